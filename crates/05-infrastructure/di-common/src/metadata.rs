//! 元数据定义
//!
//! 提供类型名称和类型种类的判定

use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashSet;

/// 不允许作为契约注册的基本类型和文本类型
static PRIMITIVE_TYPES: Lazy<HashSet<TypeId>> = Lazy::new(|| {
    [
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
        TypeId::of::<String>(),
        TypeId::of::<str>(),
        TypeId::of::<&'static str>(),
    ]
    .into_iter()
    .collect()
});

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// 普通服务类型（结构体或 trait object）
    Service,
    /// 基本类型或文本类型
    Primitive,
}

impl TypeKind {
    /// 判定类型种类
    pub fn of_id(type_id: TypeId) -> Self {
        if PRIMITIVE_TYPES.contains(&type_id) {
            Self::Primitive
        } else {
            Self::Service
        }
    }

    /// 判定类型种类
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::of_id(TypeId::of::<T>())
    }
}

/// 获取简短的类型名称（去掉模块路径，保留泛型参数）
pub fn short_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();

    for ch in full_name.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            segment.push(ch);
        } else {
            result.push_str(segment.rsplit("::").next().unwrap_or(&segment));
            segment.clear();
            result.push(ch);
        }
    }
    result.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Repository<T>(T);

    #[test]
    fn test_primitive_kinds() {
        assert_eq!(TypeKind::of::<u32>(), TypeKind::Primitive);
        assert_eq!(TypeKind::of::<String>(), TypeKind::Primitive);
        assert_eq!(TypeKind::of::<str>(), TypeKind::Primitive);
        assert_eq!(TypeKind::of::<Repository<u32>>(), TypeKind::Service);
        assert_eq!(TypeKind::of::<dyn std::fmt::Debug>(), TypeKind::Service);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("app::services::UserService"), "UserService");
        assert_eq!(
            short_type_name("alloc::vec::Vec<alloc::sync::Arc<dyn app::Plugin>>"),
            "Vec<Arc<dyn Plugin>>"
        );
        assert_eq!(short_type_name("u32"), "u32");
    }
}
