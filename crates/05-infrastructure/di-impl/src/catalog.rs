//! 类型目录
//!
//! 首次访问时从类型来源枚举具体类型，之后保持不变。

use di_abstractions::{global_sources, Contract, TypeDescriptor, TypeSource};
use di_common::{short_type_name, DependencyError, DependencyResult};
use once_cell::sync::OnceCell;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 类型目录
pub struct TypeCatalog {
    /// `None` 表示使用全局类型来源
    sources: Option<Vec<Arc<dyn TypeSource>>>,
    types: OnceCell<Vec<Arc<TypeDescriptor>>>,
}

impl TypeCatalog {
    /// 使用指定的类型来源
    pub fn new(sources: Vec<Arc<dyn TypeSource>>) -> Self {
        Self {
            sources: Some(sources),
            types: OnceCell::new(),
        }
    }

    /// 使用全局类型来源，首次访问时读取
    pub fn global() -> Self {
        Self {
            sources: None,
            types: OnceCell::new(),
        }
    }

    /// 目录中的所有具体类型
    pub fn types(&self) -> &[Arc<TypeDescriptor>] {
        self.types.get_or_init(|| {
            let sources = match &self.sources {
                Some(sources) => sources.clone(),
                None => global_sources(),
            };

            let mut seen = HashSet::new();
            let mut types = Vec::new();
            for source in &sources {
                let mut added = 0;
                for descriptor in source.types() {
                    // 相同类型出现在多个来源时保留第一个
                    if seen.insert(descriptor.type_id()) {
                        types.push(Arc::new(descriptor));
                        added += 1;
                    }
                }
                debug!("类型来源 {} 提供了 {} 个类型", source.name(), added);
            }

            debug!("类型目录初始化完成，共 {} 个类型", types.len());
            types
        })
    }

    /// 类型数量
    pub fn len(&self) -> usize {
        self.types().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.types().is_empty()
    }

    /// 按类型ID查找具体类型
    pub fn find(&self, type_id: TypeId) -> Option<&Arc<TypeDescriptor>> {
        self.types()
            .iter()
            .find(|descriptor| descriptor.type_id() == type_id)
    }

    /// 契约是否为抽象契约（目录中没有同名具体类型）
    pub fn is_abstract(&self, contract: &Contract) -> bool {
        self.find(contract.id()).is_none()
    }

    /// 可赋值给契约的所有具体类型，按目录顺序
    pub fn assignable_to(&self, contract: &Contract) -> Vec<Arc<TypeDescriptor>> {
        self.types()
            .iter()
            .filter(|descriptor| descriptor.is_assignable_to(contract))
            .cloned()
            .collect()
    }

    /// 为契约选择唯一的具体类型
    pub fn select_for(&self, contract: &Contract) -> DependencyResult<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.find(contract.id()) {
            return Ok(descriptor.clone());
        }

        let mut candidates = self.assignable_to(contract);
        match candidates.len() {
            0 => Err(DependencyError::NoAssignableTypes {
                type_name: contract.short_name(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(DependencyError::AmbiguousBinding {
                type_name: contract.short_name(),
                candidates: candidates
                    .iter()
                    .map(|descriptor| short_type_name(descriptor.type_name()))
                    .collect(),
            }),
        }
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("global", &self.sources.is_none())
            .field("initialized", &self.types.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{Constructor, Injectable, ModuleTypes};
    use mockall::mock;

    trait Shape: Send + Sync {}

    struct Circle;
    struct Square;

    impl Shape for Circle {}
    impl Shape for Square {}

    impl Injectable for Circle {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::builder::<Circle>()
                .implements::<dyn Shape>(|circle| circle)
                .constructor(Constructor::new("new"), |_| Ok(Circle))
                .build()
        }
    }

    impl Injectable for Square {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::builder::<Square>()
                .implements::<dyn Shape>(|square| square)
                .constructor(Constructor::new("new"), |_| Ok(Square))
                .build()
        }
    }

    mock! {
        Source {}

        impl TypeSource for Source {
            fn name(&self) -> &str;
            fn types(&self) -> Vec<TypeDescriptor>;
        }
    }

    #[test]
    fn test_catalog_is_computed_once() {
        let mut source = MockSource::new();
        source.expect_name().return_const("mocked".to_string());
        source
            .expect_types()
            .times(1)
            .returning(|| vec![Circle::descriptor()]);

        let catalog = TypeCatalog::new(vec![Arc::new(source)]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.find(TypeId::of::<Circle>()).is_some());
        assert_eq!(catalog.assignable_to(&Contract::of::<dyn Shape>()).len(), 1);
    }

    #[test]
    fn test_duplicate_types_keep_first() {
        let first = ModuleTypes::new("first").with::<Circle>();
        let second = ModuleTypes::new("second").with::<Circle>().with::<Square>();
        let catalog = TypeCatalog::new(vec![Arc::new(first), Arc::new(second)]);

        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_select_for_concrete_contract_uses_itself() {
        let catalog = TypeCatalog::new(vec![Arc::new(
            ModuleTypes::new("shapes").with::<Circle>().with::<Square>(),
        )]);

        let selected = catalog.select_for(&Contract::of::<Square>()).unwrap();
        assert_eq!(selected.type_id(), TypeId::of::<Square>());
        assert!(!catalog.is_abstract(&Contract::of::<Square>()));
        assert!(catalog.is_abstract(&Contract::of::<dyn Shape>()));
    }

    #[test]
    fn test_select_for_abstract_contract() {
        let single = TypeCatalog::new(vec![Arc::new(ModuleTypes::new("one").with::<Circle>())]);
        let selected = single.select_for(&Contract::of::<dyn Shape>()).unwrap();
        assert_eq!(selected.type_id(), TypeId::of::<Circle>());

        let both = TypeCatalog::new(vec![Arc::new(
            ModuleTypes::new("both").with::<Circle>().with::<Square>(),
        )]);
        match both.select_for(&Contract::of::<dyn Shape>()) {
            Err(DependencyError::AmbiguousBinding { candidates, .. }) => {
                assert_eq!(candidates, vec!["Circle".to_string(), "Square".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other.map(|d| d.type_name())),
        }

        let empty = TypeCatalog::new(Vec::new());
        assert!(matches!(
            empty.select_for(&Contract::of::<dyn Shape>()),
            Err(DependencyError::NoAssignableTypes { .. })
        ));
    }
}
