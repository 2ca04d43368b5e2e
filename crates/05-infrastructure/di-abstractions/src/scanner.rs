//! 类型来源抽象接口
//!
//! 类型目录由外部模块提供的类型来源组成。Rust 没有程序集扫描，
//! 每个模块以 [`ModuleTypes`] 列出自己的可注入类型。

use crate::factory::{Injectable, TypeDescriptor};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// 类型来源 trait
///
/// 用于向类型目录提供候选具体类型
pub trait TypeSource: Send + Sync {
    /// 获取来源名称
    fn name(&self) -> &str;

    /// 枚举来源中的具体类型
    fn types(&self) -> Vec<TypeDescriptor>;
}

/// 模块类型列表
///
/// 描述符函数在 [`TypeSource::types`] 被调用时才执行。
#[derive(Clone)]
pub struct ModuleTypes {
    name: String,
    descriptors: Vec<fn() -> TypeDescriptor>,
}

impl ModuleTypes {
    /// 创建新的模块类型列表
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptors: Vec::new(),
        }
    }

    /// 添加可注入类型
    pub fn with<T: Injectable>(self) -> Self {
        self.with_descriptor(T::descriptor)
    }

    /// 添加描述符函数
    pub fn with_descriptor(mut self, descriptor: fn() -> TypeDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// 类型数量
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl TypeSource for ModuleTypes {
    fn name(&self) -> &str {
        &self.name
    }

    fn types(&self) -> Vec<TypeDescriptor> {
        self.descriptors.iter().map(|descriptor| descriptor()).collect()
    }
}

impl fmt::Debug for ModuleTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleTypes")
            .field("name", &self.name)
            .field("types", &self.descriptors.len())
            .finish()
    }
}

/// 全局类型来源注册表
static GLOBAL_TYPE_SOURCES: Lazy<RwLock<Vec<Arc<dyn TypeSource>>>> =
    Lazy::new(|| RwLock::new(Vec::new()));

/// 注册全局类型来源
///
/// 未显式指定类型来源的容器使用全局类型来源构建类型目录。
pub fn register_global_source(source: Arc<dyn TypeSource>) {
    tracing::debug!("注册全局类型来源: {}", source.name());
    GLOBAL_TYPE_SOURCES.write().push(source);
}

/// 获取所有全局类型来源
pub fn global_sources() -> Vec<Arc<dyn TypeSource>> {
    GLOBAL_TYPE_SOURCES.read().clone()
}
