//! 组件注册表抽象接口

use crate::contract::{erase, Builder, Contract, Instance};
use crate::factory::{Injectable, TypeDescriptor};
use di_common::{DependencyResult, Disposable, Lifestyle};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// 销毁回调，只会被调用一次
pub type Disposer = Box<dyn FnOnce() + Send>;

/// 绑定方式
pub enum Binding {
    /// 由容器构造；`concrete` 缺省时从类型目录中选择
    Component {
        concrete: Option<Arc<TypeDescriptor>>,
        lifestyle: Lifestyle,
    },
    /// 调用方提供的固定实例
    Instance {
        instance: Instance,
        disposer: Option<Disposer>,
    },
    /// 调用方提供的工厂，每次解析都调用
    Factory { factory: Builder },
}

impl Binding {
    /// 绑定对应的生命周期
    pub fn lifestyle(&self) -> Lifestyle {
        match self {
            Self::Component { lifestyle, .. } => *lifestyle,
            Self::Instance { .. } => Lifestyle::InstanceProvided,
            Self::Factory { .. } => Lifestyle::ExternalFactory,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component { concrete, lifestyle } => f
                .debug_struct("Component")
                .field("concrete", &concrete.as_ref().map(|c| c.type_name()))
                .field("lifestyle", lifestyle)
                .finish(),
            Self::Instance { disposer, .. } => f
                .debug_struct("Instance")
                .field("disposable", &disposer.is_some())
                .finish(),
            Self::Factory { .. } => f.debug_struct("Factory").finish_non_exhaustive(),
        }
    }
}

/// 注册请求
#[derive(Debug)]
pub struct RegistrationRequest {
    /// 契约
    pub contract: Contract,
    /// 绑定方式
    pub binding: Binding,
}

impl RegistrationRequest {
    /// 绑定到具体类型
    pub fn component<C, T>(lifestyle: Lifestyle) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        Self {
            contract: Contract::of::<C>(),
            binding: Binding::Component {
                concrete: Some(Arc::new(T::descriptor())),
                lifestyle,
            },
        }
    }

    /// 绑定到类型目录中唯一可赋值的类型
    pub fn catalog<C>(lifestyle: Lifestyle) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        Self {
            contract: Contract::of::<C>(),
            binding: Binding::Component {
                concrete: None,
                lifestyle,
            },
        }
    }

    /// 绑定到固定实例
    pub fn instance<C>(instance: Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        Self {
            contract: Contract::of::<C>(),
            binding: Binding::Instance {
                instance: erase(instance),
                disposer: None,
            },
        }
    }

    /// 绑定到可销毁的固定实例
    pub fn disposable_instance<C>(instance: Arc<C>) -> Self
    where
        C: ?Sized + Disposable + 'static,
    {
        let target = instance.clone();
        Self {
            contract: Contract::of::<C>(),
            binding: Binding::Instance {
                instance: erase(instance),
                disposer: Some(Box::new(move || target.dispose())),
            },
        }
    }

    /// 绑定到工厂
    pub fn factory<C, F>(factory: F) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
        F: Fn() -> DependencyResult<Arc<C>> + Send + Sync + 'static,
    {
        Self {
            contract: Contract::of::<C>(),
            binding: Binding::Factory {
                factory: Arc::new(move || factory().map(erase)),
            },
        }
    }
}

/// 注册信息描述（诊断用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationDescriptor {
    /// 契约名称
    pub contract: String,
    /// 具体类型名称
    pub concrete: Option<String>,
    /// 生命周期
    pub lifestyle: Lifestyle,
    /// 是否由自动绑定创建
    pub implicit: bool,
    /// 构建闭包或实例是否已就绪
    pub realized: bool,
}

impl fmt::Display for RegistrationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.contract)?;
        if let Some(concrete) = &self.concrete {
            write!(f, " -> {concrete}")?;
        }
        write!(f, " [{}]", self.lifestyle)?;
        if self.implicit {
            f.write_str(" (implicit)")?;
        }
        if self.realized {
            f.write_str(" (realized)")?;
        }
        Ok(())
    }
}

/// 组件注册表 trait
///
/// 注册调用是原子的：失败时注册表保持不变。
pub trait ComponentRegistry: Send + Sync {
    /// 注册组件
    fn register(&self, request: RegistrationRequest) -> DependencyResult<RegistrationDescriptor>;

    /// 检查契约是否已注册
    fn is_registered_contract(&self, contract: &Contract) -> bool;

    /// 按注册顺序获取所有注册信息
    fn get_registrations(&self) -> Vec<RegistrationDescriptor>;

    /// 注册瞬时组件
    fn register_transient<C, T>(&self) -> DependencyResult<RegistrationDescriptor>
    where
        Self: Sized,
        C: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        self.register(RegistrationRequest::component::<C, T>(Lifestyle::Transient))
    }

    /// 注册单例组件
    fn register_singleton<C, T>(&self) -> DependencyResult<RegistrationDescriptor>
    where
        Self: Sized,
        C: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        self.register(RegistrationRequest::component::<C, T>(Lifestyle::Singleton))
    }

    /// 注册瞬时契约，具体类型取自类型目录
    fn register_transient_contract<C>(&self) -> DependencyResult<RegistrationDescriptor>
    where
        Self: Sized,
        C: ?Sized + Send + Sync + 'static,
    {
        self.register(RegistrationRequest::catalog::<C>(Lifestyle::Transient))
    }

    /// 注册单例契约，具体类型取自类型目录
    fn register_singleton_contract<C>(&self) -> DependencyResult<RegistrationDescriptor>
    where
        Self: Sized,
        C: ?Sized + Send + Sync + 'static,
    {
        self.register(RegistrationRequest::catalog::<C>(Lifestyle::Singleton))
    }

    /// 注册组件实例
    fn register_instance<C>(&self, instance: Arc<C>) -> DependencyResult<RegistrationDescriptor>
    where
        Self: Sized,
        C: ?Sized + Send + Sync + 'static,
    {
        self.register(RegistrationRequest::instance(instance))
    }

    /// 注册可销毁的组件实例
    fn register_disposable_instance<C>(
        &self,
        instance: Arc<C>,
    ) -> DependencyResult<RegistrationDescriptor>
    where
        Self: Sized,
        C: ?Sized + Disposable + 'static,
    {
        self.register(RegistrationRequest::disposable_instance(instance))
    }

    /// 注册组件工厂
    fn register_factory<C, F>(&self, factory: F) -> DependencyResult<RegistrationDescriptor>
    where
        Self: Sized,
        C: ?Sized + Send + Sync + 'static,
        F: Fn() -> DependencyResult<Arc<C>> + Send + Sync + 'static,
    {
        self.register(RegistrationRequest::factory(factory))
    }

    /// 检查组件是否已注册
    fn is_registered<C>(&self) -> bool
    where
        Self: Sized,
        C: ?Sized + Send + Sync + 'static,
    {
        self.is_registered_contract(&Contract::of::<C>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_lifestyles() {
        let instance = RegistrationRequest::instance(Arc::new(5_u8));
        assert_eq!(instance.binding.lifestyle(), Lifestyle::InstanceProvided);

        let factory = RegistrationRequest::factory::<u8, _>(|| Ok(Arc::new(1)));
        assert_eq!(factory.binding.lifestyle(), Lifestyle::ExternalFactory);
    }

    #[test]
    fn test_descriptor_display_and_serialize() {
        let descriptor = RegistrationDescriptor {
            contract: "dyn Greeter".to_string(),
            concrete: Some("EnglishGreeter".to_string()),
            lifestyle: Lifestyle::Singleton,
            implicit: true,
            realized: false,
        };

        assert_eq!(
            descriptor.to_string(),
            "dyn Greeter -> EnglishGreeter [Singleton] (implicit)"
        );
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["lifestyle"], "Singleton");
        assert_eq!(json["implicit"], true);
    }
}
