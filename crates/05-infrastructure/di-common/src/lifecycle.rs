//! 组件生命周期管理

use serde::{Deserialize, Serialize};
use std::fmt;

/// 组件生命周期类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lifestyle {
    /// 瞬时模式 - 每次解析都创建新实例
    #[default]
    Transient,
    /// 单例模式 - 容器生命周期内只创建一个实例
    Singleton,
    /// 调用方提供的固定实例
    InstanceProvided,
    /// 调用方提供的工厂，每次解析都调用
    ExternalFactory,
}

impl Lifestyle {
    /// 实例在容器生命周期内是否固定
    pub fn is_fixed(self) -> bool {
        matches!(self, Self::Singleton | Self::InstanceProvided)
    }

    /// 每次解析是否可能产生不同实例
    pub fn is_varying(self) -> bool {
        !self.is_fixed()
    }

    /// 捕获依赖规则：`self` 作为依赖方时，能否直接持有 `provider` 生命周期的实例
    ///
    /// `ExternalFactory` 作为依赖方表示可调用的生产者，它的每次调用都应可能产生新值。
    pub fn may_depend_on(self, provider: Lifestyle) -> bool {
        match self {
            Self::Singleton | Self::InstanceProvided => provider.is_fixed(),
            Self::Transient => true,
            Self::ExternalFactory => provider.is_varying(),
        }
    }

    /// 自动绑定时的生命周期：固定的依赖方会把默认策略升级为单例
    pub fn implicit_for(default: Lifestyle, dependent: Option<Lifestyle>) -> Lifestyle {
        match dependent {
            Some(dependent) if dependent.is_fixed() => Self::Singleton,
            _ => default,
        }
    }
}

impl fmt::Display for Lifestyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transient => "Transient",
            Self::Singleton => "Singleton",
            Self::InstanceProvided => "InstanceProvided",
            Self::ExternalFactory => "ExternalFactory",
        };
        f.write_str(name)
    }
}

/// 可销毁组件 trait
///
/// 容器在 `dispose()` 时对已实现的单例和注册实例调用一次。
pub trait Disposable: Send + Sync {
    /// 释放组件持有的资源
    fn dispose(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_consumers_reject_varying_providers() {
        for consumer in [Lifestyle::Singleton, Lifestyle::InstanceProvided] {
            assert!(consumer.may_depend_on(Lifestyle::Singleton));
            assert!(consumer.may_depend_on(Lifestyle::InstanceProvided));
            assert!(!consumer.may_depend_on(Lifestyle::Transient));
            assert!(!consumer.may_depend_on(Lifestyle::ExternalFactory));
        }
    }

    #[test]
    fn test_transient_accepts_anything() {
        for provider in [
            Lifestyle::Transient,
            Lifestyle::Singleton,
            Lifestyle::InstanceProvided,
            Lifestyle::ExternalFactory,
        ] {
            assert!(Lifestyle::Transient.may_depend_on(provider));
        }
    }

    #[test]
    fn test_producer_requires_varying_provider() {
        assert!(Lifestyle::ExternalFactory.may_depend_on(Lifestyle::Transient));
        assert!(!Lifestyle::ExternalFactory.may_depend_on(Lifestyle::Singleton));
    }

    #[test]
    fn test_implicit_lifestyle_upgrade() {
        assert_eq!(
            Lifestyle::implicit_for(Lifestyle::Transient, Some(Lifestyle::Singleton)),
            Lifestyle::Singleton
        );
        assert_eq!(
            Lifestyle::implicit_for(Lifestyle::Transient, Some(Lifestyle::Transient)),
            Lifestyle::Transient
        );
        assert_eq!(
            Lifestyle::implicit_for(Lifestyle::Transient, Some(Lifestyle::ExternalFactory)),
            Lifestyle::Transient
        );
        assert_eq!(
            Lifestyle::implicit_for(Lifestyle::Singleton, None),
            Lifestyle::Singleton
        );
    }

    #[test]
    fn test_lifestyle_serializes_by_name() {
        let json = serde_json::to_string(&Lifestyle::InstanceProvided).unwrap();
        assert_eq!(json, "\"InstanceProvided\"");
        assert_eq!(Lifestyle::default(), Lifestyle::Transient);
    }
}
