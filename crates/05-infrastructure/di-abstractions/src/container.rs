//! 依赖注入容器配置与统计

use di_common::Lifestyle;
use serde::{Deserialize, Serialize};

/// 默认的最大解析深度
pub const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 100;

/// 自动绑定策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoBindingPolicy {
    /// 不自动绑定，未注册的契约直接失败
    #[default]
    None,
    /// 以瞬时生命周期自动绑定
    Transient,
    /// 以单例生命周期自动绑定
    Singleton,
}

impl AutoBindingPolicy {
    /// 自动绑定使用的默认生命周期
    pub fn default_lifestyle(self) -> Option<Lifestyle> {
        match self {
            Self::None => None,
            Self::Transient => Some(Lifestyle::Transient),
            Self::Singleton => Some(Lifestyle::Singleton),
        }
    }

    /// 是否启用自动绑定
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }
}

/// 容器配置
///
/// 容器本身不读取配置文件，宿主应用可以从自己的配置中反序列化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 自动绑定策略
    pub auto_binding: AutoBindingPolicy,
    /// 最大解析深度
    pub max_resolution_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            auto_binding: AutoBindingPolicy::None,
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStats {
    /// 注册的组件数量
    pub registered_components: usize,
    /// 自动绑定产生的注册数量
    pub implicit_registrations: usize,
    /// 成功解析的次数
    pub resolved_components: usize,
    /// 已实例化的固定实例数量
    pub active_singletons: usize,
    /// 解析失败的次数
    pub resolution_errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_when_fields_missing() {
        let config: ContainerConfig = serde_json::from_str(r#"{"auto_binding":"singleton"}"#).unwrap();
        assert_eq!(config.auto_binding, AutoBindingPolicy::Singleton);
        assert_eq!(config.max_resolution_depth, DEFAULT_MAX_RESOLUTION_DEPTH);

        let empty: ContainerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ContainerConfig::default());
    }

    #[test]
    fn test_policy_lifestyles() {
        assert_eq!(AutoBindingPolicy::None.default_lifestyle(), None);
        assert!(!AutoBindingPolicy::None.is_enabled());
        assert_eq!(
            AutoBindingPolicy::Transient.default_lifestyle(),
            Some(Lifestyle::Transient)
        );
    }
}
