//! 容器构建器

use crate::catalog::TypeCatalog;
use crate::DiContainerImpl;
use di_abstractions::{
    AutoBindingPolicy, ContainerConfig, DiagnosticsSink, TracingSink, TypeSource,
};
use di_common::{DependencyError, DependencyResult};
use std::sync::Arc;
use tracing::debug;

/// 容器构建器实现
#[derive(Default)]
pub struct DiContainerBuilder {
    config: ContainerConfig,
    sources: Vec<Arc<dyn TypeSource>>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl DiContainerBuilder {
    /// 创建使用默认配置的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置容器配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置自动绑定策略
    pub fn auto_binding(mut self, policy: AutoBindingPolicy) -> Self {
        self.config.auto_binding = policy;
        self
    }

    /// 设置最大解析深度
    pub fn max_resolution_depth(mut self, depth: usize) -> Self {
        self.config.max_resolution_depth = depth;
        self
    }

    /// 添加类型来源；未添加任何来源时使用全局类型来源
    pub fn add_type_source(mut self, source: Arc<dyn TypeSource>) -> Self {
        debug!("添加类型来源: {}", source.name());
        self.sources.push(source);
        self
    }

    /// 设置诊断输出
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// 构建容器
    pub fn build(self) -> DependencyResult<DiContainerImpl> {
        if self.config.max_resolution_depth == 0 {
            return Err(DependencyError::binding(
                "ContainerConfig",
                "max_resolution_depth 必须大于 0",
            ));
        }

        let catalog = if self.sources.is_empty() {
            TypeCatalog::global()
        } else {
            TypeCatalog::new(self.sources)
        };
        let diagnostics = self
            .diagnostics
            .unwrap_or_else(|| Arc::new(TracingSink));

        Ok(DiContainerImpl::from_parts(self.config, catalog, diagnostics))
    }
}
