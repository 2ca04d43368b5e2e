//! # 依赖注入具体实现
//!
//! 提供具体的依赖注入容器、注册表、类型目录和解析算法实现。
//!
//! 所有 `register`/`resolve` 调用在同一个粗粒度互斥区内执行，彼此原子且互斥；
//! 依赖路径作为递归参数传递，不属于容器状态。

pub mod builder;
pub mod catalog;
mod resolver;
mod table;

pub use builder::DiContainerBuilder;
pub use catalog::TypeCatalog;

use di_abstractions::{
    Binding, ComponentRegistry, ComponentResolver, ContainerConfig, ContainerStats, Contract,
    DiagnosticsSink, Disposer, Instance, RegistrationDescriptor, RegistrationRequest, TracingSink,
};
use di_common::{DependencyError, DependencyResult, Lifestyle, ResolveError, ResolveResult};
use parking_lot::Mutex;
use resolver::Resolver;
use std::fmt::Write as _;
use std::sync::Arc;
use table::{Registration, RegistrationTable};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 互斥区内的容器状态
#[derive(Default)]
struct ContainerState {
    table: RegistrationTable,
    resolved: usize,
    errors: usize,
}

/// 具体的依赖注入容器实现
pub struct DiContainerImpl {
    id: Uuid,
    config: ContainerConfig,
    catalog: TypeCatalog,
    state: Mutex<ContainerState>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl DiContainerImpl {
    /// 使用默认配置和全局类型来源创建容器
    pub fn new() -> Self {
        Self::from_parts(
            ContainerConfig::default(),
            TypeCatalog::global(),
            Arc::new(TracingSink),
        )
    }

    /// 使用指定配置和全局类型来源创建容器
    ///
    /// 配置校验与 [`DiContainerBuilder::build`] 相同。
    pub fn with_config(config: ContainerConfig) -> DependencyResult<Self> {
        DiContainerBuilder::new().with_config(config).build()
    }

    pub(crate) fn from_parts(
        config: ContainerConfig,
        catalog: TypeCatalog,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let id = Uuid::new_v4();
        info!(
            "创建依赖注入容器 {} (自动绑定: {:?}, 最大解析深度: {})",
            id, config.auto_binding, config.max_resolution_depth
        );
        Self {
            id,
            config,
            catalog,
            state: Mutex::new(ContainerState::default()),
            diagnostics,
        }
    }

    /// 创建容器构建器
    pub fn builder() -> DiContainerBuilder {
        DiContainerBuilder::new()
    }

    /// 容器标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 类型目录
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// 生成诊断文本
    pub fn to_diagnostic_string(&self) -> String {
        let registrations = self.get_registrations();
        let mut output = format!(
            "DiContainer {} (auto_binding: {:?}, registrations: {})",
            self.id,
            self.config.auto_binding,
            registrations.len()
        );
        for registration in &registrations {
            let _ = write!(output, "\n  {registration}");
        }
        output
    }

    /// 把诊断文本写入诊断输出
    pub fn log(&self) {
        self.diagnostics.write(&self.to_diagnostic_string());
    }

    /// 验证容器状态
    ///
    /// 依次实现每个注册，返回全部失败。固定生命周期的组件会在此时被创建。
    pub fn validate(&self) -> Result<(), Vec<ResolveError>> {
        info!("验证容器 {}", self.id);
        let (contracts, errors, discarded) = {
            let mut state = self.state.lock();
            let state = &mut *state;

            let contracts: Vec<Contract> = state
                .table
                .iter()
                .map(|registration| registration.contract.clone())
                .collect();

            let mut resolver = Resolver::new(&mut state.table, &self.catalog, &self.config);
            let errors: Vec<ResolveError> = contracts
                .iter()
                .filter_map(|contract| resolver.resolve(contract).err())
                .collect();
            (contracts, errors, resolver.take_discarded())
        };
        run_disposers(discarded);

        if errors.is_empty() {
            info!("容器 {} 验证通过，共 {} 个注册", self.id, contracts.len());
            Ok(())
        } else {
            for error in &errors {
                warn!("验证失败: {}", error);
            }
            Err(errors)
        }
    }

    /// 获取统计信息
    pub fn stats(&self) -> ContainerStats {
        let state = self.state.lock();
        ContainerStats {
            registered_components: state.table.len(),
            implicit_registrations: state.table.implicit_count(),
            resolved_components: state.resolved,
            active_singletons: state
                .table
                .iter()
                .filter(|registration| registration.instance.is_some())
                .count(),
            resolution_errors: state.errors,
        }
    }

    /// 销毁容器
    ///
    /// 按注册的逆序对已实现的固定实例调用一次销毁回调，然后清空注册表。
    /// 之后的解析调用如同从未注册过任何组件。
    pub fn dispose(&self) {
        let registrations = self.state.lock().table.drain();
        let total = registrations.len();

        // 回调在互斥区外执行
        let mut disposed = 0;
        for registration in registrations.into_iter().rev() {
            if let Some(disposer) = registration.disposer {
                debug!("销毁组件: {}", registration.contract);
                disposer();
                disposed += 1;
            }
        }

        info!(
            "容器 {} 已销毁，清除 {} 个注册，销毁 {} 个组件",
            self.id, total, disposed
        );
    }

    fn record_failure(&self, error: &ResolveError) {
        self.state.lock().errors += 1;
        warn!("{}", error);
        self.diagnostics.write(&format!("解析失败: {error}"));
    }
}

/// 执行回滚时丢弃的销毁回调
fn run_disposers(disposers: Vec<Disposer>) {
    if disposers.is_empty() {
        return;
    }
    debug!("销毁回滚丢弃的 {} 个组件", disposers.len());
    for disposer in disposers {
        disposer();
    }
}

impl Default for DiContainerImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DiContainerImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiContainerImpl")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl ComponentRegistry for DiContainerImpl {
    fn register(&self, request: RegistrationRequest) -> DependencyResult<RegistrationDescriptor> {
        let RegistrationRequest { contract, binding } = request;

        let result = RegistrationTable::check_contract(&contract).and_then(|()| {
            let registration = match binding {
                Binding::Component {
                    concrete,
                    lifestyle,
                } => {
                    if !matches!(lifestyle, Lifestyle::Transient | Lifestyle::Singleton) {
                        return Err(DependencyError::binding(
                            contract.short_name(),
                            format!("组件绑定的生命周期只能是 Transient 或 Singleton, 实际为 {lifestyle}"),
                        ));
                    }
                    let concrete = match concrete {
                        Some(concrete) => concrete,
                        None => self.catalog.select_for(&contract)?,
                    };
                    Registration::component(contract.clone(), concrete, lifestyle)
                }
                Binding::Instance { instance, disposer } => {
                    Registration::instance(contract.clone(), instance, disposer)
                }
                Binding::Factory { factory } => Registration::factory(contract.clone(), factory),
            };
            self.state.lock().table.insert(registration)
        });

        match &result {
            Ok(descriptor) => info!("注册组件: {}", descriptor),
            Err(error) => warn!("注册组件失败: {}", error),
        }
        result
    }

    fn is_registered_contract(&self, contract: &Contract) -> bool {
        self.state.lock().table.contains(contract)
    }

    fn get_registrations(&self) -> Vec<RegistrationDescriptor> {
        self.state.lock().table.descriptors()
    }
}

impl ComponentResolver for DiContainerImpl {
    fn resolve_contract(&self, contract: &Contract) -> ResolveResult<Instance> {
        debug!("解析组件: {}", contract);
        let (builder, discarded) = {
            let mut state = self.state.lock();
            let state = &mut *state;
            let mut resolver = Resolver::new(&mut state.table, &self.catalog, &self.config);
            let builder = resolver.resolve(contract);
            (builder, resolver.take_discarded())
        };
        run_disposers(discarded);

        // 瞬时组件的构建闭包在互斥区外调用，此时依赖链已不可得
        let result = builder.and_then(|builder| {
            builder().map_err(|source| ResolveError::new(contract.short_name(), "", source))
        });

        match result {
            Ok(instance) => {
                self.state.lock().resolved += 1;
                Ok(instance)
            }
            Err(error) => {
                self.record_failure(&error);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{Constructor, Injectable, MemorySink, ModuleTypes, TypeDescriptor};

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct EnglishGreeter;

    impl Greeter for EnglishGreeter {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    impl Injectable for EnglishGreeter {
        fn descriptor() -> TypeDescriptor {
            TypeDescriptor::builder::<EnglishGreeter>()
                .implements::<dyn Greeter>(|greeter| greeter)
                .constructor(Constructor::new("new"), |_| Ok(EnglishGreeter))
                .build()
        }
    }

    fn container() -> DiContainerImpl {
        DiContainerImpl::builder()
            .add_type_source(Arc::new(ModuleTypes::new("greeters").with::<EnglishGreeter>()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_component_binding_rejects_fixed_external_lifestyles() {
        let container = container();
        let error = container
            .register(RegistrationRequest::component::<dyn Greeter, EnglishGreeter>(
                Lifestyle::InstanceProvided,
            ))
            .unwrap_err();
        assert!(matches!(error, DependencyError::Binding { .. }));
        assert!(container.get_registrations().is_empty());
    }

    #[test]
    fn test_contract_registration_selects_from_catalog() {
        let container = container();
        let descriptor = container
            .register_singleton_contract::<dyn Greeter>()
            .unwrap();
        assert_eq!(descriptor.concrete.as_deref(), Some("EnglishGreeter"));
        assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn test_primitive_check_precedes_catalog_selection() {
        let container = container();
        let error = container
            .register(RegistrationRequest::catalog::<u32>(Lifestyle::Transient))
            .unwrap_err();
        assert!(matches!(error, DependencyError::Binding { .. }));
    }

    #[test]
    fn test_stats_and_diagnostics() {
        let sink = Arc::new(MemorySink::new());
        let container = DiContainerImpl::builder()
            .add_type_source(Arc::new(ModuleTypes::new("greeters").with::<EnglishGreeter>()))
            .with_diagnostics(sink.clone())
            .build()
            .unwrap();

        container
            .register_singleton::<dyn Greeter, EnglishGreeter>()
            .unwrap();
        container.resolve::<dyn Greeter>().unwrap();
        assert!(container.resolve::<EnglishGreeter>().is_err());

        let stats = container.stats();
        assert_eq!(stats.registered_components, 1);
        assert_eq!(stats.active_singletons, 1);
        assert_eq!(stats.resolved_components, 1);
        assert_eq!(stats.resolution_errors, 1);

        container.log();
        let lines = sink.lines();
        assert!(lines[0].starts_with("解析失败"));
        assert!(lines
            .iter()
            .any(|line| line.contains("dyn Greeter -> EnglishGreeter [Singleton] (realized)")));
    }
}
