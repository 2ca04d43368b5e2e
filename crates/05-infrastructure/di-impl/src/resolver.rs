//! 解析算法
//!
//! 递归地为契约生成构建闭包。固定生命周期在实现时立即调用一次，
//! 其余生命周期只缓存组合好的构建闭包，每次解析时重新调用。

use crate::catalog::TypeCatalog;
use crate::table::{Registration, RegistrationTable};
use di_abstractions::{
    constant_builder, Arguments, Builder, CollectionAssemble, ConstructorDescriptor, ContainerConfig,
    Contract, ContractKind, DependencyPath, Disposer, Instance, ProviderWrap, TypeDescriptor,
};
use di_common::{
    short_type_name, DependencyError, DependencyResult, Lifestyle, ResolveError, ResolveResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// 已实现的契约
#[derive(Clone)]
pub(crate) struct Realized {
    /// 产生契约实例的构建闭包
    pub(crate) builder: Builder,
    /// 产生具体类型实例的构建闭包
    pub(crate) raw: Option<Builder>,
    pub(crate) concrete: Option<Arc<TypeDescriptor>>,
    pub(crate) lifestyle: Lifestyle,
}

/// 一次构造的结果
pub(crate) struct Construction {
    pub(crate) realized: Realized,
    pub(crate) instance: Option<Instance>,
    pub(crate) disposer: Option<Disposer>,
}

/// 参数边上的依赖方
struct Dependent {
    name: String,
    lifestyle: Lifestyle,
}

impl Dependent {
    fn new(contract: &Contract, lifestyle: Lifestyle) -> Self {
        Self {
            name: contract.short_name(),
            lifestyle,
        }
    }
}

/// 单次顶层解析调用
pub(crate) struct Resolver<'c> {
    table: &'c mut RegistrationTable,
    catalog: &'c TypeCatalog,
    config: &'c ContainerConfig,
    /// 第一个失败点的依赖链，即解析到达的最深位置
    failure_chain: Option<String>,
    /// 本次调用中新实现的显式注册
    filled: Vec<Contract>,
    /// 回滚时丢弃的固定实例的销毁回调
    discarded: Vec<Disposer>,
}

impl<'c> Resolver<'c> {
    pub(crate) fn new(
        table: &'c mut RegistrationTable,
        catalog: &'c TypeCatalog,
        config: &'c ContainerConfig,
    ) -> Self {
        Self {
            table,
            catalog,
            config,
            failure_chain: None,
            filled: Vec::new(),
            discarded: Vec::new(),
        }
    }

    /// 取出回滚丢弃的销毁回调，由调用方在互斥区外执行
    pub(crate) fn take_discarded(&mut self) -> Vec<Disposer> {
        std::mem::take(&mut self.discarded)
    }

    /// 解析契约，返回构建闭包
    pub(crate) fn resolve(&mut self, contract: &Contract) -> ResolveResult<Builder> {
        self.failure_chain = None;
        self.filled.clear();
        let checkpoint = self.table.len();
        let root = DependencyPath::root();
        match self.realize(contract, &root, None) {
            Ok(realized) => Ok(realized.builder),
            Err(source) => {
                self.rollback(checkpoint);
                let chain = self
                    .failure_chain
                    .take()
                    .unwrap_or_else(|| contract.short_name());
                Err(ResolveError::new(contract.short_name(), chain, source))
            }
        }
    }

    /// 失败的调用不留下任何注册或实例
    fn rollback(&mut self, checkpoint: usize) {
        for contract in std::mem::take(&mut self.filled) {
            if let Some(registration) = self.table.get_mut(&contract) {
                self.discarded.extend(registration.reset());
            }
        }
        let removed = self.table.truncate(checkpoint);
        if !removed.is_empty() {
            debug!("回滚 {} 个隐式注册", removed.len());
        }
        self.discarded
            .extend(removed.into_iter().rev().filter_map(|registration| registration.disposer));
    }

    fn realize(
        &mut self,
        contract: &Contract,
        path: &DependencyPath<'_>,
        dependent: Option<&Dependent>,
    ) -> DependencyResult<Realized> {
        let result = self
            .realize_inner(contract, path, dependent)
            .and_then(|realized| {
                check_edge(dependent, contract, realized.lifestyle)?;
                Ok(realized)
            });

        if result.is_err() && self.failure_chain.is_none() {
            self.failure_chain = Some(path.describe_with(contract));
        }
        result
    }

    fn realize_inner(
        &mut self,
        contract: &Contract,
        path: &DependencyPath<'_>,
        dependent: Option<&Dependent>,
    ) -> DependencyResult<Realized> {
        if let Some(registration) = self.table.get(contract) {
            if let Some(realized) = registration.realized() {
                return Ok(realized);
            }
            let Some(descriptor) = registration.concrete.clone() else {
                return Err(DependencyError::binding(
                    contract.short_name(),
                    "注册缺少具体类型",
                ));
            };
            let lifestyle = registration.lifestyle;
            check_edge(dependent, contract, lifestyle)?;

            let construction = self.construct(contract, &descriptor, lifestyle, path)?;
            let realized = construction.realized.clone();
            if let Some(registration) = self.table.get_mut(contract) {
                registration.fill(construction);
                self.filled.push(contract.clone());
            }
            debug!("实现注册: {} [{}]", contract, lifestyle);
            return Ok(realized);
        }

        match contract.kind() {
            ContractKind::Provider { inner, wrap } => {
                self.realize_provider(contract, inner, *wrap, path)
            }
            ContractKind::Collection { element, assemble } => {
                self.realize_collection(contract, element, *assemble, path, dependent)
            }
            ContractKind::Primitive => Err(DependencyError::UnresolvedType {
                type_name: contract.short_name(),
            }),
            ContractKind::Service => self.auto_bind(contract, path, dependent),
        }
    }

    /// 自动绑定未注册的契约
    fn auto_bind(
        &mut self,
        contract: &Contract,
        path: &DependencyPath<'_>,
        dependent: Option<&Dependent>,
    ) -> DependencyResult<Realized> {
        let Some(default) = self.config.auto_binding.default_lifestyle() else {
            return Err(DependencyError::UnresolvedType {
                type_name: contract.short_name(),
            });
        };

        let descriptor = self.catalog.select_for(contract)?;
        let lifestyle = Lifestyle::implicit_for(default, dependent.map(|dependent| dependent.lifestyle));
        debug!(
            "自动绑定: {} -> {} [{}]",
            contract,
            short_type_name(descriptor.type_name()),
            lifestyle
        );
        check_edge(dependent, contract, lifestyle)?;

        let construction = self.construct(contract, &descriptor, lifestyle, path)?;
        let realized = construction.realized.clone();
        self.table
            .insert(Registration::implicit(contract.clone(), construction))?;
        Ok(realized)
    }

    /// 选择构造函数，递归解析参数，并组合构建闭包
    fn construct(
        &mut self,
        contract: &Contract,
        descriptor: &Arc<TypeDescriptor>,
        lifestyle: Lifestyle,
        path: &DependencyPath<'_>,
    ) -> DependencyResult<Construction> {
        let path = path.push(contract, self.config.max_resolution_depth)?;
        let constructor = select_constructor(descriptor)?;
        let consumer = Dependent::new(contract, lifestyle);

        let mut arguments = Vec::with_capacity(constructor.signature().parameters().len());
        for parameter in constructor.signature().parameters() {
            if let Some(value) = parameter.default_value() {
                arguments.push(constant_builder(value.clone()));
                continue;
            }

            let dependency = parameter.contract();
            if dependency.is_primitive() {
                return Err(DependencyError::constructor_selection(
                    short_type_name(descriptor.type_name()),
                    format!(
                        "构造函数 {} 的参数 {} 是基本类型且没有默认值",
                        constructor.signature().name(),
                        dependency
                    ),
                ));
            }
            arguments.push(self.realize(dependency, &path, Some(&consumer))?.builder);
        }

        let coerce = descriptor
            .coercion_to(contract)
            .cloned()
            .ok_or_else(|| DependencyError::type_mismatch(contract.name()))?;
        let invoke = constructor.invoke().clone();
        let owner = descriptor.type_name();
        let raw: Builder = Arc::new(move || {
            let values = arguments
                .iter()
                .map(|argument| argument())
                .collect::<DependencyResult<Vec<_>>>()?;
            invoke(&Arguments::new(owner, values))
        });

        if lifestyle.is_fixed() {
            let value = raw()?;
            let instance = coerce(&value).ok_or_else(|| DependencyError::type_mismatch(contract.name()))?;
            debug!("创建单例: {}", contract);
            return Ok(Construction {
                realized: Realized {
                    builder: constant_builder(instance.clone()),
                    raw: Some(constant_builder(value.clone())),
                    concrete: Some(descriptor.clone()),
                    lifestyle,
                },
                instance: Some(instance),
                disposer: descriptor.disposer_for(&value),
            });
        }

        let name = contract.name();
        let produce = raw.clone();
        let builder: Builder = Arc::new(move || {
            let value = produce()?;
            coerce(&value).ok_or_else(|| DependencyError::type_mismatch(name))
        });
        Ok(Construction {
            realized: Realized {
                builder,
                raw: Some(raw),
                concrete: Some(descriptor.clone()),
                lifestyle,
            },
            instance: None,
            disposer: None,
        })
    }

    /// 零参数可调用生产者：以生产者身份解析内部契约，包装其构建闭包
    fn realize_provider(
        &mut self,
        contract: &Contract,
        inner: &Contract,
        wrap: ProviderWrap,
        path: &DependencyPath<'_>,
    ) -> DependencyResult<Realized> {
        let path = path.push(contract, self.config.max_resolution_depth)?;
        let producer = Dependent::new(contract, Lifestyle::ExternalFactory);
        let realized = self.realize(inner, &path, Some(&producer))?;

        // 生产者对象本身是固定的，调用时才产生新值
        Ok(Realized {
            builder: constant_builder(wrap(realized.builder)),
            raw: None,
            concrete: None,
            lifestyle: Lifestyle::Singleton,
        })
    }

    /// 集合：已注册的绑定在前，自动绑定时再追加目录中尚未覆盖的类型
    fn realize_collection(
        &mut self,
        contract: &Contract,
        element: &Contract,
        assemble: CollectionAssemble,
        path: &DependencyPath<'_>,
        dependent: Option<&Dependent>,
    ) -> DependencyResult<Realized> {
        let path = path.push(contract, self.config.max_resolution_depth)?;

        let bound: Vec<(Contract, Option<std::any::TypeId>)> = self
            .table
            .iter()
            .filter(|registration| {
                registration.contract == *element
                    || registration
                        .concrete
                        .as_ref()
                        .is_some_and(|concrete| concrete.is_assignable_to(element))
            })
            .map(|registration| {
                (
                    registration.contract.clone(),
                    registration.concrete.as_ref().map(|concrete| concrete.type_id()),
                )
            })
            .collect();

        let mut covered = HashSet::new();
        let mut elements = Vec::new();
        let mut fixed = true;
        // 直接绑定到元素契约的实例或工厂，其具体类型无从得知
        let mut opaque = false;

        for (bound_contract, concrete) in bound {
            match concrete {
                Some(concrete) => {
                    if !covered.insert(concrete) {
                        continue;
                    }
                }
                None => opaque |= bound_contract == *element,
            }
            covered.insert(bound_contract.id());

            let realized = self.realize(&bound_contract, &path, dependent)?;
            fixed &= realized.lifestyle.is_fixed();
            elements.push(element_builder(&realized, &bound_contract, element, None)?);
        }

        if opaque {
            debug!("集合 {} 含有不透明绑定，不再补充目录类型", contract);
        } else if self.config.auto_binding.is_enabled() {
            for descriptor in self.catalog.assignable_to(element) {
                if !covered.insert(descriptor.type_id()) {
                    continue;
                }
                let realized = self.realize(descriptor.contract(), &path, dependent)?;
                fixed &= realized.lifestyle.is_fixed();
                elements.push(element_builder(
                    &realized,
                    descriptor.contract(),
                    element,
                    Some(&descriptor),
                )?);
            }
        }

        if elements.is_empty() {
            return Err(DependencyError::NoAssignableTypes {
                type_name: element.short_name(),
            });
        }
        debug!("集合 {} 包含 {} 个元素", contract, elements.len());

        let count = elements.len();
        let build: Builder = Arc::new(move || {
            let items = elements
                .iter()
                .map(|element| element())
                .collect::<DependencyResult<Vec<_>>>()?;
            assemble(items)
        });

        // 任一元素不固定时集合本身必须是瞬时的
        let (realized, instance) = if fixed {
            let instance = build()?;
            let realized = Realized {
                builder: constant_builder(instance.clone()),
                raw: None,
                concrete: None,
                lifestyle: Lifestyle::Singleton,
            };
            (realized, Some(instance))
        } else {
            let realized = Realized {
                builder: build,
                raw: None,
                concrete: None,
                lifestyle: Lifestyle::Transient,
            };
            (realized, None)
        };

        check_edge(dependent, contract, realized.lifestyle)?;
        if self.config.auto_binding.is_enabled() {
            self.table.insert(Registration::implicit(
                contract.clone(),
                Construction {
                    realized: realized.clone(),
                    instance,
                    disposer: None,
                },
            ))?;
            debug!("缓存集合 {} ({} 个元素, {})", contract, count, realized.lifestyle);
        }
        Ok(realized)
    }
}

/// 捕获依赖检查
fn check_edge(
    dependent: Option<&Dependent>,
    contract: &Contract,
    provider: Lifestyle,
) -> DependencyResult<()> {
    match dependent {
        Some(dependent) if !dependent.lifestyle.may_depend_on(provider) => {
            Err(DependencyError::CaptiveDependency {
                consumer: dependent.name.clone(),
                consumer_lifestyle: dependent.lifestyle,
                provider: contract.short_name(),
                provider_lifestyle: provider,
            })
        }
        _ => Ok(()),
    }
}

/// 把已实现的绑定转换为集合元素的构建闭包
///
/// `fallback` 是目录中与 `bound` 同一身份的描述符，用于以具体类型自身注册的实例或工厂。
fn element_builder(
    realized: &Realized,
    bound: &Contract,
    element: &Contract,
    fallback: Option<&Arc<TypeDescriptor>>,
) -> DependencyResult<Builder> {
    if bound == element {
        return Ok(realized.builder.clone());
    }

    let (concrete, raw) = match (&realized.concrete, &realized.raw, fallback) {
        (Some(concrete), Some(raw), _) => (concrete, raw),
        (_, _, Some(descriptor)) if descriptor.contract() == bound => {
            (descriptor, &realized.builder)
        }
        _ => return Err(DependencyError::type_mismatch(element.name())),
    };
    let coerce = concrete
        .coercion_to(element)
        .cloned()
        .ok_or_else(|| DependencyError::type_mismatch(element.name()))?;
    let raw = raw.clone();
    let name = element.name();
    Ok(Arc::new(move || {
        let value = raw()?;
        coerce(&value).ok_or_else(|| DependencyError::type_mismatch(name))
    }))
}

/// 构造函数选择
///
/// 唯一的构造函数直接使用；多个时优先唯一的标记构造函数，
/// 否则取参数最少的构造函数，并列时视为歧义。
pub(crate) fn select_constructor(
    descriptor: &TypeDescriptor,
) -> DependencyResult<&ConstructorDescriptor> {
    let type_name = short_type_name(descriptor.type_name());
    let constructors = descriptor.constructors();

    match constructors {
        [] => {
            return Err(DependencyError::constructor_selection(
                type_name,
                "没有可用的构造函数",
            ))
        }
        [only] => return Ok(only),
        _ => {}
    }

    let marked: Vec<&ConstructorDescriptor> = constructors
        .iter()
        .filter(|constructor| constructor.signature().is_marked())
        .collect();
    match marked.as_slice() {
        [only] => return Ok(*only),
        [] => {}
        _ => return Err(ambiguous_constructors(type_name, &marked)),
    }

    let fewest = constructors
        .iter()
        .map(|constructor| constructor.signature().parameters().len())
        .min()
        .unwrap_or_default();
    let shortest: Vec<&ConstructorDescriptor> = constructors
        .iter()
        .filter(|constructor| constructor.signature().parameters().len() == fewest)
        .collect();
    match shortest.as_slice() {
        [only] => Ok(*only),
        _ => Err(ambiguous_constructors(type_name, &shortest)),
    }
}

fn ambiguous_constructors(
    type_name: String,
    constructors: &[&ConstructorDescriptor],
) -> DependencyError {
    DependencyError::AmbiguousBinding {
        type_name,
        candidates: constructors
            .iter()
            .map(|constructor| constructor.signature().name().to_string())
            .collect(),
    }
}
