//! 注册表
//!
//! 契约到注册信息的有序映射。插入时完成全部校验，失败时表保持不变。

use crate::resolver::{Construction, Realized};
use di_abstractions::{
    constant_builder, Builder, Contract, ContractKind, Disposer, Instance, RegistrationDescriptor,
    TypeDescriptor,
};
use di_common::{short_type_name, DependencyError, DependencyResult, Lifestyle};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// 单条注册信息
pub(crate) struct Registration {
    pub(crate) contract: Contract,
    pub(crate) concrete: Option<Arc<TypeDescriptor>>,
    pub(crate) lifestyle: Lifestyle,
    pub(crate) implicit: bool,
    /// 缓存的构建闭包
    pub(crate) builder: Option<Builder>,
    /// 产生具体类型实例的构建闭包，集合解析时用于转换到元素契约
    pub(crate) raw: Option<Builder>,
    /// 固定生命周期的缓存实例
    pub(crate) instance: Option<Instance>,
    pub(crate) disposer: Option<Disposer>,
}

impl Registration {
    /// 由容器构造的组件
    pub(crate) fn component(
        contract: Contract,
        concrete: Arc<TypeDescriptor>,
        lifestyle: Lifestyle,
    ) -> Self {
        Self {
            contract,
            concrete: Some(concrete),
            lifestyle,
            implicit: false,
            builder: None,
            raw: None,
            instance: None,
            disposer: None,
        }
    }

    /// 调用方提供的实例
    pub(crate) fn instance(contract: Contract, instance: Instance, disposer: Option<Disposer>) -> Self {
        Self {
            contract,
            concrete: None,
            lifestyle: Lifestyle::InstanceProvided,
            implicit: false,
            builder: Some(constant_builder(instance.clone())),
            raw: None,
            instance: Some(instance),
            disposer,
        }
    }

    /// 调用方提供的工厂
    pub(crate) fn factory(contract: Contract, factory: Builder) -> Self {
        Self {
            contract,
            concrete: None,
            lifestyle: Lifestyle::ExternalFactory,
            implicit: false,
            builder: Some(factory),
            raw: None,
            instance: None,
            disposer: None,
        }
    }

    /// 自动绑定产生的注册，构造成功后才创建
    pub(crate) fn implicit(contract: Contract, construction: Construction) -> Self {
        let mut registration = Self {
            contract,
            concrete: construction.realized.concrete.clone(),
            lifestyle: construction.realized.lifestyle,
            implicit: true,
            builder: None,
            raw: None,
            instance: None,
            disposer: None,
        };
        registration.fill(construction);
        registration
    }

    /// 写入实现结果
    pub(crate) fn fill(&mut self, construction: Construction) {
        let Construction {
            realized,
            instance,
            disposer,
        } = construction;
        self.builder = Some(realized.builder);
        self.raw = realized.raw;
        self.instance = instance;
        self.disposer = disposer;
    }

    /// 撤销实现结果，返回尚未执行的销毁回调
    pub(crate) fn reset(&mut self) -> Option<Disposer> {
        self.builder = None;
        self.raw = None;
        self.instance = None;
        self.disposer.take()
    }

    /// 已实现时返回缓存的构建结果
    pub(crate) fn realized(&self) -> Option<Realized> {
        let builder = self.builder.clone()?;
        Some(Realized {
            builder,
            raw: self.raw.clone(),
            concrete: self.concrete.clone(),
            lifestyle: self.lifestyle,
        })
    }

    /// 具体类型是否被该注册占用
    fn claimed_type(&self) -> Option<TypeId> {
        self.concrete
            .as_ref()
            .map(|concrete| concrete.type_id())
            .filter(|type_id| *type_id != self.contract.id())
    }

    /// 诊断描述
    pub(crate) fn descriptor(&self) -> RegistrationDescriptor {
        RegistrationDescriptor {
            contract: self.contract.short_name(),
            concrete: self
                .concrete
                .as_ref()
                .map(|concrete| short_type_name(concrete.type_name())),
            lifestyle: self.lifestyle,
            implicit: self.implicit,
            realized: self.builder.is_some(),
        }
    }
}

/// 注册表
#[derive(Default)]
pub(crate) struct RegistrationTable {
    entries: Vec<Registration>,
    index: HashMap<TypeId, usize>,
    /// 具体类型 -> 占用它的契约
    claims: HashMap<TypeId, TypeId>,
}

impl RegistrationTable {
    /// 检查契约能否注册
    pub(crate) fn check_contract(contract: &Contract) -> DependencyResult<()> {
        match contract.kind() {
            ContractKind::Primitive => Err(DependencyError::binding(
                contract.short_name(),
                "基本类型和文本类型不能作为契约注册",
            )),
            ContractKind::Provider { .. } => Err(DependencyError::binding(
                contract.short_name(),
                "可调用生产者契约由容器合成，不能注册",
            )),
            ContractKind::Service | ContractKind::Collection { .. } => Ok(()),
        }
    }

    /// 校验并插入注册信息
    pub(crate) fn insert(
        &mut self,
        registration: Registration,
    ) -> DependencyResult<RegistrationDescriptor> {
        let contract = &registration.contract;
        Self::check_contract(contract)?;

        if let Some(concrete) = &registration.concrete {
            if !concrete.is_assignable_to(contract) {
                return Err(DependencyError::binding(
                    contract.short_name(),
                    format!(
                        "{} 不能赋值给该契约",
                        short_type_name(concrete.type_name())
                    ),
                ));
            }
        }

        if let Some(existing) = self.get(contract) {
            return Err(DependencyError::DuplicateBinding {
                contract: contract.short_name(),
                existing: existing.descriptor().to_string(),
            });
        }

        let claimed = registration.claimed_type();
        if let Some(concrete) = claimed {
            if let Some(owner) = self.claims.get(&concrete).and_then(|owner| self.get_by_id(*owner)) {
                return Err(DependencyError::DuplicateBinding {
                    contract: contract.short_name(),
                    existing: owner.descriptor().to_string(),
                });
            }
        }

        let descriptor = registration.descriptor();
        if let Some(concrete) = claimed {
            self.claims.insert(concrete, contract.id());
        }
        self.index.insert(contract.id(), self.entries.len());
        self.entries.push(registration);
        Ok(descriptor)
    }

    fn get_by_id(&self, type_id: TypeId) -> Option<&Registration> {
        self.index.get(&type_id).map(|index| &self.entries[*index])
    }

    /// 查找注册信息
    pub(crate) fn get(&self, contract: &Contract) -> Option<&Registration> {
        self.get_by_id(contract.id())
    }

    /// 查找可变注册信息
    pub(crate) fn get_mut(&mut self, contract: &Contract) -> Option<&mut Registration> {
        let index = *self.index.get(&contract.id())?;
        self.entries.get_mut(index)
    }

    /// 契约是否已注册
    pub(crate) fn contains(&self, contract: &Contract) -> bool {
        self.index.contains_key(&contract.id())
    }

    /// 按注册顺序遍历
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.iter()
    }

    /// 注册数量
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// 自动绑定产生的注册数量
    pub(crate) fn implicit_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.implicit).count()
    }

    /// 按注册顺序获取诊断描述
    pub(crate) fn descriptors(&self) -> Vec<RegistrationDescriptor> {
        self.entries.iter().map(Registration::descriptor).collect()
    }

    /// 移除第 `len` 条之后的注册，按插入顺序返回
    pub(crate) fn truncate(&mut self, len: usize) -> Vec<Registration> {
        if len >= self.entries.len() {
            return Vec::new();
        }
        let removed = self.entries.split_off(len);
        for registration in &removed {
            self.index.remove(&registration.contract.id());
            if let Some(concrete) = registration.claimed_type() {
                self.claims.remove(&concrete);
            }
        }
        removed
    }

    /// 取出全部注册信息并清空注册表
    pub(crate) fn drain(&mut self) -> Vec<Registration> {
        self.index.clear();
        self.claims.clear();
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{erase, Constructor};

    trait Store: Send + Sync {}
    trait Cache: Send + Sync {}

    struct MemoryStore;

    impl Store for MemoryStore {}
    impl Cache for MemoryStore {}

    struct Unrelated;

    fn store_descriptor() -> Arc<TypeDescriptor> {
        Arc::new(
            TypeDescriptor::builder::<MemoryStore>()
                .implements::<dyn Store>(|store| store)
                .implements::<dyn Cache>(|store| store)
                .constructor(Constructor::new("new"), |_| Ok(MemoryStore))
                .build(),
        )
    }

    fn unrelated_descriptor() -> Arc<TypeDescriptor> {
        Arc::new(
            TypeDescriptor::builder::<Unrelated>()
                .constructor(Constructor::new("new"), |_| Ok(Unrelated))
                .build(),
        )
    }

    #[test]
    fn test_rejects_primitive_and_provider_contracts() {
        let mut table = RegistrationTable::default();
        let primitive = Registration::instance(Contract::of::<u32>(), erase(Arc::new(1_u32)), None);
        assert!(matches!(
            table.insert(primitive),
            Err(DependencyError::Binding { .. })
        ));

        assert!(RegistrationTable::check_contract(&Contract::provider::<dyn Store>()).is_err());
        assert!(RegistrationTable::check_contract(&Contract::collection::<dyn Store>()).is_ok());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_rejects_non_assignable_concrete() {
        let mut table = RegistrationTable::default();
        let registration = Registration::component(
            Contract::of::<dyn Store>(),
            unrelated_descriptor(),
            Lifestyle::Transient,
        );
        assert!(matches!(
            table.insert(registration),
            Err(DependencyError::Binding { .. })
        ));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_duplicate_contract_names_existing_binding() {
        let mut table = RegistrationTable::default();
        table
            .insert(Registration::component(
                Contract::of::<dyn Store>(),
                store_descriptor(),
                Lifestyle::Singleton,
            ))
            .unwrap();

        let error = table
            .insert(Registration::component(
                Contract::of::<dyn Store>(),
                store_descriptor(),
                Lifestyle::Transient,
            ))
            .unwrap_err();
        match error {
            DependencyError::DuplicateBinding { existing, .. } => {
                assert_eq!(existing, "dyn Store -> MemoryStore [Singleton]");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_concrete_type_claimed_once() {
        let mut table = RegistrationTable::default();
        table
            .insert(Registration::component(
                Contract::of::<dyn Store>(),
                store_descriptor(),
                Lifestyle::Singleton,
            ))
            .unwrap();

        let error = table
            .insert(Registration::component(
                Contract::of::<dyn Cache>(),
                store_descriptor(),
                Lifestyle::Singleton,
            ))
            .unwrap_err();
        assert!(matches!(error, DependencyError::DuplicateBinding { .. }));

        // 以自身为契约的注册不占用具体类型
        table
            .insert(Registration::component(
                Contract::of::<MemoryStore>(),
                store_descriptor(),
                Lifestyle::Transient,
            ))
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_drain_preserves_registration_order() {
        let mut table = RegistrationTable::default();
        table
            .insert(Registration::instance(
                Contract::of::<MemoryStore>(),
                erase(Arc::new(MemoryStore)),
                None,
            ))
            .unwrap();
        table
            .insert(Registration::component(
                Contract::of::<dyn Store>(),
                store_descriptor(),
                Lifestyle::Transient,
            ))
            .unwrap();

        let descriptors = table.descriptors();
        assert_eq!(descriptors[0].contract, "MemoryStore");
        assert!(descriptors[0].realized);
        assert!(!descriptors[1].realized);

        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].contract, Contract::of::<dyn Store>());
        assert_eq!(table.len(), 0);
        assert!(!table.contains(&Contract::of::<dyn Store>()));
    }

    #[test]
    fn test_truncate_releases_index_and_claims() {
        let mut table = RegistrationTable::default();
        table
            .insert(Registration::component(
                Contract::of::<Unrelated>(),
                unrelated_descriptor(),
                Lifestyle::Singleton,
            ))
            .unwrap();
        table
            .insert(Registration::component(
                Contract::of::<dyn Store>(),
                store_descriptor(),
                Lifestyle::Transient,
            ))
            .unwrap();

        let removed = table.truncate(1);
        assert_eq!(removed.len(), 1);
        assert_eq!(table.len(), 1);
        assert!(!table.contains(&Contract::of::<dyn Store>()));
        assert!(table.truncate(5).is_empty());

        // 占用已释放，另一个契约可以再次绑定同一具体类型
        table
            .insert(Registration::component(
                Contract::of::<dyn Cache>(),
                store_descriptor(),
                Lifestyle::Transient,
            ))
            .unwrap();
    }
}
