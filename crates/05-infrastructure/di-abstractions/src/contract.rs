//! 契约与类型擦除实例
//!
//! 契约是调用方请求的类型标识。实例统一以 `Arc<dyn Any>` 擦除，内部保存 `Arc<C>`，
//! 因此 `dyn Trait` 这类不定长契约同样可以解析。

use di_common::{short_type_name, DependencyError, DependencyResult, TypeKind};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// 类型擦除后的实例，内部保存 `Arc<C>`
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 零参数构建闭包，每次调用产生一个契约实例
pub type Builder = Arc<dyn Fn() -> DependencyResult<Instance> + Send + Sync>;

/// 擦除实例类型
pub fn erase<C>(value: Arc<C>) -> Instance
where
    C: ?Sized + Send + Sync + 'static,
{
    Arc::new(value)
}

/// 还原实例类型
pub fn downcast<C>(instance: &Instance) -> Option<Arc<C>>
where
    C: ?Sized + Send + Sync + 'static,
{
    instance.downcast_ref::<Arc<C>>().cloned()
}

/// 总是返回同一实例的构建闭包
pub fn constant_builder(instance: Instance) -> Builder {
    Arc::new(move || Ok(instance.clone()))
}

/// 把构建闭包包装为 `Provider<T>` 实例
pub type ProviderWrap = fn(Builder) -> Instance;

/// 把元素实例组装为 `Vec<Arc<T>>` 实例
pub type CollectionAssemble = fn(Vec<Instance>) -> DependencyResult<Instance>;

/// 进程内已出现过的合成契约，按类型身份记录种类
static SYNTHESIZED: Lazy<RwLock<HashMap<TypeId, ContractKind>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn remember(id: TypeId, kind: &ContractKind) {
    if SYNTHESIZED.read().contains_key(&id) {
        return;
    }
    SYNTHESIZED.write().entry(id).or_insert_with(|| kind.clone());
}

/// 契约种类
#[derive(Clone)]
pub enum ContractKind {
    /// 普通服务契约
    Service,
    /// 基本类型或文本类型
    Primitive,
    /// 零参数可调用生产者 `Provider<T>`
    Provider {
        inner: Box<Contract>,
        wrap: ProviderWrap,
    },
    /// 元素契约的集合 `Vec<Arc<T>>`
    Collection {
        element: Box<Contract>,
        assemble: CollectionAssemble,
    },
}

/// 契约
///
/// 相等性只比较 `TypeId`，泛型实例化天然互不相同。
#[derive(Clone)]
pub struct Contract {
    id: TypeId,
    name: &'static str,
    kind: ContractKind,
}

impl Contract {
    /// 按类型身份创建契约
    ///
    /// `Provider<T>` 与 `Vec<Arc<T>>` 一旦在进程内出现过（合成契约、构造参数或生产者实例），
    /// 之后按同一类型创建的契约也得到相同的种类。
    pub fn of<T>() -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let id = TypeId::of::<T>();
        let synthesized = SYNTHESIZED.read().get(&id).cloned();
        let kind = synthesized.unwrap_or_else(|| match TypeKind::of::<T>() {
            TypeKind::Primitive => ContractKind::Primitive,
            TypeKind::Service => ContractKind::Service,
        });
        Self {
            id,
            name: std::any::type_name::<T>(),
            kind,
        }
    }

    /// 可调用生产者契约 `Provider<T>`
    pub fn provider<T>() -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let kind = ContractKind::Provider {
            inner: Box::new(Self::of::<T>()),
            wrap: wrap_provider::<T>,
        };
        let id = TypeId::of::<Provider<T>>();
        remember(id, &kind);
        Self {
            id,
            name: std::any::type_name::<Provider<T>>(),
            kind,
        }
    }

    /// 集合契约 `Vec<Arc<T>>`
    pub fn collection<T>() -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let kind = ContractKind::Collection {
            element: Box::new(Self::of::<T>()),
            assemble: assemble_collection::<T>,
        };
        let id = TypeId::of::<Vec<Arc<T>>>();
        remember(id, &kind);
        Self {
            id,
            name: std::any::type_name::<Vec<Arc<T>>>(),
            kind,
        }
    }

    /// 类型ID
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 简短类型名称
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }

    /// 契约种类
    pub fn kind(&self) -> &ContractKind {
        &self.kind
    }

    /// 是否为基本类型或文本类型
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ContractKind::Primitive)
    }
}

impl PartialEq for Contract {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contract {}

impl Hash for Contract {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Contract").field(&self.name).finish()
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

fn wrap_provider<T>(builder: Builder) -> Instance
where
    T: ?Sized + Send + Sync + 'static,
{
    erase(Arc::new(Provider::<T>::new(builder)))
}

fn assemble_collection<T>(elements: Vec<Instance>) -> DependencyResult<Instance>
where
    T: ?Sized + Send + Sync + 'static,
{
    let items = elements
        .iter()
        .map(|element| {
            downcast::<T>(element)
                .ok_or_else(|| DependencyError::type_mismatch(std::any::type_name::<T>()))
        })
        .collect::<DependencyResult<Vec<_>>>()?;
    Ok(erase(Arc::new(items)))
}

/// 零参数可调用生产者
///
/// 每次调用 [`Provider::get`] 都会重新执行绑定的构建闭包。
pub struct Provider<T: ?Sized> {
    builder: Builder,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T> Provider<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// 使用构建闭包创建生产者
    pub fn new(builder: Builder) -> Self {
        // 记录合成契约，使该生产者类型不能被当作普通契约注册
        let _ = Contract::provider::<T>();
        Self {
            builder,
            _marker: PhantomData,
        }
    }

    /// 生产一个实例
    pub fn get(&self) -> DependencyResult<Arc<T>> {
        let instance = (self.builder)()?;
        downcast::<T>(&instance)
            .ok_or_else(|| DependencyError::type_mismatch(std::any::type_name::<T>()))
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
