//! 类型描述符与构造函数
//!
//! Rust 没有运行时反射，具体类型通过 [`TypeDescriptor`] 描述自己：
//! 可赋值的契约、按声明顺序排列的构造函数，以及可选的销毁能力。

use crate::contract::{downcast, erase, Contract, Instance, Provider};
use crate::registry::Disposer;
use di_common::{Disposable, DependencyError, DependencyResult};
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 把具体类型实例转换为契约实例
pub type Coercion = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// 擦除后的构造函数调用
pub type Invoke = Arc<dyn Fn(&Arguments) -> DependencyResult<Instance> + Send + Sync>;

/// 可注入组件 trait
///
/// 组件提供自己的描述符，供显式注册和类型目录使用。
pub trait Injectable: Send + Sync + 'static {
    /// 获取类型描述符
    fn descriptor() -> TypeDescriptor
    where
        Self: Sized;
}

/// 构造函数参数
#[derive(Clone)]
pub struct Parameter {
    contract: Contract,
    default: Option<Instance>,
}

impl Parameter {
    /// 参数契约
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// 默认值（存在时跳过递归解析）
    pub fn default_value(&self) -> Option<&Instance> {
        self.default.as_ref()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("contract", &self.contract)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// 构造函数签名
#[derive(Clone, Debug)]
pub struct Constructor {
    name: &'static str,
    parameters: Vec<Parameter>,
    marked: bool,
}

impl Constructor {
    /// 创建新的构造函数签名
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            parameters: Vec::new(),
            marked: false,
        }
    }

    /// 添加实例参数
    pub fn param<P>(mut self) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
    {
        self.parameters.push(Parameter {
            contract: Contract::of::<P>(),
            default: None,
        });
        self
    }

    /// 添加可调用生产者参数 `Provider<P>`
    pub fn provider<P>(mut self) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
    {
        self.parameters.push(Parameter {
            contract: Contract::provider::<P>(),
            default: None,
        });
        self
    }

    /// 添加集合参数 `Vec<Arc<P>>`
    pub fn all<P>(mut self) -> Self
    where
        P: ?Sized + Send + Sync + 'static,
    {
        self.parameters.push(Parameter {
            contract: Contract::collection::<P>(),
            default: None,
        });
        self
    }

    /// 添加带默认值的参数
    pub fn with_default<P>(mut self, value: P) -> Self
    where
        P: Send + Sync + 'static,
    {
        self.parameters.push(Parameter {
            contract: Contract::of::<P>(),
            default: Some(erase(Arc::new(value))),
        });
        self
    }

    /// 标记为首选构造函数
    pub fn marked(mut self) -> Self {
        self.marked = true;
        self
    }

    /// 构造函数名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 参数列表
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// 是否带有首选标记
    pub fn is_marked(&self) -> bool {
        self.marked
    }
}

/// 已绑定调用逻辑的构造函数
#[derive(Clone)]
pub struct ConstructorDescriptor {
    signature: Constructor,
    invoke: Invoke,
}

impl ConstructorDescriptor {
    /// 构造函数签名
    pub fn signature(&self) -> &Constructor {
        &self.signature
    }

    /// 调用构造函数，返回具体类型实例
    pub fn invoke(&self) -> &Invoke {
        &self.invoke
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.signature.fmt(f)
    }
}

/// 构造函数收到的已解析参数
pub struct Arguments {
    owner: &'static str,
    values: Vec<Instance>,
}

impl Arguments {
    /// 创建参数列表
    pub fn new(owner: &'static str, values: Vec<Instance>) -> Self {
        Self { owner, values }
    }

    /// 参数数量
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 获取实例参数
    pub fn get<P>(&self, index: usize) -> DependencyResult<Arc<P>>
    where
        P: ?Sized + Send + Sync + 'static,
    {
        let value = self.values.get(index).ok_or_else(|| {
            DependencyError::constructor_selection(
                self.owner,
                format!("参数索引 {index} 超出范围 (共 {} 个)", self.values.len()),
            )
        })?;
        downcast::<P>(value).ok_or_else(|| DependencyError::type_mismatch(std::any::type_name::<P>()))
    }

    /// 获取可调用生产者参数
    pub fn provider<P>(&self, index: usize) -> DependencyResult<Provider<P>>
    where
        P: ?Sized + Send + Sync + 'static,
    {
        self.get::<Provider<P>>(index).map(|provider| (*provider).clone())
    }

    /// 获取集合参数
    pub fn all<P>(&self, index: usize) -> DependencyResult<Arc<Vec<Arc<P>>>>
    where
        P: ?Sized + Send + Sync + 'static,
    {
        self.get::<Vec<Arc<P>>>(index)
    }
}

/// 具体类型实现的契约
#[derive(Clone)]
pub struct Implementation {
    contract: Contract,
    coercion: Coercion,
}

impl Implementation {
    /// 契约
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// 类型转换
    pub fn coercion(&self) -> &Coercion {
        &self.coercion
    }
}

/// 类型描述符
#[derive(Clone)]
pub struct TypeDescriptor {
    contract: Contract,
    implementations: Vec<Implementation>,
    constructors: Vec<ConstructorDescriptor>,
    disposer: Option<fn(&Instance)>,
}

impl TypeDescriptor {
    /// 创建类型描述符构建器
    pub fn builder<T>() -> TypeDescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
    {
        TypeDescriptorBuilder::new()
    }

    /// 类型ID
    pub fn type_id(&self) -> TypeId {
        self.contract.id()
    }

    /// 完整类型名称
    pub fn type_name(&self) -> &'static str {
        self.contract.name()
    }

    /// 具体类型自身的契约
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// 实现的契约列表（第一个总是自身）
    pub fn implementations(&self) -> &[Implementation] {
        &self.implementations
    }

    /// 是否可赋值给契约
    pub fn is_assignable_to(&self, contract: &Contract) -> bool {
        self.coercion_to(contract).is_some()
    }

    /// 获取到指定契约的类型转换
    pub fn coercion_to(&self, contract: &Contract) -> Option<&Coercion> {
        self.implementations
            .iter()
            .find(|implementation| implementation.contract == *contract)
            .map(|implementation| &implementation.coercion)
    }

    /// 按声明顺序排列的构造函数
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// 是否具备销毁能力
    pub fn is_disposable(&self) -> bool {
        self.disposer.is_some()
    }

    /// 为已创建的具体实例生成销毁回调
    pub fn disposer_for(&self, raw: &Instance) -> Option<Disposer> {
        let dispose = self.disposer?;
        let raw = raw.clone();
        Some(Box::new(move || dispose(&raw)))
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type", &self.contract.name())
            .field(
                "implements",
                &self
                    .implementations
                    .iter()
                    .map(|implementation| implementation.contract.name())
                    .collect::<Vec<_>>(),
            )
            .field("constructors", &self.constructors)
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

/// 类型描述符构建器
pub struct TypeDescriptorBuilder<T> {
    implementations: Vec<Implementation>,
    constructors: Vec<ConstructorDescriptor>,
    disposer: Option<fn(&Instance)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypeDescriptorBuilder<T>
where
    T: Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            implementations: vec![Implementation {
                contract: Contract::of::<T>(),
                coercion: coercion_with::<T, T>(|value| value),
            }],
            constructors: Vec::new(),
            disposer: None,
            _marker: PhantomData,
        }
    }

    /// 声明实现的契约
    ///
    /// ```ignore
    /// TypeDescriptor::builder::<Console>().implements::<dyn Logger>(|console| console)
    /// ```
    pub fn implements<C>(mut self, coerce: fn(Arc<T>) -> Arc<C>) -> Self
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let contract = Contract::of::<C>();
        if !self
            .implementations
            .iter()
            .any(|implementation| implementation.contract == contract)
        {
            self.implementations.push(Implementation {
                contract,
                coercion: coercion_with::<T, C>(coerce),
            });
        }
        self
    }

    /// 声明构造函数
    pub fn constructor<F>(mut self, signature: Constructor, build: F) -> Self
    where
        F: Fn(&Arguments) -> DependencyResult<T> + Send + Sync + 'static,
    {
        let invoke: Invoke = Arc::new(move |arguments: &Arguments| {
            Ok(erase(Arc::new(build(arguments)?)))
        });
        self.constructors.push(ConstructorDescriptor { signature, invoke });
        self
    }

    /// 构建类型描述符
    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor {
            contract: Contract::of::<T>(),
            implementations: self.implementations,
            constructors: self.constructors,
            disposer: self.disposer,
        }
    }
}

impl<T> TypeDescriptorBuilder<T>
where
    T: Disposable + 'static,
{
    /// 声明销毁能力
    pub fn disposable(mut self) -> Self {
        self.disposer = Some(dispose_erased::<T>);
        self
    }
}

fn coercion_with<T, C>(coerce: fn(Arc<T>) -> Arc<C>) -> Coercion
where
    T: Send + Sync + 'static,
    C: ?Sized + Send + Sync + 'static,
{
    Arc::new(move |raw: &Instance| downcast::<T>(raw).map(|value| erase(coerce(value))))
}

fn dispose_erased<T>(raw: &Instance)
where
    T: Disposable + 'static,
{
    if let Some(value) = downcast::<T>(raw) {
        value.dispose();
    }
}
