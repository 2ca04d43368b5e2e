//! 错误类型定义

use crate::lifecycle::Lifestyle;
use thiserror::Error;

/// 依赖注入错误类型
///
/// 嵌套解析中产生的错误原样向上传播，由顶层调用包装为 [`ResolveError`]。
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("绑定无效: {type_name}, 原因: {message}")]
    Binding { type_name: String, message: String },

    #[error("重复绑定: {contract}, 已存在绑定 {existing}")]
    DuplicateBinding { contract: String, existing: String },

    #[error("组件未注册且无法自动绑定: {type_name}")]
    UnresolvedType { type_name: String },

    #[error("存在多个候选: {type_name}, 候选: {}", .candidates.join(", "))]
    AmbiguousBinding {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("没有可赋值给 {type_name} 的类型")]
    NoAssignableTypes { type_name: String },

    #[error("循环依赖检测到: {dependency_chain}")]
    RecursiveDependency {
        type_name: String,
        dependency_chain: String,
    },

    #[error("捕获依赖: {consumer} ({consumer_lifestyle}) 不能直接依赖 {provider} ({provider_lifestyle})")]
    CaptiveDependency {
        consumer: String,
        consumer_lifestyle: Lifestyle,
        provider: String,
        provider_lifestyle: Lifestyle,
    },

    #[error("构造函数选择失败: {type_name}, 原因: {message}")]
    ConstructorSelection { type_name: String, message: String },

    #[error("组件创建失败: {type_name}, 原因: {source}")]
    ComponentCreationFailed {
        type_name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("类型转换失败: {type_name}")]
    TypeMismatch { type_name: String },

    #[error("解析深度超过上限 {max_depth}: {dependency_chain}")]
    ResolutionDepthExceeded {
        max_depth: usize,
        dependency_chain: String,
    },
}

impl DependencyError {
    /// 创建绑定错误
    pub fn binding(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Binding {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// 创建构造函数选择错误
    pub fn constructor_selection(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstructorSelection {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// 创建类型转换错误
    pub fn type_mismatch(type_name: impl Into<String>) -> Self {
        Self::TypeMismatch {
            type_name: type_name.into(),
        }
    }

    /// 包装构造函数内部产生的错误
    pub fn creation_failed<E>(type_name: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ComponentCreationFailed {
            type_name: type_name.into(),
            source: source.into(),
        }
    }

    /// 错误类别名称，用于日志与诊断
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Binding { .. } => "BindingError",
            Self::DuplicateBinding { .. } => "DuplicateBindingError",
            Self::UnresolvedType { .. } => "UnresolvedTypeError",
            Self::AmbiguousBinding { .. } => "AmbiguousBindingError",
            Self::NoAssignableTypes { .. } => "NoAssignableTypesError",
            Self::RecursiveDependency { .. } => "RecursiveDependencyError",
            Self::CaptiveDependency { .. } => "CaptiveDependencyError",
            Self::ConstructorSelection { .. } => "ConstructorSelectionError",
            Self::ComponentCreationFailed { .. } => "ComponentCreationFailed",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::ResolutionDepthExceeded { .. } => "ResolutionDepthExceeded",
        }
    }
}

/// 顶层解析错误
///
/// 携带解析到达的最深依赖链，原始错误保留为 `source`。
/// 构建闭包在解析完成后调用失败时，依赖链为空。
#[derive(Error, Debug)]
#[error("解析 {contract} 失败{}: {source}", describe_chain(.chain))]
pub struct ResolveError {
    contract: String,
    chain: String,
    #[source]
    source: DependencyError,
}

impl ResolveError {
    /// 创建新的顶层解析错误
    pub fn new(
        contract: impl Into<String>,
        chain: impl Into<String>,
        source: DependencyError,
    ) -> Self {
        Self {
            contract: contract.into(),
            chain: chain.into(),
            source,
        }
    }

    /// 被请求的契约名称
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// 失败时的依赖链
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// 原始错误
    pub fn cause(&self) -> &DependencyError {
        &self.source
    }

    /// 取出原始错误
    pub fn into_cause(self) -> DependencyError {
        self.source
    }
}

fn describe_chain(chain: &str) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (依赖链: {chain})")
    }
}

/// 结果类型别名
pub type DependencyResult<T> = Result<T, DependencyError>;
/// 顶层解析结果类型别名
pub type ResolveResult<T> = Result<T, ResolveError>;
