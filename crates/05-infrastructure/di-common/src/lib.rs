//! # DI Common
//!
//! 这个 crate 提供了依赖解析引擎各层共享的基础类型。
//!
//! ## 核心内容
//!
//! - [`DependencyError`] / [`ResolveError`] - 错误分类
//! - [`Lifestyle`] - 生命周期策略及捕获依赖规则
//! - [`Disposable`] - 单例销毁能力
//! - [`TypeKind`] - 类型种类判定（基本类型/文本类型）
//!
//! ## 设计原则
//!
//! - 所有错误都是同步的、终止性的、不可重试的
//! - 生命周期规则集中在一处，由解析器在每条参数边上调用

pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
