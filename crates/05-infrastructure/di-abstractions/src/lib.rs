//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件注册和依赖解析的核心接口。
//!
//! ## 核心接口
//!
//! - [`Contract`] / [`Provider`] - 契约与零参数可调用生产者
//! - [`TypeDescriptor`] / [`Injectable`] - 具体类型的构造能力描述
//! - [`ComponentRegistry`] - 组件注册表接口
//! - [`ComponentResolver`] / [`DependencyPath`] - 依赖解析接口
//! - [`TypeSource`] - 类型目录的外部来源
//! - [`DiagnosticsSink`] - 诊断输出

pub mod container;
pub mod contract;
pub mod diagnostics;
pub mod factory;
pub mod registry;
pub mod resolver;
pub mod scanner;

pub use container::*;
pub use contract::*;
pub use diagnostics::*;
pub use factory::*;
pub use registry::*;
pub use resolver::*;
pub use scanner::*;
