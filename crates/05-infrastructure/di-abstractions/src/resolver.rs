//! 组件解析器抽象接口
//!
//! 提供依赖解析的入口 trait 以及单次解析调用内的依赖路径

use crate::contract::{downcast, Contract, Instance, Provider};
use di_common::{DependencyError, DependencyResult, ResolveError, ResolveResult};
use std::sync::Arc;

/// 组件解析器 trait
///
/// 负责解析组件依赖并创建组件实例
pub trait ComponentResolver: Send + Sync {
    /// 解析契约，返回擦除类型的实例
    fn resolve_contract(&self, contract: &Contract) -> ResolveResult<Instance>;

    /// 解析指定类型的组件
    fn resolve<T>(&self) -> ResolveResult<Arc<T>>
    where
        Self: Sized,
        T: ?Sized + Send + Sync + 'static,
    {
        let contract = Contract::of::<T>();
        let instance = self.resolve_contract(&contract)?;
        restore::<T>(&contract, &instance)
    }

    /// 解析零参数可调用生产者 `Provider<T>`
    fn resolve_provider<T>(&self) -> ResolveResult<Provider<T>>
    where
        Self: Sized,
        T: ?Sized + Send + Sync + 'static,
    {
        let contract = Contract::provider::<T>();
        let instance = self.resolve_contract(&contract)?;
        restore::<Provider<T>>(&contract, &instance).map(|provider| (*provider).clone())
    }

    /// 解析所有可赋值给 `T` 的组件
    fn resolve_all<T>(&self) -> ResolveResult<Arc<Vec<Arc<T>>>>
    where
        Self: Sized,
        T: ?Sized + Send + Sync + 'static,
    {
        let contract = Contract::collection::<T>();
        let instance = self.resolve_contract(&contract)?;
        restore::<Vec<Arc<T>>>(&contract, &instance)
    }
}

fn restore<T>(contract: &Contract, instance: &Instance) -> ResolveResult<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    downcast::<T>(instance).ok_or_else(|| {
        ResolveError::new(
            contract.short_name(),
            contract.short_name(),
            DependencyError::type_mismatch(contract.name()),
        )
    })
}

/// 依赖路径
///
/// 单次顶层解析调用中正在构造的契约栈。路径是不可变的，
/// `push` 返回借用父路径的新路径，递归返回时自然弹出。
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyPath<'a> {
    frame: Option<Frame<'a>>,
}

#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    contract: &'a Contract,
    parent: &'a DependencyPath<'a>,
    depth: usize,
}

impl<'a> DependencyPath<'a> {
    /// 空路径
    pub fn root() -> Self {
        Self { frame: None }
    }

    /// 路径长度
    pub fn depth(&self) -> usize {
        self.frame.map_or(0, |frame| frame.depth)
    }

    /// 最近入栈的契约
    pub fn current(&self) -> Option<&'a Contract> {
        self.frame.map(|frame| frame.contract)
    }

    /// 检查契约是否已在路径中
    pub fn contains(&self, contract: &Contract) -> bool {
        let mut cursor = self;
        while let Some(frame) = &cursor.frame {
            if frame.contract == contract {
                return true;
            }
            cursor = frame.parent;
        }
        false
    }

    /// 压入契约
    ///
    /// 契约已在路径中时返回 [`DependencyError::RecursiveDependency`]，
    /// 路径长度达到 `max_depth` 时返回 [`DependencyError::ResolutionDepthExceeded`]。
    pub fn push<'b>(
        &'b self,
        contract: &'b Contract,
        max_depth: usize,
    ) -> DependencyResult<DependencyPath<'b>> {
        if self.contains(contract) {
            return Err(DependencyError::RecursiveDependency {
                type_name: contract.short_name(),
                dependency_chain: self.describe_with(contract),
            });
        }
        if self.depth() >= max_depth {
            return Err(DependencyError::ResolutionDepthExceeded {
                max_depth,
                dependency_chain: self.describe_with(contract),
            });
        }
        Ok(DependencyPath {
            frame: Some(Frame {
                contract,
                parent: self,
                depth: self.depth() + 1,
            }),
        })
    }

    /// 从根到当前位置的契约列表
    pub fn chain(&self) -> Vec<&'a Contract> {
        let mut chain = Vec::with_capacity(self.depth());
        let mut cursor = self.frame;
        while let Some(frame) = cursor {
            chain.push(frame.contract);
            cursor = frame.parent.frame;
        }
        chain.reverse();
        chain
    }

    /// 路径描述，形如 `A -> B -> C`
    pub fn describe(&self) -> String {
        self.chain()
            .iter()
            .map(|contract| contract.short_name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// 追加一个契约后的路径描述
    pub fn describe_with(&self, contract: &Contract) -> String {
        let mut names = self
            .chain()
            .iter()
            .map(|contract| contract.short_name())
            .collect::<Vec<_>>();
        names.push(contract.short_name());
        names.join(" -> ")
    }
}
