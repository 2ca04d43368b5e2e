//! # 示例应用程序
//!
//! 演示如何用 Lorn DI 组装一个小型订单处理对象图

use clap::Parser;
use di_abstractions::{
    AutoBindingPolicy, ComponentRegistry, ComponentResolver, Constructor, ContainerConfig,
    Injectable, ModuleTypes, Provider, TypeDescriptor,
};
use di_common::Disposable;
use di_impl::DiContainerImpl;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "composition-simple")]
#[command(about = "Lorn DI 对象图组装示例")]
struct Args {
    /// 容器配置文件路径（JSON）
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,
}

trait Logger: Send + Sync {
    fn write(&self, message: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn write(&self, message: &str) {
        info!(target: "orders", "{}", message);
    }
}

impl Injectable for ConsoleLogger {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<ConsoleLogger>()
            .implements::<dyn Logger>(|logger| logger)
            .constructor(Constructor::new("new"), |_| Ok(ConsoleLogger))
            .build()
    }
}

trait OrderRepository: Send + Sync {
    fn save(&self, order: &str) -> usize;
}

/// 内存订单仓储
#[derive(Default)]
struct MemoryRepository {
    saved: AtomicUsize,
}

impl OrderRepository for MemoryRepository {
    fn save(&self, _order: &str) -> usize {
        self.saved.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Disposable for MemoryRepository {
    fn dispose(&self) {
        info!("关闭订单仓储，共保存 {} 个订单", self.saved.load(Ordering::SeqCst));
    }
}

impl Injectable for MemoryRepository {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<MemoryRepository>()
            .implements::<dyn OrderRepository>(|repository| repository)
            .constructor(Constructor::new("new"), |_| Ok(MemoryRepository::default()))
            .disposable()
            .build()
    }
}

/// 每次调用都生成新的请求标识
struct RequestId(usize);

static NEXT_REQUEST: AtomicUsize = AtomicUsize::new(1);

impl Injectable for RequestId {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<RequestId>()
            .constructor(Constructor::new("next"), |_| {
                Ok(RequestId(NEXT_REQUEST.fetch_add(1, Ordering::SeqCst)))
            })
            .build()
    }
}

trait OrderHook: Send + Sync {
    fn name(&self) -> &'static str;
}

struct AuditHook;
struct MetricsHook;

impl OrderHook for AuditHook {
    fn name(&self) -> &'static str {
        "audit"
    }
}

impl OrderHook for MetricsHook {
    fn name(&self) -> &'static str {
        "metrics"
    }
}

impl Injectable for AuditHook {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<AuditHook>()
            .implements::<dyn OrderHook>(|hook| hook)
            .constructor(Constructor::new("new"), |_| Ok(AuditHook))
            .build()
    }
}

impl Injectable for MetricsHook {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<MetricsHook>()
            .implements::<dyn OrderHook>(|hook| hook)
            .constructor(Constructor::new("new"), |_| Ok(MetricsHook))
            .build()
    }
}

/// 订单服务
struct OrderService {
    logger: Arc<dyn Logger>,
    repository: Arc<dyn OrderRepository>,
    request_ids: Provider<RequestId>,
    hooks: Arc<Vec<Arc<dyn OrderHook>>>,
    max_retries: u32,
}

impl OrderService {
    fn place(&self, order: &str) -> anyhow::Result<()> {
        let request = self.request_ids.get()?;
        let total = self.repository.save(order);
        let hooks: Vec<_> = self.hooks.iter().map(|hook| hook.name()).collect();
        self.logger.write(&format!(
            "请求 #{} 保存订单 {} (累计 {}, 钩子 {:?}, 最大重试 {})",
            request.0, order, total, hooks, self.max_retries
        ));
        Ok(())
    }
}

impl Injectable for OrderService {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<OrderService>()
            .constructor(
                Constructor::new("new")
                    .param::<dyn Logger>()
                    .param::<dyn OrderRepository>()
                    .provider::<RequestId>()
                    .all::<dyn OrderHook>()
                    .with_default(3_u32),
                |args| {
                    Ok(OrderService {
                        logger: args.get::<dyn Logger>(0)?,
                        repository: args.get::<dyn OrderRepository>(1)?,
                        request_ids: args.provider::<RequestId>(2)?,
                        hooks: args.all::<dyn OrderHook>(3)?,
                        max_retries: *args.get::<u32>(4)?,
                    })
                },
            )
            .build()
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&args.log_level))
        .init();

    info!("启动 Lorn DI 示例应用");

    let config = load_config(args.config.as_deref())?;
    let container = DiContainerImpl::builder()
        .with_config(config)
        .add_type_source(Arc::new(
            ModuleTypes::new("composition-simple")
                .with::<ConsoleLogger>()
                .with::<MemoryRepository>()
                .with::<RequestId>()
                .with::<AuditHook>()
                .with::<MetricsHook>()
                .with::<OrderService>(),
        ))
        .build()?;

    container.register_singleton::<dyn Logger, ConsoleLogger>()?;
    container.register_singleton::<dyn OrderRepository, MemoryRepository>()?;
    container.register_transient::<RequestId, RequestId>()?;
    container.register_transient::<OrderService, OrderService>()?;

    if container.config().auto_binding == AutoBindingPolicy::None {
        container.register_singleton::<dyn OrderHook, AuditHook>()?;
    }

    if let Err(errors) = container.validate() {
        for e in &errors {
            error!("容器验证失败: {}", e);
        }
        anyhow::bail!("容器验证失败，共 {} 个错误", errors.len());
    }

    let service = container.resolve::<OrderService>()?;
    service.place("A-1001")?;
    service.place("A-1002")?;
    container.resolve::<OrderService>()?.place("B-2001")?;

    container.log();
    info!("容器统计: {}", serde_json::to_string(&container.stats())?);

    container.dispose();
    info!("应用已关闭");
    Ok(())
}

/// 读取容器配置，未指定文件时启用瞬时自动绑定
fn load_config(path: Option<&str>) -> anyhow::Result<ContainerConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let config: ContainerConfig = serde_json::from_str(&text)?;
            info!("从 {} 读取容器配置: {:?}", path, config);
            Ok(config)
        }
        None => Ok(ContainerConfig {
            auto_binding: AutoBindingPolicy::Transient,
            ..ContainerConfig::default()
        }),
    }
}

/// 解析日志级别
fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
