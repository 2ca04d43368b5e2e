//! 依赖解析引擎的集中集成测试

use di_abstractions::{
    register_global_source, AutoBindingPolicy, ComponentRegistry, ComponentResolver, Constructor,
    ContainerConfig, Injectable, MemorySink, ModuleTypes, TypeDescriptor,
};
use di_common::{DependencyError, Disposable, Lifestyle};
use di_impl::DiContainerImpl;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

trait Foo: Send + Sync {
    fn shutdowns(&self) -> usize;
}

#[derive(Default)]
struct FooImpl {
    shutdowns: AtomicUsize,
}

impl Foo for FooImpl {
    fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Disposable for FooImpl {
    fn dispose(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

impl Injectable for FooImpl {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<FooImpl>()
            .implements::<dyn Foo>(|foo| foo)
            .constructor(Constructor::new("new"), |_| Ok(FooImpl::default()))
            .disposable()
            .build()
    }
}

/// 只通过全局类型来源可见的组件
trait Mailer: Send + Sync {
    fn send(&self, to: &str) -> String;
}

struct SmtpMailer;

impl Mailer for SmtpMailer {
    fn send(&self, to: &str) -> String {
        format!("sent to {to}")
    }
}

impl Injectable for SmtpMailer {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<SmtpMailer>()
            .implements::<dyn Mailer>(|mailer| mailer)
            .constructor(Constructor::new("new"), |_| Ok(SmtpMailer))
            .build()
    }
}

struct Newsletter {
    mailer: Arc<dyn Mailer>,
}

impl Injectable for Newsletter {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::builder::<Newsletter>()
            .constructor(Constructor::new("new").param::<dyn Mailer>(), |args| {
                Ok(Newsletter {
                    mailer: args.get::<dyn Mailer>(0)?,
                })
            })
            .build()
    }
}

#[test]
fn test_register_resolve_dispose_scenario() -> anyhow::Result<()> {
    init_tracing();
    let container = DiContainerImpl::new();

    container.register_singleton::<dyn Foo, FooImpl>()?;
    let first = container.resolve::<dyn Foo>()?;
    let second = container.resolve::<dyn Foo>()?;
    assert!(Arc::ptr_eq(&first, &second));

    let duplicate = container.register_singleton::<dyn Foo, FooImpl>();
    assert!(matches!(
        duplicate,
        Err(DependencyError::DuplicateBinding { .. })
    ));

    container.dispose();
    assert_eq!(first.shutdowns(), 1);

    let error = container.resolve::<dyn Foo>().err().unwrap();
    assert!(matches!(error.cause(), DependencyError::UnresolvedType { .. }));
    Ok(())
}

#[test]
fn test_global_sources_feed_default_catalog() -> anyhow::Result<()> {
    init_tracing();
    register_global_source(Arc::new(
        ModuleTypes::new("mail").with::<SmtpMailer>().with::<Newsletter>(),
    ));

    let container = DiContainerImpl::with_config(ContainerConfig {
        auto_binding: AutoBindingPolicy::Transient,
        ..ContainerConfig::default()
    })?;

    let newsletter = container.resolve::<Newsletter>()?;
    assert_eq!(newsletter.mailer.send("ops"), "sent to ops");

    let implicit: Vec<_> = container
        .get_registrations()
        .into_iter()
        .filter(|registration| registration.implicit)
        .map(|registration| (registration.contract, registration.lifestyle))
        .collect();
    assert_eq!(
        implicit,
        vec![
            ("dyn Mailer".to_string(), Lifestyle::Transient),
            ("Newsletter".to_string(), Lifestyle::Transient),
        ]
    );
    Ok(())
}

#[test]
fn test_diagnostics_reach_the_sink() -> anyhow::Result<()> {
    let sink = Arc::new(MemorySink::new());
    let container = DiContainerImpl::builder()
        .add_type_source(Arc::new(ModuleTypes::new("foo").with::<FooImpl>()))
        .with_diagnostics(sink.clone())
        .build()?;

    container.register_transient::<dyn Foo, FooImpl>()?;
    container.log();

    let lines = sink.lines();
    assert!(lines[0].starts_with(&format!("DiContainer {}", container.id())));
    assert_eq!(lines[1].trim(), "dyn Foo -> FooImpl [Transient]");

    let stats = serde_json::to_value(container.stats())?;
    assert_eq!(stats["registered_components"], 1);
    Ok(())
}
