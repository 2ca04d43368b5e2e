//! 诊断输出
//!
//! 容器本身不做 I/O，诊断文本交给外部的字符串消费者。

use parking_lot::Mutex;

/// 诊断输出 trait
pub trait DiagnosticsSink: Send + Sync {
    /// 写入一行诊断文本
    fn write(&self, message: &str);
}

/// 转发到 `tracing` 的诊断输出
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn write(&self, message: &str) {
        tracing::info!(target: "di::diagnostics", "{}", message);
    }
}

/// 收集到内存的诊断输出
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// 创建新的内存诊断输出
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收集的诊断行
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// 清空已收集的诊断行
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl DiagnosticsSink for MemorySink {
    fn write(&self, message: &str) {
        self.lines
            .lock()
            .extend(message.lines().map(str::to_string));
    }
}
