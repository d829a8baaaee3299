//! 运行日志捕获层：把 `bridge.*` 目标上的 tracing 事件转成 [`LogEntry`]。

use domain::{LogEntry, LogLevel, now_epoch_ms};
use std::fmt::{self, Write as _};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const CAPTURED_TARGET_PREFIX: &str = "bridge.";

/// 运行日志捕获层。
///
/// 只捕获 INFO 及以上级别；条目通过无界通道交给持久化任务，
/// 写入失败不会回流到日志系统。
pub struct LogCaptureLayer {
    sender: mpsc::UnboundedSender<LogEntry>,
}

/// 创建捕获层及其接收端。
pub fn log_capture() -> (LogCaptureLayer, mpsc::UnboundedReceiver<LogEntry>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (LogCaptureLayer { sender }, receiver)
}

impl<S> Layer<S> for LogCaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with(CAPTURED_TARGET_PREFIX) {
            return;
        }
        let level = match *metadata.level() {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warn,
            Level::INFO => LogLevel::Info,
            _ => return,
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let entry = LogEntry {
            timestamp: now_epoch_ms(),
            level,
            message: visitor.finish(),
        };
        // 接收端关闭（进程退出中）时直接丢弃
        let _ = self.sender.send(entry);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{}", value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("{:?}", value));
        }
    }
}
