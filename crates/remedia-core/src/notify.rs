//! User notifications and error reporting.

use std::sync::{Arc, Mutex, PoisonError};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Toast {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Success,
            title: title.into(),
            description: None,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            title: title.into(),
            description: Some(description.into()),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Writes toasts to the log. Used where there is no UI to show them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, toast: Toast) {
        let description = toast.description.as_deref().unwrap_or_default();
        match toast.level {
            ToastLevel::Error => tracing::error!(title = %toast.title, "{}", description),
            ToastLevel::Warning => tracing::warn!(title = %toast.title, "{}", description),
            ToastLevel::Info | ToastLevel::Success => {
                tracing::info!(title = %toast.title, "{}", description);
            }
        }
    }
}

/// Keeps every toast in memory, for tests and headless callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    toasts: Arc<Mutex<Vec<Toast>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(toast);
    }
}

/// External error monitoring sink.
pub trait ErrorMonitor: Send + Sync {
    fn capture(&self, context: &str, error: &Error);
}

/// Log `error`, show a toast with the user-facing message for its kind and
/// forward it to `monitor` when one is configured.
pub fn report_error(
    notifier: &dyn Notifier,
    monitor: Option<&dyn ErrorMonitor>,
    context: &str,
    error: &Error,
) {
    let kind = error.kind();
    tracing::error!(context, ?kind, "{}", error);
    notifier.notify(Toast::error(context, kind.user_message()));
    if let Some(monitor) = monitor {
        monitor.capture(context, error);
    }
}
