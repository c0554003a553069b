use serde::Serialize;

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Sink for progress and status messages raised while loading a catalog
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NotifyKind);
}

/// Forwards notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, kind: NotifyKind) {
        match kind {
            NotifyKind::Info | NotifyKind::Success => tracing::info!(kind = ?kind, "{}", message),
            NotifyKind::Warning => tracing::warn!("{}", message),
            NotifyKind::Error => tracing::error!("{}", message),
        }
    }
}
