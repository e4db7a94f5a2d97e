//! User-visible notices.

use finanboard_core::QueryKey;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A message for the user, e.g. a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub key: QueryKey,
    pub message: String,
}

impl Notice {
    pub fn success(key: QueryKey, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            key,
            message: message.into(),
        }
    }

    pub fn error(key: QueryKey, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            key,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Sink for notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(key = %notice.key, "{}", notice.message),
            NoticeLevel::Error => warn!(key = %notice.key, "{}", notice.message),
        }
    }
}

/// Forwards notices to a channel the UI drains.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            warn!("notice dropped: receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        let key = QueryKey::bills(Uuid::nil());
        notifier.notify(Notice::error(key.clone(), "could not save"));

        let notice = rx.try_recv().unwrap();
        assert!(notice.is_error());
        assert_eq!(notice.key, key);
        assert_eq!(notice.message, "could not save");
    }

    #[test]
    fn test_channel_notifier_survives_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(Notice::success(QueryKey::bills(Uuid::nil()), "saved"));
    }
}
