use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotificationLevel {
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A transient, non-blocking message for the person at the keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Notification {
    pub(crate) level: NotificationLevel,
    pub(crate) message: String,
}

/// Cloneable sending half of the notification feed.
///
/// Sending never blocks and never fails loudly: a closed receiver just means
/// nobody is looking at the screen any more.
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn success(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Success, message.into());
    }

    pub(crate) fn warning(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Warning, message.into());
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message.into());
    }

    fn push(&self, level: NotificationLevel, message: String) {
        tracing::debug!(level = level.as_str(), %message, "notification");
        if self.tx.send(Notification { level, message }).is_err() {
            tracing::trace!("notification receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifications_arrive_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.success("Exam started successfully!");
        notifier.warning("Window lost focus");

        let first = rx.recv().await.expect("first");
        let second = rx.recv().await.expect("second");
        assert_eq!(first.level, NotificationLevel::Success);
        assert_eq!(second.message, "Window lost focus");
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);
        notifier.error("nobody listening");
    }
}
