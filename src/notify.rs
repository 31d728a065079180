//! User-visible notifications. Delivery is fire-and-forget.

use tokio::sync::mpsc;

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Writes notifications to the log only; used by one-shot commands.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, message, "Notification");
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

/// Hands notifications to the run loop, which writes them on the same
/// stream as request responses.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::info!(title, message, "Notification");
        let notification = Notification {
            title: title.to_string(),
            message: message.to_string(),
        };
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification dropped, no listener");
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::{Notification, Notifier};

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, message: &str) {
            self.sent.lock().unwrap().push(Notification {
                title: title.to_string(),
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_notifier_delivers_and_tolerates_closed_channel() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify("Title", "Queued");
        assert_eq!(
            rx.recv().await,
            Some(Notification {
                title: "Title".to_string(),
                message: "Queued".to_string(),
            })
        );

        drop(rx);
        notifier.notify("Title", "nobody listening");
    }
}
