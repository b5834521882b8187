//! Events delivered to whoever is watching an upload

use tokio::sync::mpsc::UnboundedSender;

use crate::progress::ProgressUpdate;

/// Everything an observer hears about one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Narration of the step about to run, e.g. `Connecting to host:22...`
    Status(String),
    /// Non-fatal problem, the upload carries on
    Warning(String),
    Progress(ProgressUpdate),
    Completed,
    /// Classified, user-safe failure message
    Failed(String),
}

/// Delivery mechanism for upload events.
///
/// Called from the upload task, never from the caller's own thread, so
/// implementations that must run elsewhere (a UI loop, a terminal renderer)
/// should hand the event off rather than act on it inline.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, event: UploadEvent);

    fn status(&self, text: String) {
        self.notify(UploadEvent::Status(text));
    }
}

impl<F> Notifier for F
where
    F: Fn(UploadEvent) + Send + Sync + 'static,
{
    fn notify(&self, event: UploadEvent) {
        self(event)
    }
}

/// Forwards events over an unbounded channel to a receiver on another task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<UploadEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<UploadEvent>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: UploadEvent) {
        // Receiver gone means nobody is listening any more
        if self.tx.send(event).is_err() {
            tracing::debug!("Upload event dropped, receiver closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_notifier() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier = move |event: UploadEvent| sink.lock().unwrap().push(event);

        notifier.status("Connecting...".to_string());
        notifier.notify(UploadEvent::Completed);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![UploadEvent::Status("Connecting...".to_string()), UploadEvent::Completed]
        );
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let notifier = ChannelNotifier::new(tx);

        notifier.status("one".to_string());
        notifier.notify(UploadEvent::Failed("two".to_string()));
        drop(notifier);

        assert_eq!(rx.recv().await, Some(UploadEvent::Status("one".to_string())));
        assert_eq!(rx.recv().await, Some(UploadEvent::Failed("two".to_string())));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_channel_notifier_survives_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelNotifier::new(tx).notify(UploadEvent::Completed);
    }
}
