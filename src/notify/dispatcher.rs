//! Notification Dispatcher
//!
//! Bounded mpsc channel between committed operations and the delivery
//! worker. Enqueueing never blocks a settlement: a full or closed queue
//! drops the message with an error log.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{Notification, Notifier, Outbox};

/// Sender side, held by the service
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Queue every message of a committed operation; returns how many were queued
    pub fn dispatch(&self, outbox: Outbox) -> usize {
        let mut queued = 0;
        for notification in outbox.into_inner() {
            match self.tx.try_send(notification) {
                Ok(()) => queued += 1,
                Err(mpsc::error::TrySendError::Full(n)) => {
                    error!(id = %n.id, name = %n.name, "Notification queue full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(n)) => {
                    error!(id = %n.id, name = %n.name, "Notification worker stopped, message dropped");
                }
            }
        }
        queued
    }
}

/// Receiver side: delivers to the recipient and every supervisor
pub struct NotificationWorker {
    rx: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
    supervisors: Vec<String>,
}

impl NotificationWorker {
    /// Deliver one message; returns true when every delivery succeeded
    pub async fn deliver(&self, notification: &Notification) -> bool {
        let mut ok = true;

        match &notification.handle {
            Some(handle) => {
                if !self
                    .notifier
                    .notify(handle, &notification.name, &notification.text)
                    .await
                {
                    warn!(
                        id = %notification.id,
                        handle = %handle,
                        name = %notification.name,
                        notifier = self.notifier.name(),
                        "Notification delivery failed"
                    );
                    ok = false;
                }
            }
            None => {
                debug!(id = %notification.id, name = %notification.name, "Recipient has no handle");
            }
        }

        for supervisor in &self.supervisors {
            if notification.handle.as_deref() == Some(supervisor.as_str()) {
                continue;
            }
            if !self
                .notifier
                .notify(supervisor, &notification.name, &notification.text)
                .await
            {
                warn!(id = %notification.id, supervisor = %supervisor, "Supervisor copy failed");
                ok = false;
            }
        }
        ok
    }

    /// Deliver everything already queued, without waiting for more
    pub async fn drain(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(notification) = self.rx.try_recv() {
            self.deliver(&notification).await;
            delivered += 1;
        }
        delivered
    }

    /// Run until every dispatcher is dropped
    pub async fn run(mut self) {
        info!(
            notifier = self.notifier.name(),
            supervisors = self.supervisors.len(),
            "Notification worker started"
        );
        while let Some(notification) = self.rx.recv().await {
            self.deliver(&notification).await;
        }
        info!("Notification worker stopped");
    }
}

/// Create a dispatcher/worker pair
pub fn notification_channel(
    buffer: usize,
    notifier: Arc<dyn Notifier>,
    supervisors: Vec<String>,
) -> (NotificationDispatcher, NotificationWorker) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        NotificationDispatcher { tx },
        NotificationWorker {
            rx,
            notifier,
            supervisors,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Party;
    use crate::notify::RecordingNotifier;

    #[tokio::test]
    async fn test_recipient_and_supervisors_receive() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, mut worker) =
            notification_channel(8, notifier.clone(), vec!["900".into()]);

        let mut outbox = Outbox::new();
        outbox.notify_party(&Party::new(5, "seller").with_notify_handle("100"), "new order");
        outbox.notify_party(&Party::new(6, "no-handle"), "internal order");
        assert_eq!(dispatcher.dispatch(outbox), 2);

        assert_eq!(worker.drain().await, 2);
        assert_eq!(notifier.sent_to("100"), vec!["new order".to_string()]);
        assert_eq!(
            notifier.sent_to("900"),
            vec!["new order".to_string(), "internal order".to_string()]
        );
    }

    #[tokio::test]
    async fn test_supervisor_not_notified_twice() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, mut worker) =
            notification_channel(8, notifier.clone(), vec!["100".into()]);

        let mut outbox = Outbox::new();
        outbox.notify_party(&Party::new(5, "boss").with_notify_handle("100"), "hi");
        dispatcher.dispatch(outbox);
        worker.drain().await;
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, _worker) = notification_channel(1, notifier, Vec::new());

        let mut outbox = Outbox::new();
        outbox.notify_party(&Party::new(1, "a"), "one");
        outbox.notify_party(&Party::new(2, "b"), "two");
        assert_eq!(dispatcher.dispatch(outbox), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_reported() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.set_fail(true);
        let (_dispatcher, worker) = notification_channel(1, notifier, Vec::new());
        let n = Notification::new(Some("1".into()), "a", "text");
        assert!(!worker.deliver(&n).await);
    }
}
