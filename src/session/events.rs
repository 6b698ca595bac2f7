use super::SessionEvent;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::debug;

type SubscriptionId = u64;

struct Subscription {
    tx: tokio_mpsc::UnboundedSender<SessionEvent>,
}

/// Handle for subscribing to session events
#[derive(Clone)]
pub struct SessionEventsHandle {
    subscriptions: Arc<Mutex<HashMap<SubscriptionId, Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionEventsHandle {
    /// Create a new events handle and spawn a task to dispatch incoming
    /// events to all subscribers
    pub fn new(mut events_rx: tokio_mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        let subscriptions: Arc<Mutex<HashMap<SubscriptionId, Subscription>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let subscriptions_clone = subscriptions.clone();

        tokio::spawn(async move {
            loop {
                match events_rx.recv().await {
                    Some(event) => {
                        let mut subs = subscriptions_clone.lock().unwrap();
                        let mut to_remove = Vec::new();

                        for (id, subscription) in subs.iter() {
                            // If send fails, receiver was dropped - mark for removal
                            if subscription.tx.send(event.clone()).is_err() {
                                to_remove.push(*id);
                            }
                        }

                        for id in to_remove {
                            subs.remove(&id);
                        }
                    }
                    None => {
                        debug!("Session events channel closed, exiting");
                        break;
                    }
                }
            }
        });

        Self {
            subscriptions,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to all session events
    /// Subscription is automatically removed when the receiver is dropped
    pub fn subscribe(&self) -> tokio_mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        self.subscriptions
            .lock()
            .unwrap()
            .insert(id, Subscription { tx });
        rx
    }
}
