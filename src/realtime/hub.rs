use std::collections::HashMap;
use std::sync::Arc;
use actix::prelude::{Recipient, SendError};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use tracing::{debug, info};

use super::messages::Push;

/// Somewhere a serialized message can be delivered. Returns false once the
/// receiving side is gone so the hub can drop it.
pub trait PushSink: Send + Sync {
    fn push(&self, payload: &str) -> bool;
}

impl PushSink for Recipient<Push> {
    fn push(&self, payload: &str) -> bool {
        match self.try_send(Push(payload.to_string())) {
            Ok(()) => true,
            // A full mailbox is a slow client, not a dead one
            Err(SendError::Full(_)) => true,
            Err(SendError::Closed(_)) => false,
        }
    }
}

impl PushSink for mpsc::UnboundedSender<String> {
    fn push(&self, payload: &str) -> bool {
        self.send(payload.to_string()).is_ok()
    }
}

type Connections = HashMap<Uuid, Arc<dyn PushSink>>;

/// Authenticated websocket sessions grouped by user.
#[derive(Default)]
pub struct NotificationHub {
    users: Arc<RwLock<HashMap<Uuid, Connections>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: Uuid, connection_id: Uuid, sink: Arc<dyn PushSink>) {
        self.users
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(connection_id, sink);
        info!("Registered connection {} for user {}", connection_id, user_id);
    }

    pub async fn unregister(&self, user_id: Uuid, connection_id: Uuid) -> bool {
        let mut users = self.users.write().await;
        let removed = match users.get_mut(&user_id) {
            Some(connections) => {
                let removed = connections.remove(&connection_id).is_some();
                if connections.is_empty() {
                    users.remove(&user_id);
                }
                removed
            }
            None => false,
        };
        if removed {
            info!("Removed connection {} for user {}", connection_id, user_id);
        }
        removed
    }

    /// Delivers to every session of the user, returning how many received it.
    pub async fn push_to_user(&self, user_id: Uuid, payload: &str) -> usize {
        let mut users = self.users.write().await;
        let Some(connections) = users.get_mut(&user_id) else {
            return 0;
        };

        let before = connections.len();
        connections.retain(|connection_id, sink| {
            let alive = sink.push(payload);
            if !alive {
                debug!("Pruning closed connection {} for user {}", connection_id, user_id);
            }
            alive
        });
        let delivered = connections.len();
        if connections.is_empty() {
            users.remove(&user_id);
        }

        debug!("Pushed to {}/{} connections of user {}", delivered, before, user_id);
        delivered
    }

    pub async fn push_to_users(&self, user_ids: &[Uuid], payload: &str) -> usize {
        let mut delivered = 0;
        for user_id in user_ids {
            delivered += self.push_to_user(*user_id, payload).await;
        }
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.users.read().await.values().map(|c| c.len()).sum()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    #[cfg(test)]
    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.users.read().await.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_reaches_every_session_of_user() {
        let hub = NotificationHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel::<String>();
        let (tx2, mut rx2) = mpsc::unbounded_channel::<String>();
        let (tx3, mut rx3) = mpsc::unbounded_channel::<String>();

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        hub.register(alice, Uuid::new_v4(), Arc::new(tx1)).await;
        hub.register(alice, Uuid::new_v4(), Arc::new(tx2)).await;
        hub.register(bob, Uuid::new_v4(), Arc::new(tx3)).await;
        assert_eq!(hub.connection_count().await, 3);
        assert_eq!(hub.user_count().await, 2);

        assert_eq!(hub.push_to_user(alice, "hello alice").await, 2);
        assert_eq!(rx1.try_recv().unwrap(), "hello alice");
        assert_eq!(rx2.try_recv().unwrap(), "hello alice");
        assert!(rx3.try_recv().is_err());

        assert_eq!(hub.push_to_users(&[alice, bob], "everyone").await, 3);
        assert_eq!(rx3.try_recv().unwrap(), "everyone");
    }

    #[tokio::test]
    async fn test_unregister_and_offline_users() {
        let hub = NotificationHub::new();
        let (tx, _rx) = mpsc::unbounded_channel::<String>();
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();

        hub.register(user, conn, Arc::new(tx)).await;
        assert!(hub.is_online(user).await);

        assert!(hub.unregister(user, conn).await);
        assert!(!hub.unregister(user, conn).await);
        assert!(!hub.is_online(user).await);
        assert_eq!(hub.push_to_user(user, "nobody home").await, 0);
    }

    #[tokio::test]
    async fn test_closed_sinks_are_pruned() {
        let hub = NotificationHub::new();
        let (live_tx, mut live_rx) = mpsc::unbounded_channel::<String>();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel::<String>();
        drop(dead_rx);

        let user = Uuid::new_v4();
        hub.register(user, Uuid::new_v4(), Arc::new(live_tx)).await;
        hub.register(user, Uuid::new_v4(), Arc::new(dead_tx)).await;

        assert_eq!(hub.push_to_user(user, "ping").await, 1);
        assert_eq!(live_rx.try_recv().unwrap(), "ping");
        assert_eq!(hub.connection_count().await, 1);
    }

    struct Collector(mpsc::UnboundedSender<String>);

    impl actix::Actor for Collector {
        type Context = actix::Context<Self>;
    }

    impl actix::Handler<Push> for Collector {
        type Result = ();

        fn handle(&mut self, msg: Push, _: &mut Self::Context) {
            let _ = self.0.send(msg.0);
        }
    }

    #[actix_rt::test]
    async fn test_actor_recipient_sink() {
        use actix::Actor;

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let addr = Collector(tx).start();
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        hub.register(user, Uuid::new_v4(), Arc::new(addr.recipient::<Push>())).await;

        assert_eq!(hub.push_to_user(user, "from the hub").await, 1);
        assert_eq!(rx.recv().await.unwrap(), "from the hub");
    }
}
