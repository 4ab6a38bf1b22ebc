//! Single-active-producer election and token issuance.

use axum::extract::ws::Message;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::payload::TokenMessage;

use super::registry::{ClientId, ConnectionRegistry};

/// The currently active connection, if any.
///
/// The outbound sender is kept alongside the id so deactivation can
/// notify the former holder without going back through the registry.
#[derive(Default)]
struct ActiveSlot {
    id: Option<ClientId>,
    token: Option<String>,
    sender: Option<mpsc::UnboundedSender<Message>>,
}

/// Holds the active slot and serializes all election operations.
///
/// A switch is observed as deactivate-then-activate atomically: the slot
/// mutex is held across both notifications, so concurrent `set_active`
/// calls cannot interleave. Notification sends go through unbounded
/// channels and never block under the lock.
#[derive(Default)]
pub struct ActivationManager {
    slot: Mutex<ActiveSlot>,
}

impl ActivationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id of the currently active connection.
    pub async fn active_id(&self) -> Option<ClientId> {
        self.slot.lock().await.id
    }

    /// Elect `id` as the active connection, or deactivate with `None`.
    ///
    /// Unknown ids are ignored; re-electing the current holder is a
    /// no-op. Switching always deactivates the previous holder first.
    pub async fn set_active(&self, registry: &ConnectionRegistry, id: Option<ClientId>) {
        let Some(id) = id else {
            let mut slot = self.slot.lock().await;
            if slot.id.is_some() {
                deactivate(&mut slot);
            }
            return;
        };

        let mut slot = self.slot.lock().await;
        if slot.id == Some(id) {
            return;
        }

        // Registry mutex is a leaf lock, safe to take under the slot lock.
        let Some(sender) = registry.sender(id).await else {
            tracing::warn!("ignoring activation of unknown client #{}", id);
            return;
        };

        if slot.id.is_some() {
            deactivate(&mut slot);
        }

        let token = Uuid::new_v4().to_string();
        send_token(&sender, id, Some(token.clone()));
        *slot = ActiveSlot {
            id: Some(id),
            token: Some(token),
            sender: Some(sender),
        };
    }

    /// Clear the slot if `id` holds it, notifying the connection.
    ///
    /// Called from the close procedure; a stale id is a no-op.
    pub async fn deactivate_if_active(&self, id: ClientId) {
        let mut slot = self.slot.lock().await;
        if slot.id == Some(id) {
            deactivate(&mut slot);
        }
    }

    /// The token issued to the current holder.
    #[cfg(test)]
    pub(crate) async fn active_token(&self) -> Option<String> {
        self.slot.lock().await.token.clone()
    }
}

fn deactivate(slot: &mut ActiveSlot) {
    if let (Some(id), Some(sender)) = (slot.id, slot.sender.as_ref()) {
        send_token(sender, id, None);
    }
    *slot = ActiveSlot::default();
}

/// Fire-and-forget activation/deactivation notification. A failed send is
/// logged and does not roll back the election.
fn send_token(sender: &mpsc::UnboundedSender<Message>, id: ClientId, token: Option<String>) {
    let activating = token.is_some();
    let msg = TokenMessage { token };
    match serde_json::to_string(&msg) {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).is_err() {
                tracing::warn!("failed to send token notification to client #{}", id);
            } else if activating {
                tracing::info!("sent activation token to client #{}", id);
            } else {
                tracing::info!("sent deactivation to client #{}", id);
            }
        }
        Err(e) => tracing::error!("failed to serialize token message: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> std::net::SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    async fn register(
        registry: &ConnectionRegistry,
    ) -> (ClientId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.insert(tx, test_addr(), false).await.unwrap();
        (id, rx)
    }

    fn recv_token(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<String> {
        match rx.try_recv().expect("expected a token message") {
            Message::Text(text) => {
                let msg: TokenMessage = serde_json::from_str(text.as_str()).unwrap();
                msg.token
            }
            other => panic!("expected text message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_activation_sends_token() {
        // given: one registered connection
        let registry = ConnectionRegistry::new(10);
        let manager = ActivationManager::new();
        let (id, mut rx) = register(&registry).await;

        // when: electing it
        manager.set_active(&registry, Some(id)).await;

        // then: it is active and received the token recorded in the slot
        assert_eq!(manager.active_id().await, Some(id));
        let token = recv_token(&mut rx).expect("token should be present");
        assert!(!token.is_empty());
        assert_eq!(manager.active_token().await, Some(token));
    }

    #[tokio::test]
    async fn test_switch_deactivates_previous_holder_first() {
        // given: two connections with the first one active
        let registry = ConnectionRegistry::new(10);
        let manager = ActivationManager::new();
        let (a, mut rx_a) = register(&registry).await;
        let (b, mut rx_b) = register(&registry).await;
        manager.set_active(&registry, Some(a)).await;
        let first_token = recv_token(&mut rx_a);
        assert!(first_token.is_some());

        // when: switching to the second connection
        manager.set_active(&registry, Some(b)).await;

        // then: the previous holder got the null token, the new holder a
        // fresh one, and only one connection is active
        assert_eq!(recv_token(&mut rx_a), None);
        let second_token = recv_token(&mut rx_b);
        assert!(second_token.is_some());
        assert_ne!(first_token, second_token);
        assert_eq!(manager.active_id().await, Some(b));
    }

    #[tokio::test]
    async fn test_set_active_none_deactivates() {
        // given: an active connection
        let registry = ConnectionRegistry::new(10);
        let manager = ActivationManager::new();
        let (id, mut rx) = register(&registry).await;
        manager.set_active(&registry, Some(id)).await;
        recv_token(&mut rx);

        // when: clearing the election
        manager.set_active(&registry, None).await;

        // then: the holder is notified and the slot is empty, token included
        assert_eq!(recv_token(&mut rx), None);
        assert_eq!(manager.active_id().await, None);
        assert_eq!(manager.active_token().await, None);
    }

    #[tokio::test]
    async fn test_unknown_id_is_ignored() {
        // given: an active connection
        let registry = ConnectionRegistry::new(10);
        let manager = ActivationManager::new();
        let (id, mut rx) = register(&registry).await;
        manager.set_active(&registry, Some(id)).await;
        recv_token(&mut rx);

        // when: electing an id the registry does not know
        manager.set_active(&registry, Some(999)).await;

        // then: the election is unchanged and no notification was sent
        assert_eq!(manager.active_id().await, Some(id));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reelecting_current_holder_is_noop() {
        // given: an active connection
        let registry = ConnectionRegistry::new(10);
        let manager = ActivationManager::new();
        let (id, mut rx) = register(&registry).await;
        manager.set_active(&registry, Some(id)).await;
        recv_token(&mut rx);

        // when: electing it again
        manager.set_active(&registry, Some(id)).await;

        // then: no new token is issued
        assert!(rx.try_recv().is_err());
        assert_eq!(manager.active_id().await, Some(id));
    }

    #[tokio::test]
    async fn test_deactivate_if_active_ignores_stale_id() {
        // given: an active connection
        let registry = ConnectionRegistry::new(10);
        let manager = ActivationManager::new();
        let (id, mut rx) = register(&registry).await;
        manager.set_active(&registry, Some(id)).await;
        recv_token(&mut rx);

        // when: deactivating a different id
        manager.deactivate_if_active(id + 1).await;

        // then: the election is untouched
        assert_eq!(manager.active_id().await, Some(id));

        // when: deactivating the holder itself
        manager.deactivate_if_active(id).await;

        // then: the slot clears and the holder is notified
        assert_eq!(recv_token(&mut rx), None);
        assert_eq!(manager.active_id().await, None);
    }
}
