use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, instrument};

use super::events::IndexedEvent;
use super::ids::UserId;
use crate::shared::AppError;

/// Receives every event the stream accepts, addressed to the users that may see it
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_ids: &[UserId], event: &IndexedEvent) -> Result<(), AppError>;
}

/// A registered one-shot delivery slot.
///
/// A slot is `Registered` while it sits in the registry. It leaves the
/// registry exactly once, under the registry lock, either by delivery or by
/// cancellation; whichever takes the lock first decides the outcome.
struct Slot {
    id: u64,
    sender: oneshot::Sender<IndexedEvent>,
    // Dropping this stops the slot's cancellation watcher
    _retired: oneshot::Sender<()>,
}

#[derive(Default)]
struct Registry {
    next_slot_id: u64,
    users: HashMap<UserId, Vec<Slot>>,
}

/// Terminal state of a listener
#[derive(Debug, Clone, PartialEq)]
pub enum ListenOutcome {
    Delivered(IndexedEvent),
    Cancelled,
}

/// Receiving end of a slot returned by [`StreamMux::listen`]
#[derive(Debug)]
pub struct Listener {
    slot_id: u64,
    receiver: oneshot::Receiver<IndexedEvent>,
}

impl Listener {
    pub fn slot_id(&self) -> u64 {
        self.slot_id
    }

    /// Waits for the slot to reach a terminal state
    pub async fn recv(self) -> ListenOutcome {
        match self.receiver.await {
            Ok(event) => ListenOutcome::Delivered(event),
            Err(_) => ListenOutcome::Cancelled,
        }
    }
}

/// Per-user registry of one-shot wake-up slots
///
/// Each listener receives at most one event and is then retired, so a client
/// that wants the next event after that must listen again.
#[derive(Clone, Default)]
pub struct StreamMux {
    registry: Arc<Mutex<Registry>>,
}

impl StreamMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a slot for `user_id` that is removed when `cancel` completes
    /// unless an event reaches it first.
    ///
    /// Dropping the returned `Listener` does not free the slot. Until `cancel`
    /// completes or a send addresses `user_id`, the slot and its watcher task
    /// stay alive, so callers should pass a cancel signal that eventually fires.
    #[instrument(skip(self, cancel))]
    pub async fn listen<C>(&self, user_id: UserId, cancel: C) -> Listener
    where
        C: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let (retired, retired_rx) = oneshot::channel::<()>();

        let slot_id = {
            let mut registry = self.registry.lock().await;
            let slot_id = registry.next_slot_id;
            registry.next_slot_id += 1;
            registry.users.entry(user_id.clone()).or_default().push(Slot {
                id: slot_id,
                sender,
                _retired: retired,
            });
            slot_id
        };

        debug!(user_id = %user_id, slot_id, "Listener registered");

        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel => {
                    Self::cancel_slot(&registry, &user_id, slot_id).await;
                }
                _ = retired_rx => {}
            }
        });

        Listener { slot_id, receiver }
    }

    /// Removes and closes a slot if it is still registered.
    /// Returns false when the slot was already retired.
    async fn cancel_slot(registry: &Mutex<Registry>, user_id: &UserId, slot_id: u64) -> bool {
        let mut registry = registry.lock().await;

        let Some(slots) = registry.users.get_mut(user_id) else {
            return false;
        };
        let Some(position) = slots.iter().position(|slot| slot.id == slot_id) else {
            return false;
        };

        // Dropping the sender closes the listener without a value
        slots.swap_remove(position);
        if slots.is_empty() {
            registry.users.remove(user_id);
        }

        debug!(user_id = %user_id, slot_id, "Listener cancelled");
        true
    }

    /// Number of slots currently registered for a user
    pub async fn pending_listeners(&self, user_id: &UserId) -> usize {
        let registry = self.registry.lock().await;
        registry.users.get(user_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl Notifier for StreamMux {
    /// Delivers `event` to every slot of every listed user and retires those slots.
    /// Users without slots are skipped.
    #[instrument(skip(self, user_ids, event), fields(index = event.index))]
    async fn send(&self, user_ids: &[UserId], event: &IndexedEvent) -> Result<(), AppError> {
        let mut registry = self.registry.lock().await;

        for user_id in user_ids {
            let Some(slots) = registry.users.remove(user_id) else {
                continue;
            };

            let slot_count = slots.len();
            for slot in slots {
                if slot.sender.send(event.clone()).is_err() {
                    debug!(user_id = %user_id, slot_id = slot.id, "Listener dropped before delivery");
                }
            }

            debug!(user_id = %user_id, slots = slot_count, "Event delivered to listeners");
        }

        Ok(())
    }
}
