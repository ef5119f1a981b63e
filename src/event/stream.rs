use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::events::{Event, IndexedEvent};
use super::ids::{EventId, RoomId, UserId};
use super::mux::Notifier;
use crate::room::membership::MembershipStore;
use crate::shared::AppError;

/// Extra visibility predicate applied to range candidates
pub trait EventFilter: Send + Sync {
    fn accepts(&self, event: &IndexedEvent) -> bool;
}

impl<F> EventFilter for F
where
    F: Fn(&IndexedEvent) -> bool + Send + Sync,
{
    fn accepts(&self, event: &IndexedEvent) -> bool {
        self(event)
    }
}

/// Globally ordered event log with per-identity coalescing
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Appends `event` at the next index and wakes listening room members.
    ///
    /// The index is committed before members are resolved, so an error from
    /// the membership lookup or the notifier leaves the event in the log.
    async fn push(&self, event: Event) -> Result<u64, AppError>;

    /// Events in the half-open window between `from` and `to` (either order)
    /// that `user` may see in `rooms`, keeping only the latest in-window
    /// occurrence of each event id, ascending by index, at most `limit` long.
    async fn range(
        &self,
        user: &UserId,
        filter: Option<&dyn EventFilter>,
        rooms: &HashSet<RoomId>,
        from: u64,
        to: u64,
        limit: usize,
    ) -> Result<Vec<IndexedEvent>, AppError>;

    /// The index the next push will receive
    async fn next_index(&self) -> u64;

    /// Most recent index at which `event_id` was pushed
    async fn latest_index_of(&self, event_id: &EventId) -> Option<u64>;
}

#[derive(Default)]
struct StreamInner {
    /// Position in this vector is the event's index
    events: Vec<IndexedEvent>,
    /// Every index each event id was pushed at, ascending
    occurrences: HashMap<EventId, Vec<u64>>,
}

impl StreamInner {
    /// Whether a later occurrence of the same id below `hi` also qualifies
    fn superseded_within(
        &self,
        candidate: &IndexedEvent,
        hi: u64,
        is_candidate: &impl Fn(&IndexedEvent) -> bool,
    ) -> bool {
        let Some(indices) = self.occurrences.get(candidate.event.event_id()) else {
            return false;
        };

        let after = indices.partition_point(|&index| index <= candidate.index);
        indices[after..]
            .iter()
            .take_while(|&&index| index < hi)
            .any(|&index| is_candidate(&self.events[index as usize]))
    }
}

/// In-memory implementation of EventStream
///
/// History is kept for the lifetime of the stream; nothing is compacted.
pub struct IndexedEventStream {
    membership: Arc<dyn MembershipStore + Send + Sync>,
    notifier: Arc<dyn Notifier>,
    inner: RwLock<StreamInner>,
}

impl IndexedEventStream {
    pub fn new(
        membership: Arc<dyn MembershipStore + Send + Sync>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            membership,
            notifier,
            inner: RwLock::new(StreamInner::default()),
        }
    }

    /// Rooms from `rooms` whose members include `user`
    async fn visible_rooms(
        &self,
        user: &UserId,
        rooms: &HashSet<RoomId>,
    ) -> Result<HashSet<RoomId>, AppError> {
        let mut visible = HashSet::with_capacity(rooms.len());
        for room_id in rooms {
            let members = self.membership.members_of(room_id).await?;
            if members.contains(user) {
                visible.insert(room_id.clone());
            }
        }
        Ok(visible)
    }
}

#[async_trait]
impl EventStream for IndexedEventStream {
    #[instrument(skip(self, event), fields(event_id = %event.event_id(), room_id = %event.room_id()))]
    async fn push(&self, event: Event) -> Result<u64, AppError> {
        // Held through fan-out so each user is notified in index order
        let mut inner = self.inner.write().await;

        let index = inner.events.len() as u64;
        let room_id = event.room_id().clone();
        let occurrences = inner
            .occurrences
            .entry(event.event_id().clone())
            .or_default();
        debug_assert!(occurrences.last().map_or(true, |&last| last < index));
        occurrences.push(index);

        let indexed = IndexedEvent::new(index, event);
        inner.events.push(indexed.clone());

        debug!(index, "Event appended to stream");

        let members: Vec<UserId> = self
            .membership
            .members_of(&room_id)
            .await?
            .into_iter()
            .collect();
        self.notifier.send(&members, &indexed).await?;

        Ok(index)
    }

    #[instrument(skip(self, filter, rooms), fields(rooms = rooms.len()))]
    async fn range(
        &self,
        user: &UserId,
        filter: Option<&dyn EventFilter>,
        rooms: &HashSet<RoomId>,
        from: u64,
        to: u64,
        limit: usize,
    ) -> Result<Vec<IndexedEvent>, AppError> {
        let visible = self.visible_rooms(user, rooms).await?;
        if limit == 0 || visible.is_empty() {
            return Ok(Vec::new());
        }

        let is_candidate = |event: &IndexedEvent| {
            visible.contains(event.event.room_id())
                && filter.map_or(true, |filter| filter.accepts(event))
        };

        let inner = self.inner.read().await;
        let lo = from.min(to);
        let hi = from.max(to).min(inner.events.len() as u64);

        // Ascending scan: the first `limit` representatives are final as soon as found
        let mut representatives = Vec::new();
        for index in lo..hi {
            let candidate = &inner.events[index as usize];
            if !is_candidate(candidate) || inner.superseded_within(candidate, hi, &is_candidate) {
                continue;
            }

            representatives.push(candidate.clone());
            if representatives.len() == limit {
                break;
            }
        }

        debug!(
            lo,
            hi,
            limit,
            returned = representatives.len(),
            "Range query answered"
        );

        Ok(representatives)
    }

    async fn next_index(&self) -> u64 {
        self.inner.read().await.events.len() as u64
    }

    async fn latest_index_of(&self, event_id: &EventId) -> Option<u64> {
        let inner = self.inner.read().await;
        inner
            .occurrences
            .get(event_id)
            .and_then(|indices| indices.last().copied())
    }
}
