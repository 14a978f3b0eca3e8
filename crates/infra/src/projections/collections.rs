use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use storefront_catalog::{Collection, CollectionDetails, CollectionEvent, CollectionId};
use storefront_events::EventEnvelope;

use super::ProjectionError;
use super::cursors::{Position, SequenceCursors};
use crate::read_model::KeyValueStore;

pub const COLLECTION_AGGREGATE: &str = "catalog.collection";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionView {
    pub collection_id: CollectionId,
    #[serde(flatten)]
    pub details: CollectionDetails,
    pub created_at: DateTime<Utc>,
}

impl CollectionView {
    pub fn from_collection(collection: &Collection) -> Option<Self> {
        let (Some(details), Some(created_at)) = (collection.details(), collection.created_at()) else {
            return None;
        };
        Some(Self {
            collection_id: *storefront_core::AggregateRoot::id(collection),
            details: details.clone(),
            created_at,
        })
    }
}

#[derive(Debug)]
pub struct CollectionsProjection<S>
where
    S: KeyValueStore<CollectionId, CollectionView>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> CollectionsProjection<S>
where
    S: KeyValueStore<CollectionId, CollectionView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    pub fn get(&self, collection_id: &CollectionId) -> Option<CollectionView> {
        self.store.get(collection_id)
    }

    /// Position ascending, then newest first. Inactive collections only when
    /// `include_inactive`.
    pub fn list(&self, include_inactive: bool) -> Vec<CollectionView> {
        let mut collections: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|c| include_inactive || c.details.is_active)
            .collect();
        collections.sort_by(|a, b| {
            a.details
                .position
                .cmp(&b.details.position)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.collection_id.0.as_uuid().cmp(a.collection_id.0.as_uuid()))
        });
        collections
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != COLLECTION_AGGREGATE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if self.cursors.position(aggregate_id, seq)? == Position::Duplicate {
            return Ok(());
        }

        let ev: CollectionEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
        let collection_id = ev.collection_id();
        if collection_id.0 != aggregate_id {
            return Err(ProjectionError::Mismatch(
                "event collection_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            CollectionEvent::CollectionCreated(e) => {
                self.store.upsert(
                    collection_id,
                    CollectionView {
                        collection_id,
                        details: e.details,
                        created_at: e.occurred_at,
                    },
                );
            }
            CollectionEvent::CollectionUpdated(e) => {
                if let Some(mut view) = self.store.get(&collection_id) {
                    view.details = e.details;
                    self.store.upsert(collection_id, view);
                }
            }
            CollectionEvent::CollectionDeleted(_) => {
                self.store.remove(&collection_id);
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use storefront_catalog::CollectionCreated;
    use storefront_core::AggregateId;
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryKeyValueStore;

    type Projection = CollectionsProjection<InMemoryKeyValueStore<CollectionId, CollectionView>>;

    fn created(title: &str, position: u32, is_active: bool, at: DateTime<Utc>) -> EventEnvelope<JsonValue> {
        let id = CollectionId::new(AggregateId::new());
        let ev = CollectionEvent::CollectionCreated(CollectionCreated {
            collection_id: id,
            details: CollectionDetails {
                title: title.to_string(),
                subtitle: String::new(),
                description: String::new(),
                image: format!("https://cdn.test/{title}.jpg"),
                redirect_url: String::new(),
                position,
                is_active,
            },
            occurred_at: at,
        });
        EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            COLLECTION_AGGREGATE,
            1,
            serde_json::to_value(ev).unwrap(),
        )
    }

    #[test]
    fn listing_orders_by_position_then_newest() {
        let p = Projection::new(InMemoryKeyValueStore::new());
        let now = Utc::now();
        p.apply_envelope(&created("older", 1, true, now - Duration::hours(1))).unwrap();
        p.apply_envelope(&created("newer", 1, true, now)).unwrap();
        p.apply_envelope(&created("first", 0, true, now - Duration::days(3))).unwrap();
        p.apply_envelope(&created("hidden", 0, false, now)).unwrap();

        let titles: Vec<_> = p.list(false).into_iter().map(|c| c.details.title).collect();
        assert_eq!(titles, vec!["first", "newer", "older"]);
        assert_eq!(p.list(true).len(), 4);
    }
}
