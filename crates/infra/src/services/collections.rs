//! Merchandising collections: admin-curated tiles with an uploaded image.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use storefront_auth::{Principal, require_admin};
use storefront_catalog::{
    Collection, CollectionCommand, CollectionEvent, CollectionId, CollectionPatch, CreateCollection,
    DeleteCollection, UpdateCollection,
};
use storefront_core::{AggregateId, DomainError, Resource};
use storefront_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::CommandDispatcher;
use crate::errors::ServiceResult;
use crate::event_store::{EventStore, StoredEvent};
use crate::external::{ObjectStorage, discard_uploads};
use crate::projections::{COLLECTION_AGGREGATE, CollectionView, ReadModels};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCollection {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    /// Local file, uploaded before the collection is recorded.
    pub image_path: String,
    pub redirect_url: String,
    /// Defaults to 0.
    pub position: Option<u32>,
    /// Defaults to true.
    pub is_active: Option<bool>,
}

/// Allow-listed edit. A new `image_path` is uploaded and replaces the image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionUpdate {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub image_path: Option<String>,
    pub redirect_url: Option<String>,
    pub position: Option<u32>,
    pub is_active: Option<bool>,
}

fn empty_collection(aggregate_id: AggregateId) -> Collection {
    Collection::empty(CollectionId::new(aggregate_id))
}

pub struct CollectionService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    read: Arc<ReadModels<S>>,
    storage: Arc<dyn ObjectStorage>,
    conflict_retries: u32,
}

impl<S, B> CollectionService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        read: Arc<ReadModels<S>>,
        storage: Arc<dyn ObjectStorage>,
        conflict_retries: u32,
    ) -> Self {
        Self {
            dispatcher,
            read,
            storage,
            conflict_retries,
        }
    }

    pub fn create_collection(
        &self,
        principal: &Principal,
        input: NewCollection,
    ) -> ServiceResult<CollectionView> {
        require_admin(principal)?;
        if input.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty").into());
        }
        let collection_id = CollectionId::new(AggregateId::new());
        let image = self.storage.upload(&input.image_path)?;

        let cmd = CollectionCommand::CreateCollection(CreateCollection {
            collection_id,
            title: input.title,
            subtitle: input.subtitle,
            description: input.description,
            image: image.clone(),
            redirect_url: input.redirect_url,
            position: input.position.unwrap_or(0),
            is_active: input.is_active.unwrap_or(true),
            occurred_at: Utc::now(),
        });
        let committed = self
            .dispatcher
            .dispatch(collection_id.0, COLLECTION_AGGREGATE, &cmd, empty_collection)
            .inspect_err(|_| discard_uploads(self.storage.as_ref(), std::slice::from_ref(&image)))?;
        self.read.settle(collection_id.0, &committed);

        info!(collection_id = %collection_id, "collection created");
        view_of(&committed.state)
    }

    pub fn update_collection(
        &self,
        principal: &Principal,
        collection_id: CollectionId,
        update: CollectionUpdate,
    ) -> ServiceResult<CollectionView> {
        require_admin(principal)?;
        let uploaded = match &update.image_path {
            Some(path) => vec![self.storage.upload(path)?],
            None => Vec::new(),
        };

        let cmd = CollectionCommand::UpdateCollection(UpdateCollection {
            collection_id,
            patch: CollectionPatch {
                title: update.title,
                subtitle: update.subtitle,
                description: update.description,
                image: uploaded.first().cloned(),
                redirect_url: update.redirect_url,
                position: update.position,
                is_active: update.is_active,
            },
            occurred_at: Utc::now(),
        });
        let committed = self
            .dispatcher
            .dispatch_with_retry(
                self.conflict_retries,
                collection_id.0,
                COLLECTION_AGGREGATE,
                &cmd,
                empty_collection,
            )
            .inspect_err(|_| discard_uploads(self.storage.as_ref(), &uploaded))?;
        self.read.settle(collection_id.0, &committed);

        for event in decoded(&committed.events) {
            if let CollectionEvent::CollectionUpdated(e) = event {
                if let Some(old) = e.replaced_image {
                    discard_uploads(self.storage.as_ref(), &[old]);
                }
            }
        }

        info!(collection_id = %collection_id, "collection updated");
        view_of(&committed.state)
    }

    pub fn delete_collection(&self, principal: &Principal, collection_id: CollectionId) -> ServiceResult<()> {
        require_admin(principal)?;
        let cmd = CollectionCommand::DeleteCollection(DeleteCollection {
            collection_id,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            collection_id.0,
            COLLECTION_AGGREGATE,
            &cmd,
            empty_collection,
        )?;
        self.read.settle(collection_id.0, &committed);

        for event in decoded(&committed.events) {
            if let CollectionEvent::CollectionDeleted(e) = event {
                discard_uploads(self.storage.as_ref(), &[e.image]);
            }
        }

        info!(collection_id = %collection_id, "collection deleted");
        Ok(())
    }

    pub fn get_collection(&self, collection_id: CollectionId) -> ServiceResult<CollectionView> {
        view_of(&self.dispatcher.load(collection_id.0, empty_collection)?)
    }

    /// Shoppers and anonymous callers see active collections; admins see all.
    pub fn list_collections(&self, viewer: Option<&Principal>) -> Vec<CollectionView> {
        let include_inactive = viewer.is_some_and(Principal::is_admin);
        self.read.collections().list(include_inactive)
    }
}

/// The image URLs a committed write released live in its events.
fn decoded(events: &[StoredEvent]) -> impl Iterator<Item = CollectionEvent> + '_ {
    events
        .iter()
        .filter_map(|stored| serde_json::from_value(stored.payload.clone()).ok())
}

fn view_of(collection: &Collection) -> ServiceResult<CollectionView> {
    CollectionView::from_collection(collection)
        .ok_or_else(|| DomainError::not_found(Resource::Collection).into())
}
