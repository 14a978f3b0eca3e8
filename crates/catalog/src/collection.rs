//! Merchandising collections: the curated tiles a storefront lists on its
//! landing pages, ordered by an admin-set position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, Resource};
use storefront_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub AggregateId);

impl CollectionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDetails {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    /// Public URL of the uploaded tile image.
    pub image: String,
    /// Where the tile links to.
    pub redirect_url: String,
    /// Ascending sort key for listings.
    pub position: u32,
    pub is_active: bool,
}

impl CollectionDetails {
    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if self.image.trim().is_empty() {
            return Err(DomainError::validation("image is required"));
        }
        Ok(())
    }
}

/// Partial update. `image` is the URL of an already uploaded replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionPatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub redirect_url: Option<String>,
    pub position: Option<u32>,
    pub is_active: Option<bool>,
}

impl CollectionPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn merge(&self, current: &CollectionDetails) -> DomainResult<CollectionDetails> {
        let mut next = current.clone();
        if let Some(title) = &self.title {
            next.title = title.trim().to_string();
        }
        if let Some(subtitle) = &self.subtitle {
            next.subtitle = subtitle.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(image) = &self.image {
            next.image = image.clone();
        }
        if let Some(redirect_url) = &self.redirect_url {
            next.redirect_url = redirect_url.clone();
        }
        if let Some(position) = self.position {
            next.position = position;
        }
        if let Some(is_active) = self.is_active {
            next.is_active = is_active;
        }
        next.validate()?;
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    id: CollectionId,
    details: Option<CollectionDetails>,
    created_at: Option<DateTime<Utc>>,
    deleted: bool,
    version: u64,
}

impl Collection {
    pub fn empty(id: CollectionId) -> Self {
        Self {
            id,
            details: None,
            created_at: None,
            deleted: false,
            version: 0,
        }
    }

    pub fn exists(&self) -> bool {
        self.details.is_some() && !self.deleted
    }

    /// `None` once deleted.
    pub fn details(&self) -> Option<&CollectionDetails> {
        self.details.as_ref().filter(|_| !self.deleted)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn current(&self, collection_id: CollectionId) -> DomainResult<&CollectionDetails> {
        if self.id != collection_id {
            return Err(DomainError::invariant("collection_id mismatch"));
        }
        self.details().ok_or(DomainError::not_found(Resource::Collection))
    }
}

impl AggregateRoot for Collection {
    type Id = CollectionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCollection {
    pub collection_id: CollectionId,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub image: String,
    pub redirect_url: String,
    pub position: u32,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCollection {
    pub collection_id: CollectionId,
    pub patch: CollectionPatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCollection {
    pub collection_id: CollectionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionCommand {
    CreateCollection(CreateCollection),
    UpdateCollection(UpdateCollection),
    DeleteCollection(DeleteCollection),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCreated {
    pub collection_id: CollectionId,
    pub details: CollectionDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionUpdated {
    pub collection_id: CollectionId,
    pub details: CollectionDetails,
    /// The image this update replaced, if any.
    pub replaced_image: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDeleted {
    pub collection_id: CollectionId,
    pub image: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionEvent {
    CollectionCreated(CollectionCreated),
    CollectionUpdated(CollectionUpdated),
    CollectionDeleted(CollectionDeleted),
}

impl CollectionEvent {
    pub fn collection_id(&self) -> CollectionId {
        match self {
            CollectionEvent::CollectionCreated(e) => e.collection_id,
            CollectionEvent::CollectionUpdated(e) => e.collection_id,
            CollectionEvent::CollectionDeleted(e) => e.collection_id,
        }
    }
}

impl Event for CollectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CollectionEvent::CollectionCreated(_) => "catalog.collection.created",
            CollectionEvent::CollectionUpdated(_) => "catalog.collection.updated",
            CollectionEvent::CollectionDeleted(_) => "catalog.collection.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CollectionEvent::CollectionCreated(e) => e.occurred_at,
            CollectionEvent::CollectionUpdated(e) => e.occurred_at,
            CollectionEvent::CollectionDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Collection {
    type Command = CollectionCommand;
    type Event = CollectionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CollectionEvent::CollectionCreated(e) => {
                self.id = e.collection_id;
                self.details = Some(e.details.clone());
                self.created_at = Some(e.occurred_at);
            }
            CollectionEvent::CollectionUpdated(e) => {
                self.details = Some(e.details.clone());
            }
            CollectionEvent::CollectionDeleted(_) => {
                self.deleted = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CollectionCommand::CreateCollection(cmd) => {
                if self.details.is_some() {
                    return Err(DomainError::conflict("collection already exists"));
                }
                let details = CollectionDetails {
                    title: cmd.title.trim().to_string(),
                    subtitle: cmd.subtitle.clone(),
                    description: cmd.description.clone(),
                    image: cmd.image.clone(),
                    redirect_url: cmd.redirect_url.clone(),
                    position: cmd.position,
                    is_active: cmd.is_active,
                };
                details.validate()?;
                Ok(vec![CollectionEvent::CollectionCreated(CollectionCreated {
                    collection_id: cmd.collection_id,
                    details,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CollectionCommand::UpdateCollection(cmd) => {
                let current = self.current(cmd.collection_id)?;
                if cmd.patch.is_empty() {
                    return Err(DomainError::validation("no updatable fields supplied"));
                }
                let details = cmd.patch.merge(current)?;
                let replaced_image = (details.image != current.image).then(|| current.image.clone());
                Ok(vec![CollectionEvent::CollectionUpdated(CollectionUpdated {
                    collection_id: cmd.collection_id,
                    details,
                    replaced_image,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CollectionCommand::DeleteCollection(cmd) => {
                let current = self.current(cmd.collection_id)?;
                Ok(vec![CollectionEvent::CollectionDeleted(CollectionDeleted {
                    collection_id: cmd.collection_id,
                    image: current.image.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn create(id: CollectionId) -> CollectionCommand {
        CollectionCommand::CreateCollection(CreateCollection {
            collection_id: id,
            title: "  Summer Linen ".to_string(),
            subtitle: "Light layers".to_string(),
            description: String::new(),
            image: "https://cdn.test/summer.jpg".to_string(),
            redirect_url: "/collections/summer".to_string(),
            position: 2,
            is_active: true,
            occurred_at: Utc::now(),
        })
    }

    fn created() -> Collection {
        let id = CollectionId::new(AggregateId::new());
        let mut collection = Collection::empty(id);
        execute(&mut collection, &create(id)).unwrap();
        collection
    }

    #[test]
    fn create_trims_title_and_records_creation_time() {
        let collection = created();
        assert_eq!(collection.details().unwrap().title, "Summer Linen");
        assert!(collection.created_at().is_some());
        assert_eq!(collection.version(), 1);
    }

    #[test]
    fn title_and_image_are_required() {
        let id = CollectionId::new(AggregateId::new());
        let CollectionCommand::CreateCollection(mut cmd) = create(id) else {
            unreachable!()
        };
        cmd.image = String::new();
        let err = Collection::empty(id)
            .handle(&CollectionCommand::CreateCollection(cmd.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        cmd.image = "https://cdn.test/x.jpg".to_string();
        cmd.title = "   ".to_string();
        let err = Collection::empty(id)
            .handle(&CollectionCommand::CreateCollection(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn image_swap_reports_the_replaced_url() {
        let mut collection = created();
        let id = *collection.id();
        let events = execute(
            &mut collection,
            &CollectionCommand::UpdateCollection(UpdateCollection {
                collection_id: id,
                patch: CollectionPatch {
                    image: Some("https://cdn.test/autumn.jpg".to_string()),
                    position: Some(0),
                    ..CollectionPatch::default()
                },
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let CollectionEvent::CollectionUpdated(e) = &events[0] else {
            panic!("expected an update event");
        };
        assert_eq!(e.replaced_image.as_deref(), Some("https://cdn.test/summer.jpg"));
        assert_eq!(collection.details().unwrap().position, 0);
    }

    #[test]
    fn deleted_collection_is_not_found() {
        let mut collection = created();
        let id = *collection.id();
        execute(
            &mut collection,
            &CollectionCommand::DeleteCollection(DeleteCollection {
                collection_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert!(!collection.exists());
        let err = collection
            .handle(&CollectionCommand::DeleteCollection(DeleteCollection {
                collection_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound(Resource::Collection));
    }
}
