//! Application services over the event-sourced aggregates.

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod collections;
pub mod inventory;
pub mod orders;
pub mod users;

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;

use storefront_auth::IdentityVerifier;
use storefront_events::{EventBus, EventEnvelope, InMemoryEventBus};

pub use addresses::{ADDRESS_BOOK_AGGREGATE, AddressBookService, NewAddress};
pub use cart::{CART_AGGREGATE, CartService, CartView};
pub use catalog::{CatalogService, NewProduct, NewVariant};
pub use collections::{CollectionService, CollectionUpdate, NewCollection};
pub use inventory::InventoryLedger;
pub use orders::{OrderLine, OrderService, OrderTerms};
pub use users::{USER_AGGREGATE, UserDirectory, WishlistAction};

use crate::command_dispatcher::CommandDispatcher;
use crate::config::StorefrontConfig;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::external::ObjectStorage;
use crate::projections::ReadModels;

pub type InMemoryStore = Arc<InMemoryEventStore>;
pub type InMemoryBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

/// Every service wired over one store and one bus.
pub struct Storefront<S, B> {
    pub config: StorefrontConfig,
    pub dispatcher: Arc<CommandDispatcher<S, B>>,
    pub read_models: Arc<ReadModels<S>>,
    pub inventory: Arc<InventoryLedger<S, B>>,
    pub catalog: CatalogService<S, B>,
    pub collections: CollectionService<S, B>,
    pub carts: Arc<CartService<S, B>>,
    pub orders: OrderService<S, B>,
    pub users: UserDirectory<S, B>,
    pub addresses: AddressBookService<S, B>,
}

impl<S, B> Storefront<S, B>
where
    S: EventStore + Clone,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        config: StorefrontConfig,
        store: S,
        bus: B,
        verifier: Arc<dyn IdentityVerifier>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        // Subscribe before anything can be dispatched.
        let read_models = Arc::new(ReadModels::new(store.clone(), bus.subscribe()));
        let dispatcher = Arc::new(CommandDispatcher::new(store, bus));
        let retries = config.conflict_retries;

        let inventory = Arc::new(InventoryLedger::new(dispatcher.clone(), read_models.clone(), retries));
        let catalog = CatalogService::new(
            dispatcher.clone(),
            inventory.clone(),
            read_models.clone(),
            storage.clone(),
            retries,
        );
        let collections = CollectionService::new(dispatcher.clone(), read_models.clone(), storage, retries);
        let carts = Arc::new(CartService::new(dispatcher.clone(), inventory.clone()));
        let orders = OrderService::new(
            dispatcher.clone(),
            inventory.clone(),
            carts.clone(),
            read_models.clone(),
            config.clone(),
        );
        let users = UserDirectory::new(dispatcher.clone(), read_models.clone(), verifier, retries);
        let addresses =
            AddressBookService::new(dispatcher.clone(), config.default_country.clone(), retries);

        Self {
            config,
            dispatcher,
            read_models,
            inventory,
            catalog,
            collections,
            carts,
            orders,
            users,
            addresses,
        }
    }
}

impl Storefront<InMemoryStore, InMemoryBus> {
    /// Process bootstrap: configuration from the environment, then logging,
    /// then in-memory wiring.
    pub fn from_env(verifier: Arc<dyn IdentityVerifier>, storage: Arc<dyn ObjectStorage>) -> Self {
        let config = StorefrontConfig::from_env();
        storefront_observability::init_with(config.log_format);
        info!(
            conflict_retries = config.conflict_retries,
            log_format = ?config.log_format,
            default_country = %config.default_country,
            "storefront starting"
        );
        Self::in_memory(config, verifier, storage)
    }

    /// Single-process wiring with in-memory persistence.
    pub fn in_memory(
        config: StorefrontConfig,
        verifier: Arc<dyn IdentityVerifier>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
            verifier,
            storage,
        )
    }
}
