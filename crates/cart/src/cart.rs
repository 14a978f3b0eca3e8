use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::{ProductId, VariantKey};
use storefront_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, Money, Resource, UserId,
    ValueObject, line_total,
};
use storefront_events::Event;

/// Cart identifier. There is one cart per user, derived from the user's id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(pub AggregateId);

impl CartId {
    pub fn for_user(user_id: UserId) -> Self {
        Self(AggregateId::owned_by(user_id, "cart"))
    }
}

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Live product values frozen onto a cart line when it was added or merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub price: Money,
    pub discount_price: Money,
    pub stock: u32,
}

impl ValueObject for PriceSnapshot {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub key: VariantKey,
    pub quantity: u32,
    pub snapshot: PriceSnapshot,
}

impl CartItem {
    fn matches(&self, product_id: ProductId, key: &VariantKey) -> bool {
        self.product_id == product_id && &self.key == key
    }

    pub fn line_total(&self) -> DomainResult<Money> {
        line_total(self.snapshot.discount_price, self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    owner: Option<UserId>,
    items: Vec<CartItem>,
    version: u64,
    created: bool,
}

impl Cart {
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            owner: None,
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, product_id: ProductId, key: &VariantKey) -> Option<&CartItem> {
        self.items.iter().find(|i| i.matches(product_id, key))
    }

    /// Number of distinct lines.
    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// `Σ snapshot.discount_price × quantity`.
    pub fn total_amount(&self) -> DomainResult<Money> {
        self.items.iter().try_fold(0u64, |acc, item| {
            acc.checked_add(item.line_total()?)
                .ok_or_else(|| DomainError::validation("cart total overflows"))
        })
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Add `quantity` of a variant, merging into an existing line if there is one.
///
/// `live` is read from the product right before the command is built; its
/// stock is the limit for the (possibly merged) line quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub cart_id: CartId,
    pub owner: UserId,
    pub product_id: ProductId,
    pub name: String,
    pub key: VariantKey,
    pub quantity: u32,
    pub live: PriceSnapshot,
    pub occurred_at: DateTime<Utc>,
}

/// Set a line's quantity. Checked against the line's snapshot stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQuantity {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub key: VariantKey,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub key: VariantKey,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCart {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    AddItem(AddItem),
    UpdateQuantity(UpdateQuantity),
    RemoveItem(RemoveItem),
    ClearCart(ClearCart),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartOpened {
    pub cart_id: CartId,
    pub owner: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Either a new line or a merge into an existing one; `quantity` is the
/// increment and `snapshot` replaces whatever the line held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub name: String,
    pub key: VariantKey,
    pub quantity: u32,
    pub snapshot: PriceSnapshot,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityUpdated {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub key: VariantKey,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub key: VariantKey,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleared {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    CartOpened(CartOpened),
    ItemAdded(ItemAdded),
    QuantityUpdated(QuantityUpdated),
    ItemRemoved(ItemRemoved),
    CartCleared(CartCleared),
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "cart.cart.opened",
            CartEvent::ItemAdded(_) => "cart.cart.item_added",
            CartEvent::QuantityUpdated(_) => "cart.cart.quantity_updated",
            CartEvent::ItemRemoved(_) => "cart.cart.item_removed",
            CartEvent::CartCleared(_) => "cart.cart.cleared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartOpened(e) => e.occurred_at,
            CartEvent::ItemAdded(e) => e.occurred_at,
            CartEvent::QuantityUpdated(e) => e.occurred_at,
            CartEvent::ItemRemoved(e) => e.occurred_at,
            CartEvent::CartCleared(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::CartOpened(e) => {
                self.id = e.cart_id;
                self.owner = Some(e.owner);
                self.created = true;
            }
            CartEvent::ItemAdded(e) => {
                match self.items.iter_mut().find(|i| i.matches(e.product_id, &e.key)) {
                    Some(existing) => {
                        existing.quantity = existing.quantity.saturating_add(e.quantity);
                        existing.snapshot = e.snapshot;
                        existing.name = e.name.clone();
                    }
                    None => self.items.push(CartItem {
                        product_id: e.product_id,
                        name: e.name.clone(),
                        key: e.key.clone(),
                        quantity: e.quantity,
                        snapshot: e.snapshot,
                    }),
                }
            }
            CartEvent::QuantityUpdated(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.matches(e.product_id, &e.key)) {
                    item.quantity = e.quantity;
                }
            }
            CartEvent::ItemRemoved(e) => {
                self.items.retain(|i| !i.matches(e.product_id, &e.key));
            }
            CartEvent::CartCleared(_) => {
                self.items.clear();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::AddItem(cmd) => self.handle_add(cmd),
            CartCommand::UpdateQuantity(cmd) => self.handle_update(cmd),
            CartCommand::RemoveItem(cmd) => Ok(self.handle_remove(cmd)),
            CartCommand::ClearCart(cmd) => Ok(self.handle_clear(cmd)),
        }
    }
}

impl Cart {
    fn handle_add(&self, cmd: &AddItem) -> Result<Vec<CartEvent>, DomainError> {
        if cmd.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        if let Some(owner) = self.owner {
            if owner != cmd.owner {
                return Err(DomainError::forbidden("cart belongs to another user"));
            }
        }

        let merged = match self.item(cmd.product_id, &cmd.key) {
            Some(existing) => existing
                .quantity
                .checked_add(cmd.quantity)
                .ok_or_else(|| DomainError::validation("quantity overflows"))?,
            None => cmd.quantity,
        };
        if merged > cmd.live.stock {
            return Err(DomainError::insufficient_stock(merged, cmd.live.stock));
        }

        let mut events = Vec::with_capacity(2);
        if !self.created {
            events.push(CartEvent::CartOpened(CartOpened {
                cart_id: cmd.cart_id,
                owner: cmd.owner,
                occurred_at: cmd.occurred_at,
            }));
        }
        events.push(CartEvent::ItemAdded(ItemAdded {
            cart_id: cmd.cart_id,
            product_id: cmd.product_id,
            name: cmd.name.clone(),
            key: cmd.key.clone(),
            quantity: cmd.quantity,
            snapshot: cmd.live,
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }

    fn handle_update(&self, cmd: &UpdateQuantity) -> Result<Vec<CartEvent>, DomainError> {
        let item = self
            .item(cmd.product_id, &cmd.key)
            .ok_or(DomainError::not_found(Resource::CartItem))?;

        if cmd.quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        // Snapshot stock, not live: the authoritative live check is checkout.
        if cmd.quantity > item.snapshot.stock {
            return Err(DomainError::insufficient_stock(
                cmd.quantity,
                item.snapshot.stock,
            ));
        }

        Ok(vec![CartEvent::QuantityUpdated(QuantityUpdated {
            cart_id: cmd.cart_id,
            product_id: cmd.product_id,
            key: cmd.key.clone(),
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveItem) -> Vec<CartEvent> {
        if self.item(cmd.product_id, &cmd.key).is_none() {
            return Vec::new();
        }
        vec![CartEvent::ItemRemoved(ItemRemoved {
            cart_id: cmd.cart_id,
            product_id: cmd.product_id,
            key: cmd.key.clone(),
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_clear(&self, cmd: &ClearCart) -> Vec<CartEvent> {
        if self.items.is_empty() {
            return Vec::new();
        }
        vec![CartEvent::CartCleared(CartCleared {
            cart_id: cmd.cart_id,
            occurred_at: cmd.occurred_at,
        })]
    }
}
