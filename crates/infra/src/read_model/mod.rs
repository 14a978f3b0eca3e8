//! Disposable read-model storage. Everything here can be rebuilt by replaying
//! the event store.

pub mod key_value_store;

pub use key_value_store::{InMemoryKeyValueStore, KeyValueStore};
