//! Persistent device settings.
//!
//! - [`schema`]: field identifiers, kinds and bounds as a static table
//! - [`defaults`]: compiled-in default layer
//! - [`block`]: fixed-size on-storage image of the override layer
//! - [`storage`]: the persistence medium abstraction
//! - [`store`]: the layered store with dirty tracking and autocommit
//! - [`views`]: typed groups of settings consumed by other components

pub mod block;
pub mod defaults;
pub mod schema;
pub mod storage;
pub mod store;
pub mod views;

pub use block::{BLOCK_SIZE, Block, INITIALIZED_MARKER, Overrides};
pub use defaults::Defaults;
pub use schema::{
    FIELD_COUNT, FieldKind, FieldSpec, MAX_TEXT_LEN, SCHEMA, SETTINGS_STRING_SIZE, SettingId,
    SettingInput, SettingText, SettingValue,
};
pub use storage::{BlockStorage, MemoryStorage, MemoryStorageError};
pub use store::{SettingEntry, SettingsStore};
pub use views::{
    AlertDefaults, NetworkConfig, RelayConfig, RemoteConfig, UpdateEndpoint, WebCredentials,
};
