//! Layered settings store.
//!
//! Every field has a compiled-in default and an optional override. Reads
//! return the override when present. Writes only ever touch the override
//! layer, which is the only part that is persisted.

use log::{debug, error, info, warn};

use super::block::{self, BLOCK_SIZE, Overrides, empty_overrides};
use super::defaults::Defaults;
use super::schema::{SettingId, SettingInput, SettingValue};
use super::storage::BlockStorage;
use crate::error::{BlockError, SettingsError};

/// One row of the record as shown by a settings page.
#[derive(Debug, Clone, Copy)]
pub struct SettingEntry<'a> {
    pub id: SettingId,
    pub value: &'a SettingValue,
    pub default: &'a SettingValue,
    pub overridden: bool,
}

/// Settings store owning both layers and the persistence medium.
///
/// With autocommit enabled (the default) every accepted change is written
/// through immediately. With autocommit disabled changes accumulate in RAM
/// until [`save`](Self::save) or are dropped by
/// [`discard_changes`](Self::discard_changes).
pub struct SettingsStore<S> {
    storage: S,
    defaults: Defaults,
    overrides: Overrides,
    /// Override layer as last read from or written to storage.
    persisted: Overrides,
    autocommit: bool,
    dirty: bool,
    loaded: bool,
}

impl<S: BlockStorage> SettingsStore<S> {
    pub fn new(storage: S, defaults: Defaults) -> Self {
        Self {
            storage,
            defaults,
            overrides: empty_overrides(),
            persisted: empty_overrides(),
            autocommit: true,
            dirty: false,
            loaded: false,
        }
    }

    /// Load the override layer from storage.
    ///
    /// An uninitialized or corrupt block is replaced by a fresh block with no
    /// overrides. A storage read failure leaves the store on defaults. Calling
    /// this again in the same session does nothing.
    pub fn begin(&mut self) {
        if self.loaded {
            debug!("Settings already loaded");
            return;
        }
        self.loaded = true;

        let mut image = [0u8; BLOCK_SIZE];
        if let Err(err) = self.storage.read_block(&mut image) {
            error!("Settings storage read failed ({:?}), running on defaults", err);
            self.overrides = empty_overrides();
            self.persisted = empty_overrides();
            self.dirty = false;
            return;
        }

        match block::decode(&image) {
            Ok(overrides) => {
                let count = overrides.iter().filter(|slot| slot.is_some()).count();
                info!("Settings loaded, {} override(s)", count);
                self.persisted = overrides.clone();
                self.overrides = overrides;
                self.dirty = false;
            }
            Err(err) => {
                if err == BlockError::Uninitialized {
                    info!("Settings storage not initialized, writing defaults");
                } else {
                    warn!("Settings block unusable ({}), restoring defaults", err);
                }
                self.overrides = empty_overrides();
                self.persisted = empty_overrides();
                if let Err(err) = self.save() {
                    error!("Failed to initialize settings storage: {}", err);
                }
            }
        }
    }

    /// Effective value of `id`: the override if present, else the default.
    #[inline]
    pub fn get(&self, id: SettingId) -> &SettingValue {
        self.overrides[id.index()]
            .as_ref()
            .unwrap_or_else(|| self.defaults.get(id))
    }

    pub fn get_flag(&self, id: SettingId) -> bool {
        self.get(id)
            .as_flag()
            .or_else(|| self.defaults.get(id).as_flag())
            .unwrap_or_default()
    }

    pub fn get_u8(&self, id: SettingId) -> u8 {
        self.get(id)
            .as_u8()
            .or_else(|| self.defaults.get(id).as_u8())
            .unwrap_or_default()
    }

    pub fn get_u16(&self, id: SettingId) -> u16 {
        self.get(id)
            .as_u16()
            .or_else(|| self.defaults.get(id).as_u16())
            .unwrap_or_default()
    }

    pub fn get_text(&self, id: SettingId) -> &str {
        self.get(id)
            .as_text()
            .or_else(|| self.defaults.get(id).as_text())
            .unwrap_or_default()
    }

    /// Compiled-in default of `id`.
    pub fn default_value(&self, id: SettingId) -> &SettingValue {
        self.defaults.get(id)
    }

    /// Whether `id` has an override, even one equal to the default.
    pub fn is_overridden(&self, id: SettingId) -> bool {
        self.overrides[id.index()].is_some()
    }

    /// Validate and store an override. Returns `false` on validation failure,
    /// in which case nothing changed.
    pub fn set<'a>(&mut self, id: SettingId, value: impl Into<SettingInput<'a>>) -> bool {
        match self.try_set(id, value) {
            Ok(()) => true,
            Err(err) => {
                warn!("Rejected {}: {}", id.key(), err);
                false
            }
        }
    }

    /// Like [`set`](Self::set) but reports why a value was rejected.
    ///
    /// Only validation errors are returned. A failed autocommit write is
    /// logged and leaves the store dirty so [`process`](Self::process)
    /// retries it.
    pub fn try_set<'a>(
        &mut self,
        id: SettingId,
        value: impl Into<SettingInput<'a>>,
    ) -> Result<(), SettingsError> {
        let value = id.spec().validate(value.into())?;
        let slot = &mut self.overrides[id.index()];
        if slot.as_ref() == Some(&value) {
            return Ok(());
        }
        debug!("Set {} = {}", id.key(), value);
        *slot = Some(value);
        self.changed();
        Ok(())
    }

    /// Drop the override of `id`, reverting it to the default.
    pub fn clear(&mut self, id: SettingId) {
        if self.overrides[id.index()].take().is_some() {
            debug!("Cleared {}", id.key());
            self.changed();
        }
    }

    /// Drop every override (factory reset).
    pub fn reset(&mut self) {
        info!("Resetting settings to defaults");
        self.overrides = empty_overrides();
        self.changed();
    }

    /// Write the override layer to storage.
    pub fn save(&mut self) -> Result<(), SettingsError> {
        let mut image = [0u8; BLOCK_SIZE];
        block::encode(&self.overrides, &mut image)?;
        self.storage.write_block(&image).map_err(|err| {
            error!("Settings storage write failed: {:?}", err);
            SettingsError::Storage
        })?;
        self.persisted = self.overrides.clone();
        self.dirty = false;
        info!("Settings saved");
        Ok(())
    }

    /// Revert the override layer to what was last loaded or saved.
    pub fn discard_changes(&mut self) {
        if self.dirty {
            info!("Discarding unsaved settings changes");
        }
        self.overrides = self.persisted.clone();
        self.dirty = false;
    }

    /// Loop hook: write pending changes when autocommit is on.
    pub fn process(&mut self) {
        if self.autocommit && self.dirty {
            if let Err(err) = self.save() {
                error!("Deferred settings save failed: {}", err);
            }
        }
    }

    pub fn set_autocommit(&mut self, enabled: bool) {
        self.autocommit = enabled;
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Run a bulk edit with autocommit suspended and persist once.
    ///
    /// The previous autocommit policy is restored afterwards. Storage is
    /// written only if the edit changed something.
    pub fn batch<R>(&mut self, edit: impl FnOnce(&mut Self) -> R) -> Result<R, SettingsError> {
        let previous = self.autocommit;
        self.autocommit = false;
        let result = edit(self);
        self.autocommit = previous;
        if self.dirty {
            self.save()?;
        }
        Ok(result)
    }

    /// Every field with its effective value, default and override state.
    pub fn entries(&self) -> impl Iterator<Item = SettingEntry<'_>> + '_ {
        SettingId::ALL.into_iter().map(move |id| SettingEntry {
            id,
            value: self.get(id),
            default: self.defaults.get(id),
            overridden: self.is_overridden(id),
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn changed(&mut self) {
        self.dirty = true;
        if self.autocommit {
            if let Err(err) = self.save() {
                error!("Settings autocommit failed: {}", err);
            }
        }
    }
}
