//! Collaborator contracts consumed by the controller.
//!
//! Concrete drivers (RS485 framing to the relay unit, the audio module's
//! serial protocol, Wi-Fi, the message-bus client) live outside this crate.
//! Each one is driven through a narrow command interface and serviced once
//! per loop tick through `process`.

use crate::settings::{NetworkConfig, RelayConfig, RemoteConfig, UpdateEndpoint, WebCredentials};

/// The RS485 relay/zone unit ("Vellez").
pub trait RelayUnit {
    fn set_address(&mut self, address: u8);
    fn set_gong(&mut self, enabled: bool);
    fn set_zones(&mut self, zones: u16);
    /// Request the unit to energize the configured zones.
    fn activate(&mut self);
    /// Request the unit to release all zones. Harmless when already idle.
    fn deactivate(&mut self);
    /// Service the bus. Returns the new active state when it changed.
    fn process(&mut self) -> Option<bool>;

    fn configure(&mut self, config: RelayConfig) {
        self.set_address(config.address);
        self.set_gong(config.gong);
        self.set_zones(config.zones);
    }
}

/// The audio playback module.
pub trait AudioPlayer {
    fn set_volume(&mut self, level: u8);
    fn play(&mut self, track: u16);
    fn stop(&mut self);
    /// Service the module. Returns the new playing state when it changed.
    fn process(&mut self) -> Option<bool>;
}

/// Wi-Fi, clock and the services started once the device is settled.
pub trait NetworkServices {
    /// Power-on bring-up: provisioning portal SSID, clock source and the
    /// local web UI credentials.
    fn begin(&mut self, config: NetworkConfig<'_>, web: WebCredentials<'_>);
    /// Check for and, if available, apply a firmware update.
    fn check_for_update(&mut self, endpoint: UpdateEndpoint<'_>, current_version: &str);
    /// Bring up the message-bus client.
    fn start_remote(&mut self, config: RemoteConfig<'_>);
    /// Forget stored Wi-Fi credentials (fail-safe factory reset).
    fn erase_network_credentials(&mut self);
}

/// Hard device reset.
pub trait SystemControl {
    fn restart(&mut self);
}

/// Connectivity flags owned by the network stack; only read by the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connectivity {
    pub network_up: bool,
    pub time_synced: bool,
    pub remote_connected: bool,
}
