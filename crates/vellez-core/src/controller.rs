//! The cooperative control loop.
//!
//! [`Controller`] owns the settings store, the orchestrator and the local
//! outputs. Requesters feed it [`Request`]s between ticks; [`Controller::tick`]
//! then runs one loop iteration: persistence, orchestration, deferred network
//! start-up, status rendering and the reboot gate.

use embedded_hal::digital::{OutputPin, PinState};
use log::{debug, info, warn};

use crate::buttons::DEFAULT_DEBOUNCE_MS;
use crate::devices::{AudioPlayer, Connectivity, NetworkServices, RelayUnit, SystemControl};
use crate::orchestrator::{Orchestrator, OrchestratorConfig, StartParams, TickOutcome};
use crate::requests::{ButtonId, Request, RequestSource};
use crate::settings::{BlockStorage, SettingId, SettingsStore};
use crate::status::{Indication, StatusLed, SystemFlags};

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub orchestrator: OrchestratorConfig,
    pub debounce_ms: u64,
    /// Track started by button one and button two.
    pub button_tracks: [u16; 2],
    /// Reported to the update server.
    pub firmware_version: &'static str,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            button_tracks: [1, 2],
            firmware_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

pub struct Controller<S, R, A, L, E> {
    config: ControllerConfig,
    settings: SettingsStore<S>,
    orchestrator: Orchestrator,
    relay: R,
    audio: A,
    led: StatusLed<L>,
    amplifier: E,
    amplifier_enabled: Option<bool>,
    update_checked: bool,
    remote_started: bool,
}

impl<S, R, A, L, E> Controller<S, R, A, L, E>
where
    S: BlockStorage,
    R: RelayUnit,
    A: AudioPlayer,
    L: OutputPin,
    E: OutputPin,
{
    pub fn new(
        config: ControllerConfig,
        settings: SettingsStore<S>,
        relay: R,
        audio: A,
        led: StatusLed<L>,
        amplifier: E,
    ) -> Self {
        Self {
            config,
            settings,
            orchestrator: Orchestrator::new(config.orchestrator),
            relay,
            audio,
            led,
            amplifier,
            amplifier_enabled: None,
            update_checked: false,
            remote_started: false,
        }
    }

    /// Start-up sequence.
    ///
    /// `factory_reset` is the power-on fail-safe (both buttons held): every
    /// settings override and the stored network credentials are dropped
    /// before anything is configured. The network stack is brought up last,
    /// with the effective provisioning and clock settings.
    pub fn begin<N>(&mut self, factory_reset: bool, network: &mut N)
    where
        N: NetworkServices + ?Sized,
    {
        self.settings.begin();
        if factory_reset {
            warn!("Fail-safe triggered, restoring factory settings");
            self.settings.reset();
            network.erase_network_credentials();
        }
        self.apply_settings();
        network.begin(self.settings.network_config(), self.settings.web_credentials());
        info!("Controller started, firmware {}", self.config.firmware_version);
    }

    /// Apply a request. Returns `false` when it was rejected.
    pub fn handle(&mut self, request: Request) -> bool {
        debug!("Request {:?}", request);
        match request {
            Request::SetAddress(address) => {
                let accepted = self.settings.set(SettingId::VellezAddress, address);
                if accepted {
                    self.relay.set_address(address);
                }
                accepted
            }
            Request::SetGong(enabled) => {
                let accepted = self.settings.set(SettingId::VellezGongEnabled, enabled);
                if accepted {
                    self.relay.set_gong(enabled);
                }
                accepted
            }
            Request::SetVolume(level) => {
                let accepted = self.settings.set(SettingId::Volume, level);
                if accepted {
                    self.audio.set_volume(level);
                }
                accepted
            }
            Request::SetZones(zones) => {
                let accepted = self.settings.set(SettingId::VellezZones, zones);
                if accepted {
                    self.relay.set_zones(zones);
                }
                accepted
            }
            Request::Play(params) => {
                if let Err(err) = SettingId::Volume.spec().validate(params.volume.into()) {
                    warn!("Rejected play of track {}: {}", params.track, err);
                    return false;
                }
                self.orchestrator.stage_start(params);
                true
            }
            Request::PlayTrack(track) => {
                let defaults = self.settings.alert_defaults();
                self.orchestrator
                    .stage_start(StartParams::from_defaults(track, defaults));
                true
            }
            Request::Button(button) => {
                let track = match button {
                    ButtonId::One => self.config.button_tracks[0],
                    ButtonId::Two => self.config.button_tracks[1],
                };
                self.orchestrator.toggle(track, self.settings.alert_defaults());
                true
            }
            Request::Stop => {
                self.orchestrator.stage_stop();
                true
            }
            Request::Reboot => {
                self.orchestrator.stage_reboot();
                true
            }
            Request::FactoryReset => {
                self.settings.reset();
                self.apply_settings();
                true
            }
        }
    }

    /// Drain a requester into [`handle`](Self::handle).
    pub fn poll_source<Q>(&mut self, now_ms: u64, source: &mut Q)
    where
        Q: RequestSource + ?Sized,
    {
        source.poll(now_ms, &mut |request| {
            self.handle(request);
        });
    }

    /// One loop iteration.
    pub fn tick<N, C>(
        &mut self,
        now_ms: u64,
        connectivity: Connectivity,
        network: &mut N,
        system: &mut C,
    ) -> TickOutcome
    where
        N: NetworkServices + ?Sized,
        C: SystemControl + ?Sized,
    {
        self.start_network_services(connectivity, network);
        self.settings.process();

        let outcome = self.orchestrator.tick(now_ms, &mut self.relay, &mut self.audio);
        self.drive_amplifier(outcome.amplifier_enabled);
        self.led.update(Indication::evaluate(self.system_flags(connectivity)), now_ms);

        if outcome.reboot {
            info!("Restarting");
            system.restart();
        }
        outcome
    }

    /// Ladder inputs for the current state.
    pub fn system_flags(&self, connectivity: Connectivity) -> SystemFlags {
        let flags = self.orchestrator.flags();
        SystemFlags {
            relay_active: flags.active,
            start_pending: self.orchestrator.start_pending(),
            remote_connected: self.remote_started && connectivity.remote_connected,
            time_synced: connectivity.time_synced,
            network_up: connectivity.network_up,
        }
    }

    pub fn settings(&self) -> &SettingsStore<S> {
        &self.settings
    }

    /// Direct access for the local UI. Changes to relay or audio settings
    /// made here reach the hardware on the next [`begin`](Self::begin) or
    /// [`reapply_settings`](Self::reapply_settings).
    pub fn settings_mut(&mut self) -> &mut SettingsStore<S> {
        &mut self.settings
    }

    /// Push relay and audio configuration from the effective settings.
    pub fn reapply_settings(&mut self) {
        self.apply_settings();
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn relay_mut(&mut self) -> &mut R {
        &mut self.relay
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn led(&self) -> &StatusLed<L> {
        &self.led
    }

    pub fn amplifier_enabled(&self) -> bool {
        self.amplifier_enabled.unwrap_or(false)
    }

    pub fn update_checked(&self) -> bool {
        self.update_checked
    }

    pub fn remote_started(&self) -> bool {
        self.remote_started
    }

    fn apply_settings(&mut self) {
        let relay = self.settings.relay_config();
        debug!(
            "Relay address {}, gong {}, zones {:#06x}",
            relay.address, relay.gong, relay.zones
        );
        self.relay.configure(relay);
        self.audio.set_volume(self.settings.get_u8(SettingId::Volume));
    }

    /// Update check and remote client start-up, each exactly once, after
    /// the clock is set and never in the middle of an alert.
    fn start_network_services<N>(&mut self, connectivity: Connectivity, network: &mut N)
    where
        N: NetworkServices + ?Sized,
    {
        if !connectivity.time_synced || self.orchestrator.is_busy() {
            return;
        }
        if !self.update_checked {
            info!("Checking for firmware update");
            network.check_for_update(self.settings.update_endpoint(), self.config.firmware_version);
            self.update_checked = true;
        }
        if !self.remote_started {
            info!("Starting remote client");
            network.start_remote(self.settings.remote_config());
            self.remote_started = true;
        }
    }

    fn drive_amplifier(&mut self, enabled: bool) {
        if self.amplifier_enabled == Some(enabled) {
            return;
        }
        match self.amplifier.set_state(PinState::from(enabled)) {
            Ok(()) => self.amplifier_enabled = Some(enabled),
            Err(err) => warn!("Amplifier enable write failed: {:?}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{
        Defaults, MemoryStorage, NetworkConfig, RemoteConfig, UpdateEndpoint, WebCredentials,
    };
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    #[derive(Default)]
    struct Pin {
        high: bool,
    }

    impl ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    /// Relay that follows activate/deactivate on the next `process`.
    #[derive(Default)]
    struct Relay {
        address: u8,
        gong: bool,
        zones: u16,
        requested: bool,
        active: bool,
    }

    impl RelayUnit for Relay {
        fn set_address(&mut self, address: u8) {
            self.address = address;
        }
        fn set_gong(&mut self, enabled: bool) {
            self.gong = enabled;
        }
        fn set_zones(&mut self, zones: u16) {
            self.zones = zones;
        }
        fn activate(&mut self) {
            self.requested = true;
        }
        fn deactivate(&mut self) {
            self.requested = false;
        }
        fn process(&mut self) -> Option<bool> {
            (self.requested != self.active).then(|| {
                self.active = self.requested;
                self.active
            })
        }
    }

    #[derive(Default)]
    struct Audio {
        volume: u8,
        played: Vec<u16>,
    }

    impl AudioPlayer for Audio {
        fn set_volume(&mut self, level: u8) {
            self.volume = level;
        }
        fn play(&mut self, track: u16) {
            self.played.push(track);
        }
        fn stop(&mut self) {}
        fn process(&mut self) -> Option<bool> {
            None
        }
    }

    #[derive(Default)]
    struct Network {
        /// `(ap_ssid, ntp_host, timezone, web_username)` per bring-up.
        begun: Vec<(String, String, String, String)>,
        update_checks: u32,
        remote_starts: u32,
        erased: bool,
    }

    impl NetworkServices for Network {
        fn begin(&mut self, config: NetworkConfig<'_>, web: WebCredentials<'_>) {
            self.begun.push((
                config.ap_ssid.to_string(),
                config.ntp_host.to_string(),
                config.timezone.to_string(),
                web.username.to_string(),
            ));
        }
        fn check_for_update(&mut self, endpoint: UpdateEndpoint<'_>, _version: &str) {
            assert_eq!(endpoint.port, 443);
            self.update_checks += 1;
        }
        fn start_remote(&mut self, config: RemoteConfig<'_>) {
            assert_eq!(config.client_id, "vellez_00002A");
            self.remote_starts += 1;
        }
        fn erase_network_credentials(&mut self) {
            self.erased = true;
        }
    }

    #[derive(Default)]
    struct System {
        restarts: u32,
    }

    impl SystemControl for System {
        fn restart(&mut self) {
            self.restarts += 1;
        }
    }

    type TestController = Controller<MemoryStorage, Relay, Audio, Pin, Pin>;

    fn controller(storage: MemoryStorage) -> TestController {
        Controller::new(
            ControllerConfig::default(),
            SettingsStore::new(storage, Defaults::new(42)),
            Relay::default(),
            Audio::default(),
            StatusLed::new(Pin::default(), false),
            Pin::default(),
        )
    }

    #[test]
    fn begin_pushes_persisted_configuration() {
        let mut first = controller(MemoryStorage::new());
        first.begin(false, &mut Network::default());
        assert!(first.handle(Request::SetAddress(9)));
        assert!(first.handle(Request::SetVolume(22)));

        let image = *first.settings().storage().image();
        let mut second = controller(MemoryStorage::with_image(image));
        second.begin(false, &mut Network::default());
        assert_eq!(second.relay().address, 9);
        assert_eq!(second.relay().zones, 0xFFFF);
        assert_eq!(second.audio().volume, 22);
    }

    #[test]
    fn failsafe_resets_settings_and_credentials() {
        let mut first = controller(MemoryStorage::new());
        first.begin(false, &mut Network::default());
        assert!(first.handle(Request::SetZones(0x0001)));

        let image = *first.settings().storage().image();
        let mut second = controller(MemoryStorage::with_image(image));
        let mut network = Network::default();
        second.begin(true, &mut network);
        assert!(network.erased);
        assert_eq!(second.relay().zones, 0xFFFF);
        assert!(!second.settings().is_overridden(SettingId::VellezZones));
    }

    #[test]
    fn network_bring_up_uses_effective_settings() {
        let mut first = controller(MemoryStorage::new());
        first.begin(false, &mut Network::default());
        assert!(first.settings_mut().set(SettingId::Timezone, "CET-1CEST,M3.5.0,M10.5.0/3"));
        assert!(first.settings_mut().set(SettingId::NtpHost, "ntp.example.org"));
        assert!(first.settings_mut().set(SettingId::WebUsername, "keeper"));

        let image = *first.settings().storage().image();
        let mut network = Network::default();
        controller(MemoryStorage::with_image(image)).begin(false, &mut network);
        let (ap_ssid, ntp_host, timezone, web_username) = &network.begun[0];
        assert_eq!(network.begun.len(), 1);
        assert_eq!(ap_ssid, "Vellez Alert 00002A");
        assert_eq!(ntp_host, "ntp.example.org");
        assert_eq!(timezone, "CET-1CEST,M3.5.0,M10.5.0/3");
        assert_eq!(web_username, "keeper");

        // Fail-safe: bring-up sees the factory values.
        let mut network = Network::default();
        controller(MemoryStorage::with_image(image)).begin(true, &mut network);
        assert!(network.erased);
        assert_ne!(network.begun[0].1, "ntp.example.org");
        assert_eq!(network.begun[0].3, "admin");
    }

    #[test]
    fn rejected_setter_does_not_reach_hardware() {
        let mut controller = controller(MemoryStorage::new());
        controller.begin(false, &mut Network::default());
        assert!(!controller.handle(Request::SetVolume(31)));
        assert_eq!(controller.audio().volume, 15);
        assert!(!controller.handle(Request::Play(StartParams {
            track: 1,
            gong: false,
            volume: 99,
            zones: 1,
        })));
        assert!(!controller.orchestrator().start_pending());
    }

    #[test]
    fn button_uses_settings_at_press_time() {
        let mut controller = controller(MemoryStorage::new());
        let (mut network, mut system) = (Network::default(), System::default());
        controller.begin(false, &mut network);
        assert!(controller.handle(Request::SetVolume(7)));
        controller.handle(Request::Button(ButtonId::Two));
        assert!(controller.handle(Request::SetVolume(9)));

        let online = Connectivity::default();
        controller.tick(0, online, &mut network, &mut system);
        controller.tick(1, online, &mut network, &mut system);
        assert_eq!(controller.audio().played, vec![2]);
        assert_eq!(controller.audio().volume, 7);
        assert!(controller.amplifier_enabled());
        assert_eq!(controller.led().indication(), Some(Indication::Solid));
    }

    #[test]
    fn network_services_start_once_when_idle_and_synced() {
        let mut controller = controller(MemoryStorage::new());
        let (mut network, mut system) = (Network::default(), System::default());
        controller.begin(false, &mut network);

        let mut connectivity = Connectivity {
            network_up: true,
            ..Connectivity::default()
        };
        controller.tick(0, connectivity, &mut network, &mut system);
        assert_eq!(network.update_checks, 0);
        assert_eq!(controller.led().indication(), Some(Indication::Flash(3)));

        connectivity.time_synced = true;
        controller.handle(Request::PlayTrack(5));
        controller.tick(10, connectivity, &mut network, &mut system);
        assert_eq!(network.update_checks, 0);

        controller.handle(Request::Stop);
        controller.tick(20, connectivity, &mut network, &mut system);
        controller.tick(30, connectivity, &mut network, &mut system);
        controller.tick(40, connectivity, &mut network, &mut system);
        assert_eq!(network.update_checks, 1);
        assert_eq!(network.remote_starts, 1);
    }

    #[test]
    fn reboot_restarts_when_idle() {
        let mut controller = controller(MemoryStorage::new());
        let (mut network, mut system) = (Network::default(), System::default());
        controller.begin(false, &mut network);
        controller.handle(Request::Reboot);
        let outcome = controller.tick(0, Connectivity::default(), &mut network, &mut system);
        assert!(outcome.reboot);
        assert_eq!(system.restarts, 1);
    }
}
