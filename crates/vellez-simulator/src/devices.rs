//! Simulated collaborators.
//!
//! Timing uses the host clock; each device reports its state changes from
//! `process` just like the real drivers do from their protocol handlers.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::{Duration, Instant};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use log::{debug, info, warn};
use vellez_core::devices::{
    AudioPlayer, Connectivity, NetworkServices, RelayUnit, SystemControl,
};
use vellez_core::requests::ButtonId;
use vellez_core::settings::{NetworkConfig, RemoteConfig, UpdateEndpoint, WebCredentials};

/// RS485 relay unit with activation latency and an optional stuck fault.
pub struct SimRelay {
    latency: Duration,
    faulty: bool,
    address: u8,
    gong: bool,
    zones: u16,
    requested_at: Option<Instant>,
    active: bool,
}

impl SimRelay {
    pub fn new(latency: Duration, faulty: bool) -> Self {
        Self {
            latency,
            faulty,
            address: 0,
            gong: false,
            zones: 0,
            requested_at: None,
            active: false,
        }
    }
}

impl RelayUnit for SimRelay {
    fn set_address(&mut self, address: u8) {
        if self.address != address {
            info!("[relay] address {}", address);
        }
        self.address = address;
    }

    fn set_gong(&mut self, enabled: bool) {
        if self.gong != enabled {
            info!("[relay] gong {}", if enabled { "on" } else { "off" });
        }
        self.gong = enabled;
    }

    fn set_zones(&mut self, zones: u16) {
        if self.zones != zones {
            info!("[relay] zones {:#06x}", zones);
        }
        self.zones = zones;
    }

    fn activate(&mut self) {
        if self.requested_at.is_none() {
            debug!("[relay] activate requested");
            self.requested_at = Some(Instant::now());
        }
    }

    fn deactivate(&mut self) {
        self.requested_at = None;
    }

    fn process(&mut self) -> Option<bool> {
        let next = match self.requested_at {
            Some(at) => !self.faulty && at.elapsed() >= self.latency,
            None => false,
        };
        if next == self.active {
            return None;
        }
        self.active = next;
        if next {
            info!(
                "[relay] unit {} active on zones {:#06x}{}",
                self.address,
                self.zones,
                if self.gong { " with gong" } else { "" }
            );
        } else {
            info!("[relay] unit {} released", self.address);
        }
        Some(next)
    }
}

/// Audio module where every track plays for a fixed length.
pub struct SimAudio {
    track_length: Duration,
    volume: u8,
    playing: Option<(u16, Instant)>,
    reported: bool,
}

impl SimAudio {
    pub fn new(track_length: Duration) -> Self {
        Self {
            track_length,
            volume: 0,
            playing: None,
            reported: false,
        }
    }
}

impl AudioPlayer for SimAudio {
    fn set_volume(&mut self, level: u8) {
        if self.volume != level {
            info!("[audio] volume {}", level);
        }
        self.volume = level;
    }

    fn play(&mut self, track: u16) {
        info!("[audio] playing track {} at volume {}", track, self.volume);
        self.playing = Some((track, Instant::now()));
        // The caller records playback as started; only the end is reported.
        self.reported = true;
    }

    fn stop(&mut self) {
        if let Some((track, _)) = self.playing.take() {
            info!("[audio] track {} stopped", track);
        }
    }

    fn process(&mut self) -> Option<bool> {
        if let Some((track, started)) = self.playing {
            if started.elapsed() >= self.track_length {
                info!("[audio] track {} finished", track);
                self.playing = None;
            }
        }
        let playing = self.playing.is_some();
        (playing != self.reported).then(|| {
            self.reported = playing;
            playing
        })
    }
}

/// Wi-Fi, clock and message-bus stand-in.
///
/// After the link comes up the clock syncs a second later; the remote
/// client connects half a second after it is started.
pub struct SimNetwork {
    link_since: Option<Instant>,
    remote_started_at: Option<Instant>,
    update_checks: u32,
}

const TIME_SYNC_DELAY: Duration = Duration::from_secs(1);
const REMOTE_CONNECT_DELAY: Duration = Duration::from_millis(500);

impl SimNetwork {
    pub fn new(online: bool) -> Self {
        Self {
            link_since: online.then(Instant::now),
            remote_started_at: None,
            update_checks: 0,
        }
    }

    pub fn set_link(&mut self, up: bool) {
        match (up, self.link_since.is_some()) {
            (true, false) => {
                info!("[net] link up");
                self.link_since = Some(Instant::now());
            }
            (false, true) => {
                info!("[net] link down");
                self.link_since = None;
            }
            _ => {}
        }
    }

    pub fn connectivity(&self) -> Connectivity {
        let Some(since) = self.link_since else {
            return Connectivity::default();
        };
        let remote_connected = self
            .remote_started_at
            .is_some_and(|at| at.elapsed() >= REMOTE_CONNECT_DELAY);
        Connectivity {
            network_up: true,
            time_synced: since.elapsed() >= TIME_SYNC_DELAY,
            remote_connected,
        }
    }

    pub fn update_checks(&self) -> u32 {
        self.update_checks
    }
}

impl NetworkServices for SimNetwork {
    fn begin(&mut self, config: NetworkConfig<'_>, web: WebCredentials<'_>) {
        if self.link_since.is_none() {
            info!("[net] no stored network, provisioning portal \"{}\" open", config.ap_ssid);
        }
        info!("[clock] syncing from {} in zone {}", config.ntp_host, config.timezone);
        info!("[web] UI login {}", web.username);
    }

    fn check_for_update(&mut self, endpoint: UpdateEndpoint<'_>, current_version: &str) {
        self.update_checks += 1;
        info!(
            "[ota] https://{}:{}{} reports no update for {}",
            endpoint.host, endpoint.port, endpoint.uri, current_version
        );
    }

    fn start_remote(&mut self, config: RemoteConfig<'_>) {
        let auth = if config.username.is_empty() {
            "anonymous"
        } else {
            config.username
        };
        info!(
            "[mqtt] connecting to {}:{} as {} ({}), topics {} / {}",
            config.host, config.port, config.client_id, auth, config.generic_topic, config.telemetry_topic
        );
        self.remote_started_at = Some(Instant::now());
    }

    fn erase_network_credentials(&mut self) {
        warn!("[net] stored Wi-Fi credentials erased");
    }
}

/// Records a restart request; the main loop performs it.
#[derive(Default)]
pub struct SimSystem {
    restart_requested: bool,
}

impl SimSystem {
    pub fn take_restart(&mut self) -> bool {
        std::mem::take(&mut self.restart_requested)
    }
}

impl SystemControl for SimSystem {
    fn restart(&mut self) {
        self.restart_requested = true;
    }
}

/// Output pin that logs level changes.
pub struct LogPin {
    name: &'static str,
    quiet: bool,
}

impl LogPin {
    pub fn new(name: &'static str, quiet: bool) -> Self {
        Self { name, quiet }
    }

    fn report(&self, high: bool) {
        if self.quiet {
            log::trace!("[{}] {}", self.name, if high { "high" } else { "low" });
        } else {
            info!("[{}] {}", self.name, if high { "high" } else { "low" });
        }
    }
}

impl ErrorType for LogPin {
    type Error = Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.report(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.report(true);
        Ok(())
    }
}

/// Pull-up button input; reads low while the shared flag is set.
#[derive(Clone, Default)]
pub struct SimButtonPin {
    pressed: Rc<Cell<bool>>,
}

impl SimButtonPin {
    pub fn new() -> Self {
        Self {
            pressed: Rc::new(Cell::new(false)),
        }
    }

    pub fn set_pressed(&self, pressed: bool) {
        self.pressed.set(pressed);
    }
}

impl ErrorType for SimButtonPin {
    type Error = Infallible;
}

impl InputPin for SimButtonPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.pressed.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.pressed.get())
    }
}

/// Holds a button down for a fixed time after a `press` command.
pub struct ButtonPanel {
    pins: [SimButtonPin; 2],
    release_at: [Option<u64>; 2],
}

const PRESS_MS: u64 = 150;

impl ButtonPanel {
    pub fn new(pins: [SimButtonPin; 2]) -> Self {
        Self {
            pins,
            release_at: [None; 2],
        }
    }

    pub fn press(&mut self, button: ButtonId, now_ms: u64) {
        let index = match button {
            ButtonId::One => 0,
            ButtonId::Two => 1,
        };
        self.pins[index].set_pressed(true);
        self.release_at[index] = Some(now_ms + PRESS_MS);
    }

    pub fn update(&mut self, now_ms: u64) {
        for (pin, release_at) in self.pins.iter().zip(self.release_at.iter_mut()) {
            if release_at.is_some_and(|at| now_ms >= at) {
                pin.set_pressed(false);
                *release_at = None;
            }
        }
    }
}
