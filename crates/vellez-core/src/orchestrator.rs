//! Alert orchestration.
//!
//! Serializes the mutually exclusive hardware actions (relay activation,
//! audio playback, reboot) requested asynchronously by buttons, the remote
//! client and the web UI. Requests only stage intent; [`Orchestrator::tick`]
//! resolves at most one staged action per call.
//!
//! Ordering within a tick:
//! 1. service the relay and audio collaborators and fold in their state
//! 2. a staged stop cancels playback and any staged start
//! 3. a staged start configures and activates the relay, and starts audio
//!    once the relay reports active
//! 4. with nothing staged and nothing playing the relay is released
//! 5. a staged reboot is honoured only when fully idle

use log::{debug, info, warn};

use crate::devices::{AudioPlayer, RelayUnit};
use crate::settings::AlertDefaults;

/// Parameters of one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartParams {
    pub track: u16,
    pub gong: bool,
    pub volume: u8,
    pub zones: u16,
}

impl StartParams {
    /// Alert for `track` using the given settings-derived parameters.
    pub fn from_defaults(track: u16, defaults: AlertDefaults) -> Self {
        Self {
            track,
            gong: defaults.gong,
            volume: defaults.volume,
            zones: defaults.zones,
        }
    }
}

/// The single staged intent. Reboot is staged separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingAction {
    #[default]
    None,
    Start(StartParams),
    Stop,
}

/// State reported by the relay and audio collaborators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeFlags {
    /// Relay/zone unit energized.
    pub active: bool,
    /// Audio module outputting.
    pub playing: bool,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The staged reboot may be performed now.
    pub reboot: bool,
    /// The audio amplifier output should be enabled.
    pub amplifier_enabled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// How long a staged start waits for the relay to report active before
    /// it is dropped.
    pub activation_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            activation_timeout_ms: 3_000,
        }
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    pending: PendingAction,
    reboot_requested: bool,
    flags: RuntimeFlags,
    /// When the current staged start first tried to activate the relay.
    activation_started_ms: Option<u64>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            pending: PendingAction::None,
            reboot_requested: false,
            flags: RuntimeFlags::default(),
            activation_started_ms: None,
        }
    }

    /// Stage an alert. Overwrites a previously staged start and restarts its
    /// activation timeout; ignored while a stop is staged.
    pub fn stage_start(&mut self, params: StartParams) {
        match self.pending {
            PendingAction::Stop => {
                debug!("Start of track {} ignored, stop is staged", params.track);
                return;
            }
            PendingAction::Start(_) => {
                debug!("Replacing staged start with track {}", params.track);
            }
            PendingAction::None => {
                debug!("Staged start of track {}", params.track);
            }
        }
        self.pending = PendingAction::Start(params);
        self.activation_started_ms = None;
    }

    /// Stage a stop. Wins over any staged start at the next tick.
    pub fn stage_stop(&mut self) {
        if self.pending != PendingAction::Stop {
            debug!("Staged stop");
        }
        self.pending = PendingAction::Stop;
    }

    /// Stage a reboot. Performed at the first fully idle tick.
    pub fn stage_reboot(&mut self) {
        if !self.reboot_requested {
            info!("Reboot requested");
        }
        self.reboot_requested = true;
    }

    /// Button semantics: start `track` when idle, otherwise stop.
    ///
    /// `defaults` is read from the settings at press time.
    pub fn toggle(&mut self, track: u16, defaults: AlertDefaults) {
        if self.is_busy() {
            self.stage_stop();
        } else {
            self.stage_start(StartParams::from_defaults(track, defaults));
        }
    }

    /// A start is staged or audio is playing.
    pub fn is_busy(&self) -> bool {
        self.start_pending() || self.flags.playing
    }

    pub fn start_pending(&self) -> bool {
        matches!(self.pending, PendingAction::Start(_))
    }

    pub fn reboot_pending(&self) -> bool {
        self.reboot_requested
    }

    pub fn pending(&self) -> PendingAction {
        self.pending
    }

    pub fn flags(&self) -> RuntimeFlags {
        self.flags
    }

    /// Advance the state machine by one loop iteration.
    pub fn tick<R, A>(&mut self, now_ms: u64, relay: &mut R, audio: &mut A) -> TickOutcome
    where
        R: RelayUnit + ?Sized,
        A: AudioPlayer + ?Sized,
    {
        if let Some(active) = relay.process() {
            debug!("Relay unit {}", if active { "active" } else { "inactive" });
            self.flags.active = active;
        }
        if let Some(playing) = audio.process() {
            debug!("Audio {}", if playing { "playing" } else { "stopped" });
            self.flags.playing = playing;
        }

        match self.pending {
            PendingAction::Stop => {
                info!("Stopping alert");
                audio.stop();
                self.pending = PendingAction::None;
                self.activation_started_ms = None;
                self.flags.playing = false;
            }
            PendingAction::Start(params) => self.resolve_start(now_ms, params, relay, audio),
            PendingAction::None => {}
        }

        if !self.start_pending() && !self.flags.playing {
            relay.deactivate();
        }

        let reboot = self.reboot_requested && !self.is_busy();
        TickOutcome {
            reboot,
            amplifier_enabled: self.flags.active,
        }
    }

    fn resolve_start<R, A>(&mut self, now_ms: u64, params: StartParams, relay: &mut R, audio: &mut A)
    where
        R: RelayUnit + ?Sized,
        A: AudioPlayer + ?Sized,
    {
        relay.set_gong(params.gong);
        relay.set_zones(params.zones);
        relay.activate();

        if self.flags.active {
            info!(
                "Playing track {} at volume {} on zones {:#06x}",
                params.track, params.volume, params.zones
            );
            audio.set_volume(params.volume);
            audio.play(params.track);
            self.pending = PendingAction::None;
            self.activation_started_ms = None;
            self.flags.playing = true;
            return;
        }

        let started = *self.activation_started_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(started) >= self.config.activation_timeout_ms {
            warn!(
                "Relay unit did not activate within {} ms, dropping track {}",
                self.config.activation_timeout_ms, params.track
            );
            self.pending = PendingAction::None;
            self.activation_started_ms = None;
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Gong(bool),
        Zones(u16),
        Activate,
        Deactivate,
        Volume(u8),
        Play(u16),
        Stop,
    }

    /// Relay that reports active on the `process` after an `activate`.
    #[derive(Default)]
    struct FakeRelay {
        calls: Vec<Call>,
        requested: bool,
        active: bool,
        broken: bool,
    }

    impl RelayUnit for FakeRelay {
        fn set_address(&mut self, _address: u8) {}
        fn set_gong(&mut self, enabled: bool) {
            self.calls.push(Call::Gong(enabled));
        }
        fn set_zones(&mut self, zones: u16) {
            self.calls.push(Call::Zones(zones));
        }
        fn activate(&mut self) {
            self.calls.push(Call::Activate);
            self.requested = true;
        }
        fn deactivate(&mut self) {
            self.calls.push(Call::Deactivate);
            self.requested = false;
        }
        fn process(&mut self) -> Option<bool> {
            let next = self.requested && !self.broken;
            (next != self.active).then(|| {
                self.active = next;
                next
            })
        }
    }

    #[derive(Default)]
    struct FakeAudio {
        calls: Vec<Call>,
        finished: bool,
    }

    impl AudioPlayer for FakeAudio {
        fn set_volume(&mut self, level: u8) {
            self.calls.push(Call::Volume(level));
        }
        fn play(&mut self, track: u16) {
            self.calls.push(Call::Play(track));
        }
        fn stop(&mut self) {
            self.calls.push(Call::Stop);
        }
        fn process(&mut self) -> Option<bool> {
            core::mem::take(&mut self.finished).then_some(false)
        }
    }

    const PARAMS: StartParams = StartParams {
        track: 1,
        gong: true,
        volume: 20,
        zones: 0x0003,
    };

    #[test]
    fn start_waits_for_relay_then_plays() {
        let mut orchestrator = Orchestrator::default();
        let (mut relay, mut audio) = (FakeRelay::default(), FakeAudio::default());

        orchestrator.stage_start(PARAMS);
        orchestrator.tick(0, &mut relay, &mut audio);
        assert_eq!(
            relay.calls,
            vec![Call::Gong(true), Call::Zones(0x0003), Call::Activate]
        );
        assert!(audio.calls.is_empty());
        assert!(orchestrator.start_pending());

        let outcome = orchestrator.tick(10, &mut relay, &mut audio);
        assert_eq!(audio.calls, vec![Call::Volume(20), Call::Play(1)]);
        assert!(orchestrator.flags().playing);
        assert!(orchestrator.flags().active);
        assert!(outcome.amplifier_enabled);
        assert_eq!(orchestrator.pending(), PendingAction::None);
    }

    #[test]
    fn stop_wins_over_unresolved_start() {
        let mut orchestrator = Orchestrator::default();
        let (mut relay, mut audio) = (FakeRelay::default(), FakeAudio::default());

        orchestrator.stage_start(PARAMS);
        orchestrator.stage_stop();
        orchestrator.tick(0, &mut relay, &mut audio);
        orchestrator.tick(10, &mut relay, &mut audio);

        assert!(!audio.calls.contains(&Call::Play(1)));
        assert!(!relay.calls.contains(&Call::Activate));
        assert!(!orchestrator.flags().playing);
        assert!(!orchestrator.flags().active);
    }

    #[test]
    fn start_after_stop_before_tick_is_dropped() {
        let mut orchestrator = Orchestrator::default();
        orchestrator.stage_stop();
        orchestrator.stage_start(PARAMS);
        assert_eq!(orchestrator.pending(), PendingAction::Stop);
    }

    #[test]
    fn restaging_start_keeps_last_parameters() {
        let mut orchestrator = Orchestrator::default();
        let (mut relay, mut audio) = (FakeRelay::default(), FakeAudio::default());
        orchestrator.stage_start(PARAMS);
        orchestrator.stage_start(StartParams { track: 7, ..PARAMS });
        orchestrator.tick(0, &mut relay, &mut audio);
        orchestrator.tick(1, &mut relay, &mut audio);
        assert_eq!(audio.calls, vec![Call::Volume(20), Call::Play(7)]);
    }

    #[test]
    fn relay_released_after_playback_ends() {
        let mut orchestrator = Orchestrator::default();
        let (mut relay, mut audio) = (FakeRelay::default(), FakeAudio::default());
        orchestrator.stage_start(PARAMS);
        orchestrator.tick(0, &mut relay, &mut audio);
        orchestrator.tick(1, &mut relay, &mut audio);
        assert!(!relay.calls.contains(&Call::Deactivate));

        audio.finished = true;
        orchestrator.tick(2, &mut relay, &mut audio);
        assert_eq!(relay.calls.last(), Some(&Call::Deactivate));
        assert!(!orchestrator.flags().playing);

        let outcome = orchestrator.tick(3, &mut relay, &mut audio);
        assert!(!orchestrator.flags().active);
        assert!(!outcome.amplifier_enabled);
    }

    #[test]
    fn stop_while_playing_stops_audio_and_relay() {
        let mut orchestrator = Orchestrator::default();
        let (mut relay, mut audio) = (FakeRelay::default(), FakeAudio::default());
        orchestrator.stage_start(PARAMS);
        orchestrator.tick(0, &mut relay, &mut audio);
        orchestrator.tick(1, &mut relay, &mut audio);

        orchestrator.stage_stop();
        orchestrator.tick(2, &mut relay, &mut audio);
        assert_eq!(audio.calls.last(), Some(&Call::Stop));
        assert_eq!(relay.calls.last(), Some(&Call::Deactivate));
        assert!(!orchestrator.is_busy());
    }

    #[test]
    fn unresponsive_relay_drops_start_after_timeout() {
        let mut orchestrator = Orchestrator::new(OrchestratorConfig {
            activation_timeout_ms: 100,
        });
        let mut relay = FakeRelay {
            broken: true,
            ..FakeRelay::default()
        };
        let mut audio = FakeAudio::default();

        orchestrator.stage_start(PARAMS);
        orchestrator.tick(1_000, &mut relay, &mut audio);
        orchestrator.tick(1_050, &mut relay, &mut audio);
        assert!(orchestrator.start_pending());

        orchestrator.tick(1_100, &mut relay, &mut audio);
        assert!(!orchestrator.start_pending());
        assert!(audio.calls.is_empty());
        assert_eq!(relay.calls.last(), Some(&Call::Deactivate));

        // The next request is the retry.
        orchestrator.stage_start(PARAMS);
        assert!(orchestrator.start_pending());
    }

    #[test]
    fn replacing_start_restarts_activation_timeout() {
        let mut orchestrator = Orchestrator::new(OrchestratorConfig {
            activation_timeout_ms: 100,
        });
        let mut relay = FakeRelay {
            broken: true,
            ..FakeRelay::default()
        };
        let mut audio = FakeAudio::default();

        orchestrator.stage_start(PARAMS);
        orchestrator.tick(1_000, &mut relay, &mut audio);
        orchestrator.tick(1_080, &mut relay, &mut audio);
        orchestrator.stage_start(StartParams { track: 7, ..PARAMS });

        orchestrator.tick(1_100, &mut relay, &mut audio);
        orchestrator.tick(1_150, &mut relay, &mut audio);
        assert_eq!(
            orchestrator.pending(),
            PendingAction::Start(StartParams { track: 7, ..PARAMS })
        );

        orchestrator.tick(1_200, &mut relay, &mut audio);
        assert!(!orchestrator.start_pending());
    }

    #[test]
    fn reboot_waits_for_idle() {
        let mut orchestrator = Orchestrator::default();
        let (mut relay, mut audio) = (FakeRelay::default(), FakeAudio::default());
        orchestrator.stage_start(PARAMS);
        orchestrator.tick(0, &mut relay, &mut audio);
        orchestrator.stage_reboot();
        assert!(!orchestrator.tick(1, &mut relay, &mut audio).reboot);
        assert!(orchestrator.flags().playing);
        assert!(!orchestrator.tick(2, &mut relay, &mut audio).reboot);

        audio.finished = true;
        assert!(orchestrator.tick(3, &mut relay, &mut audio).reboot);
    }

    #[test]
    fn toggle_starts_then_stops() {
        let mut orchestrator = Orchestrator::default();
        let defaults = AlertDefaults {
            gong: false,
            volume: 12,
            zones: 0xFFFF,
        };
        orchestrator.toggle(2, defaults);
        assert_eq!(
            orchestrator.pending(),
            PendingAction::Start(StartParams {
                track: 2,
                gong: false,
                volume: 12,
                zones: 0xFFFF,
            })
        );
        orchestrator.toggle(2, defaults);
        assert_eq!(orchestrator.pending(), PendingAction::Stop);
    }

    #[test]
    fn stop_while_idle_is_harmless() {
        let mut orchestrator = Orchestrator::default();
        let (mut relay, mut audio) = (FakeRelay::default(), FakeAudio::default());
        orchestrator.stage_stop();
        let outcome = orchestrator.tick(0, &mut relay, &mut audio);
        assert_eq!(outcome, TickOutcome::default());
        assert_eq!(orchestrator.pending(), PendingAction::None);
        assert_eq!(orchestrator.flags(), RuntimeFlags::default());
    }
}
