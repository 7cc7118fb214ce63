//! Status signal ladder and its rendering on a single LED.

use embedded_hal::digital::{OutputPin, PinState};
use log::{trace, warn};

/// Inputs of the ladder, gathered fresh every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemFlags {
    pub relay_active: bool,
    pub start_pending: bool,
    pub remote_connected: bool,
    pub time_synced: bool,
    pub network_up: bool,
}

/// The one visible indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
    /// Relay/zone unit energized.
    Solid,
    /// Alert staged, waiting for the relay.
    FastFlash,
    /// Connectivity level: 1 remote link, 2 time synced, 3 network only.
    Flash(u8),
    /// Disconnected or provisioning.
    SlowFlash,
}

impl Indication {
    /// Evaluate the ladder. Highest priority first, first match wins.
    pub fn evaluate(flags: SystemFlags) -> Self {
        if flags.relay_active {
            Self::Solid
        } else if flags.start_pending {
            Self::FastFlash
        } else if flags.remote_connected {
            Self::Flash(1)
        } else if flags.time_synced {
            Self::Flash(2)
        } else if flags.network_up {
            Self::Flash(3)
        } else {
            Self::SlowFlash
        }
    }

    /// Whether the LED is lit at `now_ms` for this pattern.
    pub fn level_at(self, now_ms: u64) -> bool {
        match self {
            Self::Solid => true,
            Self::FastFlash => now_ms % (2 * FAST_PERIOD_MS) < FAST_PERIOD_MS,
            Self::SlowFlash => now_ms % (2 * SLOW_PERIOD_MS) < SLOW_PERIOD_MS,
            Self::Flash(0) => false,
            Self::Flash(count) => {
                let burst = u64::from(count) * 2 * FLASH_PERIOD_MS;
                let phase = now_ms % (burst + FLASH_PAUSE_MS);
                phase < burst && phase % (2 * FLASH_PERIOD_MS) < FLASH_PERIOD_MS
            }
        }
    }
}

const FAST_PERIOD_MS: u64 = 100;
const SLOW_PERIOD_MS: u64 = 1_000;
const FLASH_PERIOD_MS: u64 = 150;
const FLASH_PAUSE_MS: u64 = 1_000;

/// Status LED driven from the current [`Indication`].
pub struct StatusLed<P> {
    pin: P,
    inverted: bool,
    lit: Option<bool>,
    indication: Option<Indication>,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P, inverted: bool) -> Self {
        Self {
            pin,
            inverted,
            lit: None,
            indication: None,
        }
    }

    /// Render `indication` at `now_ms`. The pin is only written on change.
    pub fn update(&mut self, indication: Indication, now_ms: u64) {
        if self.indication != Some(indication) {
            trace!("Status indication {:?}", indication);
            self.indication = Some(indication);
        }

        let lit = indication.level_at(now_ms);
        if self.lit == Some(lit) {
            return;
        }
        let state = PinState::from(lit != self.inverted);
        if let Err(err) = self.pin.set_state(state) {
            warn!("Status LED write failed: {:?}", err);
            return;
        }
        self.lit = Some(lit);
    }

    pub fn indication(&self) -> Option<Indication> {
        self.indication
    }

    pub fn is_lit(&self) -> bool {
        self.lit.unwrap_or(false)
    }

    pub fn release(self) -> P {
        self.pin
    }
}
