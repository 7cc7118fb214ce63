//! Debounced push buttons.

use embedded_hal::digital::InputPin;
use log::{debug, warn};

use crate::requests::{ButtonId, Request, RequestSource};

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// A single push button. Reports a press once per stable low-to-high
/// transition of the logical level.
pub struct Button<P> {
    pin: P,
    /// Pressed reads low (pull-up wiring).
    active_low: bool,
    debounce_ms: u64,
    stable: bool,
    candidate: bool,
    candidate_since: u64,
}

impl<P: InputPin> Button<P> {
    pub fn new(pin: P, active_low: bool, debounce_ms: u64) -> Self {
        Self {
            pin,
            active_low,
            debounce_ms,
            stable: false,
            candidate: false,
            candidate_since: 0,
        }
    }

    /// Raw logical level, without debouncing. Read errors count as released.
    pub fn is_held(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(high) => high != self.active_low,
            Err(err) => {
                warn!("Button read failed: {:?}", err);
                false
            }
        }
    }

    /// Sample the pin. Returns `true` on a debounced press edge.
    pub fn update(&mut self, now_ms: u64) -> bool {
        let level = self.is_held();
        if level != self.candidate {
            self.candidate = level;
            self.candidate_since = now_ms;
            return false;
        }
        if level == self.stable || now_ms.saturating_sub(self.candidate_since) < self.debounce_ms {
            return false;
        }
        self.stable = level;
        level
    }
}

/// The two front-panel buttons as a request source.
pub struct Buttons<P1, P2> {
    one: Button<P1>,
    two: Button<P2>,
}

impl<P1: InputPin, P2: InputPin> Buttons<P1, P2> {
    pub fn new(one: Button<P1>, two: Button<P2>) -> Self {
        Self { one, two }
    }

    /// Both buttons held right now; sampled at power-on for the fail-safe.
    pub fn both_held(&mut self) -> bool {
        self.one.is_held() && self.two.is_held()
    }
}

impl<P1: InputPin, P2: InputPin> RequestSource for Buttons<P1, P2> {
    fn poll(&mut self, now_ms: u64, sink: &mut dyn FnMut(Request)) {
        if self.one.update(now_ms) {
            debug!("Button 1 pressed");
            sink(Request::Button(ButtonId::One));
        }
        if self.two.update(now_ms) {
            debug!("Button 2 pressed");
            sink(Request::Button(ButtonId::Two));
        }
    }
}
