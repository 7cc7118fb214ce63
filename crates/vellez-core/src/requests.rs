//! Requests accepted by the controller.
//!
//! Buttons, the message-bus client and the web UI all reduce to the same
//! small vocabulary. Requests are fire-and-forget: they stage intent and
//! never wait for hardware.

use crate::orchestrator::StartParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonId {
    One,
    Two,
}

impl ButtonId {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Relay unit bus address.
    SetAddress(u8),
    SetGong(bool),
    SetVolume(u8),
    /// Zone bitmask.
    SetZones(u16),
    /// Remote play with explicit parameters.
    Play(StartParams),
    /// Play a track with the configured gong, volume and zones.
    PlayTrack(u16),
    /// Physical button press (toggle).
    Button(ButtonId),
    Stop,
    Reboot,
    /// Drop every settings override.
    FactoryReset,
}

/// Something that produces requests when polled from the loop.
pub trait RequestSource {
    fn poll(&mut self, now_ms: u64, sink: &mut dyn FnMut(Request));
}

impl<T: RequestSource + ?Sized> RequestSource for &mut T {
    fn poll(&mut self, now_ms: u64, sink: &mut dyn FnMut(Request)) {
        (**self).poll(now_ms, sink)
    }
}
