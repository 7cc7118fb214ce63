//! Recording collaborators shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};
use vellez_core::controller::{Controller, ControllerConfig};
use vellez_core::devices::{AudioPlayer, NetworkServices, RelayUnit, SystemControl};
use vellez_core::settings::{
    Defaults, MemoryStorage, NetworkConfig, RemoteConfig, SettingsStore, UpdateEndpoint,
    WebCredentials,
};
use vellez_core::status::StatusLed;

pub const CHIP_ID: u32 = 0xC0FFEE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Address(u8),
    Gong(bool),
    Zones(u16),
    Activate,
    Deactivate,
    Volume(u8),
    Play(u16),
    Stop,
    /// `ap_ssid`, `ntp_host`, `timezone`.
    NetworkBegin(String, String, String),
    UpdateCheck(String),
    RemoteStart(String),
    EraseCredentials,
    Restart,
}

pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn count(log: &Log, event: &Event) -> usize {
    log.borrow().iter().filter(|e| *e == event).count()
}

/// Relay unit that reports the requested state on the next `process`
/// unless it is marked unresponsive.
pub struct Relay {
    log: Log,
    requested: bool,
    active: bool,
    pub unresponsive: bool,
}

impl Relay {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            requested: false,
            active: false,
            unresponsive: false,
        }
    }
}

impl RelayUnit for Relay {
    fn set_address(&mut self, address: u8) {
        self.log.borrow_mut().push(Event::Address(address));
    }
    fn set_gong(&mut self, enabled: bool) {
        self.log.borrow_mut().push(Event::Gong(enabled));
    }
    fn set_zones(&mut self, zones: u16) {
        self.log.borrow_mut().push(Event::Zones(zones));
    }
    fn activate(&mut self) {
        self.log.borrow_mut().push(Event::Activate);
        self.requested = true;
    }
    fn deactivate(&mut self) {
        if self.requested {
            self.log.borrow_mut().push(Event::Deactivate);
        }
        self.requested = false;
    }
    fn process(&mut self) -> Option<bool> {
        let next = self.requested && !self.unresponsive;
        (next != self.active).then(|| {
            self.active = next;
            next
        })
    }
}

/// Audio module that plays until `finish` is called.
pub struct Audio {
    log: Log,
    finished: bool,
}

impl Audio {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            finished: false,
        }
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }
}

impl AudioPlayer for Audio {
    fn set_volume(&mut self, level: u8) {
        self.log.borrow_mut().push(Event::Volume(level));
    }
    fn play(&mut self, track: u16) {
        self.log.borrow_mut().push(Event::Play(track));
    }
    fn stop(&mut self) {
        self.log.borrow_mut().push(Event::Stop);
    }
    fn process(&mut self) -> Option<bool> {
        std::mem::take(&mut self.finished).then_some(false)
    }
}

pub struct Network(pub Log);

impl NetworkServices for Network {
    fn begin(&mut self, config: NetworkConfig<'_>, _web: WebCredentials<'_>) {
        self.0.borrow_mut().push(Event::NetworkBegin(
            config.ap_ssid.to_string(),
            config.ntp_host.to_string(),
            config.timezone.to_string(),
        ));
    }
    fn check_for_update(&mut self, endpoint: UpdateEndpoint<'_>, _current_version: &str) {
        self.0
            .borrow_mut()
            .push(Event::UpdateCheck(format!("{}:{}{}", endpoint.host, endpoint.port, endpoint.uri)));
    }
    fn start_remote(&mut self, config: RemoteConfig<'_>) {
        self.0
            .borrow_mut()
            .push(Event::RemoteStart(config.client_id.to_string()));
    }
    fn erase_network_credentials(&mut self) {
        self.0.borrow_mut().push(Event::EraseCredentials);
    }
}

pub struct System(pub Log);

impl SystemControl for System {
    fn restart(&mut self) {
        self.0.borrow_mut().push(Event::Restart);
    }
}

#[derive(Default)]
pub struct Pin {
    pub high: bool,
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

pub type TestController = Controller<MemoryStorage, Relay, Audio, Pin, Pin>;

pub fn controller(storage: MemoryStorage, log: &Log) -> TestController {
    Controller::new(
        ControllerConfig::default(),
        SettingsStore::new(storage, Defaults::new(CHIP_ID)),
        Relay::new(log),
        Audio::new(log),
        StatusLed::new(Pin::default(), true),
        Pin::default(),
    )
}
