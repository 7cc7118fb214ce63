//! Desktop simulator for the Vellez alert/chime controller.
//!
//! Runs the controller loop against simulated relay, audio and network
//! collaborators. Settings persist to a file, so overrides survive restarts
//! of the simulator as well as simulated reboots. A stdin console plays the
//! part of the remote client and the local web UI.
//!
//! ```text
//! RUST_LOG=info cargo run -p vellez-simulator -- --track-ms 3000
//! > press 1
//! > volume 25
//! > batch mqtt_host=broker.local mqtt_port=1883
//! > reboot
//! ```

mod args;
mod console;
mod devices;
mod storage;

use std::thread;
use std::time::Instant;

use log::{error, info, warn};

use vellez_core::buttons::{Button, Buttons};
use vellez_core::controller::{Controller, ControllerConfig};
use vellez_core::devices::Connectivity;
use vellez_core::settings::{Defaults, SettingValue, SettingsStore};
use vellez_core::status::{Indication, StatusLed};

use crate::args::CliArgs;
use crate::console::{Console, HELP, LocalCommand};
use crate::devices::{ButtonPanel, LogPin, SimAudio, SimButtonPin, SimNetwork, SimRelay, SimSystem};
use crate::storage::FileStorage;

type SimController = Controller<FileStorage, SimRelay, SimAudio, LogPin, LogPin>;

/// Status LED is wired active-low on the reference board.
const LED_INVERTED: bool = true;

enum Flow {
    Continue,
    Quit,
}

/// Power-on: build every collaborator from scratch and run the start-up
/// sequence.
fn boot(args: &CliArgs, factory_reset: bool, network: &mut SimNetwork) -> SimController {
    let settings = SettingsStore::new(
        FileStorage::new(&args.storage_path),
        Defaults::new(args.chip_id),
    );
    let mut controller = Controller::new(
        ControllerConfig::default(),
        settings,
        SimRelay::new(args.relay_latency, args.relay_fault),
        SimAudio::new(args.track_length),
        StatusLed::new(LogPin::new("led", true), LED_INVERTED),
        LogPin::new("amp", false),
    );
    controller.begin(factory_reset, network);
    let ap_ssid = controller.settings().network_config().ap_ssid;
    info!("Device {:06X} up, access point \"{}\"", args.chip_id, ap_ssid);
    controller
}

fn main() {
    env_logger::init();
    let args = CliArgs::parse();
    if args.show_help {
        CliArgs::print_help();
        return;
    }

    info!("Starting Vellez simulator");
    info!("Settings file: {}", args.storage_path.display());

    let mut console = match Console::spawn() {
        Ok(console) => console,
        Err(err) => {
            error!("Failed to start console: {}", err);
            std::process::exit(1);
        }
    };

    let debounce_ms = ControllerConfig::default().debounce_ms;
    let pins = [SimButtonPin::new(), SimButtonPin::new()];
    let mut panel = ButtonPanel::new(pins.clone());
    let mut buttons = Buttons::new(
        Button::new(pins[0].clone(), true, debounce_ms),
        Button::new(pins[1].clone(), true, debounce_ms),
    );

    if args.hold_buttons {
        pins.iter().for_each(|pin| pin.set_pressed(true));
    }
    let factory_reset = buttons.both_held();
    pins.iter().for_each(|pin| pin.set_pressed(false));

    let mut network = SimNetwork::new(!args.offline);
    let mut system = SimSystem::default();
    let mut controller = boot(&args, factory_reset, &mut network);
    println!("{}", HELP);

    let epoch = Instant::now();
    loop {
        let tick_start = Instant::now();
        let now_ms = u64::try_from(epoch.elapsed().as_millis()).unwrap_or(u64::MAX);

        panel.update(now_ms);
        controller.poll_source(now_ms, &mut buttons);
        controller.poll_source(now_ms, &mut console);
        while let Some(command) = console.next_local() {
            let flow = apply(command, &mut controller, &mut network, &mut panel, now_ms);
            if let Flow::Quit = flow {
                info!("Bye");
                return;
            }
        }

        let connectivity = network.connectivity();
        controller.tick(now_ms, connectivity, &mut network, &mut system);

        if system.take_restart() {
            info!("Rebooting");
            network = SimNetwork::new(connectivity.network_up);
            controller = boot(&args, false, &mut network);
        }

        if console.is_closed() && !controller.orchestrator().is_busy() {
            info!("Console closed, exiting");
            return;
        }

        if let Some(remaining) = args.tick.checked_sub(tick_start.elapsed()) {
            thread::sleep(remaining);
        }
    }
}

fn apply(
    command: LocalCommand,
    controller: &mut SimController,
    network: &mut SimNetwork,
    panel: &mut ButtonPanel,
    now_ms: u64,
) -> Flow {
    match command {
        LocalCommand::Press(button) => panel.press(button, now_ms),
        LocalCommand::Set(id, raw) => match SettingValue::parse(id, &raw) {
            Ok(value) => {
                if controller.settings_mut().set(id, &value) {
                    controller.reapply_settings();
                }
            }
            Err(err) => warn!("{}", err),
        },
        LocalCommand::Clear(id) => {
            controller.settings_mut().clear(id);
            controller.reapply_settings();
        }
        LocalCommand::Show => show_settings(controller),
        LocalCommand::Save => {
            if let Err(err) = controller.settings_mut().save() {
                error!("Save failed: {}", err);
            }
        }
        LocalCommand::Discard => {
            controller.settings_mut().discard_changes();
            controller.reapply_settings();
        }
        LocalCommand::Autocommit(enabled) => {
            controller.settings_mut().set_autocommit(enabled);
            info!("Autocommit {}", if enabled { "on" } else { "off" });
        }
        LocalCommand::Batch(edits) => {
            let result = controller.settings_mut().batch(|store| {
                edits
                    .iter()
                    .filter(|(id, raw)| match SettingValue::parse(*id, raw) {
                        Ok(value) => store.set(*id, &value),
                        Err(err) => {
                            warn!("{}", err);
                            false
                        }
                    })
                    .count()
            });
            match result {
                Ok(accepted) => info!("Batch applied {} of {} field(s)", accepted, edits.len()),
                Err(err) => error!("Batch save failed: {}", err),
            }
            controller.reapply_settings();
        }
        LocalCommand::Net(up) => network.set_link(up),
        LocalCommand::Status => show_status(controller, network.connectivity(), network.update_checks()),
        LocalCommand::Help => println!("{}", HELP),
        LocalCommand::Quit => return Flow::Quit,
    }
    Flow::Continue
}

fn show_settings(controller: &SimController) {
    let settings = controller.settings();
    for entry in settings.entries() {
        let marker = if entry.overridden { "*" } else { " " };
        println!("{} {:<22} {}", marker, entry.id.key(), entry.value);
    }
    println!(
        "(* overridden; autocommit {}, {})",
        if settings.autocommit() { "on" } else { "off" },
        if settings.is_dirty() { "unsaved changes" } else { "saved" }
    );
}

fn show_status(controller: &SimController, connectivity: Connectivity, update_checks: u32) {
    let orchestrator = controller.orchestrator();
    let flags = orchestrator.flags();
    let indication = Indication::evaluate(controller.system_flags(connectivity));
    println!("pending      {:?}", orchestrator.pending());
    println!("relay active {}", flags.active);
    println!("playing      {}", flags.playing);
    println!("reboot       {}", orchestrator.reboot_pending());
    println!("amplifier    {}", controller.amplifier_enabled());
    println!("led          {:?} ({})", indication, if controller.led().is_lit() { "lit" } else { "dark" });
    println!(
        "network      up={} time={} remote={} (update checks {})",
        connectivity.network_up, connectivity.time_synced, connectivity.remote_connected, update_checks
    );
}
