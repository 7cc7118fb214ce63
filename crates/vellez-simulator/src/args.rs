//! Command-line argument parsing for the simulator.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Parsed command-line arguments.
#[derive(Debug)]
pub struct CliArgs {
    /// File backing the persisted settings block
    pub storage_path: PathBuf,
    /// Chip id used to render defaults such as the AP SSID
    pub chip_id: u32,
    /// Loop period
    pub tick: Duration,
    /// Delay before the simulated relay unit reports active
    pub relay_latency: Duration,
    /// Relay unit never reports active
    pub relay_fault: bool,
    /// Length of every simulated track
    pub track_length: Duration,
    /// Both buttons held at power-on (fail-safe)
    pub hold_buttons: bool,
    /// Start without network
    pub offline: bool,
    /// Whether help was requested
    pub show_help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("vellez-settings.bin"),
            chip_id: 0x00A1B2,
            tick: Duration::from_millis(10),
            relay_latency: Duration::from_millis(200),
            relay_fault: false,
            track_length: Duration::from_secs(5),
            hold_buttons: false,
            offline: false,
            show_help: false,
        }
    }
}

impl CliArgs {
    /// Parse arguments from command line.
    pub fn parse() -> Self {
        Self::parse_from(env::args().skip(1))
    }

    pub fn parse_from(iter: impl IntoIterator<Item = String>) -> Self {
        let mut args = Self::default();
        let mut iter = iter.into_iter();

        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };
            let mut value = |name: &str| {
                let value = inline.clone().or_else(|| iter.next());
                if value.is_none() {
                    eprintln!("{} requires an argument", name);
                }
                value
            };

            match flag.as_str() {
                "--help" | "-h" => args.show_help = true,
                "--relay-fault" => args.relay_fault = true,
                "--hold-buttons" => args.hold_buttons = true,
                "--offline" => args.offline = true,
                "--storage" => match value("--storage") {
                    Some(path) => args.storage_path = PathBuf::from(path),
                    None => args.show_help = true,
                },
                "--chip-id" => match value("--chip-id").as_deref().and_then(parse_hex) {
                    Some(id) if id <= 0x00FF_FFFF => args.chip_id = id,
                    _ => {
                        eprintln!("--chip-id expects up to six hex digits");
                        args.show_help = true;
                    }
                },
                "--tick-ms" | "--relay-latency-ms" | "--track-ms" => {
                    match value(flag.as_str()).and_then(|v| v.parse::<u64>().ok()) {
                        Some(ms) => {
                            let duration = Duration::from_millis(ms);
                            match flag.as_str() {
                                "--tick-ms" => args.tick = duration.max(Duration::from_millis(1)),
                                "--relay-latency-ms" => args.relay_latency = duration,
                                _ => args.track_length = duration,
                            }
                        }
                        None => {
                            eprintln!("{} expects a number of milliseconds", flag);
                            args.show_help = true;
                        }
                    }
                }
                _ => {
                    eprintln!("Unknown argument: {}", arg);
                    args.show_help = true;
                }
            }
        }

        args
    }

    /// Print help text to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage:\n  vellez-simulator [options]\n\n\
             Options:\n\
             \x20 --storage <path>          Settings block file (default vellez-settings.bin)\n\
             \x20 --chip-id <hex>           Chip id for rendered defaults (default A1B2)\n\
             \x20 --tick-ms <ms>            Loop period (default 10)\n\
             \x20 --relay-latency-ms <ms>   Relay activation delay (default 200)\n\
             \x20 --relay-fault             Relay unit never reports active\n\
             \x20 --track-ms <ms>           Length of every track (default 5000)\n\
             \x20 --hold-buttons            Hold both buttons at power-on (factory reset)\n\
             \x20 --offline                 Start with the network down\n\
             \x20 -h, --help                Show this help\n\n\
             Type `help` at the prompt for console commands. RUST_LOG controls verbosity.\n"
        );
    }
}

fn parse_hex(raw: &str) -> Option<u32> {
    let raw = raw.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(raw, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.storage_path, PathBuf::from("vellez-settings.bin"));
        assert!(!args.show_help);
    }

    #[test]
    fn flags_with_values() {
        let args = parse(&[
            "--storage",
            "/tmp/x.bin",
            "--chip-id=C0FFEE",
            "--relay-latency-ms",
            "50",
            "--relay-fault",
        ]);
        assert_eq!(args.storage_path, PathBuf::from("/tmp/x.bin"));
        assert_eq!(args.chip_id, 0xC0FFEE);
        assert_eq!(args.relay_latency, Duration::from_millis(50));
        assert!(args.relay_fault);
        assert!(!args.show_help);
    }

    #[test]
    fn bad_values_request_help() {
        assert!(parse(&["--tick-ms", "soon"]).show_help);
        assert!(parse(&["--chip-id", "1000000"]).show_help);
        assert!(parse(&["--bogus"]).show_help);
    }
}
