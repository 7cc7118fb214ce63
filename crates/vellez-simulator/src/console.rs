//! Line-oriented console standing in for the remote client and the web UI.
//!
//! Lines are read on a helper thread and handed to the loop through a
//! channel, so the loop never blocks on stdin. Remote-style commands become
//! [`Request`]s; everything that needs direct access to the settings store
//! or the simulated hardware is queued as a [`LocalCommand`].

use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use log::{debug, warn};
use vellez_core::error::SettingsError;
use vellez_core::orchestrator::StartParams;
use vellez_core::requests::{ButtonId, Request, RequestSource};
use vellez_core::settings::SettingId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    /// Press a front-panel button.
    Press(ButtonId),
    Set(SettingId, String),
    Clear(SettingId),
    Show,
    Save,
    Discard,
    Autocommit(bool),
    /// Web form submission: several fields, one save.
    Batch(Vec<(SettingId, String)>),
    Net(bool),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Request(Request),
    Local(LocalCommand),
}

pub const HELP: &str = "\
Commands:
  press <1|2>                         front-panel button
  play <track> <gong> <volume> <zones> remote play with explicit parameters
  web-play <track>                    play with configured gong/volume/zones
  stop | reboot | factory-reset
  address|gong|volume|zones <value>   remote setters
  set <key> <value> | clear <key>     edit one setting
  batch <key>=<value> ...             edit several settings, save once
  show | save | discard | autocommit <on|off>
  net <up|down> | status | help | quit";

pub struct Console {
    lines: Receiver<String>,
    local: VecDeque<LocalCommand>,
    closed: bool,
}

impl Console {
    /// Start reading stdin on a background thread.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("console".into())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self::from_receiver(rx))
    }

    pub fn from_receiver(lines: Receiver<String>) -> Self {
        Self {
            lines,
            local: VecDeque::new(),
            closed: false,
        }
    }

    pub fn next_local(&mut self) -> Option<LocalCommand> {
        self.local.pop_front()
    }

    /// Stdin reached end of file.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RequestSource for Console {
    fn poll(&mut self, _now_ms: u64, sink: &mut dyn FnMut(Request)) {
        loop {
            let line = match self.lines.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        debug!("Console input closed");
                        self.closed = true;
                    }
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(Command::Request(request)) => sink(request),
                Ok(Command::Local(command)) => self.local.push_back(command),
                Err(err) => warn!("{}", err),
            }
        }
    }
}

pub fn parse_line(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err("empty command".into());
    };
    let args: Vec<&str> = words.collect();
    let arg = |index: usize| {
        args.get(index)
            .copied()
            .ok_or_else(|| format!("{} expects more arguments, try `help`", command))
    };

    let request = |r| Ok(Command::Request(r));
    let local = |c| Ok(Command::Local(c));

    match command {
        "press" => {
            let raw = arg(0)?;
            let button = number(raw)
                .ok()
                .and_then(ButtonId::from_index)
                .ok_or_else(|| format!("no button {}", raw))?;
            local(LocalCommand::Press(button))
        }
        "play" => request(Request::Play(StartParams {
            track: number(arg(0)?)?,
            gong: flag(arg(1)?)?,
            volume: number(arg(2)?)?,
            zones: number(arg(3)?)?,
        })),
        "web-play" => request(Request::PlayTrack(number(arg(0)?)?)),
        "stop" => request(Request::Stop),
        "reboot" => request(Request::Reboot),
        "factory-reset" => request(Request::FactoryReset),
        "address" => request(Request::SetAddress(number(arg(0)?)?)),
        "gong" => request(Request::SetGong(flag(arg(0)?)?)),
        "volume" => request(Request::SetVolume(number(arg(0)?)?)),
        "zones" => request(Request::SetZones(number(arg(0)?)?)),
        "set" => {
            let id = setting(arg(0)?)?;
            // Text values may contain spaces.
            let value = line
                .split_once(arg(0)?)
                .map(|(_, rest)| rest.trim())
                .unwrap_or_default();
            local(LocalCommand::Set(id, value.to_string()))
        }
        "clear" => local(LocalCommand::Clear(setting(arg(0)?)?)),
        "batch" => {
            let mut edits = Vec::new();
            for pair in &args {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("expected key=value, got {}", pair))?;
                edits.push((setting(key)?, value.to_string()));
            }
            if edits.is_empty() {
                return Err("batch needs at least one key=value".into());
            }
            local(LocalCommand::Batch(edits))
        }
        "show" => local(LocalCommand::Show),
        "save" => local(LocalCommand::Save),
        "discard" => local(LocalCommand::Discard),
        "autocommit" => local(LocalCommand::Autocommit(flag(arg(0)?)?)),
        "net" => match arg(0)? {
            "up" => local(LocalCommand::Net(true)),
            "down" => local(LocalCommand::Net(false)),
            other => Err(format!("net expects up or down, got {}", other)),
        },
        "status" => local(LocalCommand::Status),
        "help" | "?" => local(LocalCommand::Help),
        "quit" | "exit" => local(LocalCommand::Quit),
        other => Err(format!("unknown command {}, try `help`", other)),
    }
}

fn setting(key: &str) -> Result<SettingId, String> {
    SettingId::from_key(key).ok_or_else(|| format!("{}: {}", SettingsError::UnknownKey, key))
}

fn flag(raw: &str) -> Result<bool, String> {
    match raw {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        other => Err(format!("expected on/off, got {}", other)),
    }
}

fn number<T: TryFrom<u32>>(raw: &str) -> Result<T, String> {
    let value = match raw.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse::<u32>(),
    }
    .map_err(|_| format!("not a number: {}", raw))?;
    T::try_from(value).map_err(|_| format!("{} is out of range", raw))
}
