//! Hardware-independent core of the Vellez alert/chime controller.
//!
//! This crate contains the layered settings store and its persisted block
//! format, the alert orchestration state machine, the status signal ladder,
//! and the controller loop that ties them to the relay unit, the audio
//! module and the network services through narrow collaborator traits.
//!
//! It is `no_std` so it builds for the microcontroller target and for desktop
//! hosts (the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod buttons;
pub mod controller;
pub mod devices;
pub mod error;
pub mod orchestrator;
pub mod requests;
pub mod settings;
pub mod status;
