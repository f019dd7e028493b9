//! wasend: deliver one WhatsApp message and report whether it went out.
//!
//! Drives a WhatsApp bridge sidecar: resolves the configured group or
//! contact, sends once (retrying a single known-benign failure), waits for the
//! server acknowledgment, and maps everything that happened into a process
//! exit code that never reports a sent message as failed.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod delivery;
pub mod whatsapp;
