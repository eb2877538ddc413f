//! jacked - synchronous record/playback over JACK
//!
//! Opens a named JACK client, auto-connects its ports to the system
//! capture/playback ports and records or plays fixed-duration
//! `(channels, samples)` blocks, with optional Python bindings.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod audio;
pub mod config;
pub mod error;
pub mod ports;
#[cfg(feature = "python")]
pub mod python_bindings;

pub use audio::{easy_client, get_client, AudioBackend, JackAudio, JackBackend, RunStats};
pub use config::ClientConfig;
pub use error::{JackedError, Result};
pub use ports::{port_id, port_map, PortDirection, PortMapping, DEFAULT_CLIENT};
