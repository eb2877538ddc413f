//! JACK client plumbing: the backend seam, realtime rings and the
//! synchronous capture/playback client

pub mod backend;
pub mod buffer;
pub mod chunks;
pub mod client;
pub mod jack_backend;

pub use backend::AudioBackend;
pub use buffer::ChannelRings;
pub use chunks::{adapt_channels, BlockRanges};
pub use client::{easy_client, get_client, JackAudio, RunStats};
pub use jack_backend::JackBackend;
