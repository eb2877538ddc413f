//! The narrow slice of a native audio client that the wrapper drives

use ndarray::{ArrayView2, ArrayViewMut2};

use crate::error::Result;
use crate::ports::PortDirection;

/// Port registration, connection and one-cycle-at-a-time processing
///
/// `JackBackend` implements this on top of a live JACK client. Everything in
/// [`JackAudio`](super::JackAudio) goes through this trait, so the client
/// logic can run against any implementation.
pub trait AudioBackend {
    /// Name the server actually assigned to the client
    fn client_name(&self) -> &str;

    /// Samples per process cycle
    fn buffer_size(&self) -> usize;

    fn sample_rate(&self) -> usize;

    fn register_port(&mut self, name: &str, direction: PortDirection) -> Result<()>;

    fn activate(&mut self) -> Result<()>;

    /// Connect two full port ids (`client:port`)
    fn connect(&mut self, source: &str, destination: &str) -> Result<()>;

    /// Drop any capture data queued before the caller started a run
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Run one server cycle
    ///
    /// `outputs` is `(output ports, buffer_size)` and is queued for playback;
    /// `inputs` is `(input ports, buffer_size)` and receives the captured
    /// block. Fails with `InputSync`/`OutputSync` when the streams drift.
    fn process(&mut self, outputs: ArrayView2<f32>, inputs: ArrayViewMut2<f32>) -> Result<()>;

    /// Deactivate and detach from the server
    fn close(&mut self) -> Result<()>;
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn client_name(&self) -> &str {
        (**self).client_name()
    }

    fn buffer_size(&self) -> usize {
        (**self).buffer_size()
    }

    fn sample_rate(&self) -> usize {
        (**self).sample_rate()
    }

    fn register_port(&mut self, name: &str, direction: PortDirection) -> Result<()> {
        (**self).register_port(name, direction)
    }

    fn activate(&mut self) -> Result<()> {
        (**self).activate()
    }

    fn connect(&mut self, source: &str, destination: &str) -> Result<()> {
        (**self).connect(source, destination)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn process(&mut self, outputs: ArrayView2<f32>, inputs: ArrayViewMut2<f32>) -> Result<()> {
        (**self).process(outputs, inputs)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
