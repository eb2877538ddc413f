//! Synchronous capture/playback client
//!
//! Opens a named client, wires its ports to the given remote ports and then
//! records or plays fixed-length blocks one server period at a time.

use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};

use super::backend::AudioBackend;
use super::chunks::{adapt_channels, pad_block, BlockRanges};
use super::jack_backend::JackBackend;
use crate::config::ClientConfig;
use crate::error::{JackedError, Result};
use crate::ports::{port_map, PortDirection, PortMapping};

/// Outcome of the most recent capture/playback run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Periods exchanged with the server
    pub cycles: usize,
    /// Periods skipped because the streams were out of sync
    pub skipped: usize,
}

/// Audio client with auto-connected ports
///
/// The client is closed when dropped; call [`JackAudio::close`] to see the
/// error if teardown fails.
pub struct JackAudio<B: AudioBackend = JackBackend> {
    backend: B,
    name: String,
    inputs: Vec<PortMapping>,
    outputs: Vec<PortMapping>,
    last_run: RunStats,
    closed: bool,
}

impl JackAudio<JackBackend> {
    /// Open a JACK client with default settings
    pub fn new(name: &str, inputs: Vec<PortMapping>, outputs: Vec<PortMapping>) -> Result<Self> {
        Self::with_config(name, inputs, outputs, &ClientConfig::default())
    }

    pub fn with_config(
        name: &str,
        inputs: Vec<PortMapping>,
        outputs: Vec<PortMapping>,
        config: &ClientConfig,
    ) -> Result<Self> {
        let backend = JackBackend::open(name, config)?;
        Self::with_backend(backend, inputs, outputs)
    }

    /// Open a client using the name and default port maps from `config`
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_config(&config.name, config.input_map(), config.output_map(), config)
    }

    /// Run `f` against a fresh client and close it afterwards, even on error
    pub fn scoped<T, F>(
        name: &str,
        inputs: Vec<PortMapping>,
        outputs: Vec<PortMapping>,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let client = Self::new(name, inputs, outputs)?;
        client.run_scoped(f)
    }
}

impl<B: AudioBackend> JackAudio<B> {
    /// Register, activate and connect on top of an already opened backend
    ///
    /// Outputs are registered and connected before inputs.
    pub fn with_backend(
        mut backend: B,
        inputs: Vec<PortMapping>,
        outputs: Vec<PortMapping>,
    ) -> Result<Self> {
        for mapping in &outputs {
            backend.register_port(&mapping.local, PortDirection::Output)?;
        }
        for mapping in &inputs {
            backend.register_port(&mapping.local, PortDirection::Input)?;
        }
        backend.activate()?;

        let mut client = Self {
            name: backend.client_name().to_string(),
            backend,
            inputs,
            outputs,
            last_run: RunStats::default(),
            closed: false,
        };

        client.connect(PortDirection::Output)?;
        client.connect(PortDirection::Input)?;

        log::info!(
            "Client {} ready: {} in, {} out, {} samples per period at {} Hz",
            client.name,
            client.channels_in(),
            client.channels_out(),
            client.buffer_size(),
            client.sample_rate()
        );
        Ok(client)
    }

    fn connect(&mut self, direction: PortDirection) -> Result<()> {
        let mappings = match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        };
        for mapping in mappings {
            let (source, destination) = mapping.connection(&self.name, direction);
            self.backend.connect(&source, &destination)?;
        }
        Ok(())
    }

    /// Run `f` and close the client afterwards, keeping the first error
    pub fn run_scoped<T, F>(mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let result = f(&mut self);
        let closed = self.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> usize {
        self.backend.sample_rate()
    }

    pub fn buffer_size(&self) -> usize {
        self.backend.buffer_size()
    }

    pub fn channels_in(&self) -> usize {
        self.inputs.len()
    }

    pub fn channels_out(&self) -> usize {
        self.outputs.len()
    }

    pub fn inputs(&self) -> &[PortMapping] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PortMapping] {
        &self.outputs
    }

    pub fn last_run(&self) -> RunStats {
        self.last_run
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Record `seconds` of audio from every input
    ///
    /// # Arguments
    /// * `seconds` - Duration to record, finite and not negative
    ///
    /// # Returns
    /// An array of shape `(channels_in, sample_rate * seconds)`, or
    /// [`JackedError::InvalidDuration`] for a bad duration
    pub fn capture(&mut self, seconds: f64) -> Result<Array2<f32>> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(JackedError::InvalidDuration(seconds));
        }
        let size = (self.sample_rate() as f64 * seconds) as usize;
        let mut captured = Array2::zeros((self.channels_in(), size));
        self.run(Some(captured.view_mut()), None)?;
        Ok(captured)
    }

    /// Play a `(channels, samples)` block at the current sample rate
    ///
    /// # Arguments
    /// * `data` - Samples to play, one row per channel
    /// * `truncate` - Drop surplus rows instead of mixing them into the last
    ///   output (see [`adapt_channels`])
    pub fn play(&mut self, data: ArrayView2<f32>, truncate: bool) -> Result<()> {
        let adapted = adapt_channels(data, self.channels_out(), truncate);
        self.run(None, Some(adapted.view()))
    }

    /// Play `data` while recording the same number of samples
    pub fn playrec(&mut self, data: ArrayView2<f32>, truncate: bool) -> Result<Array2<f32>> {
        let adapted = adapt_channels(data, self.channels_out(), truncate);
        let mut captured = Array2::zeros((self.channels_in(), adapted.ncols()));
        self.run(Some(captured.view_mut()), Some(adapted.view()))?;
        Ok(captured)
    }

    /// Step through the blocks one period at a time
    ///
    /// A missing side is fed silence or has its capture thrown away.
    fn run(
        &mut self,
        mut capture: Option<ArrayViewMut2<f32>>,
        playback: Option<ArrayView2<f32>>,
    ) -> Result<()> {
        if self.closed {
            return Err(JackedError::Closed);
        }

        let block = self.buffer_size();
        let samples = match (&capture, &playback) {
            (Some(c), Some(p)) => c.ncols().min(p.ncols()),
            (Some(c), None) => c.ncols(),
            (None, Some(p)) => p.ncols(),
            (None, None) => 0,
        };

        let silence = Array2::<f32>::zeros((self.channels_out(), block));
        let mut scratch = Array2::<f32>::zeros((self.channels_in(), block));
        let mut stats = RunStats::default();

        self.backend.flush()?;

        for (start, end) in BlockRanges::new(samples, block) {
            let full = end - start == block;

            let padded;
            let outs = match &playback {
                Some(p) if full => p.slice(s![.., start..end]),
                Some(p) => {
                    padded = pad_block(p.slice(s![.., start..end]), block);
                    padded.view()
                }
                None => silence.view(),
            };

            let result = match capture.as_mut() {
                Some(c) if full => self.backend.process(outs, c.slice_mut(s![.., start..end])),
                _ => self.backend.process(outs, scratch.view_mut()),
            };

            match result {
                Ok(()) => {
                    stats.cycles += 1;
                    if !full {
                        if let Some(c) = capture.as_mut() {
                            c.slice_mut(s![.., start..end])
                                .assign(&scratch.slice(s![.., ..end - start]));
                        }
                    }
                }
                Err(e) if e.is_sync() => {
                    log::debug!("Skipping period at sample {}: {}", start, e);
                    stats.skipped += 1;
                }
                Err(e) => {
                    self.last_run = stats;
                    return Err(e);
                }
            }
        }

        if stats.skipped > 0 {
            log::info!(
                "Client {}: {} of {} periods skipped",
                self.name,
                stats.skipped,
                stats.cycles + stats.skipped
            );
        }
        self.last_run = stats;
        Ok(())
    }

    /// Deactivate and detach from the server
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::info!("Closing client {}", self.name);
        self.backend.close()
    }
}

impl<B: AudioBackend> Drop for JackAudio<B> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Failed to close client {}: {}", self.name, e);
        }
    }
}

/// Open a client from explicit `(local port, remote port id)` maps
///
/// ```no_run
/// let client = jacked::get_client(
///     "recorder",
///     [("in_1", "system:capture_1")],
///     [("out_1", "system:playback_1")],
/// )?;
/// # Ok::<(), jacked::JackedError>(())
/// ```
pub fn get_client<I, O, M, N>(name: &str, input_map: I, output_map: O) -> Result<JackAudio>
where
    I: IntoIterator<Item = M>,
    O: IntoIterator<Item = N>,
    M: Into<PortMapping>,
    N: Into<PortMapping>,
{
    JackAudio::new(
        name,
        input_map.into_iter().map(Into::into).collect(),
        output_map.into_iter().map(Into::into).collect(),
    )
}

/// Open a client wired to the first `channels_in` capture and
/// `channels_out` playback ports of the `system` client
pub fn easy_client(name: &str, channels_in: usize, channels_out: usize) -> Result<JackAudio> {
    JackAudio::new(
        name,
        port_map(channels_in, PortDirection::Input),
        port_map(channels_out, PortDirection::Output),
    )
}
