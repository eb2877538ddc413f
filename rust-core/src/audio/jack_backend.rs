//! JACK implementation of [`AudioBackend`]
//!
//! The realtime process callback only moves samples between the JACK ports
//! and per-channel rings. The caller's thread waits on those rings, so each
//! call to `process` lines up with one server period.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jack::{
    AsyncClient, AudioIn, AudioOut, Client, ClientOptions, ClientStatus, Control, Frames,
    NotificationHandler, Port, ProcessHandler, ProcessScope,
};
use ndarray::{ArrayView2, ArrayViewMut2};

use super::backend::AudioBackend;
use super::buffer::{ChannelConsumers, ChannelProducers, ChannelRings};
use crate::config::ClientConfig;
use crate::error::{JackedError, Result};
use crate::ports::PortDirection;

const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Largest period a JACK server runs with
const MAX_PERIOD: usize = 8192;

/// Server cycles a caller waits for a period before the streams count as
/// out of sync
const SYNC_CYCLES: u64 = 2;

/// State written by the realtime and notification threads
struct Shared {
    cycles: AtomicU64,
    overruns: AtomicU64,
    buffer_size: AtomicUsize,
    sample_rate: AtomicUsize,
}

impl Shared {
    fn new(buffer_size: usize, sample_rate: usize) -> Self {
        Self {
            cycles: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            buffer_size: AtomicUsize::new(buffer_size),
            sample_rate: AtomicUsize::new(sample_rate),
        }
    }
}

/// Tracks the server's sample rate and logs everything else
struct Notifications {
    shared: Arc<Shared>,
}

impl NotificationHandler for Notifications {
    unsafe fn shutdown(&mut self, status: ClientStatus, reason: &str) {
        log::warn!("JACK server shut down ({:?}): {}", status, reason);
    }

    fn sample_rate(&mut self, _: &Client, srate: Frames) -> Control {
        log::info!("JACK sample rate is now {} Hz", srate);
        self.shared
            .sample_rate
            .store(srate as usize, Ordering::Release);
        Control::Continue
    }

    fn xrun(&mut self, _: &Client) -> Control {
        log::warn!("JACK xrun");
        Control::Continue
    }
}

/// Queue one period of every input port, or nothing at all
///
/// Whole periods only, so every channel stays aligned.
fn push_capture<'a, I>(captured: &mut ChannelProducers, frames: usize, ports: I) -> bool
where
    I: IntoIterator<Item = &'a [f32]>,
{
    if !captured.has_space(frames) {
        return false;
    }
    for (channel, samples) in ports.into_iter().enumerate() {
        captured.write(channel, samples);
    }
    true
}

/// Fill an output port from its ring, zero-filling on underrun
fn pull_playback(playback: &mut ChannelConsumers, channel: usize, out: &mut [f32]) {
    let read = playback.read(channel, out);
    out[read..].fill(0.0);
}

/// Realtime side: ports plus the thread-facing ends of the rings
struct Bridge {
    inputs: Vec<Port<AudioIn>>,
    outputs: Vec<Port<AudioOut>>,
    captured: ChannelProducers,
    playback: ChannelConsumers,
    shared: Arc<Shared>,
}

impl ProcessHandler for Bridge {
    fn process(&mut self, _: &Client, ps: &ProcessScope) -> Control {
        let frames = ps.n_frames() as usize;

        let ports = self.inputs.iter().map(|port| port.as_slice(ps));
        if !push_capture(&mut self.captured, frames, ports) {
            self.shared.overruns.fetch_add(1, Ordering::Relaxed);
        }

        for (channel, port) in self.outputs.iter_mut().enumerate() {
            pull_playback(&mut self.playback, channel, port.as_mut_slice(ps));
        }

        self.shared.cycles.fetch_add(1, Ordering::Release);
        Control::Continue
    }

    fn buffer_size(&mut self, _: &Client, size: Frames) -> Control {
        self.shared.buffer_size.store(size as usize, Ordering::Release);
        Control::Continue
    }
}

/// Caller side of the rings
struct Streams {
    capture: ChannelConsumers,
    playback: ChannelProducers,
    /// Queued playback is held to this many periods of the current size
    periods: usize,
}

impl Streams {
    /// Build both ring sets, returning the realtime ends alongside
    ///
    /// The rings are sized for the largest period so a server-side buffer
    /// size change never leaves them too small for one period.
    fn new(
        inputs: usize,
        outputs: usize,
        period: usize,
        periods: usize,
    ) -> (Self, ChannelProducers, ChannelConsumers) {
        let capacity = period.max(MAX_PERIOD) * periods;
        let (captured, capture) = ChannelRings::new(inputs, capacity).split();
        let (playback, playback_rx) = ChannelRings::new(outputs, capacity).split();
        let streams = Self {
            capture,
            playback,
            periods,
        };
        (streams, captured, playback_rx)
    }

    /// Drop whole stale capture periods, keeping a partial one
    fn flush(&mut self, period: usize) {
        let period = period.max(1);
        if self.capture.channels() > 0 {
            let stale = self.capture.len() / period * period;
            self.capture.discard(stale);
        }
    }

    fn input_ready(&self, block: usize) -> bool {
        self.capture.has_data(block)
    }

    fn output_ready(&self, block: usize, period: usize) -> bool {
        let limit = period.max(block) * self.periods;
        self.playback.has_space(block) && self.playback.pending() + block <= limit
    }

    /// Queue `outputs` for playback and fill `inputs` with one captured block
    ///
    /// Waits until both sides are ready. When the server stops cycling for
    /// `timeout` this is a [`JackedError::Timeout`]. When it keeps cycling
    /// and a side still is not ready after [`SYNC_CYCLES`] periods, the
    /// matching sync error comes back right away.
    fn exchange(
        &mut self,
        outputs: ArrayView2<f32>,
        mut inputs: ArrayViewMut2<f32>,
        period: usize,
        cycles: &AtomicU64,
        timeout: Duration,
        scratch: &mut Vec<f32>,
    ) -> Result<()> {
        check_rows(self.playback.channels(), outputs.nrows(), outputs.ncols())?;
        check_rows(self.capture.channels(), inputs.nrows(), inputs.ncols())?;

        let out_block = outputs.ncols();
        let in_block = inputs.ncols();

        let start = cycles.load(Ordering::Acquire);
        let deadline = Instant::now() + timeout;
        loop {
            let input_ready = self.input_ready(in_block);
            let output_ready = self.output_ready(out_block, period);
            if input_ready && output_ready {
                break;
            }

            let elapsed = cycles.load(Ordering::Acquire).wrapping_sub(start);
            if elapsed >= SYNC_CYCLES || Instant::now() >= deadline {
                if elapsed == 0 {
                    return Err(JackedError::Timeout(timeout.as_millis() as u64));
                }
                return Err(if input_ready {
                    JackedError::OutputSync
                } else {
                    JackedError::InputSync
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        for (channel, row) in outputs.outer_iter().enumerate() {
            scratch.clear();
            scratch.extend(row.iter().copied());
            self.playback.write(channel, &scratch[..]);
        }

        for (channel, mut row) in inputs.outer_iter_mut().enumerate() {
            scratch.clear();
            scratch.resize(in_block, 0.0);
            let read = self.capture.read(channel, &mut scratch[..]);
            for (dst, src) in row.iter_mut().zip(&scratch[..read]) {
                *dst = *src;
            }
        }

        Ok(())
    }
}

enum State {
    Inactive {
        client: Client,
        inputs: Vec<Port<AudioIn>>,
        outputs: Vec<Port<AudioOut>>,
    },
    Active {
        client: AsyncClient<Notifications, Bridge>,
        streams: Streams,
    },
    Closed,
}

/// A JACK client driven one period at a time
pub struct JackBackend {
    state: State,
    name: String,
    shared: Arc<Shared>,
    ring_periods: usize,
    timeout: Duration,
    scratch: Vec<f32>,
}

impl JackBackend {
    /// Open a client on the running JACK server
    pub fn open(name: &str, config: &ClientConfig) -> Result<Self> {
        let options = if config.start_server {
            ClientOptions::empty()
        } else {
            ClientOptions::NO_START_SERVER
        };

        let (client, status) = Client::new(name, options)?;
        let assigned = client.name().to_string();
        log::info!("Opened JACK client {} (status {:?})", assigned, status);

        let buffer_size = client.buffer_size() as usize;
        let sample_rate = client.sample_rate() as usize;
        log::info!("JACK buffer size {} at {} Hz", buffer_size, sample_rate);

        Ok(Self {
            state: State::Inactive {
                client,
                inputs: Vec::new(),
                outputs: Vec::new(),
            },
            name: assigned,
            shared: Arc::new(Shared::new(buffer_size, sample_rate)),
            ring_periods: config.ring_periods.max(2),
            timeout: config.process_timeout(),
            scratch: Vec::with_capacity(buffer_size),
        })
    }

    /// Periods seen by the realtime thread since activation
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Acquire)
    }
}

fn check_rows(expected: usize, view_rows: usize, view_cols: usize) -> Result<()> {
    if expected != view_rows {
        return Err(JackedError::Shape {
            expected,
            samples: view_cols,
            found_channels: view_rows,
            found_samples: view_cols,
        });
    }
    Ok(())
}

/// Give the realtime thread a chance to play out what is still queued
fn wait_for_drain(playback: &ChannelProducers, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while playback.pending() > 0 && Instant::now() < deadline {
        std::thread::sleep(POLL_INTERVAL);
    }
    if playback.pending() > 0 {
        log::warn!("Closing with {} samples still queued", playback.pending());
    }
}

impl AudioBackend for JackBackend {
    fn client_name(&self) -> &str {
        &self.name
    }

    fn buffer_size(&self) -> usize {
        self.shared.buffer_size.load(Ordering::Acquire)
    }

    fn sample_rate(&self) -> usize {
        self.shared.sample_rate.load(Ordering::Acquire)
    }

    fn register_port(&mut self, name: &str, direction: PortDirection) -> Result<()> {
        match &mut self.state {
            State::Inactive {
                client,
                inputs,
                outputs,
            } => {
                match direction {
                    PortDirection::Input => {
                        inputs.push(client.register_port(name, AudioIn::default())?)
                    }
                    PortDirection::Output => {
                        outputs.push(client.register_port(name, AudioOut::default())?)
                    }
                }
                log::debug!("Registered {:?} port {}", direction, name);
                Ok(())
            }
            State::Active { .. } => Err(JackedError::Client(format!(
                "cannot register {} after activation",
                name
            ))),
            State::Closed => Err(JackedError::Closed),
        }
    }

    fn activate(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Inactive {
                client,
                inputs,
                outputs,
            } => {
                let (streams, captured, playback) = Streams::new(
                    inputs.len(),
                    outputs.len(),
                    self.buffer_size(),
                    self.ring_periods,
                );

                let bridge = Bridge {
                    inputs,
                    outputs,
                    captured,
                    playback,
                    shared: Arc::clone(&self.shared),
                };
                let notifications = Notifications {
                    shared: Arc::clone(&self.shared),
                };

                let client = client.activate_async(notifications, bridge)?;
                log::info!("Activated JACK client {}", self.name);

                self.state = State::Active { client, streams };
                Ok(())
            }
            active @ State::Active { .. } => {
                self.state = active;
                Ok(())
            }
            State::Closed => Err(JackedError::Closed),
        }
    }

    fn connect(&mut self, source: &str, destination: &str) -> Result<()> {
        match &self.state {
            State::Active { client, .. } => {
                client
                    .as_client()
                    .connect_ports_by_name(source, destination)?;
                log::info!("Connected {} -> {}", source, destination);
                Ok(())
            }
            State::Inactive { .. } => Err(JackedError::Client(
                "ports can only be connected on an active client".to_string(),
            )),
            State::Closed => Err(JackedError::Closed),
        }
    }

    fn flush(&mut self) -> Result<()> {
        let period = self.buffer_size();
        match &mut self.state {
            State::Active { streams, .. } => {
                streams.flush(period);
                Ok(())
            }
            State::Inactive { .. } => Ok(()),
            State::Closed => Err(JackedError::Closed),
        }
    }

    fn process(&mut self, outputs: ArrayView2<f32>, inputs: ArrayViewMut2<f32>) -> Result<()> {
        let period = self.buffer_size();
        let streams = match &mut self.state {
            State::Active { streams, .. } => streams,
            State::Inactive { .. } => {
                return Err(JackedError::Client("client is not active".to_string()))
            }
            State::Closed => return Err(JackedError::Closed),
        };

        let overruns = self.shared.overruns.swap(0, Ordering::Relaxed);
        if overruns > 0 {
            log::debug!("Dropped {} capture period(s) while idle", overruns);
        }

        streams.exchange(
            outputs,
            inputs,
            period,
            &self.shared.cycles,
            self.timeout,
            &mut self.scratch,
        )
    }

    fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Active { client, streams } => {
                wait_for_drain(&streams.playback, self.timeout);
                let (client, _, _) = client.deactivate()?;
                log::info!("Deactivated JACK client {}", client.name());
            }
            State::Inactive { client, .. } => {
                log::info!("Closing inactive JACK client {}", client.name());
            }
            State::Closed => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use std::sync::atomic::AtomicBool;

    const PERIOD: usize = 4;

    /// Bump `cycles` every millisecond until `f` returns
    fn with_ticker<T>(cycles: &AtomicU64, f: impl FnOnce() -> T) -> T {
        let done = AtomicBool::new(false);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    std::thread::sleep(Duration::from_millis(1));
                    cycles.fetch_add(1, Ordering::Release);
                }
            });
            let result = f();
            done.store(true, Ordering::Release);
            result
        })
    }

    #[test]
    fn test_exchange_moves_one_period() {
        let (mut streams, mut captured, mut playback) = Streams::new(2, 1, PERIOD, 4);
        let frames = [[1.0f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        assert!(push_capture(
            &mut captured,
            PERIOD,
            frames.iter().map(|f| &f[..])
        ));

        let outputs = array![[0.5f32, 0.25, 0.125, 0.0]];
        let mut inputs = Array2::<f32>::zeros((2, PERIOD));
        let cycles = AtomicU64::new(0);
        let mut scratch = Vec::new();

        streams
            .exchange(
                outputs.view(),
                inputs.view_mut(),
                PERIOD,
                &cycles,
                Duration::from_millis(50),
                &mut scratch,
            )
            .unwrap();

        assert_eq!(inputs, array![[1.0f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]);
        let mut out = [9.0; PERIOD];
        pull_playback(&mut playback, 0, &mut out);
        assert_eq!(out, [0.5, 0.25, 0.125, 0.0]);
    }

    #[test]
    fn test_exchange_times_out_without_cycles() {
        let (mut streams, _captured, _playback) = Streams::new(1, 1, PERIOD, 4);
        let cycles = AtomicU64::new(7);
        let mut inputs = Array2::<f32>::zeros((1, PERIOD));

        let err = streams
            .exchange(
                Array2::<f32>::zeros((1, PERIOD)).view(),
                inputs.view_mut(),
                PERIOD,
                &cycles,
                Duration::from_millis(20),
                &mut Vec::new(),
            )
            .unwrap_err();

        assert!(matches!(err, JackedError::Timeout(20)));
        assert!(!err.is_sync());
    }

    #[test]
    fn test_exchange_reports_input_sync_within_a_few_cycles() {
        let (mut streams, _captured, _playback) = Streams::new(1, 1, PERIOD, 4);
        let cycles = AtomicU64::new(0);
        let mut inputs = Array2::<f32>::zeros((1, PERIOD));
        let outputs = Array2::<f32>::zeros((1, PERIOD));

        let started = Instant::now();
        let result = with_ticker(&cycles, || {
            streams.exchange(
                outputs.view(),
                inputs.view_mut(),
                PERIOD,
                &cycles,
                Duration::from_secs(10),
                &mut Vec::new(),
            )
        });

        assert!(matches!(result, Err(JackedError::InputSync)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_exchange_reports_output_sync_when_playback_backs_up() {
        let periods = 2;
        let (mut streams, mut captured, _playback) = Streams::new(1, 1, PERIOD, periods);
        streams.playback.write(0, &[0.0; PERIOD * 2]);
        assert!(push_capture(&mut captured, PERIOD, [&[1.0f32; PERIOD][..]]));

        let cycles = AtomicU64::new(0);
        let mut inputs = Array2::<f32>::zeros((1, PERIOD));
        let outputs = Array2::<f32>::zeros((1, PERIOD));

        let result = with_ticker(&cycles, || {
            streams.exchange(
                outputs.view(),
                inputs.view_mut(),
                PERIOD,
                &cycles,
                Duration::from_secs(10),
                &mut Vec::new(),
            )
        });

        assert!(matches!(result, Err(JackedError::OutputSync)));
        // the captured period is left for the next call
        assert!(streams.input_ready(PERIOD));
    }

    #[test]
    fn test_exchange_rejects_wrong_channel_count() {
        let (mut streams, _captured, _playback) = Streams::new(2, 1, PERIOD, 4);
        let mut inputs = Array2::<f32>::zeros((1, PERIOD));

        let err = streams
            .exchange(
                Array2::<f32>::zeros((1, PERIOD)).view(),
                inputs.view_mut(),
                PERIOD,
                &AtomicU64::new(0),
                Duration::from_millis(10),
                &mut Vec::new(),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            JackedError::Shape {
                expected: 2,
                found_channels: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_flush_keeps_partial_period() {
        let (mut streams, mut captured, _playback) = Streams::new(2, 0, PERIOD, 4);
        captured.write(0, &[1.0; 10]);
        captured.write(1, &[2.0; 10]);

        streams.flush(PERIOD);
        assert_eq!(streams.capture.len(), 2);

        // nothing to drop once below a period
        streams.flush(PERIOD);
        assert_eq!(streams.capture.len(), 2);
    }

    #[test]
    fn test_rings_fit_a_grown_period() {
        let (streams, mut captured, _playback) = Streams::new(1, 1, 64, 2);
        assert!(captured.has_space(MAX_PERIOD));
        assert!(streams.playback.has_space(MAX_PERIOD));

        let samples = vec![0.0f32; 1024];
        assert!(push_capture(&mut captured, 1024, [&samples[..]]));
    }

    #[test]
    fn test_playback_queue_follows_current_period() {
        let (mut streams, _captured, _playback) = Streams::new(0, 1, 64, 2);
        streams.playback.write(0, &[0.0; 128]);

        assert!(!streams.output_ready(64, 64));
        // after the server grows its period the same backlog is fine
        assert!(streams.output_ready(256, 256));
    }

    #[test]
    fn test_push_capture_is_all_or_nothing() {
        let (mut captured, consumers) = ChannelRings::new(2, 6).split();
        let period = [[1.0f32; 4], [2.0; 4]];

        assert!(push_capture(&mut captured, 4, period.iter().map(|p| &p[..])));
        assert!(!push_capture(&mut captured, 4, period.iter().map(|p| &p[..])));
        assert_eq!(consumers.len(), 4);
    }

    #[test]
    fn test_pull_playback_zero_fills_underrun() {
        let (mut producers, mut consumers) = ChannelRings::new(1, 8).split();
        producers.write(0, &[0.5, -0.5]);

        let mut out = [9.0f32; 4];
        pull_playback(&mut consumers, 0, &mut out);
        assert_eq!(out, [0.5, -0.5, 0.0, 0.0]);

        pull_playback(&mut consumers, 0, &mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_shared_sample_rate_updates() {
        let shared = Shared::new(PERIOD, 48000);
        shared.sample_rate.store(44100, Ordering::Release);
        assert_eq!(shared.sample_rate.load(Ordering::Acquire), 44100);
    }
}
