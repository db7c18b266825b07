use std::{
    fmt,
    sync::{Arc, Mutex, TryLockError},
    thread,
};

use crossbeam_channel::{Receiver, Sender};

use crate::{DeviceError, FeatureExtractor, Result};

/// Capture collaborator: hands out exclusive microphone streams.
///
/// `request_microphone` may block on a permission prompt or device
/// enumeration; [`CaptureController`] always calls it off the render thread.
pub trait MicrophoneSource: Send + Sync + 'static {
    fn request_microphone(&self) -> Result<Box<dyn CaptureStream>>;
}

/// A live mono input stream. Dropping it releases the device.
pub trait CaptureStream: Send {
    fn sample_rate(&self) -> u32;

    /// Copies the most recent `out.len()` samples into `out`, oldest first.
    /// Must not block: returns `false` when the data is momentarily
    /// unavailable.
    fn read_latest(&self, out: &mut [f32]) -> bool;

    /// `false` once the underlying device stream has stopped delivering.
    fn is_live(&self) -> bool;
}

/// Shared ring of the latest mono samples, written by the audio callback and
/// read by the render tick.
#[derive(Clone)]
pub struct SampleRing {
    shared: Arc<Mutex<RingBuffer>>,
}

struct RingBuffer {
    samples: Vec<f32>,
    write_pos: usize,
}

impl SampleRing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(RingBuffer {
                samples: vec![0.0; capacity.max(1)],
                write_pos: 0,
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        match self.shared.lock() {
            Ok(ring) => ring.samples.len(),
            Err(poisoned) => poisoned.into_inner().samples.len(),
        }
    }

    /// Appends samples, overwriting the oldest ones.
    ///
    /// Called from the audio callback. The only other lock holder is
    /// [`SampleRing::read_latest`], which never waits and holds the lock for
    /// one window copy, so the writer blocks for at most that long and never
    /// drops samples.
    pub fn push(&self, samples: &[f32]) {
        let mut ring = match self.shared.lock() {
            Ok(ring) => ring,
            Err(poisoned) => poisoned.into_inner(),
        };
        let len = ring.samples.len();
        for &sample in samples {
            let pos = ring.write_pos;
            ring.samples[pos] = sample;
            ring.write_pos = (pos + 1) % len;
        }
    }

    /// Copies the latest samples into `out`. Requests longer than the ring
    /// are left-padded with silence. Returns `false` if the writer currently
    /// holds the lock.
    pub fn read_latest(&self, out: &mut [f32]) -> bool {
        let ring = match self.shared.try_lock() {
            Ok(ring) => ring,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        let len = ring.samples.len();
        let available = out.len().min(len);
        let pad = out.len() - available;
        out[..pad].iter_mut().for_each(|sample| *sample = 0.0);
        let start = (ring.write_pos + len - available) % len;
        for (offset, slot) in out[pad..].iter_mut().enumerate() {
            *slot = ring.samples[(start + offset) % len];
        }
        true
    }
}

impl fmt::Debug for SampleRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleRing")
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Lifecycle of the microphone binding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
    Error(DeviceError),
}

impl CaptureState {
    pub fn is_active(&self) -> bool {
        matches!(self, CaptureState::Active)
    }

    /// Pure transition table. Events that make no sense in the current state
    /// leave it unchanged, which is what makes start/stop idempotent.
    pub fn on(&self, event: &CaptureEvent) -> CaptureState {
        use CaptureEvent as E;
        use CaptureState as S;

        match (self, event) {
            (S::Idle | S::Error(_), E::StartRequested) => S::Starting,
            (S::Starting, E::Granted) => S::Active,
            (S::Starting, E::Failed(err)) => S::Error(err.clone()),
            (S::Starting | S::Active, E::StopRequested) => S::Stopping,
            (S::Stopping, E::Released) => S::Idle,
            (S::Active, E::Ended) => S::Error(DeviceError::Unavailable(
                "input stream ended".to_string(),
            )),
            (state, _) => state.clone(),
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => f.write_str("idle"),
            CaptureState::Starting => f.write_str("starting"),
            CaptureState::Active => f.write_str("active"),
            CaptureState::Stopping => f.write_str("stopping"),
            CaptureState::Error(err) => write!(f, "error ({err})"),
        }
    }
}

/// Collaborator and user events driving [`CaptureState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    StartRequested,
    Granted,
    Failed(DeviceError),
    StopRequested,
    Released,
    Ended,
}

type Acquisition = Result<Box<dyn CaptureStream>>;

/// Drives the capture state machine. Acquisition runs on a worker thread and
/// its outcome is picked up by [`CaptureController::poll`] on the render
/// thread, so ticks keep flowing while a request is pending.
pub struct CaptureController {
    source: Arc<dyn MicrophoneSource>,
    state: CaptureState,
    results_tx: Sender<Acquisition>,
    results_rx: Receiver<Acquisition>,
}

impl CaptureController {
    pub fn new(source: Arc<dyn MicrophoneSource>) -> Self {
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        Self {
            source,
            state: CaptureState::Idle,
            results_tx,
            results_rx,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Asks the source for a microphone. No-op unless idle or in error.
    pub fn request_start(&mut self) {
        if !self.apply(CaptureEvent::StartRequested) {
            tracing::debug!(state = %self.state, "start ignored");
            return;
        }

        let source = Arc::clone(&self.source);
        let results = self.results_tx.clone();
        let spawned = thread::Builder::new()
            .name("microphone-request".into())
            .spawn(move || {
                let _ = results.send(source.request_microphone());
            });

        if let Err(err) = spawned {
            self.apply(CaptureEvent::Failed(DeviceError::Unavailable(format!(
                "could not spawn capture request: {err}"
            ))));
        }
    }

    /// Releases the microphone. Safe to call in any state; a stream granted
    /// after this call is dropped as soon as it arrives.
    pub fn request_stop(&mut self, extractor: &mut FeatureExtractor) {
        let was_active = self.state.is_active();
        if !self.apply(CaptureEvent::StopRequested) {
            return;
        }
        if was_active {
            extractor.stop();
            self.apply(CaptureEvent::Released);
        }
    }

    /// Picks up finished acquisitions and dead streams. Call once per tick.
    pub fn poll(&mut self, extractor: &mut FeatureExtractor) {
        while let Ok(result) = self.results_rx.try_recv() {
            let state = self.state.clone();
            match (result, state) {
                (Ok(stream), CaptureState::Starting) => match extractor.start(stream) {
                    Ok(()) => {
                        self.apply(CaptureEvent::Granted);
                    }
                    Err(crate::VibeError::Device(err)) => {
                        self.apply(CaptureEvent::Failed(err));
                    }
                    Err(err) => {
                        self.apply(CaptureEvent::Failed(DeviceError::Unavailable(err.to_string())));
                    }
                },
                (Ok(stream), CaptureState::Stopping) => {
                    drop(stream);
                    self.apply(CaptureEvent::Released);
                }
                (Ok(stream), _) => drop(stream),
                (Err(err), _) => {
                    let err = match err {
                        crate::VibeError::Device(err) => err,
                        other => DeviceError::Unavailable(other.to_string()),
                    };
                    tracing::warn!(%err, "microphone request failed");
                    if !self.apply(CaptureEvent::Failed(err)) {
                        self.apply(CaptureEvent::Released);
                    }
                }
            }
        }

        if self.state.is_active() && extractor.stream_ended() {
            extractor.stop();
            self.apply(CaptureEvent::Ended);
            tracing::warn!("capture stream ended");
        }
    }

    fn apply(&mut self, event: CaptureEvent) -> bool {
        let next = self.state.on(&event);
        if next == self.state {
            return false;
        }
        tracing::info!(from = %self.state, to = %next, ?event, "capture state changed");
        self.state = next;
        true
    }
}

impl fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureController")
            .field("state", &self.state)
            .finish()
    }
}
