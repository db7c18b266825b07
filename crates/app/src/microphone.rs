//! Default-input-device capture backend.

use std::sync::Arc;

use vibe_visualiser_core::{CaptureStream, DeviceError, MicrophoneSource, Result};

/// Samples kept for analysis; comfortably more than the largest FFT window
/// at common rates.
#[cfg(feature = "microphone")]
const RING_CAPACITY: usize = 1 << 15;

/// Returns the platform microphone source, or one that always reports the
/// device as unavailable when built without the `microphone` feature.
pub fn default_source() -> Arc<dyn MicrophoneSource> {
    #[cfg(feature = "microphone")]
    {
        Arc::new(cpal_backend::CpalMicrophone)
    }
    #[cfg(not(feature = "microphone"))]
    {
        Arc::new(NoMicrophone)
    }
}

/// Names of the input devices the host can see.
pub fn list_devices() -> Result<Vec<String>> {
    #[cfg(feature = "microphone")]
    {
        cpal_backend::input_device_names()
    }
    #[cfg(not(feature = "microphone"))]
    {
        Ok(Vec::new())
    }
}

#[cfg_attr(feature = "microphone", allow(dead_code))]
struct NoMicrophone;

impl MicrophoneSource for NoMicrophone {
    fn request_microphone(&self) -> Result<Box<dyn CaptureStream>> {
        Err(DeviceError::Unavailable("built without microphone support".into()).into())
    }
}

#[cfg(feature = "microphone")]
mod cpal_backend {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread,
    };

    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        FromSample, SampleFormat, SizedSample, StreamConfig,
    };
    use crossbeam_channel::{Receiver, Sender};
    use vibe_visualiser_core::{
        CaptureStream, DeviceError, MicrophoneSource, Result, SampleRing, VibeError,
    };

    use super::RING_CAPACITY;

    pub struct CpalMicrophone;

    impl MicrophoneSource for CpalMicrophone {
        fn request_microphone(&self) -> Result<Box<dyn CaptureStream>> {
            let ring = SampleRing::with_capacity(RING_CAPACITY);
            let live = Arc::new(AtomicBool::new(true));
            let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
            let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

            // cpal streams are not `Send` on every host, so one thread owns
            // the stream for its whole life.
            let thread_ring = ring.clone();
            let thread_live = Arc::clone(&live);
            thread::Builder::new()
                .name("microphone-stream".into())
                .spawn(move || run_stream(thread_ring, thread_live, ready_tx, stop_rx))
                .map_err(|err| DeviceError::Unavailable(format!("cannot spawn stream thread: {err}")))?;

            let sample_rate = ready_rx.recv().map_err(|_| {
                DeviceError::Unavailable("stream thread exited before reporting".into())
            })??;

            Ok(Box::new(CpalStream {
                ring,
                sample_rate,
                live,
                _stop: stop_tx,
            }))
        }
    }

    /// Handle to the running stream. Dropping it disconnects `_stop`, which
    /// ends the owning thread and closes the device.
    struct CpalStream {
        ring: SampleRing,
        sample_rate: u32,
        live: Arc<AtomicBool>,
        _stop: Sender<()>,
    }

    impl CaptureStream for CpalStream {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn read_latest(&self, out: &mut [f32]) -> bool {
            self.ring.read_latest(out)
        }

        fn is_live(&self) -> bool {
            self.live.load(Ordering::Acquire)
        }
    }

    fn run_stream(
        ring: SampleRing,
        live: Arc<AtomicBool>,
        ready: Sender<std::result::Result<u32, DeviceError>>,
        stop: Receiver<()>,
    ) {
        let stream = match open_stream(ring, Arc::clone(&live)) {
            Ok((stream, sample_rate)) => {
                let _ = ready.send(Ok(sample_rate));
                stream
            }
            Err(err) => {
                tracing::warn!(%err, "microphone unavailable");
                let _ = ready.send(Err(err));
                return;
            }
        };

        // Blocks until the handle is dropped.
        let _ = stop.recv();
        drop(stream);
        live.store(false, Ordering::Release);
        tracing::info!("microphone stream closed");
    }

    fn open_stream(
        ring: SampleRing,
        live: Arc<AtomicBool>,
    ) -> std::result::Result<(cpal::Stream, u32), DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| DeviceError::Unavailable("no default input device".into()))?;
        let supported = device.default_input_config().map_err(classify)?;
        let format = supported.sample_format();
        let config: StreamConfig = supported.config();
        let sample_rate = config.sample_rate.0;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            ?format,
            "opening microphone"
        );

        let stream = match format {
            SampleFormat::F32 => build::<f32>(&device, &config, ring, live),
            SampleFormat::I16 => build::<i16>(&device, &config, ring, live),
            SampleFormat::U16 => build::<u16>(&device, &config, ring, live),
            other => {
                return Err(DeviceError::Unavailable(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }?;
        stream.play().map_err(classify)?;
        Ok((stream, sample_rate))
    }

    fn build<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        ring: SampleRing,
        live: Arc<AtomicBool>,
    ) -> std::result::Result<cpal::Stream, DeviceError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = usize::from(config.channels.max(1));
        let mut mono = Vec::new();
        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    mono.clear();
                    mono.extend(data.chunks(channels).map(|frame| {
                        frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>()
                            / frame.len() as f32
                    }));
                    ring.push(&mono);
                },
                move |err| {
                    tracing::warn!(%err, "microphone stream error");
                    live.store(false, Ordering::Release);
                },
                None,
            )
            .map_err(classify)
    }

    /// Maps backend errors onto the two user-facing failure kinds.
    fn classify(err: impl std::fmt::Display) -> DeviceError {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("permission") || lowered.contains("denied") {
            DeviceError::PermissionDenied(message)
        } else {
            DeviceError::Unavailable(message)
        }
    }

    pub fn input_device_names() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|err| VibeError::Device(classify(err)))?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn permission_errors_are_told_apart() {
            assert!(matches!(
                classify("Permission denied by the OS"),
                DeviceError::PermissionDenied(_)
            ));
            assert!(matches!(
                classify("device busy"),
                DeviceError::Unavailable(_)
            ));
        }
    }
}
