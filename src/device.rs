//! CPAL device discovery and playback.
//!
//! [`CpalDevice`] finds an output device and plays the interleaved ring a
//! [`DaspBackend`](crate::backend::dasp::DaspBackend) renders into.
//!
//! # Example
//!
//! ```no_run
//! use patchbay::CpalDevice;
//! use patchbay::backend::dasp::DaspBackend;
//!
//! for device in CpalDevice::list_outputs() {
//!     println!("{} ({} Hz, {} ch)", device.name(), device.sample_rate(), device.channels());
//! }
//!
//! if let Some(device) = CpalDevice::default_output() {
//!     let mut backend = DaspBackend::new(device.config());
//!     let output = backend.take_output();
//!     // with the `cpal_sink` feature: let playback = device.play(output.unwrap());
//! #   drop(output);
//! }
//! ```

#[cfg(feature = "cpal_sink")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "cpal_sink")]
use std::sync::Arc;

#[cfg(feature = "cpal_sink")]
use cpal::traits::{DeviceTrait, HostTrait};

use crate::backend::dasp::DaspConfig;

/// A discovered audio output device.
pub struct CpalDevice {
    #[cfg(feature = "cpal_sink")]
    device: cpal::Device,
    #[cfg(feature = "cpal_sink")]
    config: cpal::SupportedStreamConfig,

    name: String,
    sample_rate: u32,
    channels: u16,
}

impl CpalDevice {
    /// The system's default output device, if there is one.
    #[cfg(feature = "cpal_sink")]
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        Self::from_device(device)
    }

    #[cfg(not(feature = "cpal_sink"))]
    pub fn default_output() -> Option<Self> {
        None
    }

    /// Every output device that reports a default config.
    #[cfg(feature = "cpal_sink")]
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::from_device).collect())
            .unwrap_or_default()
    }

    #[cfg(not(feature = "cpal_sink"))]
    pub fn list_outputs() -> Vec<Self> {
        Vec::new()
    }

    #[cfg(feature = "cpal_sink")]
    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Backend settings matching this device.
    pub fn config(&self) -> DaspConfig {
        DaspConfig::new(self.sample_rate).with_channels(self.channels as usize)
    }

    /// Play interleaved samples from `consumer` on a dedicated thread.
    /// Underruns are filled with silence. The stream runs until the
    /// returned [`Playback`] is dropped.
    #[cfg(feature = "cpal_sink")]
    #[must_use = "playback stops when the handle is dropped"]
    pub fn play(&self, consumer: rtrb::Consumer<f32>) -> Playback {
        let device = self.device.clone();
        let sample_format = self.config.sample_format();
        let stream_config = self.config.config();
        let name = self.name.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = stop.clone();

        let thread = std::thread::spawn(move || {
            use cpal::traits::StreamTrait;

            let stream = match stream::build(&device, sample_format, &stream_config, consumer) {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::error!(device = %name, %err, "failed to build output stream");
                    return;
                }
            };
            if let Err(err) = stream.play() {
                tracing::error!(device = %name, %err, "failed to start output stream");
                return;
            }
            tracing::debug!(device = %name, "output stream running");

            // the stream lives as long as this thread
            while !stopped.load(Ordering::Acquire) {
                std::thread::park();
            }
            drop(stream);
            tracing::debug!(device = %name, "output stream closed");
        });

        Playback {
            stop,
            thread: Some(thread),
        }
    }
}

/// A running output stream. Dropping it closes the stream.
#[cfg(feature = "cpal_sink")]
pub struct Playback {
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(feature = "cpal_sink")]
impl Playback {
    /// Whether the stream thread is still alive. It exits early if the
    /// stream could not be built or started.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map_or(false, |thread| !thread.is_finished())
    }
}

#[cfg(feature = "cpal_sink")]
impl Drop for Playback {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                tracing::warn!("output stream thread panicked");
            }
        }
    }
}

#[cfg(feature = "cpal_sink")]
mod stream {
    use cpal::traits::DeviceTrait;
    use cpal::{BuildStreamError, SampleFormat, SizedSample, Stream, StreamConfig};
    use rtrb::Consumer;

    pub(super) fn build(
        device: &cpal::Device,
        sample_format: SampleFormat,
        config: &StreamConfig,
        consumer: Consumer<f32>,
    ) -> Result<Stream, BuildStreamError> {
        match sample_format {
            SampleFormat::F32 => build_typed::<f32>(device, config, consumer, |s| s),
            SampleFormat::I16 => build_typed::<i16>(device, config, consumer, |s| {
                (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            }),
            SampleFormat::U16 => build_typed::<u16>(device, config, consumer, |s| {
                ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16
            }),
            _ => Err(BuildStreamError::StreamConfigNotSupported),
        }
    }

    fn build_typed<T: SizedSample>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut consumer: Consumer<f32>,
        convert: fn(f32) -> T,
    ) -> Result<Stream, BuildStreamError> {
        device.build_output_stream(
            config,
            move |data: &mut [T], _| {
                for sample in data.iter_mut() {
                    *sample = convert(consumer.pop().unwrap_or(0.0));
                }
            },
            |err| tracing::error!(%err, "output stream error"),
            None,
        )
    }
}
