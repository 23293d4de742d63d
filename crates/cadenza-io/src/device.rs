//! Output devices that drive a graph's render callback.
//!
//! An [`OutputDevice`] owns the platform side of live playback: it reports its
//! native format and, when started, invokes a [`RenderCallback`] on its own
//! thread for every hardware buffer. The returned [`StreamHandle`] keeps the
//! stream alive; dropping it stops playback.
//!
//! - [`CpalDevice`] wraps a [cpal](https://crates.io/crates/cpal) output device
//! - [`ManualDevice`] never spawns a thread; the caller pumps buffers through
//!   it, which makes live rendering deterministic and lets offline renders run
//!   without audio hardware

use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex, PoisonError};

/// Render callback invoked on the device thread.
///
/// Receives interleaved `f32` samples, `frames * channels` long, to fill.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// Type-erased stream handle. Playback stops when it is dropped.
pub struct StreamHandle {
    _inner: Box<dyn Send>,
}

impl StreamHandle {
    /// Wraps a backend-specific stream object, keeping it alive until drop.
    pub fn new<T: Send + 'static>(stream: T) -> Self {
        Self {
            _inner: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// An audio output the graph can render into in real time.
pub trait OutputDevice: Send {
    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Native sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of interleaved output channels.
    fn channels(&self) -> u16;

    /// Starts streaming with buffers of `buffer_frames` frames.
    fn start(&mut self, buffer_frames: u32, callback: RenderCallback) -> Result<StreamHandle>;
}

/// Output device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Default channel count.
    pub channels: u16,
    /// Whether this is the host's default output.
    pub is_default: bool,
}

/// Extract device name via `description()` (cpal 0.17+).
fn device_name(device: &cpal::Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// List output devices of the default host.
pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| device_name(&d).ok());

    let mut devices = Vec::new();
    let outputs = host
        .output_devices()
        .map_err(|e| Error::Stream(e.to_string()))?;
    for device in outputs {
        let Ok(name) = device_name(&device) else {
            continue;
        };
        let Ok(config) = device.default_output_config() else {
            continue;
        };
        devices.push(DeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            default_sample_rate: config.sample_rate(),
            channels: config.channels(),
        });
    }
    Ok(devices)
}

/// A cpal output device.
pub struct CpalDevice {
    device: cpal::Device,
    name: String,
    sample_rate: u32,
    channels: u16,
    supported_buffer: cpal::SupportedBufferSize,
}

impl std::fmt::Debug for CpalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalDevice")
            .field("name", &self.name)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

impl CpalDevice {
    /// Opens an output device by index into [`list_output_devices`] or by
    /// name (exact, then case-insensitive substring), or the host default
    /// when `search` is `None`.
    pub fn open(search: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match search {
            Some(search) => {
                let mut candidates: Vec<(cpal::Device, String)> = host
                    .output_devices()
                    .map_err(|e| Error::Stream(e.to_string()))?
                    .filter(|d| d.default_output_config().is_ok())
                    .filter_map(|d| device_name(&d).ok().map(|name| (d, name)))
                    .collect();
                let index = if let Ok(index) = search.parse::<usize>() {
                    (index < candidates.len()).then_some(index)
                } else {
                    let search_lower = search.to_lowercase();
                    candidates
                        .iter()
                        .position(|(_, name)| name == search)
                        .or_else(|| {
                            candidates.iter().position(|(_, name)| {
                                name.to_lowercase().contains(search_lower.as_str())
                            })
                        })
                };
                let found = index.map(|i| candidates.swap_remove(i).0);
                found.ok_or_else(|| {
                    Error::DeviceNotFound(format!("no output device matching '{search}'"))
                })?
            }
            None => host.default_output_device().ok_or(Error::NoDevice)?,
        };

        let config = device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        let name = device_name(&device).unwrap_or_else(|_| "unknown".to_string());
        tracing::info!(
            host = host.id().name(),
            device = %name,
            sample_rate = config.sample_rate(),
            channels = config.channels(),
            "opened output device"
        );
        Ok(Self {
            device,
            name,
            sample_rate: config.sample_rate(),
            channels: config.channels(),
            supported_buffer: config.buffer_size().clone(),
        })
    }

    fn build_stream(
        &self,
        buffer_size: cpal::BufferSize,
        callback: &Arc<Mutex<RenderCallback>>,
    ) -> std::result::Result<cpal::Stream, cpal::BuildStreamError> {
        let stream_config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: self.sample_rate,
            buffer_size,
        };

        let callback = Arc::clone(callback);
        let name = self.name.clone();
        self.device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut guard = callback.lock().unwrap_or_else(PoisonError::into_inner);
                let render = &mut *guard;
                render(data);
            },
            move |err| {
                tracing::warn!(device = %name, error = %err, "output stream error");
            },
            None,
        )
    }
}

/// Buffer size to request for `frames` given the range the device reports.
///
/// Falls back to the device default when `frames` lies outside that range.
fn buffer_size_for(frames: u32, supported: &cpal::SupportedBufferSize) -> cpal::BufferSize {
    match *supported {
        cpal::SupportedBufferSize::Range { min, max } if !(min..=max).contains(&frames) => {
            tracing::warn!(
                frames,
                min,
                max,
                "device does not support buffer size; using its default"
            );
            cpal::BufferSize::Default
        }
        _ => cpal::BufferSize::Fixed(frames),
    }
}

/// Whether a stream rejected with `err` may open with the default buffer size.
fn retry_with_default(requested: cpal::BufferSize, err: &cpal::BuildStreamError) -> bool {
    matches!(requested, cpal::BufferSize::Fixed(_))
        && matches!(
            err,
            cpal::BuildStreamError::StreamConfigNotSupported
                | cpal::BuildStreamError::InvalidArgument
                | cpal::BuildStreamError::BackendSpecific { .. }
        )
}

impl OutputDevice for CpalDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn start(&mut self, buffer_frames: u32, callback: RenderCallback) -> Result<StreamHandle> {
        let callback = Arc::new(Mutex::new(callback));
        let requested = buffer_size_for(buffer_frames, &self.supported_buffer);
        let stream = match self.build_stream(requested, &callback) {
            Err(err) if retry_with_default(requested, &err) => {
                tracing::warn!(
                    device = %self.name,
                    buffer_frames,
                    error = %err,
                    "fixed buffer size rejected; retrying with device default"
                );
                self.build_stream(cpal::BufferSize::Default, &callback)
            }
            built => built,
        }
        .map_err(|e| Error::Stream(e.to_string()))?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            channels = self.channels,
            sample_rate = self.sample_rate,
            buffer_frames,
            "output stream started"
        );
        Ok(StreamHandle::new(stream))
    }
}

type SharedCallback = Arc<Mutex<Option<RenderCallback>>>;

/// Dropping the handle detaches the callback.
struct ManualStream {
    callback: SharedCallback,
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// A device driven by explicit [`pump`](ManualDevice::pump) calls.
///
/// Clones share the attached callback, so a caller can keep one clone while
/// the graph owns another.
#[derive(Clone)]
pub struct ManualDevice {
    callback: SharedCallback,
    sample_rate: u32,
    channels: u16,
}

impl std::fmt::Debug for ManualDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualDevice")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("streaming", &self.is_streaming())
            .finish()
    }
}

impl ManualDevice {
    /// A device reporting `sample_rate` and `channels`.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            callback: Arc::new(Mutex::new(None)),
            sample_rate,
            channels,
        }
    }

    /// Returns `true` while a stream is attached.
    pub fn is_streaming(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Runs the render callback for one buffer of `frames` frames.
    ///
    /// Returns the interleaved samples, or `None` when no stream is attached.
    pub fn pump(&self, frames: usize) -> Option<Vec<f32>> {
        let mut guard = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let callback = guard.as_mut()?;
        let mut buffer = vec![0.0; frames * usize::from(self.channels)];
        callback(&mut buffer);
        Some(buffer)
    }
}

impl OutputDevice for ManualDevice {
    fn name(&self) -> &str {
        "manual"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn start(&mut self, buffer_frames: u32, callback: RenderCallback) -> Result<StreamHandle> {
        let mut slot = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(Error::Stream("manual device already streaming".into()));
        }
        *slot = Some(callback);
        tracing::debug!(buffer_frames, "manual stream attached");
        Ok(StreamHandle::new(ManualStream {
            callback: Arc::clone(&self.callback),
        }))
    }
}
