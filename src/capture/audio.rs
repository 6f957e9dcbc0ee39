//! cpal-backed capture host.
//!
//! Opens the configured input device, captures its native stream as mono
//! 16-bit PCM, and finalizes the samples into the negotiated format. Access
//! failures (no device, device busy, stream refused by the OS) are reported as
//! permission errors so the widget can tell the user to check microphone
//! access.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

use super::encoder;
use super::ffmpeg::{find_ffmpeg, probe_audio_encoders};
use super::format::EncodingFormat;
use super::host::{ActiveCapture, CaptureError, CaptureHost};
use crate::config::AudioConfig;

type SampleBuffer = Arc<Mutex<Vec<i16>>>;

/// Capture host for the system's audio input devices.
pub struct CpalHost {
    /// Device name, index, or "default"
    device_name: String,
    /// Requested sample rate; the device rate wins when they differ
    sample_rate: u32,
    /// Reference level in dBFS for a 100% level reading
    reference_level_db: i8,
    /// ffmpeg binary, if one was found
    ffmpeg: Option<PathBuf>,
    /// Audio encoders the ffmpeg binary reports
    encoders: HashSet<String>,
}

impl CpalHost {
    /// Creates a host for the configured device and probes ffmpeg once.
    pub fn new(config: &AudioConfig) -> Self {
        let (ffmpeg, encoders) = match find_ffmpeg() {
            Ok(path) => match probe_audio_encoders(&path) {
                Ok(encoders) => (Some(path), encoders),
                Err(e) => {
                    tracing::warn!("Failed to list ffmpeg encoders: {}", e);
                    (Some(path), HashSet::new())
                }
            },
            Err(e) => {
                tracing::warn!("{}", e);
                (None, HashSet::new())
            }
        };

        tracing::debug!(
            "Capture host ready: device={}, ffmpeg={:?}, encoders={:?}",
            config.device,
            ffmpeg,
            encoders
        );

        Self {
            device_name: config.device.clone(),
            sample_rate: config.sample_rate,
            reference_level_db: config.reference_level_db,
            ffmpeg,
            encoders,
        }
    }

    fn open_device(&self) -> Result<cpal::Device> {
        suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if self.device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, &self.device_name)
            }
        })
    }
}

impl CaptureHost for CpalHost {
    type Capture = CpalCapture;

    fn request_capture(&mut self) -> Result<CpalCapture, CaptureError> {
        let device = self
            .open_device()
            .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Recording device: {}", device_name);

        let device_config = device
            .default_input_config()
            .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?;
        let device_sample_rate = device_config.sample_rate().0;
        let channels = device_config.channels() as usize;

        if device_sample_rate != self.sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
                self.sample_rate,
                device_sample_rate
            );
        }

        let samples: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        let sample_format = device_config.sample_format();
        let stream_config: cpal::StreamConfig = device_config.into();

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, &samples, channels)
            }
            cpal::SampleFormat::I32 => {
                build_stream::<i32>(&device, &stream_config, &samples, channels)
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, &samples, channels)
            }
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, &samples, channels)
            }
            other => {
                return Err(CaptureError::PermissionDenied(format!(
                    "sample format not supported: {other:?}"
                )))
            }
        }
        .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?;

        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            device_sample_rate,
            channels,
            sample_format
        );

        Ok(CpalCapture {
            stream: Some(stream),
            samples,
            sample_rate: device_sample_rate,
            reference_level_db: self.reference_level_db,
            format: EncodingFormat::Wav,
            ffmpeg: self.ffmpeg.clone(),
        })
    }

    fn supports(&self, format: EncodingFormat) -> bool {
        match format.ffmpeg_encoder() {
            None => true,
            Some(encoder) => self.ffmpeg.is_some() && self.encoders.contains(encoder),
        }
    }
}

/// A live cpal input stream collecting mono samples.
pub struct CpalCapture {
    /// Input stream, dropped to stop capturing
    stream: Option<cpal::Stream>,
    /// Recorded audio samples (i16 PCM mono)
    samples: SampleBuffer,
    /// Actual device sample rate
    sample_rate: u32,
    reference_level_db: i8,
    /// Format chosen at `begin`
    format: EncodingFormat,
    ffmpeg: Option<PathBuf>,
}

impl CpalCapture {
    fn samples(&self) -> MutexGuard<'_, Vec<i16>> {
        lock_samples(&self.samples)
    }
}

impl ActiveCapture for CpalCapture {
    fn begin(&mut self, format: EncodingFormat) -> Result<(), CaptureError> {
        self.format = format;
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| CaptureError::PermissionDenied("stream already closed".to_string()))?;
        stream
            .play()
            .map_err(|e| CaptureError::PermissionDenied(e.to_string()))?;
        tracing::debug!("Audio stream started, encoding as {}", format);
        Ok(())
    }

    fn finalize(mut self) -> Result<Vec<u8>, CaptureError> {
        // Dropping the stream stops the callback and releases the device.
        self.stream = None;

        let samples = std::mem::take(&mut *self.samples());
        if samples.is_empty() {
            tracing::warn!("Recording stopped with no samples captured");
            return Ok(Vec::new());
        }

        let duration_secs = samples.len() as f32 / self.sample_rate as f32;
        tracing::info!(
            "Recording stopped: {:.2}s ({} samples at {}Hz)",
            duration_secs,
            samples.len(),
            self.sample_rate
        );

        encoder::encode(&samples, self.sample_rate, self.format, self.ffmpeg.as_deref())
            .map_err(|e| CaptureError::Finalize(e.to_string()))
    }

    fn level(&self) -> u8 {
        let samples = self.samples();
        let window = (self.sample_rate / 20) as usize;
        let recent = &samples[samples.len().saturating_sub(window)..];
        level_percent(recent, self.reference_level_db)
    }
}

/// Converts the RMS of `samples` to a 0-100 reading relative to
/// `reference_level_db`, spanning the 40 dB below it.
pub fn level_percent(samples: &[i16], reference_level_db: i8) -> u8 {
    if samples.is_empty() {
        return 0;
    }

    let sum_of_squares: i64 = samples.iter().map(|&x| (x as i64).pow(2)).sum();
    let mean_square = sum_of_squares / samples.len() as i64;
    let rms = (mean_square as f32).sqrt();

    let db_fs = if rms > 0.0 {
        20.0 * (rms / 32767.0).log10()
    } else {
        -160.0
    };

    let min_db = reference_level_db as f32 - 40.0;
    ((db_fs - min_db) / 40.0 * 100.0).clamp(0.0, 100.0) as u8
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: &SampleBuffer,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let samples = Arc::clone(samples);
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            push_mono(data, &samples, channels);
        },
        |err| {
            tracing::error!("Audio stream error: {}", err);
        },
        None,
    )
}

/// Appends `data` to the buffer, averaging interleaved channels to mono.
fn push_mono<T>(data: &[T], samples: &SampleBuffer, channels: usize)
where
    T: Sample,
    i16: FromSample<T>,
{
    let mut samples = lock_samples(samples);
    if channels <= 1 {
        samples.extend(data.iter().map(|&s| i16::from_sample(s)));
        return;
    }
    for frame in data.chunks_exact(channels) {
        let sum: i32 = frame.iter().map(|&s| i16::from_sample(s) as i32).sum();
        samples.push((sum / channels as i32) as i16);
    }
}

fn lock_samples(samples: &SampleBuffer) -> MutexGuard<'_, Vec<i16>> {
    samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Input devices that report a name, in host order. `vmsg list-devices`
/// numbers devices by their position in this list.
pub(crate) fn named_input_devices(host: &cpal::Host) -> Result<Vec<(String, cpal::Device)>> {
    Ok(host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?
        .filter_map(|device| device.name().ok().map(|name| (name, device)))
        .collect())
}

/// Finds an input device by numeric index or exact name.
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    select_device(named_input_devices(host)?, device_spec)
}

fn select_device<D>(devices: Vec<(String, D)>, device_spec: &str) -> Result<D> {
    if let Ok(index) = device_spec.parse::<usize>() {
        let count = devices.len();
        return devices
            .into_iter()
            .nth(index)
            .map(|(_, device)| device)
            .ok_or_else(|| {
                anyhow!(
                    "Device index {} is out of range (0-{})",
                    index,
                    count.saturating_sub(1)
                )
            });
    }

    devices
        .into_iter()
        .find(|(name, _)| name == device_spec)
        .map(|(_, device)| device)
        .ok_or_else(|| {
            anyhow!(
                "Audio input device '{device_spec}' not found. Use 'vmsg list-devices' to see available devices."
            )
        })
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// No ALSA outside Linux, nothing to suppress.
#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(names: &[&str]) -> Vec<(String, usize)> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect()
    }

    #[test]
    fn test_select_device_by_index_and_name() {
        let devices = named(&["Built-in Microphone", "USB Headset"]);
        assert_eq!(select_device(devices.clone(), "1").unwrap(), 1);
        assert_eq!(select_device(devices.clone(), "USB Headset").unwrap(), 1);
        assert!(select_device(devices.clone(), "2").is_err());
        assert!(select_device(devices, "Missing").is_err());
    }

    #[test]
    fn test_index_counts_only_listed_devices() {
        // Host order was [A, <unnamed>, C]; the unnamed device is not listed,
        // so index 1 is C, as `list-devices` shows it.
        let listed = vec![("A".to_string(), 'a'), ("C".to_string(), 'c')];
        assert_eq!(select_device(listed, "1").unwrap(), 'c');
    }

    #[test]
    fn test_level_of_silence_is_zero() {
        assert_eq!(level_percent(&[], -20), 0);
        assert_eq!(level_percent(&[0; 800], -20), 0);
    }

    #[test]
    fn test_level_of_full_scale_is_full() {
        assert_eq!(level_percent(&[i16::MAX; 800], -20), 100);
    }

    #[test]
    fn test_stereo_is_averaged_to_mono() {
        let buffer: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        push_mono(&[100i16, 300, -50, 50], &buffer, 2);
        assert_eq!(*lock_samples(&buffer), vec![200, 0]);
    }

    #[test]
    fn test_float_samples_are_converted() {
        let buffer: SampleBuffer = Arc::new(Mutex::new(Vec::new()));
        push_mono(&[0.0f32, 1.0], &buffer, 1);
        let samples = lock_samples(&buffer);
        assert_eq!(samples[0], 0);
        assert!(samples[1] > 32_000);
    }
}
