//! Live microphone capture via CPAL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::source::FrameSource;
use crate::defaults;
use crate::error::{Result, VocmdError};
use crate::output::eprintln_clear;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// CPAL probing triggers harmless but noisy ALSA/JACK/PipeWire messages.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` on fd 2. Safe as long as no other thread is
/// concurrently manipulating stderr.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Quiet down JACK/ALSA/PipeWire before any backend probing happens.
///
/// # Safety
/// Modifies environment variables; call at startup before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: called at startup before any threads exist
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Device names preferred on PipeWire/PulseAudio desktops, where the sound
/// server honors the user's input selection.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never useful for voice input.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// An enumerable input device. Side query only; never part of the
/// streaming contract.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    /// Supported sample rates, deduplicated min/max per config range.
    pub sample_rates: Vec<u32>,
    pub recommended: bool,
}

/// List usable audio input devices with index, name, and sample rates.
///
/// Filters out devices that are never useful for voice input (surround
/// channels, HDMI outputs). Preferred sound-server devices are flagged
/// recommended.
///
/// # Errors
/// Returns `VocmdError::Capture` if device enumeration fails.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| VocmdError::Capture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut infos = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else {
            continue;
        };
        if should_filter_device(&name) {
            continue;
        }

        let mut sample_rates = Vec::new();
        if let Ok(configs) = with_suppressed_stderr(|| device.supported_input_configs()) {
            for config in configs {
                for rate in [config.min_sample_rate(), config.max_sample_rate()] {
                    if !sample_rates.contains(&rate) {
                        sample_rates.push(rate);
                    }
                }
            }
        }
        sample_rates.sort_unstable();

        infos.push(DeviceInfo {
            index: infos.len(),
            name: name.clone(),
            sample_rates,
            recommended: is_preferred_device(&name),
        });
    }

    Ok(infos)
}

/// Pick the best default input device, preferring PipeWire/PulseAudio over
/// raw ALSA devices so the desktop's device selection is respected.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| VocmdError::DeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper to make cpal::Stream Send.
///
/// SAFETY: the stream is only touched under the Mutex in CpalFrameSource, so
/// access is serialized even though the handle moves between threads.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone frame source capturing 16-bit PCM at 16kHz mono.
///
/// Tries the preferred format first (i16/16kHz/mono, converted transparently
/// by PipeWire/PulseAudio), then f32, then the device's native config with
/// software channel mixing and resampling.
pub struct CpalFrameSource {
    device: cpal::Device,
    stream: Arc<Mutex<Option<SendableStream>>>,
    buffer: Arc<Mutex<Vec<i16>>>,
    callback_count: Arc<AtomicU64>,
    sample_rate: u32,
}

impl CpalFrameSource {
    /// Opens the named device, or the best default when `device_name` is None.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host.input_devices().map_err(|e| VocmdError::Capture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;

                let mut found = None;
                for dev in devices {
                    if let Ok(dev_name) = dev.name()
                        && dev_name == name
                    {
                        found = Some(dev);
                        break;
                    }
                }

                found.ok_or_else(|| VocmdError::DeviceNotFound {
                    device: name.to_string(),
                })
            } else {
                get_best_default_device()
            }
        })?;

        Ok(Self {
            device,
            stream: Arc::new(Mutex::new(None)),
            buffer: Arc::new(Mutex::new(Vec::new())),
            callback_count: Arc::new(AtomicU64::new(0)),
            sample_rate: defaults::SAMPLE_RATE,
        })
    }

    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln_clear(&format!("vocmd: audio stream error: {}", err));
        };

        // i16/16kHz/mono first; sound servers convert transparently
        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // f32 for devices that only expose float formats
        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                    );
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Some PipeWire-ALSA setups accept non-native configs but never fire
        // the data callback; capture natively and convert in software.
        self.build_stream_native()
    }

    /// Build a stream at the device's native config, mixing to mono and
    /// resampling to 16kHz in the callback.
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| VocmdError::Capture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;

        let stream_config: cpal::StreamConfig = default_config.clone().into();

        eprintln_clear(&format!(
            "vocmd: using native audio format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            default_config.sample_format(),
        ));

        let err_callback = |err| {
            eprintln_clear(&format!("vocmd: audio stream error: {}", err));
        };

        let buffer = Arc::clone(&self.buffer);
        let counter = Arc::clone(&self.callback_count);

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let converted =
                            mix_and_resample(data, native_channels, native_rate, target_rate);
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&converted);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| VocmdError::Capture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let i16_data: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let converted =
                            mix_and_resample(&i16_data, native_channels, native_rate, target_rate);
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&converted);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| VocmdError::Capture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(VocmdError::Capture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a device with --device.",
                    fmt
                ),
            }),
        }
    }
}

/// Mix multi-channel audio to mono and resample to the target rate.
fn mix_and_resample(samples: &[i16], channels: usize, source_rate: u32, target_rate: u32) -> Vec<i16> {
    let mono: Vec<i16> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    if source_rate == target_rate {
        mono
    } else {
        crate::audio::wav::resample(&mono, source_rate, target_rate)
    }
}

impl FrameSource for CpalFrameSource {
    fn start(&mut self) -> Result<()> {
        {
            let stream_guard = self.stream.lock().map_err(|e| VocmdError::Capture {
                message: format!("Failed to lock stream: {}", e),
            })?;
            if stream_guard.is_some() {
                return Ok(()); // already started
            }
        }

        let stream = self.build_stream()?;
        stream.play().map_err(|e| VocmdError::Capture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Verify the callback actually fires; some PipeWire-ALSA setups
        // accept a config but never deliver data.
        std::thread::sleep(std::time::Duration::from_millis(200));

        let final_stream = if self.callback_count.load(Ordering::Relaxed) == 0 {
            drop(stream);
            if let Ok(mut buf) = self.buffer.lock() {
                buf.clear();
            }

            let native_stream = self.build_stream_native()?;
            native_stream.play().map_err(|e| VocmdError::Capture {
                message: format!("Failed to start native audio stream: {}", e),
            })?;
            native_stream
        } else {
            stream
        };

        let mut stream_guard = self.stream.lock().map_err(|e| VocmdError::Capture {
            message: format!("Failed to lock stream: {}", e),
        })?;
        *stream_guard = Some(SendableStream(final_stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| VocmdError::Capture {
            message: format!("Failed to lock stream: {}", e),
        })?;

        if let Some(sendable) = stream_guard.take() {
            sendable.0.pause().map_err(|e| VocmdError::Capture {
                message: format!("Failed to stop audio stream: {}", e),
            })?;
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Option<Vec<i16>>> {
        let mut buffer = self.buffer.lock().map_err(|e| VocmdError::Capture {
            message: format!("Failed to lock audio buffer: {}", e),
        })?;

        let samples = std::mem::take(&mut *buffer);
        Ok(Some(samples))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_finite(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_unusable_devices() {
        assert!(should_filter_device("surround51"));
        assert!(should_filter_device("front:CARD=PCH"));
        assert!(should_filter_device("HDMI Output"));
        assert!(should_filter_device("Digital Output S/PDIF"));
        assert!(!should_filter_device("pipewire"));
        assert!(!should_filter_device("Built-in Audio"));
    }

    #[test]
    fn recognizes_preferred_devices() {
        assert!(is_preferred_device("pipewire"));
        assert!(is_preferred_device("PipeWire"));
        assert!(is_preferred_device("PulseAudio"));
        assert!(!is_preferred_device("hw:0,0"));
        assert!(!is_preferred_device("default"));
    }

    #[test]
    fn mix_stereo_averages_channels() {
        let stereo = [100i16, 200, 300, -300];
        let mono = mix_and_resample(&stereo, 2, 16000, 16000);
        assert_eq!(mono, vec![150, 0]);
    }

    #[test]
    fn unknown_device_name_is_an_error() {
        let source = CpalFrameSource::new(Some("NonExistentDevice12345"));
        match source {
            Err(VocmdError::DeviceNotFound { device }) => {
                assert_eq!(device, "NonExistentDevice12345");
            }
            // Headless machines can fail enumeration before the name lookup.
            Err(VocmdError::Capture { .. }) => {}
            Err(other) => panic!("expected DeviceNotFound, got {:?}", other),
            Ok(_) => panic!("expected an error for a bogus device name"),
        }
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn list_devices_returns_indexed_entries() {
        let devices = list_devices().expect("enumeration failed");
        assert!(!devices.is_empty());
        for (i, info) in devices.iter().enumerate() {
            assert_eq!(info.index, i);
        }
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn start_read_stop_cycle() {
        let mut source = CpalFrameSource::new(None).expect("open default device");
        assert!(source.start().is_ok());
        assert!(source.read_samples().is_ok());
        assert!(source.stop().is_ok());
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn start_stop_multiple_times() {
        let mut source = CpalFrameSource::new(None).expect("open default device");
        for _ in 0..3 {
            assert!(source.start().is_ok());
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(source.stop().is_ok());
        }
    }
}
