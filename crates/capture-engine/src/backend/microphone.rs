use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use screenrec_common::error::{RecorderError, RecorderResult};

use super::{AudioSpec, InputDevice, MicrophoneBackend, SampleReader};
use crate::audio::{downmix_i16, downmix_to_i16};

/// How long a read waits for the device before treating it as gone.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

enum Packet {
    Samples(Vec<i16>),
    Error(cpal::StreamError),
}

/// Microphone access through the host's default cpal audio API.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalMicrophoneBackend;

impl CpalMicrophoneBackend {
    pub fn new() -> Self {
        Self
    }

    fn device(&self, index: usize) -> RecorderResult<cpal::Device> {
        cpal::default_host()
            .input_devices()
            .map_err(|e| RecorderError::audio(format!("Failed to enumerate input devices: {e}")))?
            .nth(index)
            .ok_or_else(|| RecorderError::audio(format!("No input device at index {index}")))
    }
}

impl MicrophoneBackend for CpalMicrophoneBackend {
    fn input_devices(&self) -> Vec<InputDevice> {
        let devices = match cpal::default_host().input_devices() {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate input devices");
                return Vec::new();
            }
        };

        devices
            .enumerate()
            .filter(|(_, device)| {
                device
                    .supported_input_configs()
                    .map(|mut configs| configs.any(|c| c.channels() > 0))
                    .unwrap_or(false)
            })
            .map(|(index, device)| InputDevice {
                index,
                name: device
                    .name()
                    .unwrap_or_else(|_| format!("Input device {index}")),
            })
            .collect()
    }

    fn probe(&self, index: usize, spec: &AudioSpec) -> RecorderResult<()> {
        let device = self.device(index)?;
        let (config, sample_format) = negotiate(&device, spec)?;
        // The receiver is dropped right away; the stream is never played.
        let (tx, _rx) = mpsc::channel();
        let stream = build_stream(&device, &config, sample_format, tx)?;
        drop(stream);
        Ok(())
    }

    fn open(&self, index: usize, spec: &AudioSpec) -> RecorderResult<Box<dyn SampleReader>> {
        let device = self.device(index)?;
        let (config, sample_format) = negotiate(&device, spec)?;
        tracing::debug!(
            channels = config.channels,
            sample_rate = config.sample_rate.0,
            ?sample_format,
            "Negotiated microphone stream"
        );

        let (tx, rx) = mpsc::channel();
        let stream = build_stream(&device, &config, sample_format, tx)?;
        stream
            .play()
            .map_err(|e| RecorderError::audio(format!("Failed to start input stream: {e}")))?;

        Ok(Box::new(CpalSampleReader {
            _stream: stream,
            rx,
            pending: Vec::with_capacity(spec.chunk_frames * 2),
            chunk_frames: spec.chunk_frames.max(1),
        }))
    }
}

/// Pick a supported configuration at the requested rate, preferring the
/// requested channel count and native i16 samples.
fn negotiate(device: &cpal::Device, spec: &AudioSpec) -> RecorderResult<(StreamConfig, SampleFormat)> {
    let rate = cpal::SampleRate(spec.sample_rate);
    let best = device
        .supported_input_configs()
        .map_err(|e| RecorderError::audio(format!("Failed to query input configs: {e}")))?
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .filter(|range| {
            matches!(
                range.sample_format(),
                SampleFormat::I16 | SampleFormat::U16 | SampleFormat::F32
            )
        })
        .min_by_key(|range| {
            (
                range.channels() != spec.channels,
                range.sample_format() != SampleFormat::I16,
                range.channels(),
            )
        })
        .ok_or_else(|| {
            RecorderError::audio(format!(
                "Device does not support {} Hz capture",
                spec.sample_rate
            ))
        })?;

    let supported = best.with_sample_rate(rate);
    Ok((supported.config(), supported.sample_format()))
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    tx: Sender<Packet>,
) -> RecorderResult<cpal::Stream> {
    match sample_format {
        SampleFormat::I16 => build_stream_typed::<i16>(device, config, tx, downmix_i16),
        SampleFormat::U16 => build_stream_typed::<u16>(device, config, tx, downmix_float::<u16>),
        SampleFormat::F32 => build_stream_typed::<f32>(device, config, tx, downmix_float::<f32>),
        other => Err(RecorderError::audio(format!(
            "Unsupported sample format {other:?}"
        ))),
    }
}

fn downmix_float<T>(data: &[T], channels: usize) -> Vec<i16>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let floats: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
    downmix_to_i16(&floats, channels)
}

fn build_stream_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    tx: Sender<Packet>,
    downmix: fn(&[T], usize) -> Vec<i16>,
) -> RecorderResult<cpal::Stream>
where
    T: cpal::SizedSample + Send + 'static,
{
    let channels = config.channels as usize;
    let data_tx = tx.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let _ = data_tx.send(Packet::Samples(downmix(data, channels)));
            },
            move |err| {
                let _ = tx.send(Packet::Error(err));
            },
            None,
        )
        .map_err(|e| RecorderError::audio(format!("Failed to open input stream: {e}")))
}

struct CpalSampleReader {
    _stream: cpal::Stream,
    rx: Receiver<Packet>,
    pending: Vec<i16>,
    chunk_frames: usize,
}

impl SampleReader for CpalSampleReader {
    fn read_chunk(&mut self) -> RecorderResult<Vec<i16>> {
        while self.pending.len() < self.chunk_frames {
            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(Packet::Samples(samples)) => self.pending.extend_from_slice(&samples),
                Ok(Packet::Error(cpal::StreamError::DeviceNotAvailable)) => {
                    return Err(RecorderError::audio("Input device is no longer available"));
                }
                // Overruns and other transient backend errors are not fatal.
                Ok(Packet::Error(err)) => {
                    tracing::debug!(error = %err, "Suppressed input stream error");
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(RecorderError::audio(format!(
                        "No audio data received for {}s",
                        READ_TIMEOUT.as_secs()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RecorderError::audio("Input stream closed"));
                }
            }
        }
        Ok(self.pending.drain(..self.chunk_frames).collect())
    }
}
