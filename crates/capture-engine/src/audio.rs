//! Microphone enumeration and the audio capture loop.
//!
//! The loop reads fixed-size mono chunks from the first functional
//! microphone until its [`StopSignal`] is raised, keeps every chunk in
//! memory and writes them out as one 16-bit PCM WAV file at the end.

use std::path::{Path, PathBuf};

use screenrec_common::error::{RecorderError, RecorderResult};

use crate::backend::{AudioSpec, InputDevice, MicrophoneBackend};
use crate::signal::StopSignal;

/// A microphone that passed the open/close probe.
pub type MicrophoneInfo = InputDevice;

/// How an audio capture run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    /// Samples were written to `path`.
    Completed { path: PathBuf, samples: u64 },
    /// No functional microphone; nothing was written.
    NoMicrophone,
    /// The device or the file write failed; no file is guaranteed.
    Failed { message: String },
}

impl AudioOutcome {
    pub fn has_audio(&self) -> bool {
        matches!(self, AudioOutcome::Completed { samples, .. } if *samples > 0)
    }
}

/// Every input device that can be opened at `spec`. Devices failing the
/// probe are left out.
pub fn list_active_microphones(
    backend: &dyn MicrophoneBackend,
    spec: &AudioSpec,
) -> Vec<MicrophoneInfo> {
    backend
        .input_devices()
        .into_iter()
        .filter(|device| match backend.probe(device.index, spec) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(device = %device.name, error = %e, "Skipping non-functional microphone");
                false
            }
        })
        .collect()
}

/// Record from the first functional microphone until `stop` is raised.
pub fn record_audio(
    backend: &dyn MicrophoneBackend,
    stop: &StopSignal,
    output_path: &Path,
    spec: &AudioSpec,
) -> AudioOutcome {
    let microphones = list_active_microphones(backend, spec);
    let Some(microphone) = microphones.first() else {
        tracing::warn!("No available microphones found; recording without audio");
        return AudioOutcome::NoMicrophone;
    };
    tracing::info!(microphone = %microphone.name, "Using microphone");

    let mut reader = match backend.open(microphone.index, spec) {
        Ok(reader) => reader,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open microphone");
            return AudioOutcome::Failed {
                message: e.to_string(),
            };
        }
    };

    tracing::info!("Audio recording started");
    let mut chunks: Vec<Vec<i16>> = Vec::new();
    while !stop.is_raised() {
        match reader.read_chunk() {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                tracing::error!(error = %e, "Error during audio recording");
                drop(reader);
                return AudioOutcome::Failed {
                    message: e.to_string(),
                };
            }
        }
    }
    drop(reader);
    tracing::debug!(chunks = chunks.len(), "Microphone stream closed");

    match write_wav(output_path, spec.sample_rate, &chunks) {
        Ok(samples) => {
            tracing::info!(path = %output_path.display(), samples, "Audio saved");
            AudioOutcome::Completed {
                path: output_path.to_path_buf(),
                samples,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, path = %output_path.display(), "Failed to write audio file");
            AudioOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

/// Write mono 16-bit PCM chunks as one WAV file. Returns the sample count.
pub fn write_wav(path: &Path, sample_rate: u32, chunks: &[Vec<i16>]) -> RecorderResult<u64> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| RecorderError::audio(format!("Failed to create WAV file: {e}")))?;

    let mut samples = 0u64;
    for sample in chunks.iter().flatten() {
        writer
            .write_sample(*sample)
            .map_err(|e| RecorderError::audio(format!("Failed to write audio data: {e}")))?;
        samples += 1;
    }

    writer
        .finalize()
        .map_err(|e| RecorderError::audio(format!("Failed to finalize WAV file: {e}")))?;
    Ok(samples)
}

/// Average interleaved i16 frames down to mono. Mono input passes through
/// unchanged.
pub(crate) fn downmix_i16(interleaved: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| (frame.iter().map(|&s| i32::from(s)).sum::<i32>() / frame.len() as i32) as i16)
        .collect()
}

/// Average interleaved float frames down to mono i16.
pub(crate) fn downmix_to_i16(interleaved: &[f32], channels: usize) -> Vec<i16> {
    let channels = channels.max(1);
    interleaved
        .chunks(channels)
        .map(|frame| f32_to_i16(frame.iter().sum::<f32>() / frame.len() as f32))
        .collect()
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::backend::SampleReader;

    struct FakeReader {
        reads: Arc<AtomicUsize>,
        fail_after: Option<usize>,
        stop: StopSignal,
        stop_after: usize,
    }

    impl SampleReader for FakeReader {
        fn read_chunk(&mut self) -> RecorderResult<Vec<i16>> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_after.is_some_and(|limit| n > limit) {
                return Err(RecorderError::audio("device unplugged"));
            }
            if n >= self.stop_after {
                self.stop.raise();
            }
            Ok(vec![n as i16; 4])
        }
    }

    struct FakeBackend {
        devices: Vec<InputDevice>,
        broken: HashSet<usize>,
        opened: Arc<AtomicUsize>,
        reads: Arc<AtomicUsize>,
        fail_after: Option<usize>,
        stop: StopSignal,
    }

    impl FakeBackend {
        fn new(names: &[&str]) -> Self {
            Self {
                devices: names
                    .iter()
                    .enumerate()
                    .map(|(index, name)| InputDevice {
                        index,
                        name: name.to_string(),
                    })
                    .collect(),
                broken: HashSet::new(),
                opened: Arc::new(AtomicUsize::new(usize::MAX)),
                reads: Arc::new(AtomicUsize::new(0)),
                fail_after: None,
                stop: StopSignal::new(),
            }
        }
    }

    impl MicrophoneBackend for FakeBackend {
        fn input_devices(&self) -> Vec<InputDevice> {
            self.devices.clone()
        }

        fn probe(&self, index: usize, _spec: &AudioSpec) -> RecorderResult<()> {
            if self.broken.contains(&index) {
                Err(RecorderError::audio("device busy"))
            } else {
                Ok(())
            }
        }

        fn open(&self, index: usize, _spec: &AudioSpec) -> RecorderResult<Box<dyn SampleReader>> {
            self.opened.store(index, Ordering::SeqCst);
            Ok(Box::new(FakeReader {
                reads: self.reads.clone(),
                fail_after: self.fail_after,
                stop: self.stop.clone(),
                stop_after: 3,
            }))
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_enumerator_skips_devices_failing_probe() {
        let mut backend = FakeBackend::new(&["busy", "usb", "builtin"]);
        backend.broken.insert(0);

        let active = list_active_microphones(&backend, &AudioSpec::default());
        let names: Vec<_> = active.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["usb", "builtin"]);
        assert_eq!(active[0].index, 1);
    }

    #[test]
    fn test_no_microphone_writes_nothing() {
        let dir = temp_dir("screenrec_test_audio_none");
        let backend = FakeBackend::new(&[]);
        let path = dir.join("audio.wav");

        let outcome = record_audio(&backend, &StopSignal::new(), &path, &AudioSpec::default());
        assert_eq!(outcome, AudioOutcome::NoMicrophone);
        assert!(!path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_records_first_functional_microphone_until_stopped() {
        let dir = temp_dir("screenrec_test_audio_record");
        let mut backend = FakeBackend::new(&["busy", "usb"]);
        backend.broken.insert(0);
        let stop = backend.stop.clone();
        let path = dir.join("audio.wav");

        let outcome = record_audio(&backend, &stop, &path, &AudioSpec::default());
        assert_eq!(backend.opened.load(Ordering::SeqCst), 1);
        assert_eq!(
            outcome,
            AudioOutcome::Completed {
                path: path.clone(),
                samples: 12
            }
        );
        assert!(outcome.has_audio());

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_device_error_aborts_without_file() {
        let dir = temp_dir("screenrec_test_audio_error");
        let mut backend = FakeBackend::new(&["usb"]);
        backend.fail_after = Some(1);
        let stop = StopSignal::new();
        let path = dir.join("audio.wav");

        let outcome = record_audio(&backend, &stop, &path, &AudioSpec::default());
        assert!(matches!(outcome, AudioOutcome::Failed { .. }));
        assert!(!path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_pre_raised_stop_writes_header_only_file() {
        let dir = temp_dir("screenrec_test_audio_prestopped");
        let backend = FakeBackend::new(&["usb"]);
        let stop = StopSignal::new();
        stop.raise();
        let path = dir.join("audio.wav");

        let outcome = record_audio(&backend, &stop, &path, &AudioSpec::default());
        assert!(!outcome.has_audio());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 44);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_downmix_averages_channels() {
        assert_eq!(downmix_to_i16(&[1.0, 0.0, -1.0, -1.0], 2), vec![16383, -32767]);
        assert_eq!(downmix_to_i16(&[0.5], 1), vec![16383]);
    }

    #[test]
    fn test_i16_mono_is_bit_exact() {
        let samples = vec![1000, -1000, i16::MAX, i16::MIN, 0, 1];
        assert_eq!(downmix_i16(&samples, 1), samples);
        assert_eq!(downmix_i16(&[1000, 3000, i16::MIN, i16::MIN], 2), vec![2000, i16::MIN]);
    }

    proptest! {
        #[test]
        fn downmix_yields_one_sample_per_frame(
            frames in 0usize..256,
            channels in 1usize..8,
            value in -4.0f32..4.0,
        ) {
            let interleaved = vec![value; frames * channels];
            let mono = downmix_to_i16(&interleaved, channels);
            prop_assert_eq!(mono.len(), frames);
            for sample in mono {
                prop_assert!(sample >= -i16::MAX);
            }
        }
    }
}
