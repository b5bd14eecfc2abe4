use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::Path;
use tokio::process::Command;

use crate::error::{audio_error, export_error, IntoRadioEditError, RadioEditError, Result};

/// Default margin added on both sides of every muted span
pub const DEFAULT_FADE_MS: u32 = 10;

/// Output containers the ffmpeg encoder knows how to produce
const SUPPORTED_FORMATS: &[&str] = &["mp3", "wav", "flac", "ogg", "opus", "m4a", "aac"];

/// Interleaved floating-point PCM
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn silent(frames: usize, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Frame index nearest to `seconds`, clamped to the buffer
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        frame.min(self.frames())
    }

    /// Append trailing silence up to `frames`
    pub fn pad_to_frames(&mut self, frames: usize) {
        let target = frames * self.channels as usize;
        if target > self.samples.len() {
            self.samples.resize(target, 0.0);
        }
    }
}

/// Read a WAV file, converting integer samples to `[-1, 1]` floats
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| audio_error(format!("Failed to open '{}': {}", path.display(), e)))?;
    let spec = reader.spec();

    let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect()
        }
    };
    let samples = samples
        .map_err(|e| audio_error(format!("Failed to decode '{}': {}", path.display(), e)))?;

    debug!(
        "Read {} ({} Hz, {} ch, {} samples)",
        path.display(),
        spec.sample_rate,
        spec.channels,
        samples.len()
    );
    Ok(AudioBuffer::new(samples, spec.sample_rate, spec.channels))
}

/// Write a buffer as 32-bit float WAV
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let wav_error = |e: hound::Error| audio_error(format!("Failed to write '{}': {}", path.display(), e));

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
    for &sample in &audio.samples {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    Ok(())
}

/// Mutes spans of a track and mixes stems back together
#[derive(Debug, Clone)]
pub struct AudioEditor {
    fade_ms: u32,
}

impl Default for AudioEditor {
    fn default() -> Self {
        Self::new(DEFAULT_FADE_MS)
    }
}

impl AudioEditor {
    pub fn new(fade_ms: u32) -> Self {
        Self { fade_ms }
    }

    pub fn fade_ms(&self) -> u32 {
        self.fade_ms
    }

    /// Return a copy of `audio` with each span silenced
    pub fn mute(&self, audio: &AudioBuffer, spans: &[(f64, f64)]) -> AudioBuffer {
        let mut edited = audio.clone();
        self.mute_in_place(&mut edited, spans);
        edited
    }

    /// Overwrite each span (widened by the fade margin, clamped to the buffer)
    /// with silence. Sample positions never move. Returns the number of spans
    /// that touched the buffer.
    pub fn mute_in_place(&self, audio: &mut AudioBuffer, spans: &[(f64, f64)]) -> usize {
        let mut sorted: Vec<(f64, f64)> = spans
            .iter()
            .copied()
            .filter(|&(start, end)| {
                let valid = start.is_finite() && end.is_finite() && end >= start;
                if !valid {
                    warn!("Skipping invalid mute span {:.3}s-{:.3}s", start, end);
                }
                valid
            })
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let margin = self.fade_ms as f64 / 1000.0;
        let channels = audio.channels as usize;
        let mut muted = 0;

        for (start, end) in sorted {
            let first = audio.frame_at(start - margin);
            let last = audio.frame_at(end + margin);
            if first >= last {
                continue;
            }
            audio.samples[first * channels..last * channels].fill(0.0);
            muted += 1;
        }

        debug!("Muted {} of {} spans", muted, spans.len());
        muted
    }

    /// Overlay vocals onto the instrumental at identical offsets.
    ///
    /// The shorter buffer is padded with trailing silence first. The sum is
    /// clipped to `[-1, 1]`.
    pub fn combine(&self, vocals: &AudioBuffer, instrumental: &AudioBuffer) -> Result<AudioBuffer> {
        if vocals.sample_rate != instrumental.sample_rate || vocals.channels != instrumental.channels {
            return Err(audio_error(format!(
                "Stem formats differ: vocals {} Hz/{} ch, instrumental {} Hz/{} ch",
                vocals.sample_rate, vocals.channels, instrumental.sample_rate, instrumental.channels
            )));
        }

        let frames = vocals.frames().max(instrumental.frames());
        let mut mixed = instrumental.clone();
        mixed.pad_to_frames(frames);

        for (out, voice) in mixed.samples.iter_mut().zip(&vocals.samples) {
            *out = (*out + voice).clamp(-1.0, 1.0);
        }
        Ok(mixed)
    }
}

/// Encode parameters for the final output
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub format: String,
    pub bitrate: String,
}

impl ExportSettings {
    /// Derive the container from the output extension, defaulting to mp3
    pub fn for_output(output: &Path, bitrate: impl Into<String>) -> Self {
        let format = output
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "mp3".to_string());
        Self {
            format,
            bitrate: bitrate.into(),
        }
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self.format.as_str(), "mp3" | "ogg" | "opus" | "m4a" | "aac")
    }

    fn codec(&self) -> Result<&'static str> {
        match self.format.as_str() {
            "mp3" => Ok("libmp3lame"),
            "wav" => Ok("pcm_s16le"),
            "flac" => Ok("flac"),
            "ogg" => Ok("libvorbis"),
            "opus" => Ok("libopus"),
            "m4a" | "aac" => Ok("aac"),
            other => Err(RadioEditError::UnsupportedFormat {
                extension: other.to_string(),
                supported: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

/// Turns a mixed WAV into the final output file
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, wav_path: &Path, output_path: &Path, settings: &ExportSettings) -> Result<()>;
}

/// Encoder backed by the ffmpeg binary
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder;

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, wav_path: &Path, output_path: &Path, settings: &ExportSettings) -> Result<()> {
        let codec = settings.codec()?;
        let mut args: Vec<String> = vec![
            "-i".into(),
            wav_path.to_string_lossy().into_owned(),
            "-vn".into(),
            "-c:a".into(),
            codec.into(),
        ];
        if settings.is_lossy() {
            args.push("-b:a".into());
            args.push(settings.bitrate.clone());
        }
        args.push("-y".into());
        args.push(output_path.to_string_lossy().into_owned());

        debug!("ffmpeg {}", args.join(" "));

        let output = Command::new("ffmpeg")
            .args(&args)
            .output()
            .await
            .map_err(|e| export_error(format!("Failed to execute ffmpeg: {}", e), None))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(export_error(
                format!("ffmpeg failed to encode {}", settings.format),
                Some(stderr),
            ));
        }

        info!("Encoded {} to {}", settings.format, output_path.display());
        Ok(())
    }
}

/// Move a staged file into its final location, copying across filesystems
pub async fn publish(staged: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.with_path(parent)?;
    }

    if tokio::fs::rename(staged, destination).await.is_err() {
        tokio::fs::copy(staged, destination)
            .await
            .map_err(|e| export_error(format!("Failed to write '{}': {}", destination.display(), e), None))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn constant(value: f32, seconds: f64, sample_rate: u32, channels: u16) -> AudioBuffer {
        let frames = (seconds * sample_rate as f64) as usize;
        AudioBuffer::new(vec![value; frames * channels as usize], sample_rate, channels)
    }

    #[test]
    fn test_buffer_geometry() {
        let audio = constant(0.1, 2.0, 1000, 2);
        assert_eq!(audio.frames(), 2000);
        assert!((audio.duration() - 2.0).abs() < 1e-9);
        assert_eq!(audio.frame_at(0.5), 500);
        assert_eq!(audio.frame_at(-1.0), 0);
        assert_eq!(audio.frame_at(10.0), 2000);
    }

    #[test]
    fn test_mute_silences_span_with_margin() {
        let editor = AudioEditor::new(10);
        let audio = constant(0.5, 2.0, 1000, 1);
        let edited = editor.mute(&audio, &[(1.0, 1.5)]);

        let samples = edited.samples();
        assert_eq!(samples[989], 0.5);
        assert!(samples[990..1510].iter().all(|s| *s == 0.0));
        assert_eq!(samples[1510], 0.5);
        assert_eq!(edited.frames(), audio.frames());
    }

    #[test]
    fn test_mute_clamps_to_bounds() {
        let editor = AudioEditor::new(10);
        let audio = constant(0.5, 1.0, 1000, 2);
        let edited = editor.mute(&audio, &[(0.0, 0.2), (0.9, 5.0)]);

        assert!(edited.samples()[..2 * 210].iter().all(|s| *s == 0.0));
        assert_eq!(edited.samples()[2 * 210], 0.5);
        assert!(edited.samples()[2 * 890..].iter().all(|s| *s == 0.0));
        assert_eq!(edited.samples().len(), audio.samples().len());
    }

    #[test]
    fn test_mute_order_independent_and_idempotent() {
        let editor = AudioEditor::default();
        let audio = constant(0.25, 3.0, 8000, 1);
        let spans = [(2.0, 2.3), (0.4, 0.6), (1.0, 1.1)];
        let reversed: Vec<(f64, f64)> = spans.iter().rev().copied().collect();

        let once = editor.mute(&audio, &spans);
        let again = editor.mute(&audio, &reversed);
        let twice = editor.mute(&once, &spans);

        assert_eq!(once, again);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_mute_skips_invalid_spans() {
        let editor = AudioEditor::default();
        let mut audio = constant(0.5, 1.0, 1000, 1);
        let muted = editor.mute_in_place(&mut audio, &[(0.6, 0.4), (f64::NAN, 0.5), (5.0, 6.0)]);

        assert_eq!(muted, 0);
        assert!(audio.samples().iter().all(|s| *s == 0.5));
    }

    #[test]
    fn test_combine_pads_shorter_and_sums() {
        let editor = AudioEditor::default();
        let vocals = constant(0.25, 1.0, 1000, 1);
        let instrumental = constant(0.5, 0.5, 1000, 1);
        let mixed = editor.combine(&vocals, &instrumental).unwrap();

        assert_eq!(mixed.frames(), 1000);
        assert_eq!(mixed.samples()[0], 0.75);
        assert_eq!(mixed.samples()[999], 0.25);
    }

    #[test]
    fn test_combine_clips() {
        let editor = AudioEditor::default();
        let loud = constant(0.8, 0.1, 1000, 1);
        let mixed = editor.combine(&loud, &loud).unwrap();
        assert!(mixed.samples().iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_combine_rejects_mismatched_formats() {
        let editor = AudioEditor::default();
        let a = constant(0.1, 0.1, 44100, 2);
        let b = constant(0.1, 0.1, 48000, 2);
        assert!(editor.combine(&a, &b).is_err());
    }

    #[test]
    fn test_wav_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let audio = AudioBuffer::new(vec![0.0, 0.5, -0.5, 0.25], 22050, 2);

        write_wav(&path, &audio).unwrap();
        assert_eq!(read_wav(&path).unwrap(), audio);
    }

    #[test]
    fn test_read_int_wav_scales() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("int.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(-32768i16).unwrap();
        writer.finalize().unwrap();

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.samples(), &[0.5, -1.0]);
    }

    #[test]
    fn test_export_settings() {
        let settings = ExportSettings::for_output(Path::new("out/Song (clean).MP3"), "320k");
        assert_eq!(settings.format, "mp3");
        assert!(settings.is_lossy());

        let settings = ExportSettings::for_output(Path::new("song.flac"), "320k");
        assert!(!settings.is_lossy());
        assert_eq!(settings.codec().unwrap(), "flac");

        let settings = ExportSettings::for_output(Path::new("song.xyz"), "320k");
        assert!(settings.codec().is_err());
    }

    #[tokio::test]
    async fn test_publish_moves_file() {
        let dir = tempdir().unwrap();
        let staged = dir.path().join("staged.wav");
        let destination = dir.path().join("nested").join("final.wav");
        std::fs::write(&staged, b"data").unwrap();

        publish(&staged, &destination).await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"data");
    }
}
