//! The `.sclip` format: a JSON description of a solid-color clip with one
//! sine tone per audio track.

use std::f64::consts::TAU;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File extension the reader accepts.
pub const EXTENSION: &str = "sclip";

const MAX_DIMENSION: u32 = 4096;

/// Errors reading a clip description.
#[derive(Error, Debug)]
pub enum ClipError {
    /// Not a `.sclip` file.
    #[error("not a .{EXTENSION} file: {0}")]
    WrongExtension(String),

    /// The file could not be read.
    #[error("failed to read clip: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a clip description.
    #[error("invalid clip JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field is out of range.
    #[error("invalid clip: {0}")]
    Invalid(&'static str),
}

/// One audio track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    /// Frequency in Hz.
    pub frequency: f64,
    /// Peak amplitude in `0.0..=1.0`.
    pub amplitude: f64,
}

impl Tone {
    /// Sample value at `seconds`.
    #[allow(clippy::cast_possible_truncation, reason = "value is clamped to the i16 range")]
    pub fn sample(&self, seconds: f64) -> i16 {
        let level = self.amplitude.clamp(0.0, 1.0) * (TAU * self.frequency * seconds).sin();
        (level * f64::from(i16::MAX)).round() as i16
    }
}

/// A clip description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolidClip {
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Frame rate numerator.
    pub rate: u32,
    /// Frame rate denominator.
    pub scale: u32,
    /// Number of frames.
    pub frames: u32,
    /// Fill color as `[r, g, b]`.
    pub color: [u8; 3],
    /// Audio sample rate.
    pub sample_rate: u32,
    /// Audio channel count.
    pub channels: u16,
    /// One tone per audio track; empty for a silent clip without audio.
    pub tones: Vec<Tone>,
}

impl Default for SolidClip {
    fn default() -> Self {
        Self {
            width: 64,
            height: 36,
            rate: 30,
            scale: 1,
            frames: 90,
            color: [32, 96, 200],
            sample_rate: 48_000,
            channels: 2,
            tones: vec![
                Tone {
                    frequency: 440.0,
                    amplitude: 0.25,
                },
                Tone {
                    frequency: 880.0,
                    amplitude: 0.125,
                },
            ],
        }
    }
}

impl SolidClip {
    /// Read and validate a `.sclip` file.
    ///
    /// # Errors
    ///
    /// Fails for other extensions, unreadable files, bad JSON or
    /// out-of-range fields.
    pub fn from_path(path: &Path) -> Result<Self, ClipError> {
        let is_clip = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(EXTENSION));
        if !is_clip {
            return Err(ClipError::WrongExtension(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate clip JSON.
    ///
    /// # Errors
    ///
    /// Fails on bad JSON, a top-level value other than an object, or
    /// out-of-range fields.
    pub fn from_json(text: &str) -> Result<Self, ClipError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ClipError::Json(serde::de::Error::custom("clip must be a JSON object")));
        }
        let clip = Self::deserialize(value)?;
        clip.validate()?;
        Ok(clip)
    }

    fn validate(&self) -> Result<(), ClipError> {
        if !(1..=MAX_DIMENSION).contains(&self.width) || !(1..=MAX_DIMENSION).contains(&self.height) {
            return Err(ClipError::Invalid("frame size"));
        }
        if self.rate == 0 || self.scale == 0 || self.frames == 0 {
            return Err(ClipError::Invalid("frame rate or length"));
        }
        if !self.tones.is_empty() && (self.sample_rate == 0 || !(1..=8).contains(&self.channels)) {
            return Err(ClipError::Invalid("audio format"));
        }
        Ok(())
    }

    /// Bytes per bottom-up BGR row, padded to 4 bytes.
    pub fn stride(&self) -> usize {
        (self.width as usize * 3).div_ceil(4) * 4
    }

    /// Bytes per frame.
    pub fn frame_size(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// Samples per channel over the whole clip.
    pub fn sample_total(&self) -> u64 {
        u64::from(self.frames) * u64::from(self.sample_rate) * u64::from(self.scale) / u64::from(self.rate.max(1))
    }

    /// Frame shown at `seconds`, clamped to the clip.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is floored and clamped first")]
    pub fn frame_at(&self, seconds: f64) -> u32 {
        let frame = (seconds.max(0.0) * f64::from(self.rate) / f64::from(self.scale.max(1))).floor();
        (frame.min(f64::from(self.frames.saturating_sub(1)))) as u32
    }

    /// Render `frame` as 24-bit BGR into `buf`: the fill color with a white
    /// column that moves one pixel per frame. Returns bytes written, 0 if
    /// `buf` is too small.
    pub fn render_frame(&self, frame: u32, buf: &mut [u8]) -> usize {
        let size = self.frame_size();
        let Some(out) = buf.get_mut(..size) else {
            return 0;
        };
        let bar = frame.checked_rem(self.width).unwrap_or(0) as usize;
        let [r, g, b] = self.color;
        for row in out.chunks_exact_mut(self.stride()) {
            for (x, pixel) in row.chunks_exact_mut(3).take(self.width as usize).enumerate() {
                let bgr = if x == bar { [255, 255, 255] } else { [b, g, r] };
                pixel.copy_from_slice(&bgr);
            }
        }
        size
    }

    /// Render `length` interleaved 16-bit sample frames of `track` from
    /// `start`. Returns sample frames written.
    #[allow(clippy::cast_precision_loss, reason = "sample positions stay far below 2^52")]
    pub fn render_audio(&self, track: usize, start: u64, length: usize, buf: &mut [u8]) -> usize {
        let Some(tone) = self.tones.get(track) else {
            return 0;
        };
        let remaining = usize::try_from(self.sample_total().saturating_sub(start)).unwrap_or(usize::MAX);
        let block = usize::from(self.channels) * 2;
        let rate = f64::from(self.sample_rate.max(1));
        let mut written = 0;
        for (offset, frame) in buf.chunks_exact_mut(block).take(length.min(remaining)).enumerate() {
            let position = start + offset as u64;
            let value = tone.sample(position as f64 / rate).to_le_bytes();
            for channel in frame.chunks_exact_mut(2) {
                channel.copy_from_slice(&value);
            }
            written += 1;
        }
        written
    }
}
