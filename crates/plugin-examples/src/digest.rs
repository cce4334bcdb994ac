//! Output plugin writing per-frame digests as JSON.

use parking_lot::Mutex;
use serde::Serialize;

use aviutl2::prelude::*;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const AUDIO_BLOCK: usize = 4800;

/// Continue an FNV-1a hash over `bytes`.
pub fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// What one job produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    /// Hash of each video frame, in frame order.
    pub frames: Vec<u64>,
    /// Hash over all audio samples.
    pub audio: Option<u64>,
    /// Whether the job stopped on an abort request.
    pub aborted: bool,
}

/// Writes a JSON digest of every frame instead of encoding media.
#[derive(Debug, Default)]
pub struct FrameDigest {
    last: Mutex<Option<DigestReport>>,
}

impl FrameDigest {
    /// Report of the most recent job.
    pub fn last_report(&self) -> Option<DigestReport> {
        self.last.lock().clone()
    }

    fn digest(session: &mut OutputSession<'_>) -> AnyResult<DigestReport> {
        let mut report = DigestReport::default();
        if let Some(video) = session.video() {
            let mut frames = session.frames();
            for frame in frames.by_ref() {
                let data = session
                    .video_frame(frame, VideoFormat::Rgb24)
                    .ok_or_else(|| format!("host returned no data for frame {frame}"))?;
                report.frames.push(fnv1a(FNV_OFFSET, data));
                session.rest_time(frame + 1, video.frames);
            }
            report.aborted = frames.aborted();
        }
        if report.aborted {
            return Ok(report);
        }
        if let Some(audio) = session.audio() {
            let mut hash = FNV_OFFSET;
            let mut position = 0;
            while position < audio.samples {
                if session.is_abort() {
                    report.aborted = true;
                    break;
                }
                let length = AUDIO_BLOCK.min(audio.samples - position);
                let samples = session
                    .audio_pcm16(position, length)
                    .ok_or_else(|| format!("host returned no audio at {position}"))?;
                for sample in samples {
                    hash = fnv1a(hash, &sample.to_le_bytes());
                }
                position += length;
            }
            report.audio = Some(hash);
        }
        Ok(report)
    }
}

impl OutputPlugin for FrameDigest {
    fn new(_info: HostInfo) -> AnyResult<Self> {
        Ok(Self::default())
    }

    fn plugin_table(&self) -> OutputPluginTable {
        OutputPluginTable {
            name: "Frame Digest".into(),
            file_filters: vec![FileFilter::new("Digest JSON", &["json"])],
            information: "Writes FNV-1a digests of every frame".into(),
            flags: OutputPluginFlags::VIDEO | OutputPluginFlags::AUDIO,
        }
    }

    fn output(&self, session: &mut OutputSession<'_>) -> AnyResult<()> {
        session.set_buffer_size(2, 2);
        let report = Self::digest(session)?;
        let path = session.save_path();
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        tracing::info!(
            path = %path.display(),
            frames = report.frames.len(),
            aborted = report.aborted,
            "digest written"
        );
        *self.last.lock() = Some(report);
        Ok(())
    }

    fn config_text(&self) -> Option<String> {
        Some(String::from("FNV-1a, 24-bit RGB"))
    }
}
