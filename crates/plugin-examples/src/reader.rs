//! Input plugin for `.sclip` files.

use std::path::Path;

use aviutl2::prelude::*;
use aviutl2::sys::video_format;

use crate::clip::{EXTENSION, SolidClip};

/// Reads `.sclip` descriptions as 24-bit video plus one audio track per tone.
#[derive(Debug, Default)]
pub struct SolidClipReader;

/// One open clip.
#[derive(Debug)]
pub struct ClipHandle {
    clip: SolidClip,
    track: usize,
}

impl InputPlugin for SolidClipReader {
    type Handle = ClipHandle;

    fn new(_info: HostInfo) -> AnyResult<Self> {
        Ok(Self)
    }

    fn plugin_table(&self) -> InputPluginTable {
        InputPluginTable {
            name: "Solid Clip Reader".into(),
            file_filters: vec![FileFilter::new("Solid clip", &[EXTENSION])],
            information: "Solid color clips with sine tracks".into(),
            flags: InputPluginFlags::VIDEO
                | InputPluginFlags::AUDIO
                | InputPluginFlags::CONCURRENT
                | InputPluginFlags::MULTI_TRACK,
            time_to_frame: true,
        }
    }

    fn open(&self, path: &Path) -> AnyResult<ClipHandle> {
        let clip = SolidClip::from_path(path)?;
        tracing::debug!(path = %path.display(), frames = clip.frames, tracks = clip.tones.len(), "clip opened");
        Ok(ClipHandle { clip, track: 0 })
    }

    fn info(&self, handle: &mut ClipHandle) -> AnyResult<InputInfo> {
        let clip = &handle.clip;
        let video = VideoInputInfo {
            width: i32::try_from(clip.width)?,
            height: i32::try_from(clip.height)?,
            rate: i32::try_from(clip.rate)?,
            scale: i32::try_from(clip.scale)?,
            frames: i32::try_from(clip.frames)?,
            bit_count: 24,
            format: video_format::BI_RGB,
        };
        let audio = (!clip.tones.is_empty())
            .then(|| -> AnyResult<AudioInputInfo> {
                Ok(AudioInputInfo {
                    sample_rate: clip.sample_rate,
                    channels: clip.channels,
                    samples: i32::try_from(clip.sample_total())?,
                    format: AudioFormat::Pcm16,
                })
            })
            .transpose()?;
        Ok(InputInfo {
            video: Some(video),
            audio,
            time_to_frame: true,
        })
    }

    fn read_video(&self, handle: &mut ClipHandle, frame: usize, buf: &mut [u8]) -> AnyResult<usize> {
        let frame = u32::try_from(frame)?;
        if frame >= handle.clip.frames {
            return Err(format!("frame {frame} past the end").into());
        }
        Ok(handle.clip.render_frame(frame, buf))
    }

    fn read_audio(&self, handle: &mut ClipHandle, start: usize, length: usize, buf: &mut [u8]) -> AnyResult<usize> {
        Ok(handle.clip.render_audio(handle.track, u64::try_from(start)?, length, buf))
    }

    fn track_count(&self, handle: &mut ClipHandle, kind: TrackKind) -> AnyResult<usize> {
        Ok(match kind {
            TrackKind::Video => 1,
            TrackKind::Audio => handle.clip.tones.len(),
        })
    }

    fn select_track(&self, handle: &mut ClipHandle, kind: TrackKind, index: usize) -> AnyResult<usize> {
        match kind {
            TrackKind::Video if index == 0 => Ok(0),
            TrackKind::Audio if index < handle.clip.tones.len() => {
                handle.track = index;
                Ok(index)
            }
            _ => Err(format!("no {kind:?} track {index}").into()),
        }
    }

    fn time_to_frame(&self, handle: &mut ClipHandle, seconds: f64) -> AnyResult<usize> {
        Ok(handle.clip.frame_at(seconds) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn open_default() -> Result<(SolidClipReader, ClipHandle, tempfile::TempDir), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("clip.sclip");
        std::fs::write(&path, serde_json::to_string(&SolidClip::default())?)?;
        let reader = SolidClipReader;
        let handle = reader.open(&path).map_err(|e| e.to_string())?;
        Ok((reader, handle, dir))
    }

    #[test]
    fn test_info_describes_clip() -> TestResult {
        let (reader, mut handle, _dir) = open_default()?;
        let info = reader.info(&mut handle).map_err(|e| e.to_string())?;
        let video = info.video.ok_or("no video")?;
        assert_eq!((video.width, video.height, video.frames), (64, 36, 90));
        assert_eq!(video.frame_size(), 64 * 3 * 36);
        let audio = info.audio.ok_or("no audio")?;
        assert_eq!(audio.samples, 90 * 1600);
        assert_eq!(audio.block_align(), 4);
        Ok(())
    }

    #[test]
    fn test_track_selection() -> TestResult {
        let (reader, mut handle, _dir) = open_default()?;
        assert_eq!(reader.track_count(&mut handle, TrackKind::Audio).map_err(|e| e.to_string())?, 2);
        assert!(matches!(reader.select_track(&mut handle, TrackKind::Audio, 1), Ok(1)));
        assert!(matches!(reader.select_track(&mut handle, TrackKind::Audio, 2), Err(_)));
        assert!(matches!(reader.select_track(&mut handle, TrackKind::Video, 1), Err(_)));
        Ok(())
    }

    #[test]
    fn test_read_past_end_fails() -> TestResult {
        let (reader, mut handle, _dir) = open_default()?;
        let mut buf = vec![0u8; handle.clip.frame_size()];
        assert!(matches!(reader.read_video(&mut handle, 89, &mut buf), Ok(n) if n == buf.len()));
        assert!(matches!(reader.read_video(&mut handle, 90, &mut buf), Err(_)));
        Ok(())
    }
}
