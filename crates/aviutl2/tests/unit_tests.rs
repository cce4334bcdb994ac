//! Unit tests for the public SDK surface that needs no host.

use aviutl2::filter::{FilterConfig, FilterValue, ObjectCache};
use aviutl2::input::{AudioFormat, AudioInputInfo, TrackKind, VideoInputInfo};
use aviutl2::{Aviutl2Error, FileFilter, HostInfo, LogLevel, VideoFormat, sys};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_only_edit_unavailable_is_recoverable() {
    assert!(Aviutl2Error::EditUnavailable.is_recoverable());
    assert!(!Aviutl2Error::ReentrantEditSection.is_recoverable());
    assert!(!Aviutl2Error::NotInitialized.is_recoverable());
    assert!(!Aviutl2Error::DataTooLarge { size: 5000, max: 4096 }.is_recoverable());
}

#[test]
fn test_error_messages_name_the_limit() {
    let err = Aviutl2Error::DataTooLarge { size: 4097, max: 4096 };
    let text = err.to_string();
    assert!(text.contains("4097"));
    assert!(text.contains("4096"));
}

#[test]
fn test_log_levels_map_from_tracing() {
    assert_eq!(LogLevel::from(&tracing::Level::ERROR), LogLevel::Error);
    assert_eq!(LogLevel::from(&tracing::Level::WARN), LogLevel::Warn);
    assert_eq!(LogLevel::from(&tracing::Level::INFO), LogLevel::Info);
    assert_eq!(LogLevel::from(&tracing::Level::DEBUG), LogLevel::Log);
    assert_eq!(LogLevel::from(&tracing::Level::TRACE), LogLevel::Verbose);
}

#[test]
fn test_file_filter_encoding() {
    let encoded = FileFilter::encode(&[
        FileFilter::new("Video", &["mp4", "mkv"]),
        FileFilter::new("All", &[]),
    ]);
    assert_eq!(
        encoded.to_string_lossy(),
        "Video (*.mp4;*.mkv)\0*.mp4;*.mkv\0All (*.*)\0*.*\0"
    );
}

#[test]
fn test_video_format_tags() {
    assert_eq!(VideoFormat::Rgb24.fourcc(), sys::video_format::BI_RGB);
    assert_eq!(VideoFormat::Pa64.fourcc(), sys::video_format::PA64);
    assert_eq!(VideoFormat::Hf64.fourcc(), sys::video_format::HF64);
    // 3 px * 3 bytes = 9, padded to 12 per row.
    assert_eq!(VideoFormat::Rgb24.frame_size(3, 1), 12);
    assert_eq!(VideoFormat::Hf64.frame_size(2, 2), 32);
}

#[test]
fn test_input_frame_and_block_sizes() {
    let video = VideoInputInfo {
        width: 3,
        height: -2,
        rate: 30,
        scale: 1,
        frames: 10,
        bit_count: 24,
        format: sys::video_format::BI_RGB,
    };
    assert_eq!(video.frame_size(), 24);
    let yuy2 = VideoInputInfo {
        bit_count: 16,
        format: sys::video_format::YUY2,
        ..video
    };
    assert_eq!(yuy2.frame_size(), 12);

    let audio = AudioInputInfo {
        sample_rate: 48_000,
        channels: 2,
        samples: 48_000,
        format: AudioFormat::Float32,
    };
    assert_eq!(audio.block_align(), 8);
    assert_eq!(AudioFormat::Pcm16.format_tag(), sys::audio_format::PCM);
}

#[test]
fn test_track_kind_from_raw() {
    assert_eq!(TrackKind::from_raw(0), Some(TrackKind::Video));
    assert_eq!(TrackKind::from_raw(1), Some(TrackKind::Audio));
    assert_eq!(TrackKind::from_raw(2), None);
}

#[test]
fn test_filter_config_accessors() {
    let config = FilterConfig::from_values(vec![
        ("Size".to_string(), FilterValue::Track(12.5)),
        ("On".to_string(), FilterValue::Check(true)),
    ]);
    assert_eq!(config.track("Size"), Some(12.5));
    assert_eq!(config.check("On"), Some(true));
    assert_eq!(config.check("Size"), None);
    assert_eq!(config.values().count(), 2);
}

#[test]
fn test_object_cache_per_effect() {
    let cache: ObjectCache<u32> = ObjectCache::with_capacity(2);
    cache.with(1, || 0, |v| *v += 1);
    cache.with(1, || 0, |v| *v += 1);
    cache.with(2, || 10, |v| *v += 1);
    assert_eq!(cache.with(1, || 0, |v| *v), 2);
    assert_eq!(cache.remove(2), Some(11));
    assert_eq!(cache.len(), 1);
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_host_info_without_config() -> TestResult {
    let info = HostInfo::new(2_003_000);
    assert_eq!(info.version, 2_003_000);
    assert!(!aviutl2::plugin::is_initialized());
    Ok(())
}
