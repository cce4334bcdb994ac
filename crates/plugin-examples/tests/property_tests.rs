//! Property-based tests for clip descriptions and color quantization.

use aviutl2_plugin_examples::clip::{ClipError, SolidClip};
use aviutl2_plugin_examples::posterize::{quantize, quantize_sample};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_clip_json_preserves_fields(
        width in 1u32..=4096,
        height in 1u32..=4096,
        frames in 1u32..10_000,
        color: [u8; 3],
    ) {
        let clip = SolidClip { width, height, frames, color, ..SolidClip::default() };
        let text = serde_json::to_string(&clip).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let parsed = SolidClip::from_json(&text).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(parsed, clip);
    }

    #[test]
    fn test_oversized_frames_rejected(width in 4097u32..=u32::MAX) {
        let text = format!(r#"{{"width": {width}}}"#);
        prop_assert!(matches!(SolidClip::from_json(&text), Err(ClipError::Invalid(_))));
    }

    #[test]
    fn test_frame_size_covers_rows(width in 1u32..=4096, height in 1u32..=64) {
        let clip = SolidClip { width, height, ..SolidClip::default() };
        prop_assert_eq!(clip.stride() % 4, 0);
        prop_assert!(clip.stride() >= width as usize * 3);
        prop_assert_eq!(clip.frame_size(), clip.stride() * height as usize);
    }

    #[test]
    fn test_frame_at_stays_in_clip(seconds in -10.0f64..1.0e6, frames in 1u32..1000) {
        let clip = SolidClip { frames, ..SolidClip::default() };
        prop_assert!(clip.frame_at(seconds) < frames);
    }

    #[test]
    fn test_quantize_is_idempotent(value: u8, levels in 2.0f64..=256.0) {
        let once = quantize(value, levels);
        prop_assert_eq!(quantize(once, levels), once);
    }

    #[test]
    fn test_quantize_sample_in_range(sample in -4.0f32..4.0, levels in 2.0f64..=1024.0) {
        let out = quantize_sample(sample, levels);
        prop_assert!((-1.0..=1.0).contains(&out));
    }
}
