//! Filter plugin reducing color levels and, optionally, audio resolution.

use aviutl2::prelude::*;

const DEFAULT_LEVELS: f64 = 4.0;
const DEFAULT_AUDIO_LEVELS: f64 = 16.0;

/// Round `value` to one of `levels` evenly spaced steps in `0..=255`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "result is within 0..=255")]
pub fn quantize(value: u8, levels: f64) -> u8 {
    let steps = levels.max(2.0).round() - 1.0;
    let level = (f64::from(value) / 255.0 * steps).round();
    (level / steps * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Round `sample` to one of `levels` steps in `-1.0..=1.0`.
#[allow(clippy::cast_possible_truncation, reason = "f32 precision is enough for audio")]
pub fn quantize_sample(sample: f32, levels: f64) -> f32 {
    let steps = levels.max(2.0).round() - 1.0;
    let unit = (f64::from(sample.clamp(-1.0, 1.0)) + 1.0) / 2.0;
    ((unit * steps).round() / steps * 2.0 - 1.0) as f32
}

/// Posterize filter.
#[derive(Debug, Default)]
pub struct Posterize {
    blocks: ObjectCache<u64>,
}

impl Posterize {
    /// Audio blocks processed for the effect instance `effect_id`.
    pub fn audio_blocks(&self, effect_id: i64) -> u64 {
        self.blocks.with(effect_id, || 0, |count| *count)
    }
}

impl FilterPlugin for Posterize {
    fn new(_info: HostInfo) -> AnyResult<Self> {
        Ok(Self::default())
    }

    fn plugin_table(&self) -> FilterPluginTable {
        FilterPluginTable {
            name: "Posterize".into(),
            label: Some("Color".into()),
            information: "Reduce color levels".into(),
            flags: FilterPluginFlags::VIDEO | FilterPluginFlags::AUDIO | FilterPluginFlags::FILTER,
            items: vec![
                FilterItem::track("Levels", DEFAULT_LEVELS, 2.0, 32.0, 1.0),
                FilterItem::check("Keep alpha", true),
                FilterItem::group("Audio", false),
                FilterItem::check("Crush audio", false),
                FilterItem::track("Audio levels", DEFAULT_AUDIO_LEVELS, 2.0, 256.0, 1.0),
            ],
        }
    }

    fn proc_video(&self, config: &FilterConfig, video: &mut VideoFilterContext<'_>) -> AnyResult<()> {
        let levels = config.track("Levels").unwrap_or(DEFAULT_LEVELS);
        let keep_alpha = config.check("Keep alpha").unwrap_or(true);
        let (width, height) = video.size();
        let mut pixels = video.image()?;
        for pixel in &mut pixels {
            pixel.r = quantize(pixel.r, levels);
            pixel.g = quantize(pixel.g, levels);
            pixel.b = quantize(pixel.b, levels);
            if !keep_alpha {
                pixel.a = quantize(pixel.a, levels);
            }
        }
        video.set_image(&pixels, width, height)?;
        Ok(())
    }

    fn proc_audio(&self, config: &FilterConfig, audio: &mut AudioFilterContext<'_>) -> AnyResult<()> {
        let effect = audio.object().effect_id;
        self.blocks.with(effect, || 0, |count| *count += 1);
        if !config.check("Crush audio").unwrap_or(false) {
            return Ok(());
        }
        let levels = config.track("Audio levels").unwrap_or(DEFAULT_AUDIO_LEVELS);
        for channel in 0..audio.channel_count() {
            let samples: Vec<f32> = audio
                .samples(channel)?
                .into_iter()
                .map(|s| quantize_sample(s, levels))
                .collect();
            audio.set_samples(channel, &samples)?;
        }
        Ok(())
    }
}
