//! Sample AviUtl ExEdit2 plugin: the "Solid Clip Toolkit".
//!
//! One `RegisterPlugin` export registers every module kind the SDK offers:
//!
//! - [`reader::SolidClipReader`]: input for `.sclip` clip descriptions,
//!   multi-track and safe for concurrent reads.
//! - [`digest::FrameDigest`]: output writing FNV-1a digests per frame.
//! - [`posterize::Posterize`]: video and audio filter.
//! - [`math::ClipMath`]: script module `clip_math`.
//! - Layer and object menus from [`menus`].
//!
//! Settings persist in the project file.

#![allow(unsafe_code, reason = "host entry points are exported with #[unsafe(no_mangle)]")]

pub mod clip;
pub mod digest;
pub mod math;
pub mod menus;
pub mod posterize;
pub mod reader;

use serde::{Deserialize, Serialize};

use aviutl2::prelude::*;

/// Project key holding [`Settings`] as JSON.
pub const SETTINGS_KEY: &str = "solid-clip-toolkit.settings";
/// Project key holding the palette as binary.
pub const PALETTE_KEY: &str = "solid-clip-toolkit.palette";

/// Persistent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Length of inserted clips in frames.
    pub clip_length: usize,
    /// Color of inserted clips.
    pub color: [u8; 3],
    /// Clips inserted so far.
    pub inserted: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clip_length: 60,
            color: [32, 96, 200],
            inserted: 0,
        }
    }
}

/// Recently used colors, stored as 8 RGB triples plus a count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Palette {
    colors: [[u8; 3]; 8],
    len: u8,
}

impl Palette {
    const BYTES: usize = 25;

    /// Put `color` first, dropping the oldest entry when full.
    pub fn remember(&mut self, color: [u8; 3]) {
        let mut next = [[0u8; 3]; 8];
        let mut len = 0;
        for c in std::iter::once(color).chain(self.colors().iter().copied().filter(|c| *c != color)) {
            if let Some(slot) = next.get_mut(len) {
                *slot = c;
                len += 1;
            }
        }
        self.colors = next;
        self.len = u8::try_from(len).unwrap_or(8);
    }

    /// Stored colors, most recent first.
    pub fn colors(&self) -> &[[u8; 3]] {
        self.colors.get(..usize::from(self.len)).unwrap_or(&[])
    }

    fn to_bytes(self) -> [u8; Self::BYTES] {
        let mut out = [0u8; Self::BYTES];
        for (chunk, color) in out.chunks_exact_mut(3).zip(self.colors) {
            chunk.copy_from_slice(&color);
        }
        if let Some(last) = out.last_mut() {
            *last = self.len;
        }
        out
    }

    fn from_bytes(bytes: [u8; Self::BYTES]) -> Self {
        let mut palette = Self::default();
        for (color, chunk) in palette.colors.iter_mut().zip(bytes.chunks_exact(3)) {
            color.copy_from_slice(chunk);
        }
        palette.len = bytes.last().copied().unwrap_or(0).min(8);
        palette
    }
}

/// The generic plugin tying the modules together.
#[derive(Debug, Default)]
pub struct SolidClipToolkit {
    settings: Settings,
    palette: Palette,
}

impl SolidClipToolkit {
    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl GenericPlugin for SolidClipToolkit {
    fn new(info: HostInfo) -> AnyResult<Self> {
        tracing::info!(host = info.version, "solid clip toolkit loading");
        let mut palette = Palette::default();
        palette.remember(Settings::default().color);
        Ok(Self {
            settings: Settings::default(),
            palette,
        })
    }

    fn register(&mut self, host: &mut HostApp<'_>) -> AnyResult<()> {
        host.set_plugin_information("Solid Clip Toolkit 0.1")?;
        host.register_input_plugin::<reader::SolidClipReader>()?;
        host.register_output_plugin::<digest::FrameDigest>()?;
        host.register_filter_plugin::<posterize::Posterize>()?;
        host.register_script_module::<math::ClipMath>()?;
        host.register_layer_menu("Insert solid clip", aviutl2::edit_callback!(menus::insert_clip))?;
        host.register_object_menu("Push down one layer", aviutl2::edit_callback!(menus::push_down))?;
        Ok(())
    }

    fn on_project_load(&mut self, project: &mut ProjectFile<'_>) -> AnyResult<()> {
        if let Some(settings) = project.json::<Settings>(SETTINGS_KEY)? {
            self.settings = settings;
        }
        if let Some(bytes) = project.binary::<{ Palette::BYTES }>(PALETTE_KEY)? {
            self.palette = Palette::from_bytes(bytes);
        }
        Ok(())
    }

    fn on_project_save(&mut self, project: &mut ProjectFile<'_>) -> AnyResult<()> {
        project.set_json(SETTINGS_KEY, &self.settings)?;
        project.set_binary(PALETTE_KEY, &self.palette.to_bytes())?;
        Ok(())
    }
}

aviutl2::export_generic_plugin!(SolidClipToolkit, required_version = 2_003_000);
