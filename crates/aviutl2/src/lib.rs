//! Safe Rust SDK for AviUtl ExEdit2 plugins.
//!
//! Plugins implement one capability trait and export it with the matching
//! macro:
//!
//! | Trait | Macro | Entry point |
//! |-------|-------|-------------|
//! | [`InputPlugin`] | [`export_input_plugin!`] | `GetInputPluginTable` |
//! | [`OutputPlugin`] | [`export_output_plugin!`] | `GetOutputPluginTable` |
//! | [`FilterPlugin`] | [`export_filter_plugin!`] | `GetFilterPluginTable` |
//! | [`ScriptModule`] | [`export_script_module!`] | `GetScriptModuleTable` |
//! | [`GenericPlugin`] | [`export_generic_plugin!`] | `RegisterPlugin` |
//!
//! Every macro also exports `InitializeLogger`, `InitializeConfig`,
//! `InitializePlugin` and `UninitializePlugin`. The logger hook installs a
//! `tracing` subscriber that forwards events to the host log window, so
//! plugin code logs with the `tracing` macros.
//!
//! # Panics and errors
//!
//! Plugin trait methods return [`AnyResult`]. The bridge turns an error into
//! the ABI's failure value and logs it. A panic inside plugin code is caught
//! at the boundary and treated the same way; it never unwinds into the host.
//!
//! # Example
//!
//! ```rust,ignore
//! use aviutl2::prelude::*;
//!
//! struct Invert;
//!
//! impl FilterPlugin for Invert {
//!     fn new(_info: HostInfo) -> AnyResult<Self> {
//!         Ok(Self)
//!     }
//!
//!     fn plugin_table(&self) -> FilterPluginTable {
//!         FilterPluginTable {
//!             name: "Invert".into(),
//!             label: None,
//!             information: "Invert colors".into(),
//!             flags: FilterPluginFlags::VIDEO,
//!             items: vec![FilterItem::check("Alpha", false)],
//!         }
//!     }
//!
//!     fn proc_video(&self, _config: &FilterConfig, video: &mut VideoFilterContext<'_>) -> AnyResult<()> {
//!         let (w, h) = video.size();
//!         let mut pixels = video.image()?;
//!         for p in &mut pixels {
//!             p.r = 255 - p.r;
//!             p.g = 255 - p.g;
//!             p.b = 255 - p.b;
//!         }
//!         video.set_image(&pixels, w, h)?;
//!         Ok(())
//!     }
//! }
//!
//! aviutl2::export_filter_plugin!(Invert);
//! ```

#![allow(unsafe_code, reason = "FFI bridge to the host C ABI")]
#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use aviutl2_sys as sys;

pub mod config;
pub mod edit;
pub mod error;
pub mod filter;
pub mod host;
pub mod input;
pub mod logger;
mod macros;
pub mod output;
pub mod plugin;
pub mod prelude;
pub mod project;
pub mod script;
pub mod wide;

pub use config::{ConfigHandle, FontInfo};
pub use edit::{EditHandle, EditSection, ObjectHandle, in_edit_section};
pub use error::{AnyResult, Aviutl2Error, Result};
pub use filter::{FilterConfig, FilterItem, FilterPlugin, FilterPluginTable, FilterValue};
pub use host::{GenericPlugin, HostApp, Registrations};
pub use input::{InputPlugin, InputPluginTable};
pub use logger::{HostLogLayer, LogHandle, LogLevel};
pub use output::{OutputPlugin, OutputPluginTable, OutputSession, VideoFormat};
pub use plugin::{FileFilter, HostInfo};
pub use project::ProjectFile;
pub use script::{ScriptCall, ScriptError, ScriptFunction, ScriptModule, ScriptModuleTable};
pub use wide::WideString;
