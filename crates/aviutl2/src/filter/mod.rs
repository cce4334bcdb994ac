//! Filter plugins.
//!
//! Implement [`FilterPlugin`] and export it with
//! [`crate::export_filter_plugin!`] (a DLL with a single filter) or register
//! it from a [`crate::GenericPlugin`] through
//! [`crate::HostApp::register_filter_plugin`].

pub mod cache;
pub mod context;
pub mod items;

pub use cache::ObjectCache;
pub use context::{AudioFilterContext, Texture2d, VideoFilterContext};
pub use items::{FilterConfig, FilterItem, FilterItemArray, FilterValue};

use aviutl2_sys::{self as sys, FilterPluginFlags};

use crate::error::{AnyResult, Aviutl2Error, Result};
use crate::plugin::{self, HostInfo, RawBox, report};
use crate::wide::WideString;

/// Filter plugin description.
#[derive(Debug, Clone)]
pub struct FilterPluginTable {
    /// Plugin name.
    pub name: String,
    /// Menu category, `None` for the host default.
    pub label: Option<String>,
    /// Plugin information.
    pub information: String,
    /// Capabilities; must include `VIDEO` or `AUDIO`.
    pub flags: FilterPluginFlags,
    /// Settings shown in the object settings window.
    pub items: Vec<FilterItem>,
}

/// A video and/or audio filter.
///
/// The plugin value is shared by every process call, possibly from several
/// threads, so methods take `&self`. Keep per-object state in an
/// [`ObjectCache`].
pub trait FilterPlugin: Send + Sync + Sized + 'static {
    /// Create the plugin.
    fn new(info: HostInfo) -> AnyResult<Self>;

    /// Describe the plugin and its settings.
    fn plugin_table(&self) -> FilterPluginTable;

    /// Process one video frame.
    fn proc_video(
        &self,
        _config: &FilterConfig,
        _video: &mut VideoFilterContext<'_>,
    ) -> AnyResult<()> {
        Ok(())
    }

    /// Process one audio block.
    fn proc_audio(
        &self,
        _config: &FilterConfig,
        _audio: &mut AudioFilterContext<'_>,
    ) -> AnyResult<()> {
        Ok(())
    }
}

struct FilterState<F> {
    plugin: F,
    items: FilterItemArray,
    table: RawBox<sys::FilterPluginTable>,
    _strings: Vec<WideString>,
}

/// Create `F`, lay out its table and store it for the trampolines.
pub(crate) fn install<F: FilterPlugin>(info: HostInfo) -> Result<*mut sys::FilterPluginTable> {
    let plugin = F::new(info).map_err(|e| Aviutl2Error::Plugin(e.to_string()))?;
    let desc = plugin.plugin_table();
    if !desc
        .flags
        .intersects(FilterPluginFlags::VIDEO | FilterPluginFlags::AUDIO)
    {
        return Err(Aviutl2Error::Plugin(format!(
            "filter {:?} declares neither VIDEO nor AUDIO",
            desc.name
        )));
    }
    let items = FilterItemArray::build(&desc.items)?;
    let name = WideString::new(&desc.name);
    let label = desc.label.as_deref().map(WideString::new);
    let information = WideString::new(&desc.information);
    let table = RawBox::new(sys::FilterPluginTable {
        flag: desc.flags.bits(),
        name: name.as_ptr(),
        label: label.as_ref().map_or(std::ptr::null(), WideString::as_ptr),
        information: information.as_ptr(),
        items: items.as_raw(),
        func_proc_video: desc
            .flags
            .contains(FilterPluginFlags::VIDEO)
            .then_some(proc_video::<F> as unsafe extern "C" fn(_) -> _),
        func_proc_audio: desc
            .flags
            .contains(FilterPluginFlags::AUDIO)
            .then_some(proc_audio::<F> as unsafe extern "C" fn(_) -> _),
    });
    let mut strings = vec![name, information];
    strings.extend(label);
    let ptr = table.as_ptr();
    plugin::install(FilterState {
        plugin,
        items,
        table,
        _strings: strings,
    })?;
    tracing::info!(filter = %desc.name, items = desc.items.len(), "filter plugin ready");
    Ok(ptr)
}

/// Run `f` with the installed instance of `F`.
///
/// # Errors
///
/// Returns [`Aviutl2Error::NotInitialized`] if `F` is not installed.
pub fn with_instance<F: FilterPlugin, R>(f: impl FnOnce(&F) -> R) -> Result<R> {
    let state = plugin::state::<FilterState<F>>()?;
    Ok(f(&state.plugin))
}

unsafe extern "C" fn proc_video<F: FilterPlugin>(video: *mut sys::FilterProcVideo) -> bool {
    plugin::guard("func_proc_video", false, || {
        let state = match plugin::state::<FilterState<F>>() {
            Ok(state) => state,
            Err(e) => {
                report("func_proc_video", &e);
                return false;
            }
        };
        // SAFETY: the host passes a struct valid for this call.
        let Some(mut ctx) = (unsafe { VideoFilterContext::from_raw(video) }) else {
            return false;
        };
        let config = state.items.snapshot();
        match state.plugin.proc_video(&config, &mut ctx) {
            Ok(()) => true,
            Err(e) => {
                report("func_proc_video", &e);
                false
            }
        }
    })
}

unsafe extern "C" fn proc_audio<F: FilterPlugin>(audio: *mut sys::FilterProcAudio) -> bool {
    plugin::guard("func_proc_audio", false, || {
        let state = match plugin::state::<FilterState<F>>() {
            Ok(state) => state,
            Err(e) => {
                report("func_proc_audio", &e);
                return false;
            }
        };
        // SAFETY: the host passes a struct valid for this call.
        let Some(mut ctx) = (unsafe { AudioFilterContext::from_raw(audio) }) else {
            return false;
        };
        let config = state.items.snapshot();
        match state.plugin.proc_audio(&config, &mut ctx) {
            Ok(()) => true,
            Err(e) => {
                report("func_proc_audio", &e);
                false
            }
        }
    })
}

#[doc(hidden)]
pub fn __initialize<F: FilterPlugin>(version: u32) -> bool {
    plugin::guard("InitializePlugin", false, || {
        plugin::clear();
        match install::<F>(HostInfo::new(version)) {
            Ok(_) => true,
            Err(e) => {
                report("InitializePlugin", &e);
                false
            }
        }
    })
}

#[doc(hidden)]
pub fn __table<F: FilterPlugin>() -> *mut sys::FilterPluginTable {
    plugin::state::<FilterState<F>>().map_or(std::ptr::null_mut(), |state| state.table.as_ptr())
}
