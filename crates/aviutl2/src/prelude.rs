//! Convenience re-exports for plugin authors.

pub use crate::config::{ConfigHandle, FontInfo};
pub use crate::edit::{EditHandle, EditInfo, EditSection, ObjectHandle, ObjectLayerFrame};
pub use crate::error::{AnyResult, Aviutl2Error};
pub use crate::filter::{
    AudioFilterContext, FilterConfig, FilterItem, FilterPlugin, FilterPluginTable, FilterValue,
    ObjectCache, VideoFilterContext,
};
pub use crate::host::{GenericPlugin, HostApp};
pub use crate::input::{
    AudioFormat, AudioInputInfo, InputInfo, InputPlugin, InputPluginTable, TrackKind,
    VideoInputInfo,
};
pub use crate::output::{OutputPlugin, OutputPluginTable, OutputSession, VideoFormat};
pub use crate::plugin::{FileFilter, HostInfo};
pub use crate::project::ProjectFile;
pub use crate::script::{ScriptCall, ScriptError, ScriptModule, ScriptModuleTable};
pub use aviutl2_sys::{
    FilterPluginFlags, Hwnd, InputPluginFlags, ObjectInfo, OutputPluginFlags, PixelRgba, SceneInfo,
};
