//! Common imports for code working against the raw ABI.

pub use crate::constants::{
    MAX_FILTER_DATA_SIZE, MAX_LOG_MESSAGE_LEN, MAX_PROJECT_BINARY_SIZE, audio_format, item_type,
    make_fourcc, video_format,
};
pub use crate::entry::*;
pub use crate::{
    BitmapInfoHeader, ConfigHandle, EditHandle, EditInfo, EditSection, FilterPluginFlags,
    FilterPluginTable, FilterProcAudio, FilterProcVideo, HostAppTable, InputHandle, InputInfo,
    InputInfoFlags, InputPluginFlags, InputPluginTable, LogHandle, ObjectHandle, ObjectInfo,
    ObjectLayerFrame, OutputInfo, OutputInfoFlags, OutputPluginFlags, OutputPluginTable,
    PixelRgba, ProjectFile, SceneInfo, ScriptModuleFunction, ScriptModuleParam, ScriptModuleTable,
    WChar, WaveFormatEx,
};
