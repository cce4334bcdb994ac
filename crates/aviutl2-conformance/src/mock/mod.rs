//! In-process stand-ins for the host side of every ABI table.
//!
//! Host callbacks carry no context pointer, so per-call host state lives in
//! thread-local scenes: drive a plugin from one thread per session. Tables
//! the SDK keeps for the whole process (logger, config, edit handle) are
//! statics.

use std::cell::UnsafeCell;

pub mod app;
pub mod config;
pub mod edit;
pub mod filter;
pub mod logger;
pub mod output;
pub mod project;
pub mod script;

pub use app::{MenuEntry, MenuKind, RecordedRegistration, RegistrationState};
pub use edit::{EditScene, EditStats, ObjectSnapshot};
pub use filter::{AudioRun, VideoRun};
pub use logger::{HostLogLevel, LogRecord};
pub use output::{OutputJob, OutputRun};
pub use project::ProjectStore;
pub use script::{ScriptOutcome, ScriptResult, ScriptValue};

/// A raw table with a stable address for the life of the process.
///
/// The host never writes to these tables after construction; plugins only
/// read them.
pub(crate) struct StaticTable<T>(UnsafeCell<T>);

// SAFETY: the contents are plain function pointers and pointers to other
// statics, written once at compile time and never mutated.
unsafe impl<T> Sync for StaticTable<T> {}

impl<T> StaticTable<T> {
    pub(crate) const fn new(table: T) -> Self {
        Self(UnsafeCell::new(table))
    }

    pub(crate) const fn as_ptr(&self) -> *mut T {
        self.0.get()
    }
}

/// Clamp a host-side `i32` count to `usize`.
pub(crate) fn to_usize(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Saturating `usize` to `i32`.
pub(crate) fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Reset every thread-local scene.
pub fn reset_thread_state() {
    edit::reset();
    project::reset();
    app::reset();
}
