//! Mock host and conformance checks for AviUtl ExEdit2 plugins.
//!
//! The harness loads a plugin library (or takes in-process entry points),
//! drives it through the host lifecycle against mock host tables, and
//! records what it did:
//!
//! - [`loader`] resolves the exported entry points with `libloading`.
//! - [`mock`] implements every host-side table: logger, config, host app
//!   registration, edit sections, project files, script parameters,
//!   output jobs and filter blocks.
//! - [`session`] runs `RequiredVersion`, the initialize hooks, registration
//!   and unload, and drives input handles.
//! - [`checks`] turns observed behavior into a [`ConformanceReport`].
//!
//! ```rust,ignore
//! use aviutl2_conformance::{ConformanceConfig, run_library};
//!
//! let report = run_library("plugin.aux2".as_ref(), &ConformanceConfig::default())?;
//! assert!(report.passed());
//! ```
//!
//! Host callbacks carry no context pointer, so mock state is per thread.
//! Run one plugin per thread at a time.

#![allow(unsafe_code, reason = "calls into plugin libraries over the host C ABI")]
#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod checks;
pub mod config;
pub mod error;
pub mod loader;
pub mod mock;
pub mod report;
pub mod runner;
pub mod session;

pub use config::{ConformanceConfig, DEFAULT_HOST_VERSION};
pub use error::{ConformanceError, Result};
pub use loader::{EntryPoints, LifecycleEvent, LifecycleLog, PluginLibrary};
pub use report::{CheckOutcome, CheckStatus, ConformanceReport};
pub use runner::{check_names, ensure_passed, run_entry_points, run_library};
pub use session::{InputModule, InputSession, PluginSession, RegistrationSummary, TrackMonitor};
