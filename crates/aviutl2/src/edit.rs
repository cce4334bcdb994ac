//! Edit sections: the only window in which a plugin may mutate the project.
//!
//! The host holds its edit lock for the duration of an [`EditSection`]. A
//! section cannot be opened while output is running, and opening one from
//! inside another would block the host, so [`EditHandle::call`] refuses both.

use std::cell::Cell;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

use aviutl2_sys as sys;

pub use aviutl2_sys::{EditInfo, ObjectLayerFrame};

use crate::error::{AnyResult, Aviutl2Error, Result};
use crate::plugin::{self, to_i32, to_usize};
use crate::wide::{WideString, read_c_str, to_c_string};

thread_local! {
    static IN_SECTION: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside an edit section.
#[must_use]
pub fn in_edit_section() -> bool {
    IN_SECTION.with(Cell::get)
}

struct SectionGuard {
    previous: bool,
}

impl SectionGuard {
    fn enter() -> Self {
        Self {
            previous: IN_SECTION.with(|s| s.replace(true)),
        }
    }
}

impl Drop for SectionGuard {
    fn drop(&mut self) {
        IN_SECTION.with(|s| s.set(self.previous));
    }
}

/// Handle for requesting edit sections, created by
/// [`HostApp::create_edit_handle`](crate::host::HostApp::create_edit_handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditHandle {
    raw: NonNull<sys::EditHandle>,
}

// SAFETY: the host owns the handle for the lifetime of the plugin and accepts
// requests from any thread.
unsafe impl Send for EditHandle {}
// SAFETY: see above.
unsafe impl Sync for EditHandle {}

struct CallState<F, R> {
    f: Option<F>,
    result: Option<R>,
}

unsafe extern "C" fn call_trampoline<F, R>(param: *mut c_void, edit: *mut sys::EditSection)
where
    F: FnOnce(&mut EditSection<'_>) -> R,
{
    // SAFETY: `param` is the `CallState` that `EditHandle::call` keeps alive
    // on its stack for the duration of the host call.
    let Some(state) = (unsafe { param.cast::<CallState<F, R>>().as_mut() }) else {
        return;
    };
    let Some(f) = state.f.take() else {
        return;
    };
    // SAFETY: the host passes a section valid for this call.
    let Some(mut section) = (unsafe { EditSection::from_raw(edit) }) else {
        return;
    };
    let _guard = SectionGuard::enter();
    state.result = plugin::guard("edit section", None, || Some(f(&mut section)));
}

impl EditHandle {
    /// Wrap a host handle.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `create_edit_handle` and stay valid while the
    /// plugin is loaded.
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut sys::EditHandle) -> Option<Self> {
        NonNull::new(ptr).map(|raw| Self { raw })
    }

    /// Raw handle pointer.
    #[must_use]
    pub fn as_ptr(&self) -> *mut sys::EditHandle {
        self.raw.as_ptr()
    }

    /// Run `f` inside an edit section on the calling thread.
    ///
    /// # Errors
    ///
    /// - [`Aviutl2Error::ReentrantEditSection`] if already inside a section.
    /// - [`Aviutl2Error::EditUnavailable`] if the host refuses (output is
    ///   running). Nothing was mutated.
    /// - [`Aviutl2Error::OperationFailed`] if the host accepted but never ran
    ///   the closure, or the closure panicked.
    pub fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut EditSection<'_>) -> R,
    {
        if in_edit_section() {
            return Err(Aviutl2Error::ReentrantEditSection);
        }
        // SAFETY: valid per the `from_raw` contract.
        let raw = unsafe { self.raw.as_ref() };
        let call = raw
            .call_edit_section_param
            .ok_or(Aviutl2Error::Unsupported("call_edit_section_param"))?;
        let mut state = CallState {
            f: Some(f),
            result: None,
        };
        // SAFETY: `state` outlives the synchronous host call and matches the
        // trampoline's type parameters.
        let accepted = unsafe {
            call(
                (&raw mut state).cast::<c_void>(),
                Some(call_trampoline::<F, R>),
            )
        };
        if !accepted {
            tracing::debug!("host refused edit section");
            return Err(Aviutl2Error::EditUnavailable);
        }
        state
            .result
            .ok_or(Aviutl2Error::OperationFailed("edit section callback did not run"))
    }
}

/// Opaque object reference, valid for the enclosing edit section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle<'a> {
    raw: NonNull<c_void>,
    _section: PhantomData<&'a ()>,
}

impl ObjectHandle<'_> {
    fn new(raw: sys::ObjectHandle) -> Option<Self> {
        NonNull::new(raw).map(|raw| Self {
            raw,
            _section: PhantomData,
        })
    }

    /// Raw host handle.
    #[must_use]
    pub fn as_raw(&self) -> sys::ObjectHandle {
        self.raw.as_ptr()
    }
}

/// Project access inside an edit section.
///
/// Layer and frame numbers are 0-based.
#[derive(Debug)]
pub struct EditSection<'a> {
    raw: &'a sys::EditSection,
}

impl<'a> EditSection<'a> {
    /// Wrap the host's section.
    ///
    /// # Safety
    ///
    /// `raw` must be the pointer passed to the running edit callback.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut sys::EditSection) -> Option<Self> {
        // SAFETY: per the caller contract.
        unsafe { raw.as_ref() }.map(|raw| Self { raw })
    }

    /// Project and cursor snapshot.
    #[must_use]
    pub fn info(&self) -> EditInfo {
        // SAFETY: the host keeps `info` valid for the section.
        unsafe { self.raw.info.as_ref() }.copied().unwrap_or_default()
    }

    /// Create an object from alias data. A `length` of 0 uses the alias's
    /// own length.
    ///
    /// # Errors
    ///
    /// Fails if the alias contains a NUL or the host cannot place it.
    pub fn create_object_from_alias(
        &mut self,
        alias: &str,
        layer: usize,
        frame: usize,
        length: usize,
    ) -> Result<ObjectHandle<'a>> {
        let create = self
            .raw
            .create_object_from_alias
            .ok_or(Aviutl2Error::Unsupported("create_object_from_alias"))?;
        let alias = to_c_string(alias)?;
        // SAFETY: `alias` outlives the call.
        let handle = unsafe { create(alias.as_ptr(), to_i32(layer), to_i32(frame), to_i32(length)) };
        ObjectHandle::new(handle).ok_or(Aviutl2Error::OperationFailed("create_object_from_alias"))
    }

    /// Object on `layer` at or after `frame`.
    #[must_use]
    pub fn find_object(&self, layer: usize, frame: usize) -> Option<ObjectHandle<'a>> {
        let find = self.raw.find_object?;
        // SAFETY: plain integers.
        ObjectHandle::new(unsafe { find(to_i32(layer), to_i32(frame)) })
    }

    /// Number of instances of `effect` on the object.
    #[must_use]
    pub fn count_object_effect(&self, object: ObjectHandle<'a>, effect: &str) -> usize {
        let Some(count) = self.raw.count_object_effect else {
            return 0;
        };
        let effect = WideString::new(effect);
        // SAFETY: handle from this section; `effect` outlives the call.
        to_usize(unsafe { count(object.as_raw(), effect.as_ptr()) })
    }

    /// Layer and frame span of the object.
    #[must_use]
    pub fn object_layer_frame(&self, object: ObjectHandle<'a>) -> ObjectLayerFrame {
        // SAFETY: handle from this section.
        self.raw
            .get_object_layer_frame
            .map(|f| unsafe { f(object.as_raw()) })
            .unwrap_or_default()
    }

    /// Object serialized as alias data.
    #[must_use]
    pub fn object_alias(&self, object: ObjectHandle<'a>) -> Option<String> {
        let get = self.raw.get_object_alias?;
        // SAFETY: handle from this section.
        let ptr = unsafe { get(object.as_raw()) };
        // SAFETY: the string lives until the next call and is copied.
        let alias = unsafe { read_c_str(ptr) }?;
        alias.to_str().ok().map(str::to_string)
    }

    /// Value of `item` in `effect`, in alias text form. `effect` may carry an
    /// index suffix such as `"blur:1"`.
    #[must_use]
    pub fn object_item_value(&self, object: ObjectHandle<'a>, effect: &str, item: &str) -> Option<String> {
        let get = self.raw.get_object_item_value?;
        let effect = WideString::new(effect);
        let item = WideString::new(item);
        // SAFETY: handle from this section; buffers outlive the call.
        let ptr = unsafe { get(object.as_raw(), effect.as_ptr(), item.as_ptr()) };
        // SAFETY: the result is copied at once.
        let value = unsafe { read_c_str(ptr) }?;
        value.to_str().ok().map(str::to_string)
    }

    /// Set `item` in `effect` from alias text.
    ///
    /// # Errors
    ///
    /// Fails if the value contains a NUL or the host rejects it.
    pub fn set_object_item_value(
        &mut self,
        object: ObjectHandle<'a>,
        effect: &str,
        item: &str,
        value: &str,
    ) -> Result<()> {
        let set = self
            .raw
            .set_object_item_value
            .ok_or(Aviutl2Error::Unsupported("set_object_item_value"))?;
        let effect = WideString::new(effect);
        let item = WideString::new(item);
        let value = to_c_string(value)?;
        // SAFETY: handle from this section; buffers outlive the call.
        let ok = unsafe { set(object.as_raw(), effect.as_ptr(), item.as_ptr(), value.as_ptr()) };
        if ok {
            Ok(())
        } else {
            Err(Aviutl2Error::OperationFailed("set_object_item_value"))
        }
    }

    /// Move the object so that it starts at `frame` on `layer`.
    ///
    /// # Errors
    ///
    /// Fails if the destination overlaps another object.
    pub fn move_object(&mut self, object: ObjectHandle<'a>, layer: usize, frame: usize) -> Result<()> {
        let mv = self.raw.move_object.ok_or(Aviutl2Error::Unsupported("move_object"))?;
        // SAFETY: handle from this section.
        if unsafe { mv(object.as_raw(), to_i32(layer), to_i32(frame)) } {
            Ok(())
        } else {
            Err(Aviutl2Error::OperationFailed("move_object"))
        }
    }

    /// Delete the object. The handle must not be used afterwards.
    pub fn delete_object(&mut self, object: ObjectHandle<'a>) {
        if let Some(delete) = self.raw.delete_object {
            // SAFETY: handle from this section.
            unsafe { delete(object.as_raw()) };
        }
    }

    /// Object shown in the settings window.
    #[must_use]
    pub fn focus_object(&self) -> Option<ObjectHandle<'a>> {
        let get = self.raw.get_focus_object?;
        // SAFETY: no arguments.
        ObjectHandle::new(unsafe { get() })
    }

    /// Show the object in the settings window. Applied after the section ends.
    pub fn set_focus_object(&mut self, object: ObjectHandle<'a>) {
        if let Some(set) = self.raw.set_focus_object {
            // SAFETY: handle from this section.
            unsafe { set(object.as_raw()) };
        }
    }

    /// The `index`-th selected object.
    #[must_use]
    pub fn selected_object(&self, index: usize) -> Option<ObjectHandle<'a>> {
        let get = self.raw.get_selected_object?;
        // SAFETY: plain integer.
        ObjectHandle::new(unsafe { get(to_i32(index)) })
    }

    /// All selected objects.
    #[must_use]
    pub fn selected_objects(&self) -> Vec<ObjectHandle<'a>> {
        // SAFETY: no arguments.
        let count = self.raw.get_selected_object_num.map_or(0, |f| to_usize(unsafe { f() }));
        (0..count).filter_map(|i| self.selected_object(i)).collect()
    }
}

/// Body of a menu or button callback.
pub type EditCallbackFn = fn(&mut EditSection<'_>) -> AnyResult<()>;

/// Run a menu or button callback body inside the host's section.
///
/// # Safety
///
/// `edit` must be the pointer the host passed to the running callback.
#[doc(hidden)]
pub unsafe fn __invoke_edit_callback(name: &'static str, edit: *mut sys::EditSection, body: EditCallbackFn) {
    plugin::guard("edit callback", (), || {
        // SAFETY: forwarded caller contract.
        let Some(mut section) = (unsafe { EditSection::from_raw(edit) }) else {
            return;
        };
        let _guard = SectionGuard::enter();
        if let Err(e) = body(&mut section) {
            tracing::error!(callback = name, error = %e, "edit callback failed");
        }
    });
}
