//! Property-based tests for string conversion, size ceilings and script
//! result ordering.

#![allow(unsafe_code, reason = "tests drive the raw host tables")]

use std::cell::RefCell;
use std::ffi::{CStr, c_char, c_void};

use aviutl2::script::{ScriptCall, ScriptError};
use aviutl2::{Aviutl2Error, FileFilter, FilterItem, ProjectFile, WideString, sys};
use aviutl2::filter::FilterItemArray;
use proptest::prelude::*;

thread_local! {
    static STORED: RefCell<Option<usize>> = const { RefCell::new(None) };
    static RESULTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

unsafe extern "C" fn store_binary(_key: *const c_char, _data: *mut c_void, size: i32) {
    STORED.with(|s| *s.borrow_mut() = usize::try_from(size).ok());
}

fn project_table() -> sys::ProjectFile {
    sys::ProjectFile {
        get_param_string: None,
        set_param_string: None,
        get_param_binary: None,
        set_param_binary: Some(store_binary),
        clear_params: None,
    }
}

fn record(entry: String) {
    RESULTS.with(|r| r.borrow_mut().push(entry));
}

unsafe extern "C" fn push_int(value: i32) {
    record(format!("i{value}"));
}

unsafe extern "C" fn push_bool(value: bool) {
    record(format!("b{value}"));
}

unsafe extern "C" fn push_string(value: *const c_char) {
    // SAFETY: the SDK passes a NUL-terminated string.
    let s = unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned();
    record(format!("s{s}"));
}

fn script_table() -> sys::ScriptModuleParam {
    sys::ScriptModuleParam {
        get_param_num: None,
        get_param_int: None,
        get_param_double: None,
        get_param_string: None,
        get_param_data: None,
        get_param_table_int: None,
        get_param_table_double: None,
        get_param_table_string: None,
        get_param_array_num: None,
        get_param_array_int: None,
        get_param_array_double: None,
        get_param_array_string: None,
        push_result_int: Some(push_int),
        push_result_double: None,
        push_result_string: Some(push_string),
        push_result_data: None,
        push_result_table_int: None,
        push_result_table_double: None,
        push_result_table_string: None,
        push_result_array_int: None,
        push_result_array_double: None,
        push_result_array_string: None,
        set_error: None,
        get_param_boolean: None,
        push_result_boolean: Some(push_bool),
        get_param_table_boolean: None,
    }
}

#[derive(Debug, Clone)]
enum Push {
    Int(i32),
    Bool(bool),
    Str(String),
}

fn push_strategy() -> impl Strategy<Value = Push> {
    prop_oneof![
        any::<i32>().prop_map(Push::Int),
        any::<bool>().prop_map(Push::Bool),
        "[a-z0-9 ]{0,12}".prop_map(Push::Str),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_wide_string_round_trip(s in "[^\\x00]{0,64}") {
        let wide = WideString::new(&s);
        prop_assert_eq!(wide.to_string_lossy(), s.clone());
        prop_assert_eq!(wide.as_units_with_nul().last(), Some(&0));
        prop_assert_eq!(wide.len(), s.encode_utf16().count());
    }

    #[test]
    fn prop_project_binary_ceiling(size in 0usize..=8192) {
        STORED.with(|s| *s.borrow_mut() = None);
        let mut raw = project_table();
        // SAFETY: `raw` outlives the file.
        let file = unsafe { ProjectFile::from_raw(&mut raw) };
        let Some(mut file) = file else {
            return Err(TestCaseError::fail("null project"));
        };
        let data = vec![0u8; size];
        let result = file.set_binary("k", &data);
        if size <= sys::MAX_PROJECT_BINARY_SIZE {
            prop_assert!(matches!(result, Ok(())));
            prop_assert_eq!(STORED.with(|s| *s.borrow()), Some(size));
        } else {
            let rejected = matches!(result, Err(Aviutl2Error::DataTooLarge { max: 4096, .. }));
            prop_assert!(rejected);
            prop_assert_eq!(STORED.with(|s| *s.borrow()), None);
        }
    }

    #[test]
    fn prop_script_results_keep_push_order(pushes in prop::collection::vec(push_strategy(), 0..16)) {
        RESULTS.with(|r| r.borrow_mut().clear());
        let mut raw = script_table();
        // SAFETY: `raw` outlives the call.
        let call = unsafe { ScriptCall::from_raw(&mut raw) };
        let Some(mut call) = call else {
            return Err(TestCaseError::fail("null param"));
        };
        let mut expected = Vec::new();
        for push in &pushes {
            match push {
                Push::Int(v) => {
                    call.push_int(*v);
                    expected.push(format!("i{v}"));
                }
                Push::Bool(v) => {
                    call.push_bool(*v);
                    expected.push(format!("b{v}"));
                }
                Push::Str(v) => {
                    call.push_str(v).map_err(|e| TestCaseError::fail(e.to_string()))?;
                    expected.push(format!("s{v}"));
                }
            }
        }
        prop_assert_eq!(RESULTS.with(|r| r.borrow().clone()), expected);
    }

    #[test]
    fn prop_track_default_is_clamped(
        default in -1000.0f64..1000.0,
        min in -100.0f64..0.0,
        span in 0.0f64..200.0,
    ) {
        let max = min + span;
        let array = FilterItemArray::build(&[FilterItem::track("T", default, min, max, 0.01)])
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let value = array.snapshot().track("T").unwrap_or(f64::NAN);
        prop_assert!(value >= min && value <= max);
    }

    #[test]
    fn prop_file_filter_has_two_parts_per_filter(exts in prop::collection::vec("[a-z]{1,4}", 0..4)) {
        let refs: Vec<&str> = exts.iter().map(String::as_str).collect();
        let encoded = FileFilter::encode(&[FileFilter::new("Media", &refs)]);
        let nuls = encoded.as_units().iter().filter(|u| **u == 0).count();
        prop_assert_eq!(nuls, 2);
    }
}

#[test]
fn script_error_display_is_readable() {
    let err = ScriptError::InvalidArgument {
        index: 1,
        reason: "expected a table".into(),
    };
    assert_eq!(err.to_string(), "invalid argument #1: expected a table");
}
