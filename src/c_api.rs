// File: src/c_api.rs
// C ABI for host editors that embed the engine as a shared library.
// Uses raw pointers and catch_unwind for stability at the boundary.
use crate::core::engine::{BrailleEngine, EmitError, Host, Position};
use crate::core::types::ModeChange;
use crate::core::unifier::unify;
use crate::profile::ProfileRecord;
use libc::c_char;
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::time::{Duration, Instant};

static mut ENGINE: *mut FfiEngine = ptr::null_mut();

struct FfiEngine {
    engine: BrailleEngine,
    /// All `now_ms` arguments are offsets from init.
    epoch: Instant,
    /// Append-only cursor for the collecting host.
    cursor: Position,
}

impl FfiEngine {
    fn instant(&self, now_ms: u64) -> Instant {
        self.epoch + Duration::from_millis(now_ms)
    }
}

#[derive(Serialize)]
struct Emission {
    text: String,
    dots: String,
}

/// Buffers emissions so one FFI call can return them all as JSON.
struct CollectingHost<'a> {
    cursor: &'a mut Position,
    emissions: Vec<Emission>,
}

impl Host for CollectingHost<'_> {
    fn emit(&mut self, text: &str, dots: &str) -> Result<Position, EmitError> {
        let pos = *self.cursor;
        self.cursor.col += text.chars().count() as u32;
        self.emissions.push(Emission {
            text: text.to_string(),
            dots: dots.to_string(),
        });
        Ok(pos)
    }

    fn mode_changed(&mut self, _change: &ModeChange) {}
}

fn with_engine<F>(f: F) -> String
where
    F: FnOnce(&mut FfiEngine) -> String,
{
    let result = catch_unwind(AssertUnwindSafe(|| unsafe {
        match ENGINE.as_mut() {
            Some(state) => f(state),
            None => "[]".to_string(),
        }
    }));
    result.unwrap_or_else(|_| {
        eprintln!("[perkins-ime FATAL] panic behind the FFI boundary");
        "[]".to_string()
    })
}

fn collect<F>(f: F) -> String
where
    F: FnOnce(&mut BrailleEngine, &mut CollectingHost),
{
    with_engine(|state| {
        let mut host = CollectingHost {
            cursor: &mut state.cursor,
            emissions: Vec::new(),
        };
        f(&mut state.engine, &mut host);
        serde_json::to_string(&host.emissions).unwrap_or_else(|_| "[]".to_string())
    })
}

fn into_c_string(s: String) -> *mut c_char {
    // Interior NULs cannot come out of serde_json or the overlay, but
    // the boundary still degrades instead of panicking.
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => CString::default().into_raw(),
    }
}

/// Initialises the engine from `{system_id: [profile records]}` JSON.
/// # Safety
/// `profiles_json` must be a valid NUL-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn perkins_ime_init(profiles_json: *const c_char) {
    let result = catch_unwind(|| unsafe {
        if !ENGINE.is_null() {
            return;
        }
        let json = if profiles_json.is_null() {
            "{}"
        } else {
            CStr::from_ptr(profiles_json).to_str().unwrap_or("{}")
        };
        let profiles: HashMap<String, Vec<ProfileRecord>> =
            serde_json::from_str(json).unwrap_or_default();
        let tables = unify(&profiles);
        let state = FfiEngine {
            engine: BrailleEngine::new(tables),
            epoch: Instant::now(),
            cursor: Position { line: 0, col: 0 },
        };
        ENGINE = Box::into_raw(Box::new(state));
    });
    if result.is_err() {
        eprintln!("[perkins-ime FATAL] panic during engine initialisation");
        ENGINE = ptr::null_mut();
    }
}

#[no_mangle]
pub unsafe extern "C" fn perkins_ime_destroy() {
    if ENGINE.is_null() {
        return;
    }
    drop(Box::from_raw(ENGINE));
    ENGINE = ptr::null_mut();
}

/// Feeds one dot press (0 = space). Returns a JSON array of emissions
/// `[{"text": …, "dots": …}, …]` produced by this call.
#[no_mangle]
pub extern "C" fn perkins_ime_press(dot: u8, now_ms: u64) -> *mut c_char {
    into_c_string(with_engine(|state| {
        let now = state.instant(now_ms);
        let mut host = CollectingHost {
            cursor: &mut state.cursor,
            emissions: Vec::new(),
        };
        state.engine.press(dot, now, &mut host);
        serde_json::to_string(&host.emissions).unwrap_or_else(|_| "[]".to_string())
    }))
}

/// Delivers the pending chord if its deadline has passed.
#[no_mangle]
pub extern "C" fn perkins_ime_poll(now_ms: u64) -> *mut c_char {
    into_c_string(with_engine(|state| {
        let now = state.instant(now_ms);
        let mut host = CollectingHost {
            cursor: &mut state.cursor,
            emissions: Vec::new(),
        };
        state.engine.poll(now, &mut host);
        serde_json::to_string(&host.emissions).unwrap_or_else(|_| "[]".to_string())
    }))
}

/// Commits the pending chord immediately.
#[no_mangle]
pub extern "C" fn perkins_ime_flush() -> *mut c_char {
    into_c_string(collect(|engine, host| engine.flush_input(host)))
}

#[no_mangle]
pub extern "C" fn perkins_ime_reset() {
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        if let Some(state) = ENGINE.as_mut() {
            state.engine.reset();
            state.cursor = Position { line: 0, col: 0 };
        }
    }));
}

#[no_mangle]
pub extern "C" fn perkins_ime_current_mode() -> *mut c_char {
    into_c_string(with_engine(|state| {
        state.engine.current_mode().as_str().to_string()
    }))
}

/// The overlay rendering for one line, as Unicode braille.
#[no_mangle]
pub extern "C" fn perkins_ime_overlay_line(line: u32) -> *mut c_char {
    into_c_string(with_engine(|state| {
        state.engine.overlay().line_text(line).unwrap_or_default()
    }))
}

/// Frees a string previously returned by this API.
/// # Safety
/// `s` must have been produced by this library and not freed before.
#[no_mangle]
pub unsafe extern "C" fn perkins_ime_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
