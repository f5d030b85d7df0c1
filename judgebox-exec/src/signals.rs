use std::ffi::CStr;

/// Returns a string with the text representation of the signal, e.g. `Segmentation fault`.
pub fn strsignal(signal: i32) -> String {
    // SAFETY: strsignal returns either NULL or a pointer to a NUL-terminated string that stays
    // valid at least until the next call in this thread, and it is copied right away.
    unsafe {
        let ptr = libc::strsignal(signal);
        if ptr.is_null() {
            return format!("Unknown signal {signal}");
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}
