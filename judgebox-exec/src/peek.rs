//! Reading strings out of the address space of a traced process.
//!
//! The only way to look at the memory of the candidate is `PTRACE_PEEKDATA`, which returns one
//! machine word at a time. The address comes from the candidate itself, so every read is bounded
//! and a failed read simply ends the string.

use std::mem::size_of;

use nix::sys::ptrace;
use nix::unistd::Pid;

/// Default bound on the number of words read: enough for a `PATH_MAX` long path.
pub const DEFAULT_MAX_WORDS: usize = 4096 / size_of::<libc::c_long>();

/// Bytes read from the memory of a traced process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeekedString {
    /// The bytes before the NUL terminator, or everything read if the terminator was not found.
    pub bytes: Vec<u8>,
    /// Whether the NUL terminator was found within the bound.
    pub terminated: bool,
}

/// Read a NUL-terminated string at `address` in the memory of the tracee `pid`, reading at most
/// `max_words` words.
///
/// A word that cannot be read (e.g. an invalid pointer) ends the string as if it were zero.
pub fn read_cstring(pid: Pid, address: u64, max_words: usize) -> PeekedString {
    read_cstring_with(
        |addr| ptrace::read(pid, addr as usize as ptrace::AddressType).ok(),
        address,
        max_words,
    )
}

/// Same as [`read_cstring`] but reading the words with `peek`, which returns `None` when the word
/// at the given address cannot be read.
pub fn read_cstring_with<F>(mut peek: F, address: u64, max_words: usize) -> PeekedString
where
    F: FnMut(u64) -> Option<libc::c_long>,
{
    let word_size = size_of::<libc::c_long>();
    let mut bytes = Vec::with_capacity(max_words.min(DEFAULT_MAX_WORDS) * word_size);
    for index in 0..max_words {
        let Some(addr) = address.checked_add((index * word_size) as u64) else {
            break;
        };
        let Some(word) = peek(addr) else {
            break;
        };
        let chunk = word.to_ne_bytes();
        if let Some(nul) = chunk.iter().position(|&b| b == 0) {
            bytes.extend_from_slice(&chunk[..nul]);
            return PeekedString {
                bytes,
                terminated: true,
            };
        }
        bytes.extend_from_slice(&chunk);
    }
    PeekedString {
        bytes,
        terminated: false,
    }
}
