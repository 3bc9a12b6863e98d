// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Process-wide table mapping callback tokens to live sessions.
//!
//! The native callback signatures carry a single pointer-sized userdata
//! value and nothing else, so a session parks a type-erased pointer to its
//! stream or sink here under a small token, and the callbacks recover it on
//! the far side of the ABI. One live entry per token; entries are scoped to
//! one thread of control, because the native library issues all callbacks
//! for a session synchronously on the thread that initiated the call.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex};

use crate::reader::RandomAccess;

/// Pointer-sized value carried through the native callbacks' userdata slot.
pub(crate) type Token = u64;

enum Entry {
    Reader(*mut dyn RandomAccess),
    Writer(*mut dyn Write),
}

// SAFETY: entries are only dereferenced on the thread that registered them;
// the map itself is what crosses threads.
unsafe impl Send for Entry {}

static SESSIONS: LazyLock<Mutex<HashMap<Token, Entry>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh token. Tokens are never reused within a process.
pub(crate) fn next_token() -> Token {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Removes the registry entry when dropped, so a session can never leave a
/// stale registration behind.
pub(crate) struct Registration {
    token: Token,
}

impl Registration {
    pub(crate) fn reader(token: Token, reader: *mut dyn RandomAccess) -> Registration {
        let prev = SESSIONS.lock().unwrap().insert(token, Entry::Reader(reader));
        assert!(prev.is_none(), "token {token} already registered");
        Registration { token }
    }

    pub(crate) fn writer(token: Token, writer: *mut dyn Write) -> Registration {
        let prev = SESSIONS.lock().unwrap().insert(token, Entry::Writer(writer));
        assert!(prev.is_none(), "token {token} already registered");
        Registration { token }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        SESSIONS.lock().unwrap().remove(&self.token);
    }
}

/// Runs `f` on the stream registered under `token`.
///
/// Panics if no reader session is registered for the token. Callbacks only
/// arrive while their session is alive and registered, so a miss is a
/// programming-contract violation, not a recoverable condition; the panic
/// aborts when it originates inside an `extern "C"` callback.
pub(crate) fn with_reader<T>(token: Token, f: impl FnOnce(&mut dyn RandomAccess) -> T) -> T {
    let ptr = match SESSIONS.lock().unwrap().get(&token) {
        Some(Entry::Reader(ptr)) => *ptr,
        _ => panic!("reader callback for unregistered token {token}"),
    };
    // The lock is released before the stream call so sessions on other
    // threads can service their own callbacks in the meantime.
    f(unsafe { &mut *ptr })
}

/// Runs `f` on the sink registered under `token`. Same contract as
/// [`with_reader`].
pub(crate) fn with_writer<T>(token: Token, f: impl FnOnce(&mut dyn Write) -> T) -> T {
    let ptr = match SESSIONS.lock().unwrap().get(&token) {
        Some(Entry::Writer(ptr)) => *ptr,
        _ => panic!("writer callback for unregistered token {token}"),
    };
    f(unsafe { &mut *ptr })
}

#[cfg(test)]
pub(crate) fn is_registered(token: Token) -> bool {
    SESSIONS.lock().unwrap().contains_key(&token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    #[test]
    fn test_tokens_are_unique() {
        let a = next_token();
        let b = next_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_register_lookup_unregister() {
        let token = next_token();
        let mut stream = Cursor::new(vec![1u8, 2, 3]);
        {
            let _registration = Registration::reader(token, &mut stream);
            assert!(is_registered(token));
            let len = with_reader(token, |s| s.len().unwrap());
            assert_eq!(len, 3);
        }
        assert!(!is_registered(token));
    }

    #[test]
    fn test_writer_entry() {
        let token = next_token();
        let mut sink: Vec<u8> = Vec::new();
        {
            let _registration = Registration::writer(token, &mut sink);
            with_writer(token, |w| w.write_all(b"abc").unwrap());
        }
        assert_eq!(sink, b"abc");
        assert!(!is_registered(token));
    }

    #[test]
    #[should_panic(expected = "unregistered token")]
    fn test_lookup_of_unregistered_token_panics() {
        with_reader(Token::MAX, |_| ());
    }

    #[test]
    fn test_sessions_on_other_threads_are_not_observable() {
        let token_a = next_token();
        let token_b = next_token();

        let a = std::thread::spawn(move || {
            let mut stream = Cursor::new(b"aaaa".to_vec());
            let _registration = Registration::reader(token_a, &mut stream);
            with_reader(token_a, |s| {
                let mut buf = [0u8; 4];
                s.read_exact(&mut buf).unwrap();
                buf
            })
        });
        let b = std::thread::spawn(move || {
            let mut stream = Cursor::new(b"bbbb".to_vec());
            let _registration = Registration::reader(token_b, &mut stream);
            with_reader(token_b, |s| {
                let mut buf = [0u8; 4];
                s.read_exact(&mut buf).unwrap();
                buf
            })
        });

        assert_eq!(&a.join().unwrap(), b"aaaa");
        assert_eq!(&b.join().unwrap(), b"bbbb");
        assert!(!is_registered(token_a));
        assert!(!is_registered(token_b));
    }
}
