// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Pull-style read/seek bridge driven by the native decoder.
//!
//! libheif reads the container through a `heif_reader` table of C callbacks.
//! Each callback recovers its session's stream from the registry using the
//! token in `userdata` and translates stream failures into the native
//! contract's failure codes; no Rust error unwinds across the ABI.

use std::io::{self, Read, Seek, SeekFrom};
use std::os::raw::{c_int, c_void};

use crate::ffi;
use crate::registry::{self, Token};

/// Random-access byte source with a reliable total length.
///
/// Implemented for every `Read + Seek` type; the default length query seeks
/// to the end and restores the position. Sources are treated as static: the
/// bridge takes the reported length as authoritative and never waits for a
/// source to grow. Growable (streaming) sources are an extension point, not
/// supported here.
pub trait RandomAccess: Read + Seek {
    /// Total stream length in bytes.
    fn len(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if end != pos {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(end)
    }
}

impl<T: Read + Seek> RandomAccess for T {}

pub(crate) fn token_from(userdata: *mut c_void) -> Token {
    userdata as usize as Token
}

pub(crate) fn token_as_userdata(token: Token) -> *mut c_void {
    token as usize as *mut c_void
}

/// Builds the callback table handed to `heif_context_read_from_reader`.
///
/// The returned struct must be kept at a stable address for the whole
/// session; the library holds on to the pointer and keeps reading through
/// it lazily during later decode calls.
pub(crate) fn new_reader() -> ffi::heif_reader {
    ffi::heif_reader {
        reader_api_version: 1,
        get_position: Some(get_position),
        read: Some(read),
        seek: Some(seek),
        wait_for_file_size: Some(wait_for_file_size),
    }
}

unsafe extern "C" fn get_position(userdata: *mut c_void) -> i64 {
    registry::with_reader(token_from(userdata), |stream| {
        match stream.stream_position() {
            Ok(pos) => pos as i64,
            Err(_) => -1,
        }
    })
}

unsafe extern "C" fn read(data: *mut c_void, size: usize, userdata: *mut c_void) -> c_int {
    registry::with_reader(token_from(userdata), |stream| {
        let Ok(available) = remaining(stream) else {
            return -1;
        };
        // There is no partial-success return path across the boundary, so
        // clamp to what the stream can still serve and fail outright when
        // that is nothing at all.
        let count = (size as u64).min(available) as usize;
        if count < 1 {
            return -1;
        }
        let buf = unsafe { std::slice::from_raw_parts_mut(data as *mut u8, count) };
        match stream.read_exact(buf) {
            Ok(()) => 0,
            Err(_) => -1,
        }
    })
}

unsafe extern "C" fn seek(position: i64, userdata: *mut c_void) -> c_int {
    registry::with_reader(token_from(userdata), |stream| {
        let Ok(len) = stream.len() else {
            return -1;
        };
        // The only bounds check the bridge performs; the stream's reported
        // length is authoritative.
        if position < 0 || position as u64 > len {
            return -1;
        }
        match stream.seek(SeekFrom::Start(position as u64)) {
            Ok(_) => 0,
            Err(_) => -1,
        }
    })
}

/// For a static source this is a pure comparison against the known length;
/// at minimum the bridge must report "size unreachable" rather than block.
/// An unanswerable length query counts as unreachable too.
unsafe extern "C" fn wait_for_file_size(
    target_size: i64,
    userdata: *mut c_void,
) -> ffi::heif_reader_grow_status {
    registry::with_reader(token_from(userdata), |stream| match stream.len() {
        Ok(len) if target_size as u64 <= len => ffi::heif_reader_grow_status_size_reached,
        _ => ffi::heif_reader_grow_status_size_beyond_eof,
    })
}

fn remaining(stream: &mut dyn RandomAccess) -> io::Result<u64> {
    let pos = stream.stream_position()?;
    let len = stream.len()?;
    Ok(len.saturating_sub(pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registration;
    use std::io::Cursor;

    fn with_registered<T>(data: &[u8], f: impl FnOnce(Token) -> T) -> T {
        let token = registry::next_token();
        let mut stream = Cursor::new(data.to_vec());
        let _registration = Registration::reader(token, &mut stream);
        f(token)
    }

    #[test]
    fn test_position_reports_stream_offset() {
        with_registered(b"0123456789", |token| {
            let userdata = token_as_userdata(token);
            assert_eq!(unsafe { get_position(userdata) }, 0);
            let mut buf = [0u8; 4];
            assert_eq!(
                unsafe { read(buf.as_mut_ptr() as *mut c_void, 4, userdata) },
                0
            );
            assert_eq!(unsafe { get_position(userdata) }, 4);
        });
    }

    #[test]
    fn test_read_fills_requested_bytes() {
        with_registered(b"0123456789", |token| {
            let userdata = token_as_userdata(token);
            let mut buf = [0u8; 4];
            assert_eq!(
                unsafe { read(buf.as_mut_ptr() as *mut c_void, 4, userdata) },
                0
            );
            assert_eq!(&buf, b"0123");
        });
    }

    #[test]
    fn test_read_clamps_to_remaining_bytes() {
        with_registered(b"0123456789", |token| {
            let userdata = token_as_userdata(token);
            assert_eq!(unsafe { seek(8, userdata) }, 0);
            let mut buf = [0xAAu8; 8];
            // Only two bytes remain; the bridge copies them and succeeds.
            assert_eq!(
                unsafe { read(buf.as_mut_ptr() as *mut c_void, 8, userdata) },
                0
            );
            assert_eq!(&buf[..2], b"89");
            assert_eq!(buf[2], 0xAA);
        });
    }

    #[test]
    fn test_read_at_end_fails() {
        with_registered(b"0123", |token| {
            let userdata = token_as_userdata(token);
            assert_eq!(unsafe { seek(4, userdata) }, 0);
            let mut buf = [0u8; 1];
            assert_eq!(
                unsafe { read(buf.as_mut_ptr() as *mut c_void, 1, userdata) },
                -1
            );
        });
    }

    #[test]
    fn test_seek_rejects_out_of_bounds_positions() {
        with_registered(b"0123", |token| {
            let userdata = token_as_userdata(token);
            assert_eq!(unsafe { seek(-1, userdata) }, -1);
            assert_eq!(unsafe { seek(5, userdata) }, -1);
            // Seeking exactly to the end is allowed.
            assert_eq!(unsafe { seek(4, userdata) }, 0);
            assert_eq!(unsafe { seek(0, userdata) }, 0);
        });
    }

    #[test]
    fn test_wait_for_file_size_compares_against_length() {
        with_registered(b"0123456789", |token| {
            let userdata = token_as_userdata(token);
            assert_eq!(
                unsafe { wait_for_file_size(10, userdata) },
                ffi::heif_reader_grow_status_size_reached
            );
            assert_eq!(
                unsafe { wait_for_file_size(11, userdata) },
                ffi::heif_reader_grow_status_size_beyond_eof
            );
        });
    }

    #[test]
    fn test_tokens_address_their_own_streams() {
        with_registered(b"first", |token_a| {
            with_registered(b"other", |token_b| {
                let mut buf = [0u8; 5];
                assert_eq!(
                    unsafe { read(buf.as_mut_ptr() as *mut c_void, 5, token_as_userdata(token_b)) },
                    0
                );
                assert_eq!(&buf, b"other");
                assert_eq!(
                    unsafe { read(buf.as_mut_ptr() as *mut c_void, 5, token_as_userdata(token_a)) },
                    0
                );
                assert_eq!(&buf, b"first");
            });
        });
    }
}
