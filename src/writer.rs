// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Push-style write bridge driven by the native encoder.

use std::ffi::CStr;
use std::io::Write;
use std::os::raw::c_void;

use crate::ffi;
use crate::reader::token_from;
use crate::registry;

// Callback-produced errors must carry static message strings; the native
// side reads them after the callback has returned.
static OK_MESSAGE: &CStr = c"Success";
static WRITE_FAILED_MESSAGE: &CStr = c"Writing to the output sink failed";

/// Builds the callback table handed to `heif_context_write`. Only needed
/// for the duration of that call.
pub(crate) fn new_writer() -> ffi::heif_writer {
    ffi::heif_writer {
        writer_api_version: 1,
        write: Some(write),
    }
}

/// Forwards one native write to the registered sink.
///
/// Each native call maps to exactly one sink write; there is no buffering
/// here beyond what the sink itself performs.
unsafe extern "C" fn write(
    _ctx: *mut ffi::heif_context,
    data: *const c_void,
    size: usize,
    userdata: *mut c_void,
) -> ffi::heif_error {
    registry::with_writer(token_from(userdata), |sink| {
        let outcome = if size == 0 {
            Ok(())
        } else {
            let bytes = unsafe { std::slice::from_raw_parts(data as *const u8, size) };
            sink.write_all(bytes)
        };
        match outcome {
            Ok(()) => ffi::heif_error {
                code: ffi::heif_error_Ok,
                subcode: 0,
                message: OK_MESSAGE.as_ptr(),
            },
            Err(_) => ffi::heif_error {
                code: ffi::heif_error_Encoding_error,
                subcode: 0,
                message: WRITE_FAILED_MESSAGE.as_ptr(),
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::token_as_userdata;
    use crate::registry::Registration;
    use std::io;

    #[test]
    fn test_write_forwards_bytes_to_sink() {
        let token = registry::next_token();
        let mut sink: Vec<u8> = Vec::new();
        {
            let _registration = Registration::writer(token, &mut sink);
            let data = b"encoded bytes";
            let err = unsafe {
                write(
                    std::ptr::null_mut(),
                    data.as_ptr() as *const c_void,
                    data.len(),
                    token_as_userdata(token),
                )
            };
            assert_eq!(err.code, ffi::heif_error_Ok);
        }
        assert_eq!(sink, b"encoded bytes");
    }

    #[test]
    fn test_sink_failure_becomes_encoding_error() {
        struct FailingSink;
        impl io::Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let token = registry::next_token();
        let mut sink = FailingSink;
        let _registration = Registration::writer(token, &mut sink);
        let data = [0u8; 8];
        let err = unsafe {
            write(
                std::ptr::null_mut(),
                data.as_ptr() as *const c_void,
                data.len(),
                token_as_userdata(token),
            )
        };
        assert_eq!(err.code, ffi::heif_error_Encoding_error);
    }
}
