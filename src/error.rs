// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Error type shared by the decoder and encoder.

use std::ffi::CStr;
use std::io;
use std::path::PathBuf;

use crate::ffi;

/// Errors from HEIF/AVIF decoding and encoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The source file does not exist or is not readable.
    #[error("source not found: {0}")]
    NotFound(PathBuf),

    /// The source bytes are not a supported HEIF/AVIF container, are
    /// truncated, or carry malformed embedded metadata.
    #[error("source is not a supported HEIF/AVIF image")]
    SourceFormat,

    /// An image or thumbnail index outside its valid range. A caller
    /// contract violation, not an I/O condition.
    #[error("index {index} out of range for {count} entries")]
    IndexOutOfBounds { index: usize, count: usize },

    /// A non-zero status from libheif, carrying the library's message.
    /// Terminal for the current operation; never retried.
    #[error("libheif: {0}")]
    Native(String),

    /// Color profile parsing or conversion failed.
    #[error("color profile: {0}")]
    ColorProfile(String),

    /// The requested encode format has no libheif compression mapping.
    #[error("unsupported output format")]
    UnsupportedFormat,

    /// I/O failure in the supplied stream or sink.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Converts a `heif_error` returned by value into a `Result`.
///
/// The native message is copied out before the error value goes away.
pub(crate) fn check(err: ffi::heif_error) -> Result<()> {
    if err.code == ffi::heif_error_Ok {
        return Ok(());
    }
    let message = if err.message.is_null() {
        format!("error code {}", err.code)
    } else {
        unsafe { CStr::from_ptr(err.message) }
            .to_string_lossy()
            .into_owned()
    };
    Err(Error::Native(message))
}
