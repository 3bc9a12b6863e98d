// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! heifrs - HEIF/AVIF decoding and encoding backed by libheif.
//!
//! The native library drives all container I/O through small C callbacks
//! that carry nothing but a pointer-sized token. This crate bridges those
//! callbacks to ordinary Rust streams and sinks through a process-wide
//! session registry, models the container's image/thumbnail forest with
//! lazily resolved nodes, and marshals libheif's strided interleaved planes
//! into tight rasters with sRGB-converted color.

use std::ffi::CStr;
use std::sync::LazyLock;

mod cms;
mod container;
mod decoder;
mod encoder;
mod error;
mod exif;
mod ffi;
mod format;
mod raster;
mod reader;
mod registry;
mod writer;

pub use cms::{ColorProfile, NclxProfile};
pub use decoder::{Decoder, Metadata};
pub use encoder::{Encoder, EncoderOptions};
pub use error::{Error, Result};
pub use exif::{ExifDirectory, ExifField, ExifValue};
pub use format::{detect_format, ImageFormat};
pub use raster::{Raster, SampleLayout, Size};
pub use reader::RandomAccess;

/// Version string of the linked libheif.
pub fn version() -> String {
    let ptr = unsafe { ffi::heif_get_version() };
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

// Checked once per process, before the first native context is built. The
// supported range is >= 1.18, < 2.
static VERSION_CHECK: LazyLock<std::result::Result<(), String>> = LazyLock::new(|| {
    let version = version();
    let mut parts = version.split('.');
    let major: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    if major != 1 || minor < 18 {
        return Err(format!(
            "incompatible libheif version {version}; >= 1.18, < 2 required"
        ));
    }
    Ok(())
});

pub(crate) fn ensure_supported_version() -> Result<()> {
    VERSION_CHECK.clone().map_err(Error::Native)
}
