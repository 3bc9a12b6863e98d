// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Encoding session over a native codec context.

use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::raw::{c_int, c_void};

use crate::error::{check, Error, Result};
use crate::ffi;
use crate::format::ImageFormat;
use crate::raster::{self, Raster};
use crate::reader;
use crate::registry::{self, Registration};
use crate::writer;

/// Caller-supplied encoder configuration.
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Lossless mode. `quality` is ignored when set.
    pub lossless: bool,
    /// Lossy quality, 0–100.
    pub quality: u8,
    /// Effort knob for encoders that expose a numeric speed parameter.
    pub speed: i32,
    /// Preset name for encoders that expose a named preset instead of a
    /// speed knob (x265).
    pub preset: String,
    /// XMP packet to embed, if any.
    pub xmp: Option<String>,
}

impl Default for EncoderOptions {
    fn default() -> EncoderOptions {
        EncoderOptions {
            lossless: false,
            quality: 60,
            speed: 7,
            preset: "fast".into(),
            xmp: None,
        }
    }
}

/// Synchronous HEIF/AVIF encoding session.
///
/// The sink is borrowed per [`encode`](Encoder::encode) call and registered
/// with the callback table only for the duration of the native write.
pub struct Encoder {
    ctx: *mut ffi::heif_context,
    format: ImageFormat,
    options: EncoderOptions,
}

// Releases native resources in reverse acquisition order when an encode
// bails out early.
struct NativeEncoder(*mut ffi::heif_encoder);

impl Drop for NativeEncoder {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { ffi::heif_encoder_release(self.0) };
        }
    }
}

struct NativeImage(*mut ffi::heif_image);

impl Drop for NativeImage {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { ffi::heif_image_release(self.0) };
        }
    }
}

struct NativeHandle(*mut ffi::heif_image_handle);

impl Drop for NativeHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { ffi::heif_image_handle_release(self.0) };
        }
    }
}

struct NativeNclx(*mut ffi::heif_color_profile_nclx);

impl Drop for NativeNclx {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { ffi::heif_nclx_color_profile_free(self.0) };
        }
    }
}

struct NativeOptions(*mut ffi::heif_encoding_options);

impl Drop for NativeOptions {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe { ffi::heif_encoding_options_free(self.0) };
        }
    }
}

impl Encoder {
    pub fn new(format: ImageFormat, options: EncoderOptions) -> Encoder {
        Encoder {
            ctx: std::ptr::null_mut(),
            format,
            options,
        }
    }

    /// Encodes `raster` and writes the finished container to `sink`.
    pub fn encode(&mut self, raster: &Raster, sink: &mut dyn Write) -> Result<()> {
        let compression = match self.format {
            ImageFormat::Avif => ffi::heif_compression_AV1,
            ImageFormat::Heif => ffi::heif_compression_HEVC,
            ImageFormat::Unknown => return Err(Error::UnsupportedFormat),
        };
        self.init_context()?;

        let mut encoder_ptr: *mut ffi::heif_encoder = std::ptr::null_mut();
        check(unsafe {
            ffi::heif_context_get_encoder_for_format(self.ctx, compression, &mut encoder_ptr)
        })?;
        let encoder = NativeEncoder(encoder_ptr);

        let width = raster.width() as c_int;
        let height = raster.height() as c_int;
        let has_alpha = raster.layout().has_alpha();
        let (colorspace, chroma, channel) = plane_spec(raster);

        let mut image_ptr: *mut ffi::heif_image = std::ptr::null_mut();
        check(unsafe { ffi::heif_image_create(width, height, colorspace, chroma, &mut image_ptr) })?;
        let image = NativeImage(image_ptr);

        let mut nclx = NativeNclx(std::ptr::null_mut());
        let options = NativeOptions(unsafe { ffi::heif_encoding_options_alloc() });
        unsafe {
            (*options.0).save_alpha_channel = has_alpha as u8;
        }

        if self.options.lossless {
            check(unsafe { ffi::heif_encoder_set_lossless(encoder.0, 1) })?;
            nclx.0 = unsafe { ffi::heif_nclx_color_profile_alloc() };
            if nclx.0.is_null() {
                return Err(Error::Native("failed to allocate NCLX profile".into()));
            }
            if colorspace == ffi::heif_colorspace_RGB {
                unsafe {
                    (*nclx.0).matrix_coefficients = ffi::heif_matrix_coefficients_RGB_GBR;
                    (*nclx.0).full_range_flag = 1;
                }
                set_parameter_string(encoder.0, c"chroma", c"444")?;
            } else {
                // Monochrome input mirrors the NCLX the library resolved
                // for the image just created, when it has one.
                let mut input_ptr: *mut ffi::heif_color_profile_nclx = std::ptr::null_mut();
                let err = unsafe { ffi::heif_image_get_nclx_color_profile(image.0, &mut input_ptr) };
                if err.code != ffi::heif_error_Color_profile_does_not_exist {
                    check(err)?;
                }
                if !input_ptr.is_null() {
                    let input = NativeNclx(input_ptr);
                    unsafe {
                        (*nclx.0).color_primaries = (*input.0).color_primaries;
                        (*nclx.0).transfer_characteristics = (*input.0).transfer_characteristics;
                        (*nclx.0).matrix_coefficients = (*input.0).matrix_coefficients;
                        (*nclx.0).full_range_flag = (*input.0).full_range_flag;
                    }
                }
            }
            unsafe {
                (*options.0).output_nclx_profile = nclx.0;
            }
        } else {
            check(unsafe { ffi::heif_encoder_set_lossless(encoder.0, 0) })?;
            let quality = c_int::from(self.options.quality.min(100));
            check(unsafe { ffi::heif_encoder_set_lossy_quality(encoder.0, quality) })?;
            if quality > 90 {
                // Subsampled chroma shows at high quality settings.
                set_parameter_string(encoder.0, c"chroma", c"444")?;
            }
        }

        // Preset-style encoders take a named preset; everything else takes
        // the numeric speed knob. Selection is by the encoder's reported
        // name.
        let name_ptr = unsafe { ffi::heif_encoder_get_name(encoder.0) };
        let name = if name_ptr.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(name_ptr) }.to_string_lossy().into_owned()
        };
        if name.contains("x265") {
            let preset = CString::new(self.options.preset.as_str()).map_err(|_| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "preset contains a NUL byte",
                ))
            })?;
            check(unsafe {
                ffi::heif_encoder_set_parameter_string(encoder.0, c"preset".as_ptr(), preset.as_ptr())
            })?;
        } else {
            check(unsafe {
                ffi::heif_encoder_set_parameter_integer(
                    encoder.0,
                    c"speed".as_ptr(),
                    self.options.speed as c_int,
                )
            })?;
        }

        // Copy the raster into the plane the library allocated, honoring
        // whatever stride it reports.
        check(unsafe { ffi::heif_image_add_plane(image.0, channel, width, height, 8) })?;
        let mut stride: c_int = 0;
        let plane_ptr = unsafe { ffi::heif_image_get_plane(image.0, channel, &mut stride) };
        if plane_ptr.is_null() || stride <= 0 {
            return Err(Error::Native("encoder image has no plane".into()));
        }
        let stride = stride as usize;
        let plane =
            unsafe { std::slice::from_raw_parts_mut(plane_ptr, stride * raster.height() as usize) };
        raster::unpack_into_plane(raster, plane, stride);

        let mut handle_ptr: *mut ffi::heif_image_handle = std::ptr::null_mut();
        check(unsafe {
            ffi::heif_context_encode_image(self.ctx, image.0, encoder.0, options.0, &mut handle_ptr)
        })?;
        let handle = NativeHandle(handle_ptr);

        if let Some(xmp) = &self.options.xmp {
            check(unsafe {
                ffi::heif_context_add_XMP_metadata(
                    self.ctx,
                    handle.0,
                    xmp.as_ptr() as *const c_void,
                    xmp.len() as c_int,
                )
            })?;
        }

        let mut writer = writer::new_writer();
        let token = registry::next_token();
        let sink_ptr: *mut (dyn Write + '_) = sink;
        // SAFETY: lifetime erasure only. The registration guard drops at
        // the end of this call, before the sink borrow ends.
        let sink_ptr: *mut (dyn Write + 'static) = unsafe { std::mem::transmute(sink_ptr) };
        let _registration = Registration::writer(token, sink_ptr);
        check(unsafe {
            ffi::heif_context_write(self.ctx, &mut writer, reader::token_as_userdata(token))
        })?;
        Ok(())
    }

    fn init_context(&mut self) -> Result<()> {
        crate::ensure_supported_version()?;
        if self.ctx.is_null() {
            self.ctx = unsafe { ffi::heif_context_alloc() };
        }
        Ok(())
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        if !self.ctx.is_null() {
            unsafe { ffi::heif_context_free(self.ctx) };
        }
    }
}

fn set_parameter_string(
    encoder: *mut ffi::heif_encoder,
    name: &CStr,
    value: &CStr,
) -> Result<()> {
    check(unsafe { ffi::heif_encoder_set_parameter_string(encoder, name.as_ptr(), value.as_ptr()) })
}

/// Native colorspace, chroma, and plane channel for a raster: one band is
/// monochrome, three is RGB, four (or declared alpha) is RGBA.
pub(crate) fn plane_spec(
    raster: &Raster,
) -> (ffi::heif_colorspace, ffi::heif_chroma, ffi::heif_channel) {
    if raster.bands() == 1 {
        (
            ffi::heif_colorspace_monochrome,
            ffi::heif_chroma_monochrome,
            ffi::heif_channel_Y,
        )
    } else if raster.layout().has_alpha() {
        (
            ffi::heif_colorspace_RGB,
            ffi::heif_chroma_interleaved_RGBA,
            ffi::heif_channel_interleaved,
        )
    } else {
        (
            ffi::heif_colorspace_RGB,
            ffi::heif_chroma_interleaved_RGB,
            ffi::heif_channel_interleaved,
        )
    }
}

#[cfg(test)]
#[path = "encoder_tests.rs"]
mod tests;
