// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Hand-declared libheif C ABI surface.
//!
//! Only the subset of `heif.h` driven by the decoder and encoder is declared
//! here. C enums are rendered as constified integer constants rather than
//! Rust enums so that values read back from the library can never be out of
//! range for the Rust type.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]
#![allow(non_snake_case)]
#![allow(dead_code)]

use std::os::raw::{c_char, c_int, c_void};

/// Identifier of one item (image, thumbnail, metadata block) in a container.
pub(crate) type heif_item_id = u32;

// ============================================================================
// Status
// ============================================================================

pub(crate) type heif_error_code = c_int;
pub(crate) const heif_error_Ok: heif_error_code = 0;
pub(crate) const heif_error_Input_does_not_exist: heif_error_code = 1;
pub(crate) const heif_error_Invalid_input: heif_error_code = 2;
pub(crate) const heif_error_Unsupported_filetype: heif_error_code = 3;
pub(crate) const heif_error_Unsupported_feature: heif_error_code = 4;
pub(crate) const heif_error_Usage_error: heif_error_code = 5;
pub(crate) const heif_error_Memory_allocation_error: heif_error_code = 6;
pub(crate) const heif_error_Decoder_plugin_error: heif_error_code = 7;
pub(crate) const heif_error_Encoder_plugin_error: heif_error_code = 8;
pub(crate) const heif_error_Encoding_error: heif_error_code = 9;
pub(crate) const heif_error_Color_profile_does_not_exist: heif_error_code = 10;

/// Returned by value from nearly every libheif call. `message` points at a
/// string owned by the library (or at a static string for callback-produced
/// errors) and is only read, never freed, on this side.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct heif_error {
    pub code: heif_error_code,
    pub subcode: c_int,
    pub message: *const c_char,
}

// ============================================================================
// Colorspaces, chroma, channels, compression
// ============================================================================

pub(crate) type heif_colorspace = c_int;
pub(crate) const heif_colorspace_undefined: heif_colorspace = 99;
pub(crate) const heif_colorspace_YCbCr: heif_colorspace = 0;
pub(crate) const heif_colorspace_RGB: heif_colorspace = 1;
pub(crate) const heif_colorspace_monochrome: heif_colorspace = 2;

pub(crate) type heif_chroma = c_int;
pub(crate) const heif_chroma_undefined: heif_chroma = 99;
pub(crate) const heif_chroma_monochrome: heif_chroma = 0;
pub(crate) const heif_chroma_420: heif_chroma = 1;
pub(crate) const heif_chroma_422: heif_chroma = 2;
pub(crate) const heif_chroma_444: heif_chroma = 3;
pub(crate) const heif_chroma_interleaved_RGB: heif_chroma = 10;
pub(crate) const heif_chroma_interleaved_RGBA: heif_chroma = 11;

pub(crate) type heif_channel = c_int;
pub(crate) const heif_channel_Y: heif_channel = 0;
pub(crate) const heif_channel_Cb: heif_channel = 1;
pub(crate) const heif_channel_Cr: heif_channel = 2;
pub(crate) const heif_channel_R: heif_channel = 3;
pub(crate) const heif_channel_G: heif_channel = 4;
pub(crate) const heif_channel_B: heif_channel = 5;
pub(crate) const heif_channel_Alpha: heif_channel = 6;
pub(crate) const heif_channel_interleaved: heif_channel = 10;

pub(crate) type heif_compression_format = c_int;
pub(crate) const heif_compression_undefined: heif_compression_format = 0;
pub(crate) const heif_compression_HEVC: heif_compression_format = 1;
pub(crate) const heif_compression_AVC: heif_compression_format = 2;
pub(crate) const heif_compression_JPEG: heif_compression_format = 3;
pub(crate) const heif_compression_AV1: heif_compression_format = 4;

pub(crate) type heif_color_primaries = c_int;
pub(crate) type heif_transfer_characteristics = c_int;
pub(crate) type heif_matrix_coefficients = c_int;
pub(crate) const heif_matrix_coefficients_RGB_GBR: heif_matrix_coefficients = 0;

pub(crate) type heif_orientation = c_int;
pub(crate) type heif_chroma_downsampling_algorithm = c_int;
pub(crate) type heif_chroma_upsampling_algorithm = c_int;

// ============================================================================
// Reader / writer vtables
// ============================================================================

pub(crate) type heif_reader_grow_status = c_int;
pub(crate) const heif_reader_grow_status_size_reached: heif_reader_grow_status = 0;
pub(crate) const heif_reader_grow_status_timeout: heif_reader_grow_status = 1;
pub(crate) const heif_reader_grow_status_size_beyond_eof: heif_reader_grow_status = 2;

/// Callback table for pull-style container reading (reader API version 1).
///
/// The library stores the pointer it is given and keeps issuing callbacks
/// through it for the lifetime of the context, so the struct must live at a
/// stable address for the whole session.
#[repr(C)]
pub(crate) struct heif_reader {
    pub reader_api_version: c_int,
    pub get_position: Option<unsafe extern "C" fn(userdata: *mut c_void) -> i64>,
    pub read:
        Option<unsafe extern "C" fn(data: *mut c_void, size: usize, userdata: *mut c_void) -> c_int>,
    pub seek: Option<unsafe extern "C" fn(position: i64, userdata: *mut c_void) -> c_int>,
    pub wait_for_file_size: Option<
        unsafe extern "C" fn(target_size: i64, userdata: *mut c_void) -> heif_reader_grow_status,
    >,
}

/// Callback table for push-style container writing (writer API version 1).
#[repr(C)]
pub(crate) struct heif_writer {
    pub writer_api_version: c_int,
    pub write: Option<
        unsafe extern "C" fn(
            ctx: *mut heif_context,
            data: *const c_void,
            size: usize,
            userdata: *mut c_void,
        ) -> heif_error,
    >,
}

// ============================================================================
// Opaque handles
// ============================================================================

#[repr(C)]
pub(crate) struct heif_context {
    _private: [u8; 0],
}

#[repr(C)]
pub(crate) struct heif_image_handle {
    _private: [u8; 0],
}

#[repr(C)]
pub(crate) struct heif_image {
    _private: [u8; 0],
}

#[repr(C)]
pub(crate) struct heif_encoder {
    _private: [u8; 0],
}

#[repr(C)]
pub(crate) struct heif_decoding_options {
    _private: [u8; 0],
}

// ============================================================================
// Color profile structs
// ============================================================================

#[repr(C)]
pub(crate) struct heif_color_profile_nclx {
    pub version: u8,
    pub color_primaries: heif_color_primaries,
    pub transfer_characteristics: heif_transfer_characteristics,
    pub matrix_coefficients: heif_matrix_coefficients,
    pub full_range_flag: u8,
}

#[repr(C)]
pub(crate) struct heif_color_conversion_options {
    pub version: u8,
    pub preferred_chroma_downsampling_algorithm: heif_chroma_downsampling_algorithm,
    pub preferred_chroma_upsampling_algorithm: heif_chroma_upsampling_algorithm,
    pub only_use_preferred_chroma_algorithm: u8,
}

/// `struct heif_encoding_options`, version 7 layout. Always obtained from
/// `heif_encoding_options_alloc` so the library fills in the defaults; only
/// `save_alpha_channel` and `output_nclx_profile` are written here.
#[repr(C)]
pub(crate) struct heif_encoding_options {
    pub version: u8,
    pub save_alpha_channel: u8,
    pub macOS_compatibility_workaround: u8,
    pub save_two_colr_boxes_when_ICC_and_nclx_available: u8,
    pub output_nclx_profile: *mut heif_color_profile_nclx,
    pub macOS_compatibility_workaround_no_nclx_profile: u8,
    pub image_orientation: heif_orientation,
    pub color_conversion_options: heif_color_conversion_options,
    pub prefer_uncC_short_form: u8,
}

// ============================================================================
// Functions
// ============================================================================

unsafe extern "C" {
    pub(crate) fn heif_get_version() -> *const c_char;

    pub(crate) fn heif_context_alloc() -> *mut heif_context;
    pub(crate) fn heif_context_free(ctx: *mut heif_context);
    pub(crate) fn heif_context_read_from_file(
        ctx: *mut heif_context,
        filename: *const c_char,
        options: *const c_void,
    ) -> heif_error;
    pub(crate) fn heif_context_read_from_reader(
        ctx: *mut heif_context,
        reader: *const heif_reader,
        userdata: *mut c_void,
        options: *const c_void,
    ) -> heif_error;
    pub(crate) fn heif_context_get_number_of_top_level_images(ctx: *mut heif_context) -> c_int;
    pub(crate) fn heif_context_get_list_of_top_level_image_IDs(
        ctx: *mut heif_context,
        ids: *mut heif_item_id,
        count: c_int,
    ) -> c_int;
    pub(crate) fn heif_context_get_image_handle(
        ctx: *mut heif_context,
        id: heif_item_id,
        out_handle: *mut *mut heif_image_handle,
    ) -> heif_error;

    pub(crate) fn heif_image_handle_release(handle: *const heif_image_handle);
    pub(crate) fn heif_image_handle_get_width(handle: *const heif_image_handle) -> c_int;
    pub(crate) fn heif_image_handle_get_height(handle: *const heif_image_handle) -> c_int;
    pub(crate) fn heif_image_handle_has_alpha_channel(handle: *const heif_image_handle) -> c_int;
    pub(crate) fn heif_image_handle_get_number_of_thumbnails(
        handle: *const heif_image_handle,
    ) -> c_int;
    pub(crate) fn heif_image_handle_get_list_of_thumbnail_IDs(
        handle: *const heif_image_handle,
        ids: *mut heif_item_id,
        count: c_int,
    ) -> c_int;
    pub(crate) fn heif_image_handle_get_thumbnail(
        main_handle: *const heif_image_handle,
        thumbnail_id: heif_item_id,
        out_thumbnail_handle: *mut *mut heif_image_handle,
    ) -> heif_error;
    pub(crate) fn heif_image_handle_get_list_of_metadata_block_IDs(
        handle: *const heif_image_handle,
        type_filter: *const c_char,
        ids: *mut heif_item_id,
        count: c_int,
    ) -> c_int;
    pub(crate) fn heif_image_handle_get_metadata_size(
        handle: *const heif_image_handle,
        metadata_id: heif_item_id,
    ) -> usize;
    pub(crate) fn heif_image_handle_get_metadata(
        handle: *const heif_image_handle,
        metadata_id: heif_item_id,
        out_data: *mut c_void,
    ) -> heif_error;
    pub(crate) fn heif_image_handle_get_raw_color_profile_size(
        handle: *const heif_image_handle,
    ) -> usize;
    pub(crate) fn heif_image_handle_get_raw_color_profile(
        handle: *const heif_image_handle,
        out_data: *mut c_void,
    ) -> heif_error;
    pub(crate) fn heif_image_handle_get_nclx_color_profile(
        handle: *const heif_image_handle,
        out_data: *mut *mut heif_color_profile_nclx,
    ) -> heif_error;

    pub(crate) fn heif_decode_image(
        in_handle: *const heif_image_handle,
        out_img: *mut *mut heif_image,
        colorspace: heif_colorspace,
        chroma: heif_chroma,
        options: *const heif_decoding_options,
    ) -> heif_error;
    pub(crate) fn heif_image_get_plane_readonly(
        img: *const heif_image,
        channel: heif_channel,
        out_stride: *mut c_int,
    ) -> *const u8;
    pub(crate) fn heif_image_get_plane(
        img: *mut heif_image,
        channel: heif_channel,
        out_stride: *mut c_int,
    ) -> *mut u8;
    pub(crate) fn heif_image_release(img: *const heif_image);
    pub(crate) fn heif_image_create(
        width: c_int,
        height: c_int,
        colorspace: heif_colorspace,
        chroma: heif_chroma,
        out_image: *mut *mut heif_image,
    ) -> heif_error;
    pub(crate) fn heif_image_add_plane(
        img: *mut heif_image,
        channel: heif_channel,
        width: c_int,
        height: c_int,
        bit_depth: c_int,
    ) -> heif_error;
    pub(crate) fn heif_image_get_nclx_color_profile(
        img: *const heif_image,
        out_data: *mut *mut heif_color_profile_nclx,
    ) -> heif_error;

    pub(crate) fn heif_nclx_color_profile_alloc() -> *mut heif_color_profile_nclx;
    pub(crate) fn heif_nclx_color_profile_free(nclx_profile: *mut heif_color_profile_nclx);

    pub(crate) fn heif_context_get_encoder_for_format(
        ctx: *mut heif_context,
        format: heif_compression_format,
        out_encoder: *mut *mut heif_encoder,
    ) -> heif_error;
    pub(crate) fn heif_encoder_release(encoder: *mut heif_encoder);
    pub(crate) fn heif_encoder_get_name(encoder: *const heif_encoder) -> *const c_char;
    pub(crate) fn heif_encoder_set_lossy_quality(
        encoder: *mut heif_encoder,
        quality: c_int,
    ) -> heif_error;
    pub(crate) fn heif_encoder_set_lossless(encoder: *mut heif_encoder, enable: c_int)
        -> heif_error;
    pub(crate) fn heif_encoder_set_parameter_string(
        encoder: *mut heif_encoder,
        parameter_name: *const c_char,
        value: *const c_char,
    ) -> heif_error;
    pub(crate) fn heif_encoder_set_parameter_integer(
        encoder: *mut heif_encoder,
        parameter_name: *const c_char,
        value: c_int,
    ) -> heif_error;

    pub(crate) fn heif_encoding_options_alloc() -> *mut heif_encoding_options;
    pub(crate) fn heif_encoding_options_free(options: *mut heif_encoding_options);
    pub(crate) fn heif_context_encode_image(
        ctx: *mut heif_context,
        image: *const heif_image,
        encoder: *mut heif_encoder,
        options: *const heif_encoding_options,
        out_image_handle: *mut *mut heif_image_handle,
    ) -> heif_error;
    pub(crate) fn heif_context_add_XMP_metadata(
        ctx: *mut heif_context,
        image_handle: *const heif_image_handle,
        data: *const c_void,
        size: c_int,
    ) -> heif_error;
    pub(crate) fn heif_context_write(
        ctx: *mut heif_context,
        writer: *mut heif_writer,
        userdata: *mut c_void,
    ) -> heif_error;
}
