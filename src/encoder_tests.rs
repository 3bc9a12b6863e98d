// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Unit tests for the encoder module.

use super::*;
use crate::raster::SampleLayout;

#[test]
fn test_default_options() {
    let options = EncoderOptions::default();
    assert!(!options.lossless);
    assert_eq!(options.quality, 60);
    assert_eq!(options.speed, 7);
    assert_eq!(options.preset, "fast");
    assert!(options.xmp.is_none());
}

#[test]
fn test_plane_spec_monochrome() {
    let raster = Raster::new(4, 4, SampleLayout::Gray);
    let (colorspace, chroma, channel) = plane_spec(&raster);
    assert_eq!(colorspace, ffi::heif_colorspace_monochrome);
    assert_eq!(chroma, ffi::heif_chroma_monochrome);
    assert_eq!(channel, ffi::heif_channel_Y);
}

#[test]
fn test_plane_spec_rgb() {
    for layout in [SampleLayout::Rgb, SampleLayout::Bgr] {
        let raster = Raster::new(4, 4, layout);
        let (colorspace, chroma, channel) = plane_spec(&raster);
        assert_eq!(colorspace, ffi::heif_colorspace_RGB);
        assert_eq!(chroma, ffi::heif_chroma_interleaved_RGB);
        assert_eq!(channel, ffi::heif_channel_interleaved);
    }
}

#[test]
fn test_plane_spec_alpha() {
    for layout in [SampleLayout::Rgba, SampleLayout::Bgra] {
        let raster = Raster::new(4, 4, layout);
        let (colorspace, chroma, channel) = plane_spec(&raster);
        assert_eq!(colorspace, ffi::heif_colorspace_RGB);
        assert_eq!(chroma, ffi::heif_chroma_interleaved_RGBA);
        assert_eq!(channel, ffi::heif_channel_interleaved);
    }
}

#[test]
fn test_unknown_format_is_rejected_before_any_native_work() {
    let mut encoder = Encoder::new(ImageFormat::Unknown, EncoderOptions::default());
    let raster = Raster::new(2, 2, SampleLayout::Rgb);
    let mut sink: Vec<u8> = Vec::new();
    let result = encoder.encode(&raster, &mut sink);
    assert!(matches!(result, Err(Error::UnsupportedFormat)));
    assert!(sink.is_empty());
}
