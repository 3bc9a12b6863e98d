// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Color profile handling: ICC-to-sRGB conversion on decode, NCLX profile
//! data on both sides.

use lcms2::{ColorSpaceSignatureExt, Flags, Intent, PixelFormat, Profile, Transform};

use crate::error::{Error, Result};
use crate::ffi;
use crate::raster::{Raster, SampleLayout};

/// Color description attached to a decode result or an encode input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorProfile {
    /// Embedded ICC blob.
    Icc(Vec<u8>),
    /// Coded primaries/transfer/matrix/range tuple.
    Nclx(NclxProfile),
    /// No embedded profile.
    None,
}

/// Coded (non-ICC) color description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NclxProfile {
    pub color_primaries: i32,
    pub transfer_characteristics: i32,
    pub matrix_coefficients: i32,
    pub full_range: bool,
}

impl NclxProfile {
    pub(crate) fn from_native(nclx: &ffi::heif_color_profile_nclx) -> NclxProfile {
        NclxProfile {
            color_primaries: nclx.color_primaries,
            transfer_characteristics: nclx.transfer_characteristics,
            matrix_coefficients: nclx.matrix_coefficients,
            full_range: nclx.full_range_flag != 0,
        }
    }
}

/// Converts `raster` from the embedded ICC profile's space into sRGB.
///
/// A profile whose component count does not match the raster's color band
/// count is the one benign mismatch: the conversion is skipped and the
/// raster returned unchanged. Every other CMS failure is fatal.
pub(crate) fn convert_to_srgb(raster: Raster, icc: &[u8]) -> Result<Raster> {
    let profile = Profile::new_icc(icc)
        .map_err(|e| Error::ColorProfile(format!("failed to parse ICC profile: {e}")))?;

    let color_bands = if raster.layout().has_alpha() {
        raster.bands() - 1
    } else {
        raster.bands()
    };
    if profile.color_space().channels() as usize != color_bands {
        return Ok(raster);
    }

    let format = pixel_format_for(raster.layout());
    let srgb = Profile::new_srgb();
    let transform: Transform<u8, u8> = if raster.layout().has_alpha() {
        // The alpha band is carried through untouched.
        Transform::new_flags(
            &profile,
            format,
            &srgb,
            format,
            Intent::Perceptual,
            Flags::COPY_ALPHA,
        )
    } else {
        Transform::new(&profile, format, &srgb, format, Intent::Perceptual)
    }
    .map_err(|e| Error::ColorProfile(format!("failed to create transform: {e}")))?;

    let (width, height, layout) = (raster.width(), raster.height(), raster.layout());
    let mut data = raster.into_vec();
    transform.transform_in_place(&mut data);
    Ok(Raster::from_vec(width, height, layout, data))
}

fn pixel_format_for(layout: SampleLayout) -> PixelFormat {
    match layout {
        SampleLayout::Gray => PixelFormat::GRAY_8,
        SampleLayout::Rgb => PixelFormat::RGB_8,
        SampleLayout::Rgba => PixelFormat::RGBA_8,
        SampleLayout::Bgr => PixelFormat::BGR_8,
        SampleLayout::Bgra => PixelFormat::BGRA_8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A gray profile cannot describe an RGB raster; the conversion must be
    // skipped, not fail.
    #[test]
    fn test_band_mismatch_returns_raster_unconverted() {
        let gray_icc = Profile::new_gray_context(
            lcms2::GlobalContext::new(),
            &lcms2::CIExyY {
                x: 0.3127,
                y: 0.3290,
                Y: 1.0,
            },
            &lcms2::ToneCurve::new(2.2),
        )
        .unwrap()
        .icc()
        .unwrap();

        let raster = Raster::from_vec(1, 1, SampleLayout::Rgb, vec![10, 20, 30]);
        let converted = convert_to_srgb(raster.clone(), &gray_icc).unwrap();
        assert_eq!(converted, raster);
    }

    #[test]
    fn test_srgb_to_srgb_preserves_dimensions() {
        let srgb_icc = Profile::new_srgb().icc().unwrap();
        let raster = Raster::from_vec(2, 1, SampleLayout::Rgb, vec![0, 64, 128, 255, 255, 255]);
        let converted = convert_to_srgb(raster, &srgb_icc).unwrap();
        assert_eq!(converted.width(), 2);
        assert_eq!(converted.height(), 1);
        assert_eq!(converted.layout(), SampleLayout::Rgb);
        // White maps to white under any sane transform.
        assert_eq!(converted.sample(1, 0, 0), 255);
    }

    #[test]
    fn test_garbage_profile_is_fatal() {
        let raster = Raster::from_vec(1, 1, SampleLayout::Rgb, vec![1, 2, 3]);
        let result = convert_to_srgb(raster, &[0u8; 16]);
        assert!(matches!(result, Err(Error::ColorProfile(_))));
    }
}
