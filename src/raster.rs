// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Tightly packed interleaved rasters and the strided-plane packing between
//! them and libheif's native planes.

/// Pixel dimensions of an image or thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Byte order of the samples within one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    /// Single gray band.
    Gray,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
    /// Blue, green, red (reversed channel order).
    Bgr,
    /// Blue, green, red, alpha.
    Bgra,
}

impl SampleLayout {
    /// Samples per pixel.
    pub fn bands(self) -> usize {
        match self {
            SampleLayout::Gray => 1,
            SampleLayout::Rgb | SampleLayout::Bgr => 3,
            SampleLayout::Rgba | SampleLayout::Bgra => 4,
        }
    }

    /// Whether the layout carries an alpha band.
    pub fn has_alpha(self) -> bool {
        matches!(self, SampleLayout::Rgba | SampleLayout::Bgra)
    }

    /// Byte offset within one pixel of logical band `band` (R=0, G=1, B=2,
    /// A=3 for the color layouts; 0 for gray).
    fn band_offset(self, band: usize) -> usize {
        match self {
            SampleLayout::Gray | SampleLayout::Rgb | SampleLayout::Rgba => band,
            SampleLayout::Bgr | SampleLayout::Bgra => match band {
                0 => 2,
                2 => 0,
                other => other,
            },
        }
    }
}

/// A tightly packed interleaved 8-bit raster (stride == width × bands).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    layout: SampleLayout,
    data: Vec<u8>,
}

impl Raster {
    /// Allocates a zero-filled raster.
    pub fn new(width: u32, height: u32, layout: SampleLayout) -> Raster {
        let data = vec![0u8; width as usize * height as usize * layout.bands()];
        Raster {
            width,
            height,
            layout,
            data,
        }
    }

    /// Wraps caller-provided samples.
    ///
    /// # Panics
    /// Panics if `data` does not hold exactly
    /// `width * height * layout.bands()` bytes.
    pub fn from_vec(width: u32, height: u32, layout: SampleLayout, data: Vec<u8>) -> Raster {
        let expected = width as usize * height as usize * layout.bands();
        assert_eq!(
            data.len(),
            expected,
            "raster storage must be {expected} bytes for {width}x{height} {layout:?}"
        );
        Raster {
            width,
            height,
            layout,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    pub fn layout(&self) -> SampleLayout {
        self.layout
    }

    /// Samples per pixel.
    pub fn bands(&self) -> usize {
        self.layout.bands()
    }

    /// The interleaved sample bytes, row-major, no row padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Sample value of logical band `band` at (`x`, `y`).
    pub fn sample(&self, x: u32, y: u32, band: usize) -> u8 {
        let bands = self.layout.bands();
        let i = (y as usize * self.width as usize + x as usize) * bands
            + self.layout.band_offset(band);
        self.data[i]
    }
}

/// Packs a decoded native plane into a tight raster.
///
/// `plane` holds `height` rows of `stride` bytes each. Whether the stride is
/// tight is only known at runtime, after the native decode reports it: a
/// tight plane's copy out of native memory is adopted directly as the raster
/// storage, while a padded plane has each row's `stride - width * bands`
/// trailing bytes dropped.
pub(crate) fn pack_plane(
    plane: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    layout: SampleLayout,
) -> Raster {
    let row_bytes = width as usize * layout.bands();
    debug_assert!(stride >= row_bytes);

    let data = if stride == row_bytes {
        plane.to_vec()
    } else {
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in plane.chunks(stride).take(height as usize) {
            data.extend_from_slice(&row[..row_bytes]);
        }
        data
    };
    Raster::from_vec(width, height, layout, data)
}

/// Unpacks raster samples into a native plane of the codec's stride.
///
/// The destination stride is whatever the codec reports for the plane it
/// allocated, which may exceed the tight row width; trailing padding is left
/// untouched. A single-band pad-free source takes one bulk copy. Multi-band
/// sources always go sample-by-sample: the raster's byte order (e.g. BGR)
/// need not be the R-G-B order the plane expects.
pub(crate) fn unpack_into_plane(raster: &Raster, plane: &mut [u8], stride: usize) {
    let width = raster.width() as usize;
    let height = raster.height() as usize;
    let bands = raster.bands();
    let row_bytes = width * bands;
    debug_assert!(stride >= row_bytes);

    if bands == 1 && stride == row_bytes {
        plane[..row_bytes * height].copy_from_slice(raster.data());
        return;
    }
    for y in 0..height {
        let row = &mut plane[y * stride..y * stride + row_bytes];
        let mut i = 0;
        for x in 0..width {
            for band in 0..bands {
                row[i] = raster.sample(x as u32, y as u32, band);
                i += 1;
            }
        }
    }
}
