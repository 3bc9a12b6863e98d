// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Magic-byte format identification.

/// Container formats recognized from the magic window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// AV1 image file (`avif` brand).
    Avif,
    /// HEIF family (`heic`, `heix`, or `mif1` brand).
    Heif,
    /// Anything else.
    Unknown,
}

/// Number of leading bytes format identification inspects.
pub(crate) const MAGIC_LEN: usize = 12;

/// Identifies the container format from the first bytes of a source.
///
/// Bytes 4..8 must be the `ftyp` box type; bytes 8..12 select the brand.
/// Any other pattern, including a source shorter than twelve bytes, is
/// [`ImageFormat::Unknown`].
pub fn detect_format(magic: &[u8]) -> ImageFormat {
    if magic.len() < MAGIC_LEN || &magic[4..8] != b"ftyp" {
        return ImageFormat::Unknown;
    }
    match &magic[8..12] {
        b"avif" => ImageFormat::Avif,
        b"heic" | b"heix" | b"mif1" => ImageFormat::Heif,
        _ => ImageFormat::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magic(brand: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x1c];
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(brand);
        bytes
    }

    #[test]
    fn test_detects_all_supported_brands() {
        assert_eq!(detect_format(&magic(b"avif")), ImageFormat::Avif);
        assert_eq!(detect_format(&magic(b"heic")), ImageFormat::Heif);
        assert_eq!(detect_format(&magic(b"heix")), ImageFormat::Heif);
        assert_eq!(detect_format(&magic(b"mif1")), ImageFormat::Heif);
    }

    #[test]
    fn test_unknown_brand() {
        assert_eq!(detect_format(&magic(b"jpeg")), ImageFormat::Unknown);
        assert_eq!(detect_format(&magic(b"avis")), ImageFormat::Unknown);
    }

    #[test]
    fn test_missing_ftyp() {
        let mut bytes = magic(b"avif");
        bytes[4] = b'F';
        assert_eq!(detect_format(&bytes), ImageFormat::Unknown);
    }

    #[test]
    fn test_short_input() {
        assert_eq!(detect_format(&[]), ImageFormat::Unknown);
        assert_eq!(detect_format(&magic(b"avif")[..11]), ImageFormat::Unknown);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = magic(b"avif");
        bytes.extend_from_slice(&[0xFF; 32]);
        assert_eq!(detect_format(&bytes), ImageFormat::Avif);
    }
}
