// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! EXIF payload handling.
//!
//! A container's EXIF metadata block carries a fixed 10-byte prefix (the
//! 4-byte TIFF header offset followed by the 6-byte `Exif\0\0` marker)
//! ahead of an ordinary TIFF byte stream. The prefix is stripped, the TIFF
//! byte-order header validated, and IFD0 parsed into a flat directory,
//! following the EXIF sub-IFD pointer one level deep.

use crate::error::{Error, Result};

/// Bytes to discard from an EXIF block payload before TIFF parsing.
pub(crate) const PAYLOAD_PREFIX_LEN: usize = 10;

const EXIF_IFD_POINTER: u16 = 0x8769;

/// Parsed EXIF fields in directory order (IFD0 first, then the EXIF
/// sub-IFD, if present).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifDirectory {
    pub fields: Vec<ExifField>,
}

impl ExifDirectory {
    /// First field with the given TIFF tag number, if present.
    pub fn field(&self, tag: u16) -> Option<&ExifField> {
        self.fields.iter().find(|f| f.tag == tag)
    }
}

/// One TIFF directory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifField {
    pub tag: u16,
    pub value: ExifValue,
}

/// Decoded TIFF field value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExifValue {
    Bytes(Vec<u8>),
    Ascii(String),
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    /// (numerator, denominator) pairs.
    Rationals(Vec<(u32, u32)>),
    Undefined(Vec<u8>),
}

/// Parses a raw EXIF metadata block payload.
pub(crate) fn parse_payload(payload: &[u8]) -> Result<ExifDirectory> {
    let tiff = payload
        .get(PAYLOAD_PREFIX_LEN..)
        .ok_or(Error::SourceFormat)?;
    parse_tiff(tiff)
}

fn parse_tiff(tiff: &[u8]) -> Result<ExifDirectory> {
    let big_endian = match tiff.get(..2) {
        Some(b"II") => false,
        Some(b"MM") => true,
        _ => return Err(Error::SourceFormat),
    };
    let bytes = TiffBytes {
        data: tiff,
        big_endian,
    };
    if bytes.u16_at(2)? != 42 {
        return Err(Error::SourceFormat);
    }
    let ifd0 = bytes.u32_at(4)? as usize;

    let mut fields = Vec::new();
    let sub_ifd = read_ifd(&bytes, ifd0, &mut fields)?;
    if let Some(offset) = sub_ifd {
        read_ifd(&bytes, offset, &mut fields)?;
    }
    Ok(ExifDirectory { fields })
}

struct TiffBytes<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl TiffBytes<'_> {
    fn u16_at(&self, offset: usize) -> Result<u16> {
        let b = self
            .data
            .get(offset..offset + 2)
            .ok_or(Error::SourceFormat)?;
        Ok(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let b = self
            .data
            .get(offset..offset + 4)
            .ok_or(Error::SourceFormat)?;
        Ok(if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    fn bytes_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data
            .get(offset..offset + len)
            .ok_or(Error::SourceFormat)
    }
}

/// Reads one IFD, appending decoded fields and returning the EXIF sub-IFD
/// offset if the pointer tag is present.
fn read_ifd(
    bytes: &TiffBytes<'_>,
    offset: usize,
    fields: &mut Vec<ExifField>,
) -> Result<Option<usize>> {
    let count = bytes.u16_at(offset)? as usize;
    let mut sub_ifd = None;
    for i in 0..count {
        let entry = offset + 2 + i * 12;
        let tag = bytes.u16_at(entry)?;
        let field_type = bytes.u16_at(entry + 2)?;
        let value_count = bytes.u32_at(entry + 4)? as usize;
        let Some(value) = read_value(bytes, entry + 8, field_type, value_count)? else {
            continue;
        };
        if tag == EXIF_IFD_POINTER {
            if let ExifValue::Longs(longs) = &value {
                sub_ifd = longs.first().map(|&p| p as usize);
            }
            // A structural pointer, not image metadata.
            continue;
        }
        fields.push(ExifField { tag, value });
    }
    Ok(sub_ifd)
}

/// Decodes one entry's value. Returns `None` for field types this reader
/// does not know, which are skipped rather than rejected.
fn read_value(
    bytes: &TiffBytes<'_>,
    value_slot: usize,
    field_type: u16,
    count: usize,
) -> Result<Option<ExifValue>> {
    let unit: usize = match field_type {
        1 | 2 | 7 => 1,
        3 => 2,
        4 => 4,
        5 => 8,
        _ => return Ok(None),
    };
    let total = unit.checked_mul(count).ok_or(Error::SourceFormat)?;
    if total > bytes.data.len() {
        return Err(Error::SourceFormat);
    }
    // Values of four bytes or fewer live inline in the entry; larger ones
    // live at the offset stored there.
    let start = if total <= 4 {
        value_slot
    } else {
        bytes.u32_at(value_slot)? as usize
    };

    let value = match field_type {
        1 => ExifValue::Bytes(bytes.bytes_at(start, total)?.to_vec()),
        7 => ExifValue::Undefined(bytes.bytes_at(start, total)?.to_vec()),
        2 => {
            let raw = bytes.bytes_at(start, total)?;
            let text = raw.split(|&b| b == 0).next().unwrap_or(&[]);
            ExifValue::Ascii(String::from_utf8_lossy(text).into_owned())
        }
        3 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push(bytes.u16_at(start + i * 2)?);
            }
            ExifValue::Shorts(values)
        }
        4 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push(bytes.u32_at(start + i * 4)?);
            }
            ExifValue::Longs(values)
        }
        5 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                let numerator = bytes.u32_at(start + i * 8)?;
                let denominator = bytes.u32_at(start + i * 8 + 4)?;
                values.push((numerator, denominator));
            }
            ExifValue::Rationals(values)
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TiffBuilder {
        data: Vec<u8>,
        big_endian: bool,
    }

    impl TiffBuilder {
        fn new(big_endian: bool) -> TiffBuilder {
            let mut data = Vec::new();
            data.extend_from_slice(if big_endian { b"MM" } else { b"II" });
            let mut b = TiffBuilder { data, big_endian };
            b.push_u16(42);
            b.push_u32(8); // IFD0 directly after the header
            b
        }

        fn push_u16(&mut self, v: u16) {
            self.data.extend_from_slice(&if self.big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            });
        }

        fn push_u32(&mut self, v: u32) {
            self.data.extend_from_slice(&if self.big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            });
        }

        fn into_payload(self) -> Vec<u8> {
            let mut payload = vec![0, 0, 0, 0];
            payload.extend_from_slice(b"Exif\0\0");
            payload.extend_from_slice(&self.data);
            payload
        }
    }

    fn simple_payload(big_endian: bool) -> Vec<u8> {
        let mut b = TiffBuilder::new(big_endian);
        b.push_u16(2); // entry count
        // ImageWidth, SHORT, 1 -> 640 (inline, padded to 4 bytes)
        b.push_u16(0x0100);
        b.push_u16(3);
        b.push_u32(1);
        b.push_u16(640);
        b.push_u16(0);
        // ExifIFDPointer, LONG, 1 -> sub-IFD at offset 38
        b.push_u16(EXIF_IFD_POINTER);
        b.push_u16(4);
        b.push_u32(1);
        b.push_u32(38);
        b.push_u32(0); // next-IFD offset
        // Sub-IFD at offset 38: one UNDEFINED ExifVersion entry
        b.push_u16(1);
        b.push_u16(0x9000);
        b.push_u16(7);
        b.push_u32(4);
        b.data.extend_from_slice(b"0231");
        b.into_payload()
    }

    #[test]
    fn test_parses_little_endian_payload() {
        let dir = parse_payload(&simple_payload(false)).unwrap();
        assert_eq!(dir.fields.len(), 2);
        assert_eq!(dir.field(0x0100).unwrap().value, ExifValue::Shorts(vec![640]));
        assert_eq!(
            dir.field(0x9000).unwrap().value,
            ExifValue::Undefined(b"0231".to_vec())
        );
        // The sub-IFD pointer itself is structural and not reported.
        assert!(dir.field(EXIF_IFD_POINTER).is_none());
    }

    #[test]
    fn test_parses_big_endian_payload() {
        let dir = parse_payload(&simple_payload(true)).unwrap();
        assert_eq!(dir.field(0x0100).unwrap().value, ExifValue::Shorts(vec![640]));
    }

    #[test]
    fn test_ascii_value_with_offset_storage() {
        let mut b = TiffBuilder::new(false);
        b.push_u16(1);
        // Make, ASCII, 9 bytes -> stored at offset 26
        b.push_u16(0x010F);
        b.push_u16(2);
        b.push_u32(9);
        b.push_u32(26);
        b.push_u32(0); // next-IFD offset
        b.data.extend_from_slice(b"heifcam\0\0");
        let dir = parse_payload(&b.into_payload()).unwrap();
        assert_eq!(
            dir.field(0x010F).unwrap().value,
            ExifValue::Ascii("heifcam".into())
        );
    }

    #[test]
    fn test_rational_value() {
        let mut b = TiffBuilder::new(false);
        b.push_u16(1);
        // XResolution, RATIONAL, 1 -> stored at offset 26
        b.push_u16(0x011A);
        b.push_u16(5);
        b.push_u32(1);
        b.push_u32(26);
        b.push_u32(0);
        b.push_u32(72);
        b.push_u32(1);
        let dir = parse_payload(&b.into_payload()).unwrap();
        assert_eq!(
            dir.field(0x011A).unwrap().value,
            ExifValue::Rationals(vec![(72, 1)])
        );
    }

    #[test]
    fn test_rejects_payload_shorter_than_prefix() {
        assert!(matches!(
            parse_payload(b"Exif\0\0"),
            Err(Error::SourceFormat)
        ));
    }

    #[test]
    fn test_rejects_bad_byte_order_marker() {
        let mut payload = vec![0, 0, 0, 0];
        payload.extend_from_slice(b"Exif\0\0");
        payload.extend_from_slice(b"XX\x2A\x00");
        assert!(matches!(parse_payload(&payload), Err(Error::SourceFormat)));
    }

    #[test]
    fn test_rejects_truncated_directory() {
        let mut b = TiffBuilder::new(false);
        b.push_u16(3); // claims three entries, none follow
        assert!(matches!(
            parse_payload(&b.into_payload()),
            Err(Error::SourceFormat)
        ));
    }

    #[test]
    fn test_unknown_field_types_are_skipped() {
        let mut b = TiffBuilder::new(false);
        b.push_u16(2);
        // SLONG (type 9) entry: skipped, not an error.
        b.push_u16(0x1234);
        b.push_u16(9);
        b.push_u32(1);
        b.push_u32(0);
        // Orientation, SHORT, 1 -> 6
        b.push_u16(0x0112);
        b.push_u16(3);
        b.push_u32(1);
        b.push_u16(6);
        b.push_u16(0);
        b.push_u32(0);
        let dir = parse_payload(&b.into_payload()).unwrap();
        assert_eq!(dir.fields.len(), 1);
        assert_eq!(dir.field(0x0112).unwrap().value, ExifValue::Shorts(vec![6]));
    }
}
