// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Decoding session over a native codec context.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::raw::{c_int, c_void};
use std::path::{Path, PathBuf};

use crate::cms::{self, ColorProfile, NclxProfile};
use crate::container::{Container, TopImage};
use crate::error::{check, Error, Result};
use crate::exif::ExifDirectory;
use crate::ffi;
use crate::format::{self, ImageFormat, MAGIC_LEN};
use crate::raster::{self, Raster, SampleLayout, Size};
use crate::reader::{self, RandomAccess};
use crate::registry::{self, Registration, Token};

/// Embedded metadata of one image.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Parsed EXIF directory, if the container carries an `Exif` block.
    pub exif: Option<ExifDirectory>,
    /// Raw XMP packet bytes, if the container carries a MIME block.
    pub xmp: Option<Vec<u8>>,
}

enum Source<'a> {
    /// Opened by the decoder itself; closed when the session ends.
    File { file: File, path: PathBuf },
    /// Supplied by the caller; never closed here.
    Stream(&'a mut dyn RandomAccess),
}

impl Source<'_> {
    fn stream(&mut self) -> &mut dyn RandomAccess {
        match self {
            Source::File { file, .. } => file,
            Source::Stream(stream) => *stream,
        }
    }
}

/// Synchronous HEIF/AVIF decoding session.
///
/// One session owns one native context plus the callback plumbing behind
/// it. Everything is resolved lazily: no native call happens until the
/// first operation that needs one, and every resolved attribute is cached
/// for the session's lifetime.
pub struct Decoder<'a> {
    source: Source<'a>,
    ctx: *mut ffi::heif_context,
    /// Boxed so its address stays stable for the whole session; the native
    /// library keeps the pointer for lazy reads during decode calls.
    reader_vtable: Option<Box<ffi::heif_reader>>,
    token: Token,
    registration: Option<Registration>,
    format: Option<ImageFormat>,
    container: Option<Container>,
}

impl Decoder<'static> {
    /// Opens `path` for decoding. The file is owned by the session and
    /// closed when the session ends.
    pub fn open(path: impl AsRef<Path>) -> Result<Decoder<'static>> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                Error::NotFound(path.clone())
            }
            _ => Error::Io(e),
        })?;
        Ok(Decoder::with_source(Source::File { file, path }))
    }
}

impl<'a> Decoder<'a> {
    /// Wraps a caller-supplied stream. The stream is borrowed for the
    /// session's lifetime and never closed by the decoder.
    pub fn from_stream(stream: &'a mut dyn RandomAccess) -> Decoder<'a> {
        Decoder::with_source(Source::Stream(stream))
    }

    fn with_source(source: Source<'a>) -> Decoder<'a> {
        Decoder {
            source,
            ctx: std::ptr::null_mut(),
            reader_vtable: None,
            token: registry::next_token(),
            registration: None,
            format: None,
            container: None,
        }
    }

    /// Identifies the source format from the leading magic bytes, leaving
    /// the stream positioned at the start.
    pub fn detect_format(&mut self) -> Result<ImageFormat> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        let stream = self.source.stream();
        let format = if stream.len()? >= MAGIC_LEN as u64 {
            stream.seek(SeekFrom::Start(0))?;
            let mut magic = [0u8; MAGIC_LEN];
            stream.read_exact(&mut magic)?;
            format::detect_format(&magic)
        } else {
            ImageFormat::Unknown
        };
        stream.seek(SeekFrom::Start(0))?;
        self.format = Some(format);
        Ok(format)
    }

    /// Number of top-level images in the container.
    pub fn num_images(&mut self) -> Result<usize> {
        self.init_context()?;
        Ok(self.container().num_images())
    }

    /// Always 1: these containers are single-resolution.
    pub fn num_resolutions(&self) -> usize {
        1
    }

    /// Number of thumbnails subordinate to image `image_index`.
    pub fn num_thumbnails(&mut self, image_index: usize) -> Result<usize> {
        self.with_image(image_index, |image, ctx| image.num_thumbnails(ctx))
    }

    /// Full pixel dimensions of image `image_index`.
    pub fn size(&mut self, image_index: usize) -> Result<Size> {
        self.with_image(image_index, |image, ctx| image.size(ctx))
    }

    /// The container is untiled; a tile is the whole image.
    pub fn tile_size(&mut self, image_index: usize) -> Result<Size> {
        self.size(image_index)
    }

    /// Whether image `image_index` carries an alpha channel.
    pub fn has_alpha(&mut self, image_index: usize) -> Result<bool> {
        self.with_image(image_index, |image, ctx| image.has_alpha(ctx))
    }

    /// Pixel dimensions of thumbnail `thumb_index` of image `image_index`.
    pub fn thumbnail_size(&mut self, image_index: usize, thumb_index: usize) -> Result<Size> {
        self.with_image(image_index, |image, ctx| {
            let parent = image.handle(ctx)?;
            let thumbnail = image.thumbnail(ctx, thumb_index)?;
            thumbnail.size(parent)
        })
    }

    /// EXIF and XMP metadata of image `image_index`, resolved once per
    /// session.
    pub fn metadata(&mut self, image_index: usize) -> Result<Metadata> {
        self.with_image(image_index, |image, ctx| {
            Ok(Metadata {
                exif: image.exif(ctx)?,
                xmp: image.xmp(ctx)?,
            })
        })
    }

    /// Embedded color profile of image `image_index`.
    pub fn color_profile(&mut self, image_index: usize) -> Result<ColorProfile> {
        self.with_image(image_index, |image, ctx| {
            let handle = image.handle(ctx)?;
            if let Some(icc) = read_raw_profile(handle)? {
                return Ok(ColorProfile::Icc(icc));
            }
            let mut nclx: *mut ffi::heif_color_profile_nclx = std::ptr::null_mut();
            let err = unsafe { ffi::heif_image_handle_get_nclx_color_profile(handle, &mut nclx) };
            if err.code == ffi::heif_error_Color_profile_does_not_exist || nclx.is_null() {
                return Ok(ColorProfile::None);
            }
            check(err)?;
            let profile = NclxProfile::from_native(unsafe { &*nclx });
            unsafe { ffi::heif_nclx_color_profile_free(nclx) };
            Ok(ColorProfile::Nclx(profile))
        })
    }

    /// Decodes image `image_index` into a tight interleaved raster,
    /// converted to sRGB when the image embeds a usable ICC profile.
    pub fn decode(&mut self, image_index: usize) -> Result<Raster> {
        self.with_image(image_index, |image, ctx| {
            let handle = image.handle(ctx)?;
            let has_alpha = image.has_alpha(ctx)?;
            let size = image.size(ctx)?;
            read_image(handle, size, has_alpha)
        })
    }

    /// Decodes thumbnail `thumb_index` of image `image_index`.
    pub fn decode_thumbnail(&mut self, image_index: usize, thumb_index: usize) -> Result<Raster> {
        self.with_image(image_index, |image, ctx| {
            let parent = image.handle(ctx)?;
            let thumbnail = image.thumbnail(ctx, thumb_index)?;
            let handle = thumbnail.handle(parent)?;
            let size = thumbnail.size(parent)?;
            let has_alpha = thumbnail.has_alpha();
            read_image(handle, size, has_alpha)
        })
    }

    fn with_image<T>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut TopImage, *mut ffi::heif_context) -> Result<T>,
    ) -> Result<T> {
        self.init_context()?;
        let ctx = self.ctx;
        let image = self.container().image(index)?;
        f(image, ctx)
    }

    fn container(&mut self) -> &mut Container {
        self.container
            .as_mut()
            .expect("container resolved with context")
    }

    /// Builds the native context and the top-level image list, once.
    fn init_context(&mut self) -> Result<()> {
        if !self.ctx.is_null() {
            return Ok(());
        }
        crate::ensure_supported_version()?;
        if self.detect_format()? == ImageFormat::Unknown {
            return Err(Error::SourceFormat);
        }

        // From here on the context is owned by the session and freed in
        // `Drop`, even when reading the container fails.
        self.ctx = unsafe { ffi::heif_context_alloc() };
        match &mut self.source {
            Source::File { path, .. } => {
                let c_path = CString::new(path.as_os_str().as_encoded_bytes()).map_err(|_| {
                    Error::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "path contains a NUL byte",
                    ))
                })?;
                check(unsafe {
                    ffi::heif_context_read_from_file(self.ctx, c_path.as_ptr(), std::ptr::null())
                })?;
            }
            Source::Stream(stream) => {
                let vtable = Box::new(reader::new_reader());
                let stream_ptr: *mut (dyn RandomAccess + '_) = &mut **stream;
                // SAFETY: lifetime erasure only. The entry is removed in
                // `Drop`, which runs before the stream borrow can end.
                let stream_ptr: *mut (dyn RandomAccess + 'static) =
                    unsafe { std::mem::transmute(stream_ptr) };
                self.registration = Some(Registration::reader(self.token, stream_ptr));
                let err = unsafe {
                    ffi::heif_context_read_from_reader(
                        self.ctx,
                        &*vtable,
                        reader::token_as_userdata(self.token),
                        std::ptr::null(),
                    )
                };
                self.reader_vtable = Some(vtable);
                check(err)?;
            }
        }
        self.container = Some(Container::from_context(self.ctx)?);
        Ok(())
    }
}

impl Drop for Decoder<'_> {
    fn drop(&mut self) {
        // Child-before-parent: the container teardown releases thumbnail
        // and image handles before the context they came from goes away.
        self.container.take();
        if !self.ctx.is_null() {
            unsafe { ffi::heif_context_free(self.ctx) };
            self.ctx = std::ptr::null_mut();
        }
        self.registration.take();
        // The owned file (path case) drops with the session; a borrowed
        // stream stays open for its owner.
    }
}

/// Decodes through a resolved handle and packs the native plane.
fn read_image(handle: *mut ffi::heif_image_handle, size: Size, has_alpha: bool) -> Result<Raster> {
    let (chroma, layout) = if has_alpha {
        (ffi::heif_chroma_interleaved_RGBA, SampleLayout::Rgba)
    } else {
        (ffi::heif_chroma_interleaved_RGB, SampleLayout::Rgb)
    };

    let mut image: *mut ffi::heif_image = std::ptr::null_mut();
    check(unsafe {
        ffi::heif_decode_image(
            handle,
            &mut image,
            ffi::heif_colorspace_RGB,
            chroma,
            std::ptr::null(),
        )
    })?;

    let result = (|| {
        let mut stride: c_int = 0;
        let plane =
            unsafe { ffi::heif_image_get_plane_readonly(image, ffi::heif_channel_interleaved, &mut stride) };
        if plane.is_null() || stride <= 0 {
            return Err(Error::Native(
                "decoded image has no interleaved plane".into(),
            ));
        }
        let stride = stride as usize;
        let plane = unsafe { std::slice::from_raw_parts(plane, stride * size.height as usize) };
        let raster = raster::pack_plane(plane, size.width, size.height, stride, layout);

        match read_raw_profile(handle)? {
            Some(icc) if !icc.is_empty() => cms::convert_to_srgb(raster, &icc),
            _ => Ok(raster),
        }
    })();
    unsafe { ffi::heif_image_release(image) };
    result
}

/// Raw ICC profile bytes attached to `handle`, if any.
fn read_raw_profile(handle: *const ffi::heif_image_handle) -> Result<Option<Vec<u8>>> {
    let size = unsafe { ffi::heif_image_handle_get_raw_color_profile_size(handle) };
    if size == 0 {
        return Ok(None);
    }
    let mut data = vec![0u8; size];
    check(unsafe {
        ffi::heif_image_handle_get_raw_color_profile(handle, data.as_mut_ptr() as *mut c_void)
    })?;
    Ok(Some(data))
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
