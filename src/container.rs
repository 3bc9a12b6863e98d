// Copyright (c) the heifrs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Lazily resolved forest of top-level images and their thumbnails.
//!
//! The native library vends handles on demand, so every node attribute is a
//! memoized accessor: resolved against the context at most once, cached for
//! the session's lifetime. Teardown releases handles child-before-parent —
//! thumbnail handles before the image handle they were resolved through,
//! and the caller frees the context only after the whole forest is gone.

use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_int, c_void};

use crate::error::{check, Error, Result};
use crate::exif::{self, ExifDirectory};
use crate::ffi;
use crate::raster::Size;

/// Top-level image list of one opened context.
pub(crate) struct Container {
    num_images: usize,
    /// IDs in container-declared order.
    image_ids: Vec<ffi::heif_item_id>,
    /// Keyed by image ID.
    images: HashMap<ffi::heif_item_id, TopImage>,
}

impl Container {
    pub(crate) fn from_context(ctx: *mut ffi::heif_context) -> Result<Container> {
        let num_images =
            unsafe { ffi::heif_context_get_number_of_top_level_images(ctx) }.max(0) as usize;
        let mut image_ids = vec![0 as ffi::heif_item_id; num_images];
        let _written = unsafe {
            ffi::heif_context_get_list_of_top_level_image_IDs(
                ctx,
                image_ids.as_mut_ptr(),
                num_images as c_int,
            )
        };
        // The reported image count stays authoritative over whatever the
        // list call claims to have produced.
        image_ids.truncate(num_images);
        Ok(Container {
            num_images,
            image_ids,
            images: HashMap::new(),
        })
    }

    pub(crate) fn num_images(&self) -> usize {
        self.num_images
    }

    pub(crate) fn image(&mut self, index: usize) -> Result<&mut TopImage> {
        let count = self.num_images;
        let id = *self
            .image_ids
            .get(index)
            .ok_or(Error::IndexOutOfBounds { index, count })?;
        Ok(self.images.entry(id).or_insert_with(|| TopImage::new(id)))
    }
}

/// One top-level image entry and its lazily resolved attributes.
pub(crate) struct TopImage {
    id: ffi::heif_item_id,
    /// Null until resolved.
    handle: *mut ffi::heif_image_handle,
    size: Option<Size>,
    has_alpha: Option<bool>,
    num_thumbnails: Option<usize>,
    /// Thumbnail IDs in index order.
    thumb_ids: Option<Vec<ffi::heif_item_id>>,
    /// Keyed by thumbnail ID.
    thumbnails: HashMap<ffi::heif_item_id, Thumbnail>,
    /// Outer `Option`: whether the block has been looked for yet.
    exif: Option<Option<ExifDirectory>>,
    xmp: Option<Option<Vec<u8>>>,
}

impl TopImage {
    fn new(id: ffi::heif_item_id) -> TopImage {
        TopImage {
            id,
            handle: std::ptr::null_mut(),
            size: None,
            has_alpha: None,
            num_thumbnails: None,
            thumb_ids: None,
            thumbnails: HashMap::new(),
            exif: None,
            xmp: None,
        }
    }

    /// Resolves the native handle, once.
    pub(crate) fn handle(
        &mut self,
        ctx: *mut ffi::heif_context,
    ) -> Result<*mut ffi::heif_image_handle> {
        if self.handle.is_null() {
            let mut handle: *mut ffi::heif_image_handle = std::ptr::null_mut();
            check(unsafe { ffi::heif_context_get_image_handle(ctx, self.id, &mut handle) })?;
            self.handle = handle;
        }
        Ok(self.handle)
    }

    pub(crate) fn size(&mut self, ctx: *mut ffi::heif_context) -> Result<Size> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let handle = self.handle(ctx)?;
        let width = unsafe { ffi::heif_image_handle_get_width(handle) };
        let height = unsafe { ffi::heif_image_handle_get_height(handle) };
        let size = Size {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        };
        self.size = Some(size);
        Ok(size)
    }

    pub(crate) fn has_alpha(&mut self, ctx: *mut ffi::heif_context) -> Result<bool> {
        if let Some(has_alpha) = self.has_alpha {
            return Ok(has_alpha);
        }
        let handle = self.handle(ctx)?;
        let has_alpha = unsafe { ffi::heif_image_handle_has_alpha_channel(handle) } != 0;
        self.has_alpha = Some(has_alpha);
        Ok(has_alpha)
    }

    pub(crate) fn num_thumbnails(&mut self, ctx: *mut ffi::heif_context) -> Result<usize> {
        if let Some(count) = self.num_thumbnails {
            return Ok(count);
        }
        let handle = self.handle(ctx)?;
        let count = unsafe { ffi::heif_image_handle_get_number_of_thumbnails(handle) }.max(0) as usize;
        self.num_thumbnails = Some(count);
        Ok(count)
    }

    /// Looks up the thumbnail at `index`, resolving the ID list on first
    /// use.
    pub(crate) fn thumbnail(
        &mut self,
        ctx: *mut ffi::heif_context,
        index: usize,
    ) -> Result<&mut Thumbnail> {
        let count = self.num_thumbnails(ctx)?;
        if index >= count {
            return Err(Error::IndexOutOfBounds { index, count });
        }
        if self.thumb_ids.is_none() {
            let handle = self.handle(ctx)?;
            let mut ids = vec![0 as ffi::heif_item_id; count];
            let _written = unsafe {
                ffi::heif_image_handle_get_list_of_thumbnail_IDs(
                    handle,
                    ids.as_mut_ptr(),
                    count as c_int,
                )
            };
            // The native list call may claim more entries than the reported
            // thumbnail count; the count is authoritative and surplus
            // entries are ignored.
            ids.truncate(count);
            for &id in &ids {
                self.thumbnails.entry(id).or_insert_with(|| Thumbnail::new(id));
            }
            self.thumb_ids = Some(ids);
        }
        let id = match &self.thumb_ids {
            Some(ids) => ids[index],
            None => return Err(Error::IndexOutOfBounds { index, count }),
        };
        match self.thumbnails.get_mut(&id) {
            Some(thumbnail) => Ok(thumbnail),
            None => Err(Error::IndexOutOfBounds { index, count }),
        }
    }

    /// EXIF directory from the container's single `Exif` metadata block, if
    /// one exists. Resolved once.
    pub(crate) fn exif(&mut self, ctx: *mut ffi::heif_context) -> Result<Option<ExifDirectory>> {
        if let Some(cached) = &self.exif {
            return Ok(cached.clone());
        }
        let handle = self.handle(ctx)?;
        let directory = match read_metadata_block(handle, c"Exif")? {
            Some(payload) => Some(exif::parse_payload(&payload)?),
            None => None,
        };
        self.exif = Some(directory.clone());
        Ok(directory)
    }

    /// Raw XMP bytes from the container's MIME metadata block, if present.
    pub(crate) fn xmp(&mut self, ctx: *mut ffi::heif_context) -> Result<Option<Vec<u8>>> {
        if let Some(cached) = &self.xmp {
            return Ok(cached.clone());
        }
        let handle = self.handle(ctx)?;
        let xmp = read_metadata_block(handle, c"mime")?;
        self.xmp = Some(xmp.clone());
        Ok(xmp)
    }
}

impl Drop for TopImage {
    fn drop(&mut self) {
        // Thumbnail handles go before the parent handle they were resolved
        // through.
        self.thumbnails.clear();
        if !self.handle.is_null() {
            unsafe { ffi::heif_image_handle_release(self.handle) };
        }
    }
}

/// One thumbnail entry, subordinate to a top-level image.
pub(crate) struct Thumbnail {
    id: ffi::heif_item_id,
    handle: *mut ffi::heif_image_handle,
    size: Option<Size>,
}

impl Thumbnail {
    fn new(id: ffi::heif_item_id) -> Thumbnail {
        Thumbnail {
            id,
            handle: std::ptr::null_mut(),
            size: None,
        }
    }

    /// Resolves through the parent image's handle; thumbnails have no
    /// context-level lookup of their own.
    pub(crate) fn handle(
        &mut self,
        parent: *mut ffi::heif_image_handle,
    ) -> Result<*mut ffi::heif_image_handle> {
        if self.handle.is_null() {
            let mut handle: *mut ffi::heif_image_handle = std::ptr::null_mut();
            check(unsafe { ffi::heif_image_handle_get_thumbnail(parent, self.id, &mut handle) })?;
            self.handle = handle;
        }
        Ok(self.handle)
    }

    pub(crate) fn size(&mut self, parent: *mut ffi::heif_image_handle) -> Result<Size> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let handle = self.handle(parent)?;
        let width = unsafe { ffi::heif_image_handle_get_width(handle) };
        let height = unsafe { ffi::heif_image_handle_get_height(handle) };
        let size = Size {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        };
        self.size = Some(size);
        Ok(size)
    }

    pub(crate) fn has_alpha(&self) -> bool {
        false
    }
}

impl Drop for Thumbnail {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ffi::heif_image_handle_release(self.handle) };
        }
    }
}

/// Reads the single metadata block matching `type_filter`, if present.
fn read_metadata_block(
    handle: *mut ffi::heif_image_handle,
    type_filter: &CStr,
) -> Result<Option<Vec<u8>>> {
    let mut block_id: ffi::heif_item_id = 0;
    let n = unsafe {
        ffi::heif_image_handle_get_list_of_metadata_block_IDs(
            handle,
            type_filter.as_ptr(),
            &mut block_id,
            1,
        )
    };
    if n != 1 {
        return Ok(None);
    }
    let size = unsafe { ffi::heif_image_handle_get_metadata_size(handle, block_id) };
    if size == 0 {
        return Ok(None);
    }
    let mut data = vec![0u8; size];
    check(unsafe {
        ffi::heif_image_handle_get_metadata(handle, block_id, data.as_mut_ptr() as *mut c_void)
    })?;
    Ok(Some(data))
}
