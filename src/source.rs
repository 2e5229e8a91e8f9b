//! Source-texture model (spec component C2): the properties record, the
//! owned byte buffer ("bulk data") it describes, and scoped read/write
//! access to that buffer.
//!
//! Bulk data is shared through an `Arc<RwLock<Vec<u8>>>` rather than a
//! hand-rolled refcounted pointer: many-readers/one-writer enforced by the
//! lock and scope-guarded release on drop map directly onto the
//! `ReaderScope`/`WriterScope` contract from §4.2 and the "single exclusive
//! writer OR many shared readers" resource policy in §5.

use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::format::{
    can_hold_hdr, full_mip_count, mip_size_in_bytes, size_in_bytes, ColorMask, GammaSpace,
    ImageView, SourceFlags, SourceFormat,
};

/// Plain record describing a texture's shape and authoring metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSourceProperties {
    pub dimensions: [u32; 3],
    pub num_mips: u32,
    pub num_slices: u32,
    pub gamma: GammaSpace,
    pub flags: SourceFlags,
    pub source_format: SourceFormat,
    pub color_mask: ColorMask,
    pub image_view: ImageView,
}

impl TextureSourceProperties {
    pub fn texture_2d(dims: [u32; 2], format: SourceFormat, gamma: GammaSpace) -> Self {
        Self {
            dimensions: [dims[0], dims[1], 1],
            num_mips: 1,
            num_slices: 1,
            gamma,
            flags: SourceFlags::empty(),
            source_format: format,
            color_mask: ColorMask::RGBA,
            image_view: ImageView::D2,
        }
    }

    pub fn texture_2d_array(dims: [u32; 2], num_slices: u32, format: SourceFormat, gamma: GammaSpace) -> Self {
        Self {
            num_slices,
            image_view: ImageView::D2Array,
            ..Self::texture_2d(dims, format, gamma)
        }
    }

    pub fn texture_2d_with_mip_chain(dims: [u32; 2], format: SourceFormat, gamma: GammaSpace) -> Self {
        let dims3 = [dims[0], dims[1], 1];
        Self {
            num_mips: full_mip_count(dims3),
            ..Self::texture_2d(dims, format, gamma)
        }
    }

    pub fn texture_2d_array_with_mip_chain(
        dims: [u32; 2],
        num_slices: u32,
        format: SourceFormat,
        gamma: GammaSpace,
    ) -> Self {
        let dims3 = [dims[0], dims[1], 1];
        Self {
            num_mips: full_mip_count(dims3),
            num_slices,
            image_view: ImageView::D2Array,
            ..Self::texture_2d(dims, format, gamma)
        }
    }

    pub fn texture_cube_with_mip_chain(
        dims: [u32; 2],
        format: SourceFormat,
        gamma: GammaSpace,
        is_long_lat_cubemap: bool,
    ) -> Self {
        let dims3 = [dims[0], dims[1], 1];
        let (num_slices, flags) = if is_long_lat_cubemap {
            (1, SourceFlags::LONG_LAT_CUBEMAP)
        } else {
            (6, SourceFlags::empty())
        };
        Self {
            num_mips: full_mip_count(dims3),
            num_slices,
            flags,
            image_view: ImageView::Cube,
            ..Self::texture_2d(dims, format, gamma)
        }
    }

    pub fn texture_cube_array_with_mip_chain(
        dims: [u32; 2],
        num_cubes: u32,
        format: SourceFormat,
        gamma: GammaSpace,
    ) -> Self {
        let dims3 = [dims[0], dims[1], 1];
        Self {
            num_mips: full_mip_count(dims3),
            num_slices: num_cubes * 6,
            image_view: ImageView::CubeArray,
            ..Self::texture_2d(dims, format, gamma)
        }
    }

    pub fn texture_volume_with_mip_chain(dims: [u32; 3], format: SourceFormat, gamma: GammaSpace) -> Self {
        Self {
            dimensions: dims,
            num_mips: full_mip_count(dims),
            num_slices: 1,
            gamma,
            flags: SourceFlags::empty(),
            source_format: format,
            color_mask: ColorMask::RGBA,
            image_view: ImageView::D3,
        }
    }

    pub fn full_mip_count(&self) -> u32 {
        full_mip_count(self.dimensions)
    }

    pub fn next_mip_dimensions(&self) -> [u32; 3] {
        crate::format::next_mip_dimensions(self.dimensions)
    }

    /// Total buffer size in bytes across all mips and slices; see §3.
    pub fn size_in_bytes(&self) -> u64 {
        size_in_bytes(self.source_format, self.dimensions, self.num_mips, self.num_slices)
    }

    /// Byte size of a single slice (all its mips).
    fn slice_size_in_bytes(&self) -> u64 {
        size_in_bytes(self.source_format, self.dimensions, self.num_mips, 1)
    }

    /// Byte offset of mip `mip_bias` within one slice.
    fn mip_byte_offset(&self, mip_bias: u32) -> u64 {
        let mut offset = 0u64;
        let mut dims = self.dimensions;
        for _ in 0..mip_bias {
            offset += mip_size_in_bytes(self.source_format, dims);
            dims = crate::format::next_mip_dimensions(dims);
        }
        offset
    }

    fn has_alpha(&self) -> bool {
        self.color_mask.contains(ColorMask::A)
    }

    pub fn assert_invariants(&self) {
        assert!(self.num_mips > 0, "num_mips must be >= 1");
        assert!(self.dimensions.iter().all(|&d| d > 0), "dimensions must be strictly positive");
        assert!(self.image_view != ImageView::Unknown, "image_view must be resolved");
        assert!(
            self.num_mips <= self.full_mip_count(),
            "num_mips {} exceeds FullMipCount {}",
            self.num_mips,
            self.full_mip_count()
        );
    }
}

/// Owned, resizable byte buffer with optional source-file association.
///
/// Cloning a `BulkData` shares the same underlying storage (it clones the
/// `Arc`), matching "owned ... buffer" at the `TextureSource` level while
/// allowing the reader/writer scopes below to share it across threads.
#[derive(Clone)]
pub struct BulkData {
    bytes: Arc<RwLock<Vec<u8>>>,
    source_path: Option<PathBuf>,
}

impl BulkData {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(vec![0u8; size])),
            source_path: None,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(bytes)),
            source_path: None,
        }
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn source_path(&self) -> Option<&PathBuf> {
        self.source_path.as_ref()
    }

    pub fn len(&self) -> usize {
        self.bytes.read().expect("bulk data lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self) -> ReaderScope<'_> {
        ReaderScope {
            guard: self.bytes.read().expect("bulk data lock poisoned"),
        }
    }

    pub fn write(&self) -> WriterScope<'_> {
        WriterScope {
            guard: self.bytes.write().expect("bulk data lock poisoned"),
        }
    }
}

/// Shared-read scope guard; release happens automatically on drop.
pub struct ReaderScope<'a> {
    guard: RwLockReadGuard<'a, Vec<u8>>,
}

impl<'a> ReaderScope<'a> {
    pub fn bytes(&self) -> &[u8] {
        &self.guard
    }
}

/// Exclusive-write scope guard; release happens automatically on drop.
pub struct WriterScope<'a> {
    guard: RwLockWriteGuard<'a, Vec<u8>>,
}

impl<'a> WriterScope<'a> {
    pub fn bytes(&self) -> &[u8] {
        &self.guard
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.guard
    }
}

/// Owns one properties record plus one bulk-data buffer.
pub struct TextureSource {
    properties: TextureSourceProperties,
    bulk_data: BulkData,
}

impl TextureSource {
    /// Installs `properties`; if `buffer` is given it is adopted as-is
    /// (caller is responsible for it matching `size_in_bytes()`),
    /// otherwise a freshly zeroed buffer of the right size is allocated.
    ///
    /// The per-texture reserved compression field named in §4.2 and §9's
    /// open question is intentionally absent: it is never populated by
    /// this engine (see DESIGN.md), so there is nothing to store.
    pub fn construct(mut properties: TextureSourceProperties, buffer: Option<BulkData>) -> Self {
        if can_hold_hdr(properties.source_format) {
            properties.flags |= SourceFlags::HDR;
        }
        properties.assert_invariants();

        let bulk_data = match buffer {
            Some(b) => {
                assert_eq!(
                    b.len() as u64,
                    properties.size_in_bytes(),
                    "adopted buffer size does not match properties.size_in_bytes()"
                );
                b
            }
            None => BulkData::new(properties.size_in_bytes() as usize),
        };

        Self { properties, bulk_data }
    }

    pub fn construct_2d(dims: [u32; 2], format: SourceFormat, gamma: GammaSpace) -> Self {
        Self::construct(TextureSourceProperties::texture_2d(dims, format, gamma), None)
    }

    pub fn construct_2d_array(
        dims: [u32; 2],
        num_slices: u32,
        format: SourceFormat,
        gamma: GammaSpace,
    ) -> Self {
        Self::construct(
            TextureSourceProperties::texture_2d_array(dims, num_slices, format, gamma),
            None,
        )
    }

    pub fn construct_cube_with_mip_chain(
        dims: [u32; 2],
        format: SourceFormat,
        gamma: GammaSpace,
        is_long_lat_cubemap: bool,
    ) -> Self {
        Self::construct(
            TextureSourceProperties::texture_cube_with_mip_chain(dims, format, gamma, is_long_lat_cubemap),
            None,
        )
    }

    pub fn properties(&self) -> &TextureSourceProperties {
        &self.properties
    }

    pub fn bulk_data(&self) -> &BulkData {
        &self.bulk_data
    }

    pub fn tear_down(&mut self) {
        self.properties = TextureSourceProperties {
            dimensions: [1, 1, 1],
            num_mips: 1,
            num_slices: 1,
            gamma: GammaSpace::Linear,
            flags: SourceFlags::empty(),
            source_format: self.properties.source_format,
            color_mask: ColorMask::empty(),
            image_view: ImageView::Unknown,
        };
        self.bulk_data = BulkData::new(0);
    }

    pub fn reader_scope(&self) -> ReaderScope<'_> {
        self.bulk_data.read()
    }

    pub fn writer_scope(&self) -> WriterScope<'_> {
        self.bulk_data.write()
    }

    /// Byte range covering `num_mips` mips starting at `mip_bias` of slice
    /// `slice_index`, relative to the full bulk-data buffer.
    pub fn mip_data_range(&self, mip_bias: u32, num_mips: u32, slice_index: u32) -> std::ops::Range<usize> {
        assert!(slice_index < self.properties.num_slices);
        assert!(mip_bias + num_mips <= self.properties.num_mips);

        let slice_offset = slice_index as u64 * self.properties.slice_size_in_bytes();
        let start = slice_offset + self.properties.mip_byte_offset(mip_bias);

        let mut len = 0u64;
        let mut dims = self.properties.dimensions;
        for m in 0..(mip_bias + num_mips) {
            let size = mip_size_in_bytes(self.properties.source_format, dims);
            if m >= mip_bias {
                len += size;
            }
            dims = crate::format::next_mip_dimensions(dims);
        }

        start as usize..(start + len) as usize
    }

    /// Byte range covering every mip of slice `slice_index`.
    pub fn slice_data_range(&self, slice_index: u32) -> std::ops::Range<usize> {
        self.mip_data_range(0, self.properties.num_mips, slice_index)
    }

    /// Whether the authored alpha channel is meaningful for this source.
    pub fn has_alpha(&self) -> bool {
        self.properties.has_alpha()
    }

    /// Replace this source's contents with a resized copy, per §4.2
    /// `Resize`. Returns `None` on any per-slice resize failure, matching
    /// the "Returns empty on any resize/allocation failure" contract.
    pub fn resize(
        &self,
        dims: [u32; 3],
        num_mips: Option<u32>,
        format: Option<SourceFormat>,
        flags: Option<SourceFlags>,
    ) -> Option<TextureSource> {
        let new_format = format.unwrap_or(self.properties.source_format);
        assert_eq!(
            crate::format::components(new_format),
            crate::format::components(self.properties.source_format),
            "Resize: channel count must be preserved across format changes"
        );

        let new_props = TextureSourceProperties {
            dimensions: dims,
            num_mips: num_mips.unwrap_or(self.properties.num_mips),
            num_slices: self.properties.num_slices,
            gamma: self.properties.gamma,
            flags: flags.unwrap_or(self.properties.flags),
            source_format: new_format,
            color_mask: self.properties.color_mask,
            image_view: self.properties.image_view,
        };

        // Per §4.5 step 2: "If properties differ (dims/format/flags), call
        // ResizeMip2D ... Else copy bytes through" — an unchanged top mip
        // must come out byte-identical, not re-resampled through whatever
        // filter `Default` resolves to.
        let identity = self.properties.dimensions == new_props.dimensions
            && self.properties.source_format == new_props.source_format;

        let mut dst = TextureSource::construct(new_props, None);
        let mut failed = 0usize;
        let total = self.properties.num_slices as usize;
        {
            let src_reader = self.reader_scope();
            let mut dst_writer = dst.writer_scope();
            for slice in 0..self.properties.num_slices {
                let src_range = self.mip_data_range(0, 1, slice);
                let dst_range = dst.mip_data_range(0, 1, slice);
                if identity {
                    let src_bytes = src_reader.bytes()[src_range].to_vec();
                    dst_writer.bytes_mut()[dst_range].copy_from_slice(&src_bytes);
                    continue;
                }
                let ok = crate::resize::resize_mip_2d(
                    &crate::resize::ResizeMip2DArgs {
                        dims_in: self.properties.dimensions,
                        format_in: self.properties.source_format,
                        flags_in: self.properties.flags,
                        gamma_in: self.properties.gamma,
                        dims_out: new_props.dimensions,
                        format_out: new_props.source_format,
                        flags_out: new_props.flags,
                        gamma_out: new_props.gamma,
                        filter: crate::resize::ResizeFilter::Default,
                    },
                    src_reader.bytes()[src_range].as_ref(),
                    &mut dst_writer.bytes_mut()[dst_range],
                );
                if !ok {
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            tracing::warn!(failed, total, "TextureSource::resize failed on slice(s)");
            return None;
        }
        Some(dst)
    }

    /// For each slice, build the full mip chain in place via repeated
    /// `ResizeMip2D` calls. Returns `false` if any slice fails.
    pub fn generate_mip_chain_2d(&self) -> bool {
        let num_mips = self.properties.num_mips;
        let num_slices = self.properties.num_slices;
        let failed = std::sync::atomic::AtomicUsize::new(0);

        {
            let mut writer = self.writer_scope();
            let bytes = writer.bytes_mut();
            for slice in 0..num_slices {
                let mut dims = self.properties.dimensions;
                for mip in 1..num_mips {
                    let next_dims = crate::format::next_mip_dimensions(dims);
                    let src_range = self.mip_data_range(mip - 1, 1, slice);
                    let dst_range = self.mip_data_range(mip, 1, slice);
                    // Disjoint, non-overlapping ranges: split the buffer so
                    // both a shared read and an exclusive write can proceed.
                    let (src, dst) = split_disjoint_mut(bytes, src_range, dst_range);
                    let ok = crate::resize::resize_mip_2d(
                        &crate::resize::ResizeMip2DArgs {
                            dims_in: dims,
                            format_in: self.properties.source_format,
                            flags_in: self.properties.flags,
                            gamma_in: self.properties.gamma,
                            dims_out: next_dims,
                            format_out: self.properties.source_format,
                            flags_out: self.properties.flags,
                            gamma_out: self.properties.gamma,
                            filter: crate::resize::ResizeFilter::Default,
                        },
                        src,
                        dst,
                    );
                    if !ok {
                        failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                    dims = next_dims;
                }
            }
        }

        failed.load(std::sync::atomic::Ordering::Relaxed) == 0
    }
}

/// Splits `bytes` into two disjoint, non-overlapping sub-slices described
/// by byte ranges known not to overlap (adjacent mip levels of one slice).
pub(crate) fn split_disjoint_mut(
    bytes: &mut [u8],
    a: std::ops::Range<usize>,
    b: std::ops::Range<usize>,
) -> (&[u8], &mut [u8]) {
    assert!(a.end <= b.start || b.end <= a.start, "mip ranges must not overlap");
    if a.end <= b.start {
        let (left, right) = bytes.split_at_mut(b.start);
        (&left[a.clone()], &mut right[0..b.len()])
    } else {
        let (left, right) = bytes.split_at_mut(a.start);
        (&right[0..a.len()], &mut left[b.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_allocates_exact_size() {
        let src = TextureSource::construct_2d([64, 64], SourceFormat::Rgba8, GammaSpace::Linear);
        assert_eq!(src.bulk_data().len() as u64, src.properties().size_in_bytes());
        assert_eq!(src.properties().size_in_bytes(), 64 * 64 * 4);
    }

    #[test]
    fn construct_auto_sets_hdr_flag_for_float_formats() {
        let src = TextureSource::construct_2d([4, 4], SourceFormat::Rgba32f, GammaSpace::Linear);
        assert!(src.properties().flags.contains(SourceFlags::HDR));
    }

    #[test]
    fn mip_data_ranges_are_contiguous_and_cover_the_slice() {
        let props = TextureSourceProperties::texture_2d_with_mip_chain([8, 8], SourceFormat::Rgba8, GammaSpace::Linear);
        let src = TextureSource::construct(props, None);
        let whole = src.slice_data_range(0);
        let mut covered = 0usize;
        for mip in 0..props.num_mips {
            let r = src.mip_data_range(mip, 1, 0);
            covered += r.len();
        }
        assert_eq!(covered, whole.len());
    }

    #[test]
    fn tear_down_resets_to_empty() {
        let mut src = TextureSource::construct_2d([4, 4], SourceFormat::Rgba8, GammaSpace::Linear);
        src.tear_down();
        assert_eq!(src.bulk_data().len(), 0);
    }

    #[test]
    #[should_panic(expected = "channel count must be preserved")]
    fn resize_forbids_changing_component_count() {
        let src = TextureSource::construct_2d([8, 8], SourceFormat::Rgba8, GammaSpace::Linear);
        src.resize([4, 4, 1], None, Some(SourceFormat::G8), None);
    }
}
