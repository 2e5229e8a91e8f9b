//! Texture generation orchestrator (spec component C5's outer sequence —
//! `Prepare`/`Generate` — plus the cross-mip-size flood pass).
//!
//! `Generate` runs a fixed pipeline over a source: resize the top mip to
//! the configured target, optionally burn in an alpha distance field,
//! build the rest of the mip chain (optionally preserving alpha-test
//! coverage at every level), optionally flood transparent texels' color
//! from the next coarser mip, then hand the result to a
//! [`TextureCompression`] implementation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::Rgba32F;
use crate::compression::{OutputTextureResource, TextureCompression};
use crate::error::{Result, TextureError};
use crate::format::source::{SourceFlags, SourceFormat};
use crate::source::{split_disjoint_mut, TextureSource, TextureSourceProperties};
use crate::view::{ImageViewMut, ImageViewRef, TextureFilter};

fn default_alpha_cutoff() -> f32 {
    0.5
}

fn default_alpha_spread_ratio() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

/// Tunables for one [`TextureGeneration`] run. Serializable so build
/// pipelines can author generation presets (e.g. "ui_mask", "albedo") as
/// data rather than code, per the ambient config-layer convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureGenerationConfig {
    /// Override for the top mip's dimensions; `None` keeps the source's.
    pub resize_dimensions: Option<[u32; 3]>,
    /// Override for the top mip's storage format; `None` keeps the source's.
    pub resize_source_format: Option<SourceFormat>,
    /// Override for the resulting source's flags; `None` keeps the source's.
    pub resize_flags: Option<SourceFlags>,

    #[serde(default = "default_alpha_cutoff")]
    pub alpha_cutoff: f32,
    #[serde(default = "default_alpha_spread_ratio")]
    pub alpha_spread_ratio: f32,

    #[serde(default = "default_true")]
    pub generate_full_mip_chain_2d: bool,
    #[serde(default = "default_true")]
    pub preserve_alpha_test_coverage_2d: bool,
    #[serde(default = "default_true")]
    pub generate_alpha_distance_field_2d: bool,
    #[serde(default = "default_true")]
    pub flood_mip_chain_with_alpha: bool,
}

impl Default for TextureGenerationConfig {
    fn default() -> Self {
        Self {
            resize_dimensions: None,
            resize_source_format: None,
            resize_flags: None,
            alpha_cutoff: default_alpha_cutoff(),
            alpha_spread_ratio: default_alpha_spread_ratio(),
            generate_full_mip_chain_2d: default_true(),
            preserve_alpha_test_coverage_2d: default_true(),
            generate_alpha_distance_field_2d: default_true(),
            flood_mip_chain_with_alpha: default_true(),
        }
    }
}

impl TextureGenerationConfig {
    pub fn with_resize_dimensions(mut self, dims: [u32; 3]) -> Self {
        self.resize_dimensions = Some(dims);
        self
    }

    pub fn with_resize_source_format(mut self, format: SourceFormat) -> Self {
        self.resize_source_format = Some(format);
        self
    }

    pub fn with_resize_flags(mut self, flags: SourceFlags) -> Self {
        self.resize_flags = Some(flags);
        self
    }

    pub fn with_alpha_cutoff(mut self, alpha_cutoff: f32) -> Self {
        self.alpha_cutoff = alpha_cutoff;
        self
    }

    pub fn with_alpha_spread_ratio(mut self, alpha_spread_ratio: f32) -> Self {
        self.alpha_spread_ratio = alpha_spread_ratio;
        self
    }

    pub fn set_generate_full_mip_chain_2d(mut self, value: bool) -> Self {
        self.generate_full_mip_chain_2d = value;
        self
    }

    pub fn set_preserve_alpha_test_coverage_2d(mut self, value: bool) -> Self {
        self.preserve_alpha_test_coverage_2d = value;
        self
    }

    pub fn set_generate_alpha_distance_field_2d(mut self, value: bool) -> Self {
        self.generate_alpha_distance_field_2d = value;
        self
    }

    pub fn set_flood_mip_chain_with_alpha(mut self, value: bool) -> Self {
        self.flood_mip_chain_with_alpha = value;
        self
    }
}

/// Drives one source through the generation pipeline into a compressed
/// output resource.
pub struct TextureGeneration {
    compression: Option<Arc<dyn TextureCompression>>,
    config: TextureGenerationConfig,
}

impl TextureGeneration {
    pub fn new(compression: Option<Arc<dyn TextureCompression>>, config: TextureGenerationConfig) -> Self {
        Self { compression, config }
    }

    /// `Prepare`: the properties `generate` will produce, without touching
    /// any bulk data — callers use this to validate or pre-allocate.
    pub fn prepare(&self, source: &TextureSource) -> TextureSourceProperties {
        let props = *source.properties();
        let dimensions = self.config.resize_dimensions.unwrap_or(props.dimensions);
        let source_format = self.config.resize_source_format.unwrap_or(props.source_format);
        let flags = self.config.resize_flags.unwrap_or(props.flags);
        let num_mips = if self.config.generate_full_mip_chain_2d {
            crate::format::full_mip_count(dimensions)
        } else {
            props.num_mips.min(crate::format::full_mip_count(dimensions))
        };
        TextureSourceProperties {
            dimensions,
            num_mips,
            source_format,
            flags,
            ..props
        }
    }

    /// `Generate`: run the full pipeline and compress the result.
    pub fn generate(&self, source: &TextureSource) -> Result<OutputTextureResource> {
        let compression = self.compression.as_ref().ok_or(TextureError::MissingCompression)?;
        let prepared = self.prepare(source);
        let num_slices = prepared.num_slices as usize;

        let mut working = source
            .resize(
                prepared.dimensions,
                Some(prepared.num_mips),
                Some(prepared.source_format),
                Some(prepared.flags),
            )
            .ok_or(TextureError::ResizeFailed { failed: num_slices, total: num_slices })?;

        if self.config.generate_alpha_distance_field_2d && prepared.flags.contains(SourceFlags::MASKED_ALPHA) {
            self.burn_in_alpha_distance_field(&mut working)?;
        }

        if self.config.generate_full_mip_chain_2d && prepared.num_mips > 1 {
            self.generate_mip_chain(&mut working)?;
        }

        if self.config.flood_mip_chain_with_alpha && prepared.num_mips > 1 {
            self.flood_mip_chain_with_alpha(&working)?;
        }

        compression.compress(&working)
    }

    fn burn_in_alpha_distance_field(&self, working: &mut TextureSource) -> Result<()> {
        let props = *working.properties();
        let [w0, h0, _] = props.dimensions;
        let wrap = props.flags.contains(SourceFlags::TILABLE);

        let mut writer = working.writer_scope();
        for slice in 0..props.num_slices {
            let range = working.mip_data_range(0, 1, slice);
            let mip0 = &mut writer.bytes_mut()[range];
            let mut samples = crate::format::decode_mip_to_float(props.source_format, mip0, w0 as usize, h0 as usize);
            crate::mipgen::generate_alpha_distance_field_2d(
                &mut samples,
                w0 as usize,
                h0 as usize,
                self.config.alpha_cutoff,
                self.config.alpha_spread_ratio,
                wrap,
            );
            crate::format::encode_float_to_mip(props.source_format, mip0, &samples);
        }
        Ok(())
    }

    fn generate_mip_chain(&self, working: &mut TextureSource) -> Result<()> {
        let props = *working.properties();
        let slice_size = crate::format::size_in_bytes(props.source_format, props.dimensions, props.num_mips, 1) as usize;
        let failed = AtomicUsize::new(0);

        {
            let mut writer = working.writer_scope();
            writer.bytes_mut().par_chunks_mut(slice_size).for_each(|slice_bytes| {
                let ok = crate::mipgen::generate_slice_mip_chain_2d(
                    props.source_format,
                    props.flags,
                    props.gamma,
                    props.dimensions,
                    props.num_mips,
                    slice_bytes,
                    self.config.alpha_cutoff,
                    self.config.preserve_alpha_test_coverage_2d,
                )
                .is_ok();
                if !ok {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            });
        }

        let failed = failed.load(Ordering::Relaxed);
        if failed > 0 {
            return Err(TextureError::MipFailed { failed, total: props.num_slices as usize });
        }
        Ok(())
    }

    /// `FloodMipChainWithAlpha`: for each slice, walks mips from the
    /// second-coarsest up to the finest, replacing each dst texel's color
    /// (never its alpha) with a nearest-sampled lookup into the next
    /// coarser mip — the coarsest mip's box-filtered averaging has already
    /// bled color into fully-transparent texels, so this propagates that
    /// fill upward and keeps mip-mapped sampling across cutout edges from
    /// picking up the cutout color.
    fn flood_mip_chain_with_alpha(&self, source: &TextureSource) -> Result<()> {
        let props = *source.properties();
        if props.num_mips < 2 {
            return Ok(());
        }
        let tilable = props.flags.contains(SourceFlags::TILABLE);
        let failed = AtomicUsize::new(0);

        {
            let mut writer = source.writer_scope();
            let bytes = writer.bytes_mut();
            for slice in 0..props.num_slices {
                for mip in (0..props.num_mips - 1).rev() {
                    let src_dims = crate::format::mip_dimensions(props.dimensions, mip + 1);
                    let dst_dims = crate::format::mip_dimensions(props.dimensions, mip);
                    let src_range = source.mip_data_range(mip + 1, 1, slice);
                    let dst_range = source.mip_data_range(mip, 1, slice);
                    let (src_bytes, dst_bytes) = split_disjoint_mut(bytes, src_range, dst_range);

                    let src_view = ImageViewRef::new(src_bytes, src_dims, props.source_format, tilable);
                    let mut dst_view = ImageViewMut::new(dst_bytes, dst_dims, props.source_format, tilable);

                    let [dw, dh, _] = dst_dims;
                    for y in 0..dh {
                        for x in 0..dw {
                            let u = (x as f32 + 0.5) / dw as f32 * 2.0 - 1.0;
                            let v = (y as f32 + 0.5) / dh as f32 * 2.0 - 1.0;
                            let flooded = match src_view.load_uvw([u, v, 0.0], TextureFilter::Nearest) {
                                Ok(c) => c,
                                Err(_) => {
                                    failed.fetch_add(1, Ordering::Relaxed);
                                    continue;
                                }
                            };
                            let original_alpha = dst_view.load([x as i64, y as i64, 0]).a;
                            dst_view.store([x, y, 0], Rgba32F::new(flooded.r, flooded.g, flooded.b, original_alpha));
                        }
                    }
                }
            }
        }

        let failed = failed.load(Ordering::Relaxed);
        if failed > 0 {
            return Err(TextureError::FloodFailed { failed, total: props.num_slices as usize });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::PassthroughCompression;
    use crate::format::source::GammaSpace;
    use crate::source::TextureSourceProperties;

    fn checkerboard_rgba8(size: u32) -> TextureSource {
        let props = TextureSourceProperties::texture_2d([size, size], SourceFormat::Rgba8, GammaSpace::Linear);
        let mut src = TextureSource::construct(props, None);
        {
            let mut w = src.writer_scope();
            let bytes = w.bytes_mut();
            for (i, b) in bytes.iter_mut().enumerate() {
                *b = if (i / 4) % 2 == 0 { 255 } else { 0 };
            }
        }
        src
    }

    #[test]
    fn prepare_computes_full_mip_chain_by_default() {
        let gen = TextureGeneration::new(None, TextureGenerationConfig::default());
        let src = checkerboard_rgba8(8);
        let prepared = gen.prepare(&src);
        assert_eq!(prepared.num_mips, 4); // 8x8 -> 4x4 -> 2x2 -> 1x1
    }

    #[test]
    fn generate_without_compression_reports_missing_compression() {
        let gen = TextureGeneration::new(None, TextureGenerationConfig::default());
        let src = checkerboard_rgba8(8);
        assert!(matches!(gen.generate(&src), Err(TextureError::MissingCompression)));
    }

    #[test]
    fn generate_produces_full_mip_chain_through_passthrough_compression() {
        let compression = Arc::new(PassthroughCompression::new(
            crate::format::PixelFormat::Rgba8Unorm,
            SourceFormat::Rgba8,
            GammaSpace::Linear,
        ));
        let config = TextureGenerationConfig {
            generate_alpha_distance_field_2d: false,
            flood_mip_chain_with_alpha: false,
            ..TextureGenerationConfig::default()
        };
        let gen = TextureGeneration::new(Some(compression), config);
        let src = checkerboard_rgba8(8);
        let out = gen.generate(&src).unwrap();
        let inner = out.inner();
        assert_eq!(inner.num_mips, 4);
        assert_eq!(inner.bulk_data.len() as u64, crate::format::pixel_size_in_bytes(inner.pixel_format, inner.dimensions, 4, 1));
    }
}
