//! Texture service (spec component C8): a thread-safe registry of
//! image-format and compression implementations, selected by file
//! extension or by capability, orchestrating import/export through the
//! filesystem.
//!
//! Both registries are modeled as insertion-ordered `Vec<(key, impl)>`
//! multimaps behind an `RwLock` — "many readers / single writer" per §5 —
//! rather than a `HashMap`, because `TextureCompression(fmt, props,
//! settings)` must walk every entry at a key *in insertion order* and
//! return the first whose `Supports` predicate passes (§4.8, testable
//! property 9).

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::compression::TextureCompression;
use crate::error::{Result, TextureError};
use crate::format::source::ImageView;
use crate::format::PixelFormat;
use crate::image_io::{format_for_path, import_texture_cube_long_lat, ImageFileFormat, ImageFormatCodec, StbImageFormat};
use crate::source::{BulkData, TextureSource, TextureSourceProperties};

/// Thread-safe registry + import/export orchestrator (§4.8).
pub struct TextureService {
    image_formats: RwLock<Vec<(ImageFileFormat, Arc<dyn ImageFormatCodec>)>>,
    compressions: RwLock<Vec<(PixelFormat, Arc<dyn TextureCompression>)>>,
}

impl TextureService {
    /// Empty service with no registered implementations.
    pub fn new() -> Self {
        Self {
            image_formats: RwLock::new(Vec::new()),
            compressions: RwLock::new(Vec::new()),
        }
    }

    /// Registers PNG/BMP/TGA/JPG/HDR (§4.8 "Default service registers
    /// PNG/BMP/TGA/JPG/HDR on startup"). The compression registry starts
    /// empty — "populated by the host" — so callers `register_compression`
    /// their own choice of passthrough/BC/ASTC implementations afterward.
    pub fn make_default() -> Self {
        let service = Self::new();
        for format in [
            ImageFileFormat::Png,
            ImageFileFormat::Bmp,
            ImageFileFormat::Tga,
            ImageFileFormat::Jpg,
            ImageFileFormat::Hdr,
        ] {
            service.register_image_format(format, Arc::new(StbImageFormat::new(format)));
        }
        service
    }

    pub fn register_image_format(&self, format: ImageFileFormat, codec: Arc<dyn ImageFormatCodec>) {
        self.image_formats.write().expect("image format registry lock poisoned").push((format, codec));
    }

    pub fn register_compression(&self, format: PixelFormat, compression: Arc<dyn TextureCompression>) {
        self.compressions.write().expect("compression registry lock poisoned").push((format, compression));
    }

    pub fn all_image_formats(&self) -> Vec<(ImageFileFormat, Arc<dyn ImageFormatCodec>)> {
        self.image_formats.read().expect("image format registry lock poisoned").clone()
    }

    pub fn all_texture_compressions(&self) -> Vec<(PixelFormat, Arc<dyn TextureCompression>)> {
        self.compressions.read().expect("compression registry lock poisoned").clone()
    }

    /// First-registered codec for `format`, regardless of capability.
    pub fn image_format(&self, format: ImageFileFormat) -> Option<Arc<dyn ImageFormatCodec>> {
        self.image_formats
            .read()
            .expect("image format registry lock poisoned")
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, codec)| codec.clone())
    }

    /// Resolves a codec from a path's extension (§4.8 `ImageFormat(ext)`).
    pub fn image_format_for_path(&self, path: &Path) -> Option<Arc<dyn ImageFormatCodec>> {
        format_for_path(path).and_then(|format| self.image_format(format))
    }

    /// First codec at `format` whose `supports_texture_source(props)` holds.
    pub fn image_format_supporting(&self, format: ImageFileFormat, props: &TextureSourceProperties) -> Option<Arc<dyn ImageFormatCodec>> {
        self.image_formats
            .read()
            .expect("image format registry lock poisoned")
            .iter()
            .filter(|(f, _)| *f == format)
            .find(|(_, codec)| codec.supports_texture_source(props))
            .map(|(_, codec)| codec.clone())
    }

    /// First-registered compression impl for `format`.
    pub fn texture_compression(&self, format: PixelFormat) -> Option<Arc<dyn TextureCompression>> {
        self.compressions
            .read()
            .expect("compression registry lock poisoned")
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, c)| c.clone())
    }

    /// First compression impl at `format` whose `supports(props)` holds.
    pub fn texture_compression_supporting(&self, format: PixelFormat, props: &TextureSourceProperties) -> Option<Arc<dyn TextureCompression>> {
        self.compressions
            .read()
            .expect("compression registry lock poisoned")
            .iter()
            .filter(|(f, _)| *f == format)
            .find(|(_, c)| c.supports(props))
            .map(|(_, c)| c.clone())
    }

    /// Imports `path` as `view`, resolving a codec from the extension.
    pub fn import_texture_source(&self, path: &Path, view: ImageView) -> Result<TextureSource> {
        let codec = self
            .image_format_for_path(path)
            .ok_or_else(|| TextureError::UnsupportedFormat(format!("no image codec registered for {path:?}")))?;
        let bytes = std::fs::read(path)?;
        let (props, data) = codec.import_texture(&bytes, view)?;
        let bulk = BulkData::from_bytes(data).with_source_path(path.to_path_buf());
        Ok(TextureSource::construct(props, Some(bulk)))
    }

    /// Imports `path` as a 2D equirectangular panorama, then upgrades it
    /// to `ImageView::Cube` with `LongLatCubemap` set (§4.6).
    pub fn import_texture_cube_long_lat(&self, path: &Path) -> Result<TextureSource> {
        let codec = self
            .image_format_for_path(path)
            .ok_or_else(|| TextureError::UnsupportedFormat(format!("no image codec registered for {path:?}")))?;
        let bytes = std::fs::read(path)?;
        let (props, data) = import_texture_cube_long_lat(codec.as_ref(), &bytes)?;
        let bulk = BulkData::from_bytes(data).with_source_path(path.to_path_buf());
        Ok(TextureSource::construct(props, Some(bulk)))
    }

    /// Exports `source`'s current contents to `path`.
    pub fn export_texture_source(&self, path: &Path, source: &TextureSource) -> Result<()> {
        let reader = source.reader_scope();
        self.export_texture(path, source.properties(), reader.bytes())
    }

    /// Exports a raw `(props, bulk)` pair to `path`, resolving a codec
    /// from the extension and truncating any existing file.
    pub fn export_texture(&self, path: &Path, props: &TextureSourceProperties, bulk: &[u8]) -> Result<()> {
        let codec = self
            .image_format_for_path(path)
            .ok_or_else(|| TextureError::UnsupportedFormat(format!("no image codec registered for {path:?}")))?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        codec.export_texture(&mut writer, props, bulk)
    }
}

impl Default for TextureService {
    fn default() -> Self {
        Self::make_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::source::{ColorMask, GammaSpace, SourceFlags, SourceFormat};
    use tempfile::tempdir;

    #[test]
    fn make_default_registers_all_five_image_formats() {
        let service = TextureService::make_default();
        assert_eq!(service.all_image_formats().len(), 5);
        assert!(service.image_format(ImageFileFormat::Hdr).is_some());
    }

    #[test]
    fn image_format_for_path_resolves_by_extension() {
        let service = TextureService::make_default();
        assert!(service.image_format_for_path(Path::new("a/b/test.PNG")).is_some());
        assert!(service.image_format_for_path(Path::new("a/b/test.unknown")).is_none());
    }

    #[test]
    fn export_then_import_png_roundtrips_bytes() {
        let service = TextureService::make_default();
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.png");

        let props = TextureSourceProperties {
            dimensions: [4, 4, 1],
            num_mips: 1,
            num_slices: 1,
            gamma: GammaSpace::SRgb,
            flags: SourceFlags::SRGB,
            source_format: SourceFormat::Rgba8,
            color_mask: ColorMask::RGBA,
            image_view: ImageView::D2,
        };
        let bulk: Vec<u8> = (0..(4 * 4 * 4)).map(|i| (i % 256) as u8).collect();

        service.export_texture(&path, &props, &bulk).unwrap();
        let imported = service.import_texture_source(&path, ImageView::D2).unwrap();
        assert_eq!(imported.properties().dimensions, [4, 4, 1]);
        assert_eq!(imported.reader_scope().bytes(), bulk.as_slice());
    }

    #[test]
    fn texture_compression_supporting_returns_first_match_in_insertion_order() {
        use crate::compression::PassthroughCompression;

        let service = TextureService::new();
        service.register_compression(
            PixelFormat::Rgba8Unorm,
            Arc::new(PassthroughCompression::new(PixelFormat::Rgba8Unorm, SourceFormat::Bgra8, GammaSpace::Linear)),
        );
        service.register_compression(
            PixelFormat::Rgba8Unorm,
            Arc::new(PassthroughCompression::new(PixelFormat::Rgba8Unorm, SourceFormat::Rgba8, GammaSpace::Linear)),
        );

        let props = TextureSourceProperties {
            dimensions: [4, 4, 1],
            num_mips: 1,
            num_slices: 1,
            gamma: GammaSpace::Linear,
            flags: SourceFlags::empty(),
            source_format: SourceFormat::Rgba8,
            color_mask: ColorMask::RGBA,
            image_view: ImageView::D2,
        };
        let found = service.texture_compression_supporting(PixelFormat::Rgba8Unorm, &props).unwrap();
        assert_eq!(found.format(), PixelFormat::Rgba8Unorm);
        assert!(found.supports(&props));
    }
}
