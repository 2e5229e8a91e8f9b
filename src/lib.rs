//! Content-pipeline texture engine: import, resize, mip-generate and
//! compress textures into GPU-ready output resources.
//!
//! ## Pipeline
//! - **Source model**: [`source::TextureSource`] owns a properties record
//!   plus a shared, scope-guarded byte buffer (§ [`source`]).
//! - **Image views & filtering**: [`view`] and [`resize`] implement the
//!   sampling kernel and the box/triangle/Kaiser/Mitchell resize filters.
//! - **Mip generation**: [`mipgen`] builds full mip chains and the alpha
//!   distance-field / coverage-preserving treatments used alongside them.
//! - **Compression dispatch**: [`compression`] turns a prepared source
//!   into one of five [`compression::OutputTextureResource`] variants via
//!   passthrough, BC1/3/4/5, optional BC7 (`bc7` feature) or ASTC (`astc`
//!   feature) implementations.
//! - **Image-format I/O**: [`image_io`] imports/exports PNG/BMP/TGA/JPG/HDR.
//! - **Orchestration**: [`generation::TextureGeneration`] runs prepare →
//!   compress → mip-generate → alpha-burn-in end to end; [`service`]
//!   is the registry that resolves an image-format or compression
//!   implementation by extension or by capability and drives filesystem
//!   import/export.
//!
//! ## Features
//! - `bc7`: BC7 desktop block compression via `intel_tex` (default).
//! - `astc`: ASTC mobile block compression via a `basisu` CLI shell-out
//!   plus `basis-universal` transcode (default).
//!
//! ## Example
//! ```no_run
//! use texture_pipeline::format::{GammaSpace, ImageView, SourceFormat};
//! use texture_pipeline::service::TextureService;
//!
//! # fn example() -> anyhow::Result<()> {
//! let service = TextureService::make_default();
//! let source = service.import_texture_source("albedo.png".as_ref(), ImageView::D2)?;
//! println!("imported {:?} at {:?}", source.properties().source_format, source.properties().dimensions);
//! # let _ = GammaSpace::Linear;
//! # let _ = SourceFormat::Rgba8;
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod compression;
pub mod error;
pub mod format;
pub mod generation;
pub mod image_io;
pub mod mipgen;
pub mod resize;
pub mod service;
pub mod source;
pub mod view;

pub use compression::{OutputTexture, OutputTextureResource, TextureCompression};
pub use error::{Result, TextureError};
pub use generation::{TextureGeneration, TextureGenerationConfig};
pub use image_io::{ImageFileFormat, ImageFormatCodec};
pub use service::TextureService;
pub use source::{BulkData, TextureSource, TextureSourceProperties};
