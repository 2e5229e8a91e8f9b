//! Pixel-format registry (spec component C1).
//!
//! Split into [`source`] (authored/uncompressed sample formats and their
//! byte-layout arithmetic) and [`pixel`] (the closed set of compressed and
//! passthrough *output* formats, their static descriptors, and decode/
//! encode kernel tables).

pub mod pixel;
pub mod source;

pub use pixel::{
    bits_per_pixel, encoding, has_depth, has_stencil, infos, is_color, is_depth, is_depth_stencil,
    is_stencil, size_in_bytes as pixel_size_in_bytes, to_image_aspect, AspectMask, BlockDim,
    EncodingInfo, PixelFormat, PixelFormatInfo, ValueType,
};
pub use source::{
    bytes_per_pixel, can_compress_with_jpeg, can_compress_with_png, can_hold_hdr, components,
    decode_mip_to_float, encode_float_to_mip, encoding as source_encoding, full_mip_count,
    has_alpha, mip_dimensions, mip_range, mip_size_in_bytes, next_mip_dimensions, size_in_bytes,
    slice_range, ColorMask, GammaSpace, ImageView, SourceEncoding, SourceFlags, SourceFormat,
};
