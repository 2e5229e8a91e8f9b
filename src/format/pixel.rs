//! The pixel-format registry (spec component C1): the closed set of
//! *output* formats this engine knows how to compress into, their static
//! descriptors, and the decode/encode-to-RGBA32 kernel tables the image
//! view kernel (`crate::view`) resolves at construction time.

use bitflags::bitflags;

use crate::color::{Rgba32F, Rgba32I, Rgba32U};

/// The closed set of pixel formats this engine can target.
///
/// Uncompressed passthrough formats correspond 1:1 with the instantiated
/// `(pixelFormat, sourceFormat, gammaSpace)` triples; the block formats are
/// the declared STB-DXT family plus BC7 and an ASTC 4x4 transcode target.
/// Two depth/stencil formats are included purely for registry completeness
/// (aspect/value-type predicates); this engine never produces depth data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Bgra8Unorm,
    SBgr8A8,
    R16Unorm,
    R8Unorm,
    R16f,
    Rg16Unorm,
    Rg8Unorm,
    Rgba16Unorm,
    Rgba16f,
    Rgba32f,
    Rgba8Unorm,
    SRgb8A8,
    Bc1,
    Bc3,
    Bc4,
    Bc5,
    Bc7,
    Astc4x4,
    Depth32f,
    Depth24Stencil8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    SNorm,
    UNorm,
    Int,
    UInt,
    Float,
    Depth,
    Stencil,
    SRgb,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AspectMask: u32 {
        const COLOR    = 1 << 0;
        const DEPTH    = 1 << 1;
        const STENCIL  = 1 << 2;
        const METADATA = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockDim {
    pub x: u32,
    pub y: u32,
}

impl BlockDim {
    pub const SINGLE: Self = Self { x: 1, y: 1 };
    pub const BC: Self = Self { x: 4, y: 4 };

    pub fn texels(self) -> u32 {
        self.x * self.y
    }
}

/// Static per-format record, analogous to the `(format, aspectMask,
/// valueType, blockDim, bitsPerBlock, channels)` descriptor in §3.
#[derive(Debug, Clone, Copy)]
pub struct PixelFormatInfo {
    pub format: PixelFormat,
    pub aspect_mask: AspectMask,
    pub value_type: ValueType,
    pub block_dim: BlockDim,
    pub bits_per_block_color: Option<u32>,
    pub bits_per_block_depth: Option<u32>,
    pub bits_per_block_stencil: Option<u32>,
    pub channels: u32,
}

/// Per-`(format,aspect)` decode/encode kernel table entry.
///
/// A `None` kernel marks that access path as unsupported on that aspect,
/// matching the "any nullable kernel indicates unsupported access" rule.
#[derive(Clone, Copy)]
pub struct EncodingInfo {
    pub bits_per_pixel: u32,
    pub decode_rgba32f: Option<fn(&[u8]) -> Rgba32F>,
    pub encode_rgba32f: Option<fn(&mut [u8], Rgba32F)>,
    pub decode_rgba32u: Option<fn(&[u8]) -> Rgba32U>,
    pub decode_rgba32i: Option<fn(&[u8]) -> Rgba32I>,
}

/// Look up the static descriptor for `format`.
pub fn infos(format: PixelFormat) -> PixelFormatInfo {
    use PixelFormat::*;
    use ValueType::*;

    let uncompressed = |value_type, bits, channels| PixelFormatInfo {
        format,
        aspect_mask: AspectMask::COLOR,
        value_type,
        block_dim: BlockDim::SINGLE,
        bits_per_block_color: Some(bits),
        bits_per_block_depth: None,
        bits_per_block_stencil: None,
        channels,
    };
    let block = |value_type, bits, channels| PixelFormatInfo {
        format,
        aspect_mask: AspectMask::COLOR,
        value_type,
        block_dim: BlockDim::BC,
        bits_per_block_color: Some(bits),
        bits_per_block_depth: None,
        bits_per_block_stencil: None,
        channels,
    };

    match format {
        Bgra8Unorm => uncompressed(UNorm, 32, 4),
        SBgr8A8 => uncompressed(SRgb, 32, 4),
        R16Unorm => uncompressed(UNorm, 16, 1),
        R8Unorm => uncompressed(UNorm, 8, 1),
        R16f => uncompressed(Float, 16, 1),
        Rg16Unorm => uncompressed(UNorm, 32, 2),
        Rg8Unorm => uncompressed(UNorm, 16, 2),
        Rgba16Unorm => uncompressed(UNorm, 64, 4),
        Rgba16f => uncompressed(Float, 64, 4),
        Rgba32f => uncompressed(Float, 128, 4),
        Rgba8Unorm => uncompressed(UNorm, 32, 4),
        SRgb8A8 => uncompressed(SRgb, 32, 4),
        Bc1 => block(UNorm, 64, 4),
        Bc3 => block(UNorm, 128, 4),
        Bc4 => block(UNorm, 64, 1),
        Bc5 => block(UNorm, 128, 2),
        Bc7 => block(UNorm, 128, 4),
        Astc4x4 => block(UNorm, 128, 4),
        Depth32f => PixelFormatInfo {
            format,
            aspect_mask: AspectMask::DEPTH,
            value_type: Depth,
            block_dim: BlockDim::SINGLE,
            bits_per_block_color: None,
            bits_per_block_depth: Some(32),
            bits_per_block_stencil: None,
            channels: 1,
        },
        Depth24Stencil8 => PixelFormatInfo {
            format,
            aspect_mask: AspectMask::DEPTH | AspectMask::STENCIL,
            value_type: Depth,
            block_dim: BlockDim::SINGLE,
            bits_per_block_color: None,
            bits_per_block_depth: Some(24),
            bits_per_block_stencil: Some(8),
            channels: 1,
        },
    }
}

/// `bitsPerBlock / (blockDim.x * blockDim.y)`, choosing the color, depth
/// or stencil variant per `aspect`. Panics if `aspect` isn't exposed by
/// `format`'s aspect mask.
pub fn bits_per_pixel(format: PixelFormat, aspect: AspectMask) -> u32 {
    let info = infos(format);
    assert!(
        info.aspect_mask.contains(aspect) || aspect.is_empty(),
        "bits_per_pixel: aspect {aspect:?} not exposed by {format:?}"
    );
    let bits = if aspect.contains(AspectMask::STENCIL) {
        info.bits_per_block_stencil
    } else if aspect.contains(AspectMask::DEPTH) {
        info.bits_per_block_depth
    } else {
        info.bits_per_block_color
    }
    .unwrap_or(0);
    bits / info.block_dim.texels()
}

/// Total color-aspect byte size of a full `(dims, numMips, numSlices)` mip
/// chain encoded in `format`, accounting for block dimensions on the
/// compressed formats (each mip rounds its block-grid dimensions up).
pub fn size_in_bytes(format: PixelFormat, dims: [u32; 3], num_mips: u32, num_slices: u32) -> u64 {
    let info = infos(format);
    let bytes_per_block = (info.bits_per_block_color.unwrap_or(0) / 8) as u64;
    let (block_x, block_y) = (info.block_dim.x as u64, info.block_dim.y as u64);

    let mut total = 0u64;
    let mut d = dims;
    for _ in 0..num_mips {
        let blocks_x = (d[0] as u64 + block_x - 1) / block_x;
        let blocks_y = (d[1] as u64 + block_y - 1) / block_y;
        total += blocks_x * blocks_y * d[2] as u64 * bytes_per_block;
        d = [(d[0] / 2).max(1), (d[1] / 2).max(1), (d[2] / 2).max(1)];
    }
    total * num_slices as u64
}

/// Derive the aspect set exposed by `format` from its value type.
pub fn to_image_aspect(format: PixelFormat) -> AspectMask {
    infos(format).aspect_mask
}

pub fn is_depth(format: PixelFormat) -> bool {
    to_image_aspect(format).contains(AspectMask::DEPTH)
}

pub fn is_stencil(format: PixelFormat) -> bool {
    to_image_aspect(format).contains(AspectMask::STENCIL)
}

pub fn is_depth_stencil(format: PixelFormat) -> bool {
    is_depth(format) && is_stencil(format)
}

pub fn is_color(format: PixelFormat) -> bool {
    to_image_aspect(format).contains(AspectMask::COLOR)
}

pub fn has_depth(format: PixelFormat) -> bool {
    is_depth(format) || is_depth_stencil(format)
}

pub fn has_stencil(format: PixelFormat) -> bool {
    is_stencil(format) || is_depth_stencil(format)
}

/// Resolve the decode/encode kernel table entry for `(format, aspect)`.
///
/// Block-compressed formats have no per-pixel encoding: they are written
/// by the compression dispatch (C7) directly and never `Load`/`Store`d
/// through the image-view kernel, so every kernel is `None` for them.
pub fn encoding(format: PixelFormat, aspect: AspectMask) -> EncodingInfo {
    let bits_per_pixel = bits_per_pixel(format, aspect);
    if matches!(
        format,
        PixelFormat::Bc1
            | PixelFormat::Bc3
            | PixelFormat::Bc4
            | PixelFormat::Bc5
            | PixelFormat::Bc7
            | PixelFormat::Astc4x4
    ) {
        return EncodingInfo {
            bits_per_pixel,
            decode_rgba32f: None,
            encode_rgba32f: None,
            decode_rgba32u: None,
            decode_rgba32i: None,
        };
    }

    use PixelFormat::*;
    let (decode, encode): (fn(&[u8]) -> Rgba32F, fn(&mut [u8], Rgba32F)) = match format {
        Bgra8Unorm | SBgr8A8 => (decode_bgra8, encode_bgra8),
        R16Unorm => (decode_r16, encode_r16),
        R8Unorm => (decode_r8, encode_r8),
        R16f => (decode_r16f, encode_r16f),
        Rg16Unorm => (decode_rg16, encode_rg16),
        Rg8Unorm => (decode_rg8, encode_rg8),
        Rgba16Unorm => (decode_rgba16, encode_rgba16),
        Rgba16f => (decode_rgba16f, encode_rgba16f),
        Rgba32f => (decode_rgba32f, encode_rgba32f),
        Rgba8Unorm | SRgb8A8 => (decode_rgba8, encode_rgba8),
        _ => unreachable!("block formats handled above"),
    };

    EncodingInfo {
        bits_per_pixel,
        decode_rgba32f: Some(decode),
        encode_rgba32f: Some(encode),
        decode_rgba32u: None,
        decode_rgba32i: None,
    }
}

fn decode_rgba8(bytes: &[u8]) -> Rgba32F {
    Rgba32F::new(
        bytes[0] as f32 / 255.0,
        bytes[1] as f32 / 255.0,
        bytes[2] as f32 / 255.0,
        bytes[3] as f32 / 255.0,
    )
}

fn encode_rgba8(bytes: &mut [u8], c: Rgba32F) {
    let c = c.saturate();
    bytes[0] = (c.r * 255.0).round() as u8;
    bytes[1] = (c.g * 255.0).round() as u8;
    bytes[2] = (c.b * 255.0).round() as u8;
    bytes[3] = (c.a * 255.0).round() as u8;
}

fn decode_bgra8(bytes: &[u8]) -> Rgba32F {
    Rgba32F::new(
        bytes[2] as f32 / 255.0,
        bytes[1] as f32 / 255.0,
        bytes[0] as f32 / 255.0,
        bytes[3] as f32 / 255.0,
    )
}

fn encode_bgra8(bytes: &mut [u8], c: Rgba32F) {
    let c = c.saturate();
    bytes[2] = (c.r * 255.0).round() as u8;
    bytes[1] = (c.g * 255.0).round() as u8;
    bytes[0] = (c.b * 255.0).round() as u8;
    bytes[3] = (c.a * 255.0).round() as u8;
}

fn decode_r8(bytes: &[u8]) -> Rgba32F {
    let v = bytes[0] as f32 / 255.0;
    Rgba32F::new(v, v, v, 1.0)
}

fn encode_r8(bytes: &mut [u8], c: Rgba32F) {
    bytes[0] = (saturate_f32(c.r) * 255.0).round() as u8;
}

fn decode_r16(bytes: &[u8]) -> Rgba32F {
    let v = u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 65535.0;
    Rgba32F::new(v, v, v, 1.0)
}

fn encode_r16(bytes: &mut [u8], c: Rgba32F) {
    let raw = (saturate_f32(c.r) * 65535.0).round() as u16;
    bytes[0..2].copy_from_slice(&raw.to_le_bytes());
}

fn decode_r16f(bytes: &[u8]) -> Rgba32F {
    let v = half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32();
    Rgba32F::new(v, v, v, 1.0)
}

fn encode_r16f(bytes: &mut [u8], c: Rgba32F) {
    let raw = half::f16::from_f32(c.r).to_le_bytes();
    bytes[0..2].copy_from_slice(&raw);
}

fn decode_rg8(bytes: &[u8]) -> Rgba32F {
    Rgba32F::new(bytes[0] as f32 / 255.0, bytes[1] as f32 / 255.0, 0.0, 1.0)
}

fn encode_rg8(bytes: &mut [u8], c: Rgba32F) {
    bytes[0] = (saturate_f32(c.r) * 255.0).round() as u8;
    bytes[1] = (saturate_f32(c.g) * 255.0).round() as u8;
}

fn decode_rg16(bytes: &[u8]) -> Rgba32F {
    let r = u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 65535.0;
    let g = u16::from_le_bytes([bytes[2], bytes[3]]) as f32 / 65535.0;
    Rgba32F::new(r, g, 0.0, 1.0)
}

fn encode_rg16(bytes: &mut [u8], c: Rgba32F) {
    let r = (saturate_f32(c.r) * 65535.0).round() as u16;
    let g = (saturate_f32(c.g) * 65535.0).round() as u16;
    bytes[0..2].copy_from_slice(&r.to_le_bytes());
    bytes[2..4].copy_from_slice(&g.to_le_bytes());
}

fn decode_rgba16(bytes: &[u8]) -> Rgba32F {
    let ch = |i: usize| u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]) as f32 / 65535.0;
    Rgba32F::new(ch(0), ch(1), ch(2), ch(3))
}

fn encode_rgba16(bytes: &mut [u8], c: Rgba32F) {
    let c = c.saturate();
    for (i, v) in [c.r, c.g, c.b, c.a].into_iter().enumerate() {
        let raw = (v * 65535.0).round() as u16;
        bytes[2 * i..2 * i + 2].copy_from_slice(&raw.to_le_bytes());
    }
}

fn decode_rgba16f(bytes: &[u8]) -> Rgba32F {
    let ch = |i: usize| half::f16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]).to_f32();
    Rgba32F::new(ch(0), ch(1), ch(2), ch(3))
}

fn encode_rgba16f(bytes: &mut [u8], c: Rgba32F) {
    for (i, v) in [c.r, c.g, c.b, c.a].into_iter().enumerate() {
        let raw = half::f16::from_f32(v).to_le_bytes();
        bytes[2 * i..2 * i + 2].copy_from_slice(&raw);
    }
}

fn decode_rgba32f(bytes: &[u8]) -> Rgba32F {
    let ch = |i: usize| f32::from_le_bytes(bytes[4 * i..4 * i + 4].try_into().unwrap());
    Rgba32F::new(ch(0), ch(1), ch(2), ch(3))
}

fn encode_rgba32f(bytes: &mut [u8], c: Rgba32F) {
    for (i, v) in [c.r, c.g, c.b, c.a].into_iter().enumerate() {
        bytes[4 * i..4 * i + 4].copy_from_slice(&v.to_le_bytes());
    }
}

fn saturate_f32(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_per_pixel_uncompressed() {
        assert_eq!(bits_per_pixel(PixelFormat::Rgba8Unorm, AspectMask::COLOR), 32);
        assert_eq!(bits_per_pixel(PixelFormat::R8Unorm, AspectMask::COLOR), 8);
    }

    #[test]
    fn bits_per_pixel_block_divides_by_texel_count() {
        // BC1 is 64 bits per 4x4=16-texel block => 4 bits per texel.
        assert_eq!(bits_per_pixel(PixelFormat::Bc1, AspectMask::COLOR), 4);
        // BC7/BC3/BC5 are 128 bits per block => 8 bits per texel.
        assert_eq!(bits_per_pixel(PixelFormat::Bc7, AspectMask::COLOR), 8);
    }

    #[test]
    fn depth_stencil_predicates() {
        assert!(is_depth(PixelFormat::Depth32f));
        assert!(!is_stencil(PixelFormat::Depth32f));
        assert!(is_depth_stencil(PixelFormat::Depth24Stencil8));
        assert!(is_color(PixelFormat::Rgba8Unorm));
    }

    #[test]
    fn rgba8_roundtrip_is_exact_within_ulp() {
        let mut bytes = [10u8, 20, 30, 40];
        let decoded = decode_rgba8(&bytes);
        encode_rgba8(&mut bytes, decoded);
        assert_eq!(bytes, [10, 20, 30, 40]);
    }

    #[test]
    fn bgra8_channel_order_is_swizzled() {
        let bytes = [1u8, 2, 3, 4]; // B,G,R,A
        let c = decode_bgra8(&bytes);
        assert_eq!((c.r, c.g, c.b, c.a), (3.0 / 255.0, 2.0 / 255.0, 1.0 / 255.0, 4.0 / 255.0));
    }

    #[test]
    fn compressed_formats_have_no_pixel_kernels() {
        let enc = encoding(PixelFormat::Bc7, AspectMask::COLOR);
        assert!(enc.decode_rgba32f.is_none());
        assert!(enc.encode_rgba32f.is_none());
    }
}
