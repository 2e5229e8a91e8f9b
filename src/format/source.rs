//! Source-level enums and the pure arithmetic that derives byte layout
//! from a `(format, dimensions, numMips, numSlices)` tuple.
//!
//! This mirrors the texture-enum table in the content pipeline this crate
//! descends from: one `SourceFormat` per authored sample layout, a small
//! bitset of orthogonal flags, and free functions rather than methods on
//! the enum so the switch tables stay in one place per concern.

use bitflags::bitflags;

use crate::color::Rgba32F;

/// Uncompressed sample format used for authored (pre-compression) data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Bgra8,
    Bgre8,
    G8,
    G16,
    R16f,
    Rg8,
    Rg16,
    Ra8,
    Ra16,
    Rgba8,
    Rgba16,
    Rgba16f,
    Rgba32f,
    /// Internal sentinel; never a valid constructed texture format.
    Unknown,
}

/// Color space the samples are authored/stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GammaSpace {
    #[default]
    Linear,
    Pow22,
    SRgb,
    Aces,
}

/// How a texture's bytes are interpreted as dimensional data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageView {
    D1,
    D1Array,
    D2,
    D2Array,
    D3,
    Cube,
    CubeArray,
    Unknown,
}

bitflags! {
    /// Orthogonal per-texture flags; subset semantics per spec §3.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SourceFlags: u32 {
        const HDR                  = 1 << 0;
        const LONG_LAT_CUBEMAP     = 1 << 1;
        const PRE_MULTIPLIED_ALPHA = 1 << 2;
        const SRGB                 = 1 << 3;
        const TILABLE              = 1 << 4;
        const MASKED_ALPHA         = 1 << 5;
    }
}

bitflags! {
    /// Which authored channels are meaningful; independent of storage format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColorMask: u32 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const RGBA = Self::R.bits() | Self::G.bits() | Self::B.bits() | Self::A.bits();
    }
}

/// Bytes occupied by one texel of `fmt`. Panics on [`SourceFormat::Unknown`].
pub fn bytes_per_pixel(fmt: SourceFormat) -> u32 {
    use SourceFormat::*;
    match fmt {
        G8 => 1,
        Ra8 | G16 | R16f => 2,
        Rg8 => 2,
        Bgra8 | Bgre8 | Rgba8 => 4,
        Rg16 => 4,
        Ra16 => 4,
        Rgba16 | Rgba16f => 8,
        Rgba32f => 16,
        Unknown => panic!("bytes_per_pixel: Unknown source format"),
    }
}

/// Number of meaningful channels authored by `fmt`.
pub fn components(fmt: SourceFormat) -> u32 {
    use SourceFormat::*;
    match fmt {
        G8 | G16 | R16f => 1,
        Rg8 | Rg16 | Ra8 | Ra16 => 2,
        Bgra8 | Bgre8 | Rgba8 | Rgba16 | Rgba16f | Rgba32f => 4,
        Unknown => panic!("components: Unknown source format"),
    }
}

/// Whether `fmt` can represent values outside `[0,1]` without clamping.
pub fn can_hold_hdr(fmt: SourceFormat) -> bool {
    matches!(
        fmt,
        SourceFormat::R16f | SourceFormat::Rgba16f | SourceFormat::Rgba32f | SourceFormat::Bgre8
    )
}

pub fn can_compress_with_jpeg(fmt: SourceFormat) -> bool {
    matches!(fmt, SourceFormat::Rgba8 | SourceFormat::Bgra8)
}

pub fn can_compress_with_png(fmt: SourceFormat) -> bool {
    !can_hold_hdr(fmt)
}

/// `floor(log2(max(dims))) + 1` — the largest legal mip count for `dims`.
pub fn full_mip_count(dims: [u32; 3]) -> u32 {
    let max_dim = dims.into_iter().max().unwrap_or(1).max(1);
    32 - max_dim.leading_zeros()
}

/// Dimensions of the mip following `dims`: halved, floored at 1 per axis.
pub fn next_mip_dimensions(dims: [u32; 3]) -> [u32; 3] {
    dims.map(|d| (d / 2).max(1))
}

/// Dimensions of mip level `level` of a chain rooted at `dims`.
pub fn mip_dimensions(dims: [u32; 3], level: u32) -> [u32; 3] {
    let mut d = dims;
    for _ in 0..level {
        d = next_mip_dimensions(d);
    }
    d
}

/// Byte size of a single mip level's data (one slice).
pub fn mip_size_in_bytes(fmt: SourceFormat, dims: [u32; 3]) -> u64 {
    let bpp = bytes_per_pixel(fmt) as u64;
    let [w, h, d] = dims;
    bpp * w as u64 * h as u64 * d as u64
}

/// Total byte size across `numMips` mip levels and `numSlices` slices.
///
/// Guarantees `size_in_bytes(fmt,dims,n,1) * k == size_in_bytes(fmt,dims,n,k)`.
pub fn size_in_bytes(fmt: SourceFormat, dims: [u32; 3], num_mips: u32, num_slices: u32) -> u64 {
    let mut total = 0u64;
    let mut d = dims;
    for _ in 0..num_mips {
        total += mip_size_in_bytes(fmt, d);
        d = next_mip_dimensions(d);
    }
    total * num_slices as u64
}

/// Half-open `[begin, end)` range of mip levels `[0, numMips)`.
pub fn mip_range(num_mips: u32) -> std::ops::Range<u32> {
    0..num_mips
}

/// Half-open `[begin, end)` range of slice indices `[0, numSlices)`.
pub fn slice_range(num_slices: u32) -> std::ops::Range<u32> {
    0..num_slices
}

/// Whether `fmt` carries a meaningful alpha channel.
///
/// `Ra8`/`Ra16` are the grayscale-plus-alpha authoring formats (mask
/// textures): their first channel is luminance, replicated across RGB on
/// decode, and the second is alpha — distinct from `Rg8`/`Rg16`, whose two
/// channels are independent color components (e.g. tangent-space normals)
/// with no alpha semantics at all.
pub fn has_alpha(fmt: SourceFormat) -> bool {
    matches!(
        fmt,
        SourceFormat::Bgra8
            | SourceFormat::Ra8
            | SourceFormat::Ra16
            | SourceFormat::Rgba8
            | SourceFormat::Rgba16
            | SourceFormat::Rgba16f
            | SourceFormat::Rgba32f
    )
}

/// Per-`SourceFormat` decode/encode-to-RGBA32 kernel pair, the source-side
/// analogue of [`crate::format::pixel::EncodingInfo`].
#[derive(Clone, Copy)]
pub struct SourceEncoding {
    pub decode: fn(&[u8]) -> Rgba32F,
    pub encode: fn(&mut [u8], Rgba32F),
}

pub fn encoding(fmt: SourceFormat) -> SourceEncoding {
    use SourceFormat::*;
    let (decode, encode): (fn(&[u8]) -> Rgba32F, fn(&mut [u8], Rgba32F)) = match fmt {
        Bgra8 => (decode_bgra8, encode_bgra8),
        Bgre8 => (decode_bgre8, encode_bgre8),
        G8 => (decode_g8, encode_g8),
        G16 => (decode_g16, encode_g16),
        R16f => (decode_r16f, encode_r16f),
        Rg8 => (decode_rg8, encode_rg8),
        Rg16 => (decode_rg16, encode_rg16),
        Ra8 => (decode_ra8, encode_ra8),
        Ra16 => (decode_ra16, encode_ra16),
        Rgba8 => (decode_rgba8, encode_rgba8),
        Rgba16 => (decode_rgba16, encode_rgba16),
        Rgba16f => (decode_rgba16f, encode_rgba16f),
        Rgba32f => (decode_rgba32f, encode_rgba32f),
        Unknown => panic!("encoding: Unknown source format"),
    };
    SourceEncoding { decode, encode }
}

/// Decode a whole `w*h` mip into row-major RGBA32F samples.
pub fn decode_mip_to_float(fmt: SourceFormat, bytes: &[u8], w: usize, h: usize) -> Vec<Rgba32F> {
    let bpp = bytes_per_pixel(fmt) as usize;
    let enc = encoding(fmt);
    (0..w * h).map(|i| (enc.decode)(&bytes[i * bpp..i * bpp + bpp])).collect()
}

/// Encode row-major RGBA32F samples back into a `w*h` mip's bytes.
pub fn encode_float_to_mip(fmt: SourceFormat, bytes: &mut [u8], px: &[Rgba32F]) {
    let bpp = bytes_per_pixel(fmt) as usize;
    let enc = encoding(fmt);
    for (i, c) in px.iter().enumerate() {
        (enc.encode)(&mut bytes[i * bpp..i * bpp + bpp], *c);
    }
}

fn saturate_f32(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

fn decode_g8(bytes: &[u8]) -> Rgba32F {
    let v = bytes[0] as f32 / 255.0;
    Rgba32F::new(v, v, v, 1.0)
}

fn encode_g8(bytes: &mut [u8], c: Rgba32F) {
    bytes[0] = (saturate_f32(c.r) * 255.0).round() as u8;
}

fn decode_g16(bytes: &[u8]) -> Rgba32F {
    let v = u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 65535.0;
    Rgba32F::new(v, v, v, 1.0)
}

fn encode_g16(bytes: &mut [u8], c: Rgba32F) {
    let raw = (saturate_f32(c.r) * 65535.0).round() as u16;
    bytes[0..2].copy_from_slice(&raw.to_le_bytes());
}

fn decode_r16f(bytes: &[u8]) -> Rgba32F {
    let v = half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32();
    Rgba32F::new(v, v, v, 1.0)
}

fn encode_r16f(bytes: &mut [u8], c: Rgba32F) {
    bytes[0..2].copy_from_slice(&half::f16::from_f32(c.r).to_le_bytes());
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

/// Grayscale-plus-alpha: channel 0 is luminance (replicated to RGB), channel
/// 1 is alpha. See [`has_alpha`] for why this differs from `Rg8`.
fn decode_ra8(bytes: &[u8]) -> Rgba32F {
    let v = bytes[0] as f32 / 255.0;
    let a = bytes[1] as f32 / 255.0;
    Rgba32F::new(v, v, v, a)
}

fn encode_ra8(bytes: &mut [u8], c: Rgba32F) {
    bytes[0] = (saturate_f32(c.r) * 255.0).round() as u8;
    bytes[1] = (saturate_f32(c.a) * 255.0).round() as u8;
}

fn decode_ra16(bytes: &[u8]) -> Rgba32F {
    let v = u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 65535.0;
    let a = u16::from_le_bytes([bytes[2], bytes[3]]) as f32 / 65535.0;
    Rgba32F::new(v, v, v, a)
}

fn encode_ra16(bytes: &mut [u8], c: Rgba32F) {
    let raw_v = (saturate_f32(c.r) * 65535.0).round() as u16;
    let raw_a = (saturate_f32(c.a) * 65535.0).round() as u16;
    bytes[0..2].copy_from_slice(&raw_v.to_le_bytes());
    bytes[2..4].copy_from_slice(&raw_a.to_le_bytes());
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

/// Shared-exponent RGBE (Radiance-style), channel order B,G,R,Exponent; no
/// alpha. Classic `ldexp`-based RGBE decode/encode.
fn decode_bgre8(bytes: &[u8]) -> Rgba32F {
    let e = bytes[3];
    if e == 0 {
        return Rgba32F::new(0.0, 0.0, 0.0, 1.0);
    }
    let scale = 2f32.powi(e as i32 - (128 + 8));
    Rgba32F::new(
        bytes[2] as f32 * scale,
        bytes[1] as f32 * scale,
        bytes[0] as f32 * scale,
        1.0,
    )
}

fn encode_bgre8(bytes: &mut [u8], c: Rgba32F) {
    let max_channel = c.r.max(c.g).max(c.b);
    if max_channel <= 1e-32 {
        bytes[0..4].copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    let exponent = (max_channel.log2().ceil() as i32 + 128 + 8).clamp(0, 255);
    let scale = 2f32.powi(-(exponent - (128 + 8)));
    bytes[2] = (c.r * scale).round().clamp(0.0, 255.0) as u8;
    bytes[1] = (c.g * scale).round().clamp(0.0, 255.0) as u8;
    bytes[0] = (c.b * scale).round().clamp(0.0, 255.0) as u8;
    bytes[3] = exponent as u8;
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
        bytes[2 * i..2 * i + 2].copy_from_slice(&half::f16::from_f32(v).to_le_bytes());
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mip_count_pow2() {
        assert_eq!(full_mip_count([1, 1, 1]), 1);
        assert_eq!(full_mip_count([2, 2, 1]), 2);
        assert_eq!(full_mip_count([256, 256, 1]), 9);
        assert_eq!(full_mip_count([8, 8, 1]), 4);
    }

    #[test]
    fn next_mip_floors_at_one() {
        assert_eq!(next_mip_dimensions([1, 1, 1]), [1, 1, 1]);
        assert_eq!(next_mip_dimensions([3, 2, 1]), [1, 1, 1]);
        assert_eq!(next_mip_dimensions([8, 8, 1]), [4, 4, 1]);
    }

    #[test]
    fn size_in_bytes_scales_linearly_with_slices() {
        let dims = [64, 64, 1];
        let one = size_in_bytes(SourceFormat::Rgba8, dims, 1, 1);
        let four = size_in_bytes(SourceFormat::Rgba8, dims, 1, 4);
        assert_eq!(one * 4, four);
    }

    #[test]
    fn size_in_bytes_full_chain_is_less_than_4_3_base() {
        // Invariant 2 from the testable-properties list: exact for pow2 dims.
        let dims = [256, 256, 1];
        let mips = full_mip_count(dims);
        let total = size_in_bytes(SourceFormat::Rgba8, dims, mips, 1) as f64;
        let base = mip_size_in_bytes(SourceFormat::Rgba8, dims) as f64;
        assert!(total <= base * 4.0 / 3.0 + 1.0);
    }

    #[test]
    fn bytes_per_pixel_matches_components_times_element_size() {
        assert_eq!(bytes_per_pixel(SourceFormat::Rgba32f), 16);
        assert_eq!(bytes_per_pixel(SourceFormat::Ra16), 4);
        assert_eq!(bytes_per_pixel(SourceFormat::G8), 1);
    }

    #[test]
    fn rgba8_source_roundtrip_is_exact() {
        let enc = encoding(SourceFormat::Rgba8);
        let mut bytes = [5u8, 128, 250, 64];
        let c = (enc.decode)(&bytes);
        (enc.encode)(&mut bytes, c);
        assert_eq!(bytes, [5, 128, 250, 64]);
    }

    #[test]
    fn ra8_replicates_luminance_and_keeps_alpha_separate() {
        let enc = encoding(SourceFormat::Ra8);
        let c = (enc.decode)(&[200, 10]);
        assert_eq!((c.r, c.g, c.b), (200.0 / 255.0, 200.0 / 255.0, 200.0 / 255.0));
        assert_eq!(c.a, 10.0 / 255.0);
    }

    #[test]
    fn bgre8_roundtrips_within_quantization_error() {
        let enc = encoding(SourceFormat::Bgre8);
        let original = Rgba32F::new(4.0, 2.0, 1.0, 1.0);
        let mut bytes = [0u8; 4];
        (enc.encode)(&mut bytes, original);
        let decoded = (enc.decode)(&bytes);
        assert!((decoded.r - original.r).abs() / original.r < 0.05);
        assert!((decoded.g - original.g).abs() / original.g < 0.05);
        assert!((decoded.b - original.b).abs() / original.b < 0.05);
    }

    #[test]
    fn has_alpha_distinguishes_ra_from_rg() {
        assert!(has_alpha(SourceFormat::Ra8));
        assert!(!has_alpha(SourceFormat::Rg8));
        assert!(has_alpha(SourceFormat::Rgba8));
        assert!(!has_alpha(SourceFormat::G8));
    }
}
