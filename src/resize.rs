//! Resize/filter kernel (spec component C4): multi-threaded 2D resampling
//! with a selectable filter, optional edge-wrap, and optional format/gamma
//! conversion. `ParallelFor` (§5, §9) is `rayon`'s `par_chunks_mut`/
//! `par_iter_mut` over pre-split, disjoint row ranges, per §10.2.

use rayon::prelude::*;

use crate::color::{saturate, srgb_to_linear, linear_to_srgb, Rgba32F};
use crate::format::source::{self, GammaSpace, SourceFlags, SourceFormat};

/// The filter selector accepted by [`resize_mip_2d`]. `GaussianBlur`/
/// `ContrastAdaptiveSharpen` aren't resampling filters in their own right;
/// per §4.4 step 4 they select `Mitchell` for the actual resample and
/// schedule the named post-process afterward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeFilter {
    /// `CubicSpline` (a.k.a. CubicBSpline) when the source has alpha, to
    /// avoid ringing on transparent texels; otherwise `Mitchell`, the
    /// general-purpose default most resamplers in this family (e.g.
    /// stb_image_resize) fall back to. See DESIGN.md for this resolution.
    Default,
    Box,
    CubicSpline,
    CatmullRom,
    Mitchell,
    PointSample,
    GaussianBlur(u32),
    ContrastAdaptiveSharpen(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SampleFilter {
    Box,
    CubicSpline,
    CatmullRom,
    Mitchell,
    PointSample,
}

#[derive(Debug, Clone, Copy)]
enum PostProcess {
    None,
    GaussianBlur(u32),
    ContrastAdaptiveSharpen(f32),
}

fn resolve_filter(filter: ResizeFilter, has_alpha: bool) -> (SampleFilter, PostProcess) {
    match filter {
        ResizeFilter::Default => {
            if has_alpha {
                (SampleFilter::CubicSpline, PostProcess::None)
            } else {
                (SampleFilter::Mitchell, PostProcess::None)
            }
        }
        ResizeFilter::Box => (SampleFilter::Box, PostProcess::None),
        ResizeFilter::CubicSpline => (SampleFilter::CubicSpline, PostProcess::None),
        ResizeFilter::CatmullRom => (SampleFilter::CatmullRom, PostProcess::None),
        ResizeFilter::Mitchell => (SampleFilter::Mitchell, PostProcess::None),
        ResizeFilter::PointSample => (SampleFilter::PointSample, PostProcess::None),
        ResizeFilter::GaussianBlur(k) => (SampleFilter::Mitchell, PostProcess::GaussianBlur(k)),
        ResizeFilter::ContrastAdaptiveSharpen(s) => {
            (SampleFilter::Mitchell, PostProcess::ContrastAdaptiveSharpen(s))
        }
    }
}

/// Arguments to [`resize_mip_2d`], one call per `(slice, mip transition)`.
pub struct ResizeMip2DArgs {
    pub dims_in: [u32; 3],
    pub format_in: SourceFormat,
    pub flags_in: SourceFlags,
    pub gamma_in: GammaSpace,
    pub dims_out: [u32; 3],
    pub format_out: SourceFormat,
    pub flags_out: SourceFlags,
    pub gamma_out: GammaSpace,
    pub filter: ResizeFilter,
}

/// Resample `src` (laid out per `dims_in`/`format_in`) into `dst` (per
/// `dims_out`/`format_out`). Returns `false` on resampler failure (here:
/// buffer-size mismatch), matching §4.4's "backend split failure → returns
/// false" contract; §3D volumes resize only the 2D (x,y) footprint of the
/// top slice, consistent with the component's name.
pub fn resize_mip_2d(args: &ResizeMip2DArgs, src: &[u8], dst: &mut [u8]) -> bool {
    let expected_in = source::size_in_bytes(args.format_in, args.dims_in, 1, 1) as usize;
    let expected_out = source::size_in_bytes(args.format_out, args.dims_out, 1, 1) as usize;
    debug_assert_eq!(src.len(), expected_in, "resize_mip_2d: input buffer size mismatch");
    debug_assert_eq!(dst.len(), expected_out, "resize_mip_2d: output buffer size mismatch");
    if src.len() != expected_in || dst.len() != expected_out {
        return false;
    }

    let has_alpha = source::has_alpha(args.format_in);
    let (sample_filter, post) = resolve_filter(args.filter, has_alpha);
    let wrap = args.flags_in.contains(SourceFlags::TILABLE) || args.flags_out.contains(SourceFlags::TILABLE);

    let [w_in, h_in, _] = args.dims_in;
    let [w_out, h_out, _] = args.dims_out;
    let (w_in, h_in, w_out, h_out) = (w_in as usize, h_in as usize, w_out as usize, h_out as usize);

    let is_resize = w_in != w_out || h_in != h_out;
    let linearize = is_resize && args.gamma_in == GammaSpace::SRgb;
    let delinearize = is_resize && args.gamma_out == GammaSpace::SRgb;

    let mut samples = source::decode_mip_to_float(args.format_in, src, w_in, h_in);
    if linearize {
        samples.par_iter_mut().for_each(|s| *s = srgb_to_linear(*s));
    }

    let mut resized = if is_resize || sample_filter != SampleFilter::Box {
        resample_2d(&samples, w_in, h_in, w_out, h_out, sample_filter, wrap)
    } else {
        samples
    };

    apply_post_process(&mut resized, w_out, h_out, post, args.gamma_out, has_alpha, args.flags_out);

    if delinearize {
        resized.par_iter_mut().for_each(|s| *s = linear_to_srgb(*s));
    }

    source::encode_float_to_mip(args.format_out, dst, &resized);
    true
}

fn apply_post_process(
    samples: &mut [Rgba32F],
    w: usize,
    h: usize,
    post: PostProcess,
    gamma: GammaSpace,
    has_alpha: bool,
    flags: SourceFlags,
) {
    match post {
        PostProcess::None => {}
        PostProcess::GaussianBlur(window) => {
            crate::mipgen::gaussian_blur_2d(samples, w, h, window, 0.5, has_alpha);
        }
        PostProcess::ContrastAdaptiveSharpen(sharpen) => {
            let masked_alpha = flags.contains(SourceFlags::MASKED_ALPHA);
            crate::mipgen::contrast_adaptive_sharpen_2d(samples, w, h, sharpen, gamma, has_alpha, masked_alpha, 0.5);
        }
    }
}

fn resample_2d(
    src: &[Rgba32F],
    w_in: usize,
    h_in: usize,
    w_out: usize,
    h_out: usize,
    filter: SampleFilter,
    wrap: bool,
) -> Vec<Rgba32F> {
    let weights_x = compute_weights(w_in as u32, w_out as u32, filter, wrap);
    let mut temp = vec![Rgba32F::default(); w_out * h_in];
    temp.par_chunks_mut(w_out).enumerate().for_each(|(y, row_out)| {
        let row_in = &src[y * w_in..y * w_in + w_in];
        for (x_out, contribs) in weights_x.iter().enumerate() {
            row_out[x_out] = accumulate(row_in, contribs);
        }
    });

    let weights_y = compute_weights(h_in as u32, h_out as u32, filter, wrap);
    let mut out = vec![Rgba32F::default(); w_out * h_out];
    out.par_chunks_mut(w_out).enumerate().for_each(|(y_out, row_out)| {
        let contribs = &weights_y[y_out];
        for x in 0..w_out {
            let mut acc = Rgba32F::default();
            for &(y_in, weight) in contribs {
                acc = acc + temp[y_in * w_out + x] * weight;
            }
            row_out[x] = acc;
        }
    });
    out
}

fn accumulate(row: &[Rgba32F], contribs: &[(usize, f32)]) -> Rgba32F {
    let mut acc = Rgba32F::default();
    for &(idx, weight) in contribs {
        acc = acc + row[idx] * weight;
    }
    acc
}

fn filter_support(filter: SampleFilter) -> f32 {
    match filter {
        SampleFilter::PointSample => 0.0,
        SampleFilter::Box => 0.5,
        SampleFilter::CubicSpline | SampleFilter::CatmullRom | SampleFilter::Mitchell => 2.0,
    }
}

fn filter_weight(filter: SampleFilter, x: f32) -> f32 {
    match filter {
        SampleFilter::PointSample => {
            if x.abs() < 0.5 {
                1.0
            } else {
                0.0
            }
        }
        SampleFilter::Box => {
            if x.abs() <= 0.5 {
                1.0
            } else {
                0.0
            }
        }
        SampleFilter::CubicSpline => cubic_bspline(x),
        SampleFilter::CatmullRom => catmull_rom(x),
        SampleFilter::Mitchell => mitchell_netravali(x, 1.0 / 3.0, 1.0 / 3.0),
    }
}

/// Uniform cubic B-spline: `support = 2`, `C1` continuous, no ringing —
/// the `CubicBSpline`/`CubicSpline` resize filter.
fn cubic_bspline(x: f32) -> f32 {
    let x = x.abs();
    if x < 1.0 {
        (4.0 - 6.0 * x * x + 3.0 * x * x * x) / 6.0
    } else if x < 2.0 {
        let t = 2.0 - x;
        (t * t * t) / 6.0
    } else {
        0.0
    }
}

/// Catmull-Rom spline, `A = -0.5`: interpolating, prone to ringing on hard
/// edges (e.g. alpha-test masks), hence §4.4's alpha-aware `Default`.
fn catmull_rom(x: f32) -> f32 {
    mitchell_netravali(x, 0.0, 0.5)
}

/// Mitchell-Netravali `(B,C)` family; `(1/3,1/3)` is the canonical
/// "Mitchell" filter, `(0,0.5)` is Catmull-Rom.
fn mitchell_netravali(x: f32, b: f32, c: f32) -> f32 {
    let x = x.abs();
    if x < 1.0 {
        ((12.0 - 9.0 * b - 6.0 * c) * x * x * x
            + (-18.0 + 12.0 * b + 6.0 * c) * x * x
            + (6.0 - 2.0 * b))
            / 6.0
    } else if x < 2.0 {
        ((-b - 6.0 * c) * x * x * x
            + (6.0 * b + 30.0 * c) * x * x
            + (-12.0 * b - 48.0 * c) * x
            + (8.0 * b + 24.0 * c))
            / 6.0
    } else {
        0.0
    }
}

/// Per output index, the `(input index, normalized weight)` contributors —
/// the classic precomputed-weight-table resampler, widening the filter's
/// support when downsampling to avoid aliasing (the same technique
/// `stb_image_resize` uses).
fn compute_weights(n_in: u32, n_out: u32, filter: SampleFilter, wrap: bool) -> Vec<Vec<(usize, f32)>> {
    if filter == SampleFilter::PointSample {
        let scale = n_in as f32 / n_out as f32;
        return (0..n_out)
            .map(|x_out| {
                let center = (x_out as f32 + 0.5) * scale;
                let idx = resolve_index(center.floor() as i64, n_in, wrap);
                vec![(idx as usize, 1.0)]
            })
            .collect();
    }

    let scale = n_in as f32 / n_out as f32;
    let filter_scale = scale.max(1.0);
    let support = filter_support(filter) * filter_scale;

    (0..n_out)
        .map(|x_out| {
            let center = (x_out as f32 + 0.5) * scale - 0.5;
            let lo = (center - support).floor() as i64;
            let hi = (center + support).ceil() as i64;
            let mut contribs = Vec::new();
            let mut weight_sum = 0.0f32;
            for i in lo..=hi {
                let w = filter_weight(filter, (i as f32 - center) / filter_scale);
                if w != 0.0 {
                    let idx = resolve_index(i, n_in, wrap);
                    contribs.push((idx as usize, w));
                    weight_sum += w;
                }
            }
            if weight_sum.abs() > 1e-8 {
                for c in contribs.iter_mut() {
                    c.1 /= weight_sum;
                }
            }
            contribs
        })
        .collect()
}

fn resolve_index(i: i64, n: u32, wrap: bool) -> u32 {
    if wrap {
        i.rem_euclid(n as i64) as u32
    } else {
        i.clamp(0, n as i64 - 1) as u32
    }
}

pub(crate) fn saturate_channel(v: f32) -> f32 {
    saturate(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn four_pixel_rgba8(colors: [[u8; 4]; 4]) -> Vec<u8> {
        colors.into_iter().flatten().collect()
    }

    #[test]
    fn identity_resize_with_box_filter_is_bit_exact() {
        let src = four_pixel_rgba8([[10, 20, 30, 255], [200, 150, 100, 128], [1, 2, 3, 4], [255, 255, 0, 10]]);
        let mut dst = vec![0u8; src.len()];
        let args = ResizeMip2DArgs {
            dims_in: [2, 2, 1],
            format_in: SourceFormat::Rgba8,
            flags_in: SourceFlags::empty(),
            gamma_in: GammaSpace::Linear,
            dims_out: [2, 2, 1],
            format_out: SourceFormat::Rgba8,
            flags_out: SourceFlags::empty(),
            gamma_out: GammaSpace::Linear,
            filter: ResizeFilter::Box,
        };
        assert!(resize_mip_2d(&args, &src, &mut dst));
        assert_eq!(src, dst);
    }

    #[test]
    fn box_downscale_2x2_to_1x1_is_average() {
        let src = four_pixel_rgba8([[100, 100, 100, 255], [200, 200, 200, 255], [0, 0, 0, 255], [50, 50, 50, 255]]);
        let mut dst = vec![0u8; 4];
        let args = ResizeMip2DArgs {
            dims_in: [2, 2, 1],
            format_in: SourceFormat::Rgba8,
            flags_in: SourceFlags::empty(),
            gamma_in: GammaSpace::Linear,
            dims_out: [1, 1, 1],
            format_out: SourceFormat::Rgba8,
            flags_out: SourceFlags::empty(),
            gamma_out: GammaSpace::Linear,
            filter: ResizeFilter::Box,
        };
        assert!(resize_mip_2d(&args, &src, &mut dst));
        // Average of 100,200,0,50 = 87.5, rounds to 88 (nearest ties away handled by `.round()`).
        assert_eq!(dst[0], 88);
    }

    #[test]
    fn buffer_size_mismatch_fails() {
        let src = vec![0u8; 16];
        let mut dst = vec![0u8; 3]; // wrong size for 1x1 RGBA8
        let args = ResizeMip2DArgs {
            dims_in: [2, 2, 1],
            format_in: SourceFormat::Rgba8,
            flags_in: SourceFlags::empty(),
            gamma_in: GammaSpace::Linear,
            dims_out: [1, 1, 1],
            format_out: SourceFormat::Rgba8,
            flags_out: SourceFlags::empty(),
            gamma_out: GammaSpace::Linear,
            filter: ResizeFilter::Box,
        };
        assert!(!resize_mip_2d(&args, &src, &mut dst));
    }

    #[test]
    fn filter_weights_sum_to_one() {
        let weights = compute_weights(8, 3, SampleFilter::Mitchell, false);
        for contribs in &weights {
            let sum: f32 = contribs.iter().map(|(_, w)| w).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-4);
        }
    }
}
