//! Mip-chain and alpha-treatment kernels (spec component C5, minus the
//! cross-mip-size flood pass — that one needs two different-size views
//! live at once and lives in [`crate::generation`] alongside the
//! orchestrator that drives it).
//!
//! Every kernel here operates on a decoded `w*h` row-major `Rgba32F`
//! sample buffer, matching the representation [`crate::resize`] already
//! decodes mips into; callers own the decode/encode round trip.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::color::{lerp, saturate, Rgba32F};
use crate::error::{Result, TextureError};
use crate::format::source::{self, GammaSpace, SourceFlags, SourceFormat};

fn index_for(x: i64, y: i64, w: usize, h: usize, wrap: bool) -> usize {
    let resolve = |c: i64, n: usize| -> usize {
        if wrap {
            c.rem_euclid(n as i64) as usize
        } else {
            c.clamp(0, n as i64 - 1) as usize
        }
    };
    resolve(y, h) * w + resolve(x, w)
}

/// `AlphaTestCoverage2D`: fraction of 4x4 bilinear sub-samples (taken at
/// every 2x2 texel neighborhood, excluding the last row/column) whose
/// alpha exceeds `alpha_cutoff`, after scaling alpha by `alpha_scale`.
pub fn alpha_test_coverage_2d(samples: &[Rgba32F], w: usize, h: usize, alpha_cutoff: f32, alpha_scale: f32) -> f32 {
    if w < 2 || h < 2 {
        return 0.0;
    }
    let total = AtomicUsize::new(0);
    (0..h - 1).into_par_iter().for_each(|y| {
        let mut row_count = 0usize;
        for x in 0..w - 1 {
            let a00 = saturate(samples[y * w + x].a * alpha_scale);
            let a10 = saturate(samples[y * w + x + 1].a * alpha_scale);
            let a01 = saturate(samples[(y + 1) * w + x].a * alpha_scale);
            let a11 = saturate(samples[(y + 1) * w + x + 1].a * alpha_scale);
            for j in 0..4 {
                let v = (j as f32 + 0.5) / 4.0;
                for i in 0..4 {
                    let u = (i as f32 + 0.5) / 4.0;
                    let a = lerp(lerp(a00, a10, u), lerp(a01, a11, u), v);
                    if a > alpha_cutoff {
                        row_count += 1;
                    }
                }
            }
        }
        total.fetch_add(row_count, Ordering::Relaxed);
    });
    total.load(Ordering::Relaxed) as f32 / (16.0 * (w - 1) as f32 * (h - 1) as f32)
}

/// `ScaleAlphaToCoverage2D`: binary search over `alphaScale ∈ [0,4]` (10
/// fixed iterations) for the scale whose resulting coverage is closest to
/// `desired`; applies the best scale to the alpha channel in place.
/// Returns the achieved coverage.
pub fn scale_alpha_to_coverage_2d(
    samples: &mut [Rgba32F],
    w: usize,
    h: usize,
    alpha_cutoff: f32,
    desired: f32,
) -> f32 {
    const EPSILON: f32 = 1e-3;
    let mut lo = 0.0f32;
    let mut hi = 4.0f32;
    let mut best_scale = 1.0f32;
    let mut best_err = f32::MAX;
    for _ in 0..10 {
        let mid = (lo + hi) * 0.5;
        let coverage = alpha_test_coverage_2d(samples, w, h, alpha_cutoff, mid);
        let err = (coverage - desired).abs();
        if err < best_err {
            best_err = err;
            best_scale = mid;
        }
        if err < EPSILON {
            break;
        }
        if coverage < desired {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    scale_bias(
        samples,
        w,
        h,
        Rgba32F::new(1.0, 1.0, 1.0, best_scale),
        Rgba32F::new(0.0, 0.0, 0.0, 0.0),
    );
    alpha_test_coverage_2d(samples, w, h, alpha_cutoff, 1.0)
}

/// `ScaleBias`: per-texel `saturate(p*scale+bias)`.
pub fn scale_bias(samples: &mut [Rgba32F], w: usize, h: usize, scale: Rgba32F, bias: Rgba32F) {
    let _ = (w, h);
    samples.par_iter_mut().for_each(|p| *p = p.scale_bias(scale, bias));
}

/// `GenerateAlphaDistanceField2D`: replaces each texel's alpha with a
/// normalized signed distance to the nearest opposite-classified texel
/// (per `alpha_cutoff`), searched within a `spreadRatio`-derived window.
pub fn generate_alpha_distance_field_2d(
    samples: &mut [Rgba32F],
    w: usize,
    h: usize,
    alpha_cutoff: f32,
    spread_ratio: f32,
    wrap: bool,
) {
    let spread = lerp(0.002, 0.1, saturate(spread_ratio));
    let spread_distance = (1.0f32).max((w.max(h) as f32 * spread).ceil()).max(1.0) as i64;

    let temp: Vec<bool> = samples.iter().map(|c| c.a > alpha_cutoff).collect();

    let rows: Vec<Vec<f32>> = (0..h)
        .into_par_iter()
        .map(|y| {
            let mut row = vec![0.0f32; w];
            for x in 0..w {
                let inside = temp[y * w + x];
                let mut min_distance = spread_distance;
                'search: for r in 1..=spread_distance {
                    for dy in -r..=r {
                        for dx in -r..=r {
                            if dx.abs() != r && dy.abs() != r {
                                continue; // only the ring at chebyshev distance r
                            }
                            let nx = x as i64 + dx;
                            let ny = y as i64 + dy;
                            if !wrap && (nx < 0 || nx >= w as i64 || ny < 0 || ny >= h as i64) {
                                continue;
                            }
                            let idx = index_for(nx, ny, w, h, wrap);
                            if temp[idx] != inside {
                                min_distance = r;
                                break 'search;
                            }
                        }
                    }
                }
                let signed_distance = if inside { min_distance } else { -min_distance };
                row[x] = saturate((signed_distance as f32 / spread_distance as f32) * 0.5 + 0.5);
            }
            row
        })
        .collect();

    for (y, row) in rows.into_iter().enumerate() {
        for (x, a) in row.into_iter().enumerate() {
            samples[y * w + x].a = a;
        }
    }
}

/// `ContrastAdaptiveSharpening2D`: AMD FidelityFX CAS, applied per RGB
/// channel from the full 3x3 neighborhood `{a,b,c,d,e,f,g,h,i}` — the cross
/// `{b,d,e,f,h}` and the diagonal corners `{a,c,g,i}` combined via the
/// soft-min/soft-max recipe (cross extrema first, then widened by the
/// corners, summed rather than averaged). `gamma` selects whether the
/// neighborhood is linearized before sharpening; `has_alpha` premultiplies
/// every sample's RGB by its alpha weight and selects the weighted
/// denominator; `masked_alpha` additionally binarizes that alpha weight via
/// `step(cutoff, alpha)` so transparent neighbors don't bleed into the
/// sharpen.
pub fn contrast_adaptive_sharpen_2d(
    samples: &mut [Rgba32F],
    w: usize,
    h: usize,
    sharpen: f32,
    gamma: GammaSpace,
    has_alpha: bool,
    masked_alpha: bool,
    alpha_cutoff: f32,
) {
    let linearize = gamma == GammaSpace::SRgb;
    let to_linear = |c: Rgba32F| if linearize { crate::color::srgb_to_linear(c) } else { c };
    let from_linear = |c: Rgba32F| if linearize { crate::color::linear_to_srgb(c) } else { c };

    let peak = 1.0 / lerp(8.0, 5.0, saturate(sharpen));
    let src = samples.to_vec();

    // Alpha weight used both to premultiply a sample's RGB and in the
    // with-alpha denominator: raw alpha normally, step(cutoff, alpha) when
    // masked_alpha.
    let alpha_weight = |c: Rgba32F| if masked_alpha { if c.a > alpha_cutoff { 1.0 } else { 0.0 } } else { c.a };

    let rows: Vec<Vec<Rgba32F>> = (0..h)
        .into_par_iter()
        .map(|y| {
            let mut row = vec![Rgba32F::default(); w];
            for x in 0..w {
                let e_raw = src[y * w + x];
                if e_raw.a < 1e-5 || (masked_alpha && e_raw.a < alpha_cutoff) {
                    row[x] = e_raw;
                    continue;
                }
                let out_alpha = e_raw.a;

                let load = |dx: i64, dy: i64| to_linear(src[index_for(x as i64 + dx, y as i64 + dy, w, h, false)]);
                let a = load(-1, -1);
                let b = load(0, -1);
                let c = load(1, -1);
                let d = load(-1, 0);
                let e = to_linear(e_raw);
                let f = load(1, 0);
                let g = load(-1, 1);
                let h_ = load(0, 1);
                let i = load(1, 1);

                // Premultiply RGB by alpha weight only in the with-alpha
                // variant; the no-alpha variant samples the channels as-is.
                let premul = |c: Rgba32F| if has_alpha {
                    let wt = alpha_weight(c);
                    Rgba32F::new(c.r * wt, c.g * wt, c.b * wt, c.a)
                } else {
                    c
                };
                let (a, b, c, d, e, f, g, h_, i) =
                    (premul(a), premul(b), premul(c), premul(d), premul(e), premul(f), premul(g), premul(h_), premul(i));

                let soft_extreme = |values: [f32; 9], min: bool| -> f32 {
                    let [av, bv, cv, dv, ev, fv, gv, hv, iv] = values;
                    let fold = |x: f32, y: f32| if min { x.min(y) } else { x.max(y) };
                    let cross = fold(fold(dv, ev), fold(fv, fold(bv, hv)));
                    let corners = fold(fold(fold(cross, av), cv), fold(gv, iv));
                    cross + corners
                };

                let channel_fns: [fn(Rgba32F) -> f32; 3] = [|c| c.r, |c| c.g, |c| c.b];
                let mut out_rgb = [0.0f32; 3];
                let mut skip_untouched = false;
                for (ch, out) in channel_fns.into_iter().zip(out_rgb.iter_mut()) {
                    let values = [ch(a), ch(b), ch(c), ch(d), ch(e), ch(f), ch(g), ch(h_), ch(i)];
                    let mn = soft_extreme(values, true);
                    let mx = soft_extreme(values, false);
                    if has_alpha && mx < 1e-5 {
                        skip_untouched = true;
                        break;
                    }
                    let mx_safe = if has_alpha { mx } else { mx.max(1e-8) };
                    let amp = (saturate(mn.min(2.0 - mx) / mx_safe)).sqrt();
                    let w_rgb = amp * peak;
                    let window = ch(b) + ch(d) + ch(f) + ch(h_);
                    let denom = if has_alpha {
                        alpha_weight(e) + (alpha_weight(b) + alpha_weight(d) + alpha_weight(f) + alpha_weight(h_)) * w_rgb
                    } else {
                        1.0 + 4.0 * w_rgb
                    };
                    *out = saturate((window * w_rgb + ch(e)) / denom.max(1e-8));
                }

                row[x] = if skip_untouched {
                    e_raw
                } else {
                    let mut sharpened = from_linear(Rgba32F::new(out_rgb[0], out_rgb[1], out_rgb[2], out_alpha));
                    sharpened.a = out_alpha;
                    sharpened
                };
            }
            row
        })
        .collect();

    for (y, row) in rows.into_iter().enumerate() {
        samples[y * w..y * w + w].copy_from_slice(&row);
    }
}

/// `GaussianBlur2D`: separable two-pass blur with a `windowSize`-tap
/// kernel whose spread is `lerp(0, windowSize, sigma01)`. `has_alpha`
/// weights the blur by alpha (premultiplied-style accumulate, then
/// unpremultiply) and restores the original color where the blurred
/// alpha is near zero, matching the spec's "restores color on near-zero
/// alpha outputs" note.
pub fn gaussian_blur_2d(samples: &mut [Rgba32F], w: usize, h: usize, window_size: u32, sigma01: f32, has_alpha: bool) {
    let window_size = window_size.max(1) as i64;
    let sigma = (lerp(0.0, window_size as f32, saturate(sigma01))).max(1e-3);
    let radius = window_size / 2;
    let kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i as f32 * i as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    let kernel: Vec<f32> = kernel.into_iter().map(|v| v / sum).collect();

    let blur_pass = |src: &[Rgba32F], horizontal: bool| -> Vec<Rgba32F> {
        (0..h * w)
            .into_par_iter()
            .map(|idx| {
                let (x, y) = (idx % w, idx / w);
                let mut acc = Rgba32F::default();
                let mut weight_sum = 0.0f32;
                for (k, &weight) in kernel.iter().enumerate() {
                    let offset = k as i64 - radius;
                    let (sx, sy) = if horizontal { (x as i64 + offset, y as i64) } else { (x as i64, y as i64 + offset) };
                    let sample = src[index_for(sx, sy, w, h, false)];
                    if has_alpha {
                        let a_weight = weight * sample.a;
                        acc = acc + Rgba32F::new(sample.r * a_weight, sample.g * a_weight, sample.b * a_weight, sample.a * weight);
                        weight_sum += a_weight;
                    } else {
                        acc = acc + sample * weight;
                    }
                }
                if has_alpha {
                    if weight_sum > 1e-5 {
                        Rgba32F::new(acc.r / weight_sum, acc.g / weight_sum, acc.b / weight_sum, acc.a)
                    } else {
                        src[index_for(x as i64, y as i64, w, h, false)]
                    }
                } else {
                    acc
                }
            })
            .collect()
    };

    let horizontal = blur_pass(samples, true);
    let vertical = blur_pass(&horizontal, false);
    samples.copy_from_slice(&vertical);
}

/// `GenerateSliceMipChain2D`: builds mips `1..numMips` of one slice in
/// place by repeated `ResizeMip2D` calls, optionally preserving
/// alpha-test coverage (measured once against mip 0) at every level.
pub fn generate_slice_mip_chain_2d(
    format: SourceFormat,
    flags: SourceFlags,
    gamma: GammaSpace,
    dims: [u32; 3],
    num_mips: u32,
    slice_bytes: &mut [u8],
    alpha_cutoff: f32,
    preserve_alpha_test_coverage: bool,
) -> Result<()> {
    let all_pow2 = dims.iter().all(|&d| d == 0 || d & (d - 1) == 0);
    if !all_pow2 {
        return Err(TextureError::InvalidArgument(
            "GenerateSliceMipChain2D requires power-of-two dimensions".to_string(),
        ));
    }

    let bpp = source::bytes_per_pixel(format) as usize;

    // Precompute each mip's `(dims, byte offset)` within this slice up front,
    // matching `TextureSourceProperties::mip_byte_offset`'s arithmetic.
    let mut mip_dims = Vec::with_capacity(num_mips as usize);
    let mut mip_offsets = Vec::with_capacity(num_mips as usize);
    let mut d = dims;
    let mut offset = 0usize;
    for _ in 0..num_mips {
        mip_dims.push(d);
        mip_offsets.push(offset);
        offset += source::mip_size_in_bytes(format, d) as usize;
        d = source::next_mip_dimensions(d);
    }

    let desired_coverage = if preserve_alpha_test_coverage && flags.contains(SourceFlags::MASKED_ALPHA) {
        let [w0, h0, _] = dims;
        let mip0 = &slice_bytes[0..w0 as usize * h0 as usize * bpp];
        let samples0 = source::decode_mip_to_float(format, mip0, w0 as usize, h0 as usize);
        Some(alpha_test_coverage_2d(&samples0, w0 as usize, h0 as usize, alpha_cutoff, 1.0))
    } else {
        None
    };

    for mip in 1..num_mips as usize {
        let prev_dims = mip_dims[mip - 1];
        let next_dims = mip_dims[mip];
        let prev_off = mip_offsets[mip - 1];
        let next_off = mip_offsets[mip];
        let next_bytes = source::mip_size_in_bytes(format, next_dims) as usize;

        let (head, tail) = slice_bytes.split_at_mut(next_off);
        let src = &head[prev_off..];
        let dst = &mut tail[..next_bytes];

        let args = crate::resize::ResizeMip2DArgs {
            dims_in: prev_dims,
            format_in: format,
            flags_in: flags,
            gamma_in: gamma,
            dims_out: next_dims,
            format_out: format,
            flags_out: flags,
            gamma_out: gamma,
            filter: crate::resize::ResizeFilter::Default,
        };
        if !crate::resize::resize_mip_2d(&args, src, dst) {
            return Err(TextureError::MipFailed { failed: 1, total: num_mips as usize });
        }

        if let Some(desired) = desired_coverage {
            let [w, h, _] = next_dims;
            let mut samples = source::decode_mip_to_float(format, dst, w as usize, h as usize);
            scale_alpha_to_coverage_2d(&mut samples, w as usize, h as usize, alpha_cutoff, desired);
            source::encode_float_to_mip(format, dst, &samples);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: usize) -> Vec<Rgba32F> {
        (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                let a = if (x + y) % 2 == 0 { 1.0 } else { 0.0 };
                Rgba32F::new(1.0, 1.0, 1.0, a)
            })
            .collect()
    }

    #[test]
    fn coverage_of_checkerboard_is_near_half() {
        let samples = checkerboard(16);
        let coverage = alpha_test_coverage_2d(&samples, 16, 16, 0.5, 1.0);
        assert!((coverage - 0.5).abs() < 0.05, "coverage was {coverage}");
    }

    #[test]
    fn scale_bias_saturates_output() {
        let mut samples = vec![Rgba32F::new(0.8, 0.2, 0.5, 1.0)];
        scale_bias(&mut samples, 1, 1, Rgba32F::splat(2.0), Rgba32F::splat(0.0));
        assert_eq!(samples[0].r, 1.0);
        assert_eq!(samples[0].g, 0.4);
    }

    #[test]
    fn distance_field_keeps_inside_above_half_and_outside_below() {
        let size = 8;
        let mut samples: Vec<Rgba32F> = (0..size * size)
            .map(|i| {
                let x = i % size;
                Rgba32F::new(1.0, 1.0, 1.0, if x < size / 2 { 1.0 } else { 0.0 })
            })
            .collect();
        generate_alpha_distance_field_2d(&mut samples, size, size, 0.5, 0.2, false);
        // Deep inside the left half (away from the boundary column).
        assert!(samples[size / 4].a > 0.5);
        // Deep inside the right half.
        assert!(samples[3 * size / 4].a < 0.5);
    }

    #[test]
    fn gaussian_blur_preserves_uniform_color() {
        let mut samples = vec![Rgba32F::new(0.5, 0.5, 0.5, 1.0); 8 * 8];
        gaussian_blur_2d(&mut samples, 8, 8, 5, 0.5, false);
        for c in &samples {
            assert!((c.r - 0.5).abs() < 1e-3);
        }
    }

    #[test]
    fn cas_leaves_flat_region_unchanged() {
        let mut samples = vec![Rgba32F::new(0.5, 0.5, 0.5, 1.0); 8 * 8];
        contrast_adaptive_sharpen_2d(&mut samples, 8, 8, 0.5, GammaSpace::Linear, false, false, 0.5);
        for c in &samples {
            assert!((c.r - 0.5).abs() < 1e-3);
        }
    }
}
