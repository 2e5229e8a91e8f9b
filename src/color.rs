//! Canonical pixel color carriers used by decode/encode kernels.
//!
//! Every pixel format's decode kernel widens a texel into one of these
//! three 4-channel carriers; the matching encode kernel narrows back down.
//! Kernels pick whichever carrier matches their value class (float formats
//! decode to [`Rgba32F`], integer/unsigned formats to [`Rgba32I`]/[`Rgba32U`]).

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rgba32F {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba32F {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v, v)
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self::new(
            lerp(self.r, other.r, t),
            lerp(self.g, other.g, t),
            lerp(self.b, other.b, t),
            lerp(self.a, other.a, t),
        )
    }

    pub fn saturate(self) -> Self {
        Self::new(
            saturate(self.r),
            saturate(self.g),
            saturate(self.b),
            saturate(self.a),
        )
    }

    pub fn scale_bias(self, scale: Self, bias: Self) -> Self {
        Self::new(
            self.r * scale.r + bias.r,
            self.g * scale.g + bias.g,
            self.b * scale.b + bias.b,
            self.a * scale.a + bias.a,
        )
        .saturate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgba32U {
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rgba32I {
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub a: i32,
}

impl std::ops::Add for Rgba32F {
    type Output = Rgba32F;
    fn add(self, rhs: Rgba32F) -> Rgba32F {
        Rgba32F::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl std::ops::Mul<f32> for Rgba32F {
    type Output = Rgba32F;
    fn mul(self, rhs: f32) -> Rgba32F {
        Rgba32F::new(self.r * rhs, self.g * rhs, self.b * rhs, self.a * rhs)
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn saturate(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Hermite smoothstep used by the bilinear `Load` fractional weights.
pub fn smoothstep(t: f32) -> f32 {
    let t = saturate(t);
    t * t * (3.0 - 2.0 * t)
}

/// IEC 61966-2-1 sRGB electro-optical transfer, applied to color channels
/// only; alpha is always linear. Used by the resize/CAS kernels to filter
/// in linear light when a mip's gamma space is `GammaSpace::SRgb`.
pub fn srgb_to_linear(c: Rgba32F) -> Rgba32F {
    let f = |v: f32| {
        if v <= 0.04045 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    };
    Rgba32F::new(f(c.r), f(c.g), f(c.b), c.a)
}

pub fn linear_to_srgb(c: Rgba32F) -> Rgba32F {
    let f = |v: f32| {
        let v = saturate(v);
        if v <= 0.0031308 {
            v * 12.92
        } else {
            1.055 * v.powf(1.0 / 2.4) - 0.055
        }
    };
    Rgba32F::new(f(c.r), f(c.g), f(c.b), c.a)
}
