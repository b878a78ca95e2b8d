//! Colour-space conversions used by segmentation and species matching

use serde::Serialize;

/// CIE L*a*b* colour (D65 white point)
/// - L: 0.0-100.0 (lightness)
/// - a: approximately -128 to +128 (green-red axis)
/// - b: approximately -128 to +128 (blue-yellow axis)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

/// D65 standard illuminant reference white point
const D65_X: f64 = 0.95047;
const D65_Y: f64 = 1.00000;
const D65_Z: f64 = 1.08883;

/// sRGB to XYZ matrix (D65)
const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

const LAB_EPSILON: f64 = 216.0 / 24389.0;
const LAB_KAPPA: f64 = 24389.0 / 27.0;

impl Lab {
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// Convert 8-bit sRGB to L*a*b*
    pub fn from_srgb(r: u8, g: u8, b: u8) -> Self {
        let rl = srgb_to_linear(f64::from(r) / 255.0);
        let gl = srgb_to_linear(f64::from(g) / 255.0);
        let bl = srgb_to_linear(f64::from(b) / 255.0);

        let x = (SRGB_TO_XYZ[0][0] * rl + SRGB_TO_XYZ[0][1] * gl + SRGB_TO_XYZ[0][2] * bl) / D65_X;
        let y = (SRGB_TO_XYZ[1][0] * rl + SRGB_TO_XYZ[1][1] * gl + SRGB_TO_XYZ[1][2] * bl) / D65_Y;
        let z = (SRGB_TO_XYZ[2][0] * rl + SRGB_TO_XYZ[2][1] * gl + SRGB_TO_XYZ[2][2] * bl) / D65_Z;

        let fx = lab_f(x);
        let fy = lab_f(y);
        let fz = lab_f(z);

        Self {
            l: (116.0 * fy - 16.0).clamp(0.0, 100.0),
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    /// Chroma (distance from the neutral axis)
    pub fn chroma(&self) -> f64 {
        self.a.hypot(self.b)
    }

    /// CIE76 colour difference
    pub fn distance(&self, other: &Self) -> f64 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        (dl * dl + da * da + db * db).sqrt()
    }
}

#[inline]
fn srgb_to_linear(c: f64) -> f64 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

#[inline]
fn lab_f(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        (LAB_KAPPA * t + 16.0) / 116.0
    }
}

/// HSV saturation of normalised channels, 0 for black
#[inline]
pub fn hsv_saturation(r: f64, g: f64, b: f64) -> f64 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max > 0.0 {
        (max - min) / max
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_colours_have_no_chroma() {
        for v in [0u8, 64, 128, 200, 255] {
            let lab = Lab::from_srgb(v, v, v);
            assert!(lab.chroma() < 0.01, "grey {v} has chroma {}", lab.chroma());
        }
        assert!(Lab::from_srgb(255, 255, 255).l > 99.9);
        assert!(Lab::from_srgb(0, 0, 0).l < 0.01);
    }

    #[test]
    fn test_green_has_negative_a() {
        let lab = Lab::from_srgb(34, 139, 34);
        assert!(lab.a < -40.0);
        assert!(lab.b > 30.0);
        assert!((lab.l - 50.6).abs() < 1.0);
    }

    #[test]
    fn test_saturation_bounds() {
        assert_eq!(hsv_saturation(0.0, 0.0, 0.0), 0.0);
        assert_eq!(hsv_saturation(0.5, 0.5, 0.5), 0.0);
        assert!((hsv_saturation(0.0, 1.0, 0.0) - 1.0).abs() < 1e-12);
    }
}
