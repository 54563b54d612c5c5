// SPDX-License-Identifier: MPL-2.0

//! YUV to RGB coefficients derived from a color matrix and picture levels.

use vidout_config::PictureLevels;

use crate::color_matrix::{
    ColorMatrix, STANDARD_170M, STANDARD_240M, STANDARD_709, STANDARD_FCC, STANDARD_YCGCO,
};

const FRAC_BITS: u32 = 16;
const ONE: f64 = (1 << FRAC_BITS) as f64;
const ROUND: i32 = 1 << (FRAC_BITS - 1);

/// Blue and red luma weights `(Kb, Kr)` of a standard.
#[must_use]
pub fn luma_weights(standard: u8) -> (f64, f64) {
    match standard {
        STANDARD_709 => (0.0722, 0.2126),
        STANDARD_FCC => (0.11, 0.30),
        STANDARD_240M => (0.087, 0.212),
        // 601, 170M and everything unlabelled
        _ => (0.114, 0.299),
    }
}

/// Floating point 3x4 matrix; columns are Y, U, V and a constant, rows R, G, B.
pub type CscMatrix = [[f64; 4]; 3];

/// Build the conversion matrix for 8 bit samples.
///
/// Hue is in degrees, contrast and saturation are 128 for unity gain.
#[must_use]
pub fn matrix(levels: &PictureLevels, cm: ColorMatrix) -> CscMatrix {
    let levels = levels.clamped();
    let hue = f64::from(levels.hue).to_radians();
    let saturation = f64::from(levels.saturation) / 128.0;
    let contrast = f64::from(levels.contrast) / 128.0;
    let brightness = f64::from(levels.brightness);

    let mut uvcos = saturation * hue.cos();
    let mut uvsin = saturation * hue.sin();

    let (ygain, yoffset) = if cm.full_range() || cm.standard() == STANDARD_YCGCO {
        let uv = contrast * 255.0 / 254.0;
        uvcos *= uv;
        uvsin *= uv;
        (contrast, brightness)
    } else {
        let uv = contrast * 255.0 / 224.0;
        uvcos *= uv;
        uvsin *= uv;
        (contrast * 255.0 / 219.0, brightness - 16.0)
    };

    let rows = if cm.standard() == STANDARD_YCGCO {
        [
            [-uvcos - uvsin, uvcos - uvsin],
            [uvcos, uvsin],
            [-uvcos + uvsin, -uvcos - uvsin],
        ]
    } else {
        let (kb, kr) = luma_weights(cm.standard());
        let vr = 2.0 * (1.0 - kr);
        let vg = -2.0 * kr * (1.0 - kr) / (1.0 - kb - kr);
        let ug = -2.0 * kb * (1.0 - kb) / (1.0 - kb - kr);
        let ub = 2.0 * (1.0 - kb);
        [
            [-uvsin * vr, uvcos * vr],
            [uvcos * ug - uvsin * vg, uvcos * vg + uvsin * ug],
            [uvcos * ub, uvsin * ub],
        ]
    };

    rows.map(|[mu, mv]| [ygain, mu, mv, yoffset * ygain - 128.0 * (mu + mv)])
}

/// Fixed point form of [`matrix`] used per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coefficients {
    y: i32,
    u: [i32; 3],
    v: [i32; 3],
    offset: [i32; 3],
}

impl Coefficients {
    #[must_use]
    pub fn new(levels: &PictureLevels, cm: ColorMatrix) -> Self {
        let m = matrix(levels, cm);
        let fixed = |value: f64| (value * ONE).round() as i32;

        Self {
            y: fixed(m[0][0]),
            u: m.map(|row| fixed(row[1])),
            v: m.map(|row| fixed(row[2])),
            offset: m.map(|row| fixed(row[3]) + ROUND),
        }
    }

    #[inline]
    #[must_use]
    pub fn rgb(&self, y: u8, u: u8, v: u8) -> [u8; 3] {
        let y = i32::from(y) * self.y;
        let (u, v) = (i32::from(u), i32::from(v));
        std::array::from_fn(|c| clamp(y + self.u[c] * u + self.v[c] * v + self.offset[c]))
    }

    /// Luma only path for gray output, brightness and contrast applied.
    #[inline]
    #[must_use]
    pub fn gray(&self, y: u8) -> u8 {
        // chroma at 128 cancels out of the offset
        clamp(i32::from(y) * self.y + self.offset[1] + 128 * (self.u[1] + self.v[1]))
    }
}

impl Default for Coefficients {
    fn default() -> Self {
        Self::new(&PictureLevels::default(), ColorMatrix::SDTV)
    }
}

#[inline]
fn clamp(value: i32) -> u8 {
    (value >> FRAC_BITS).clamp(0, 255) as u8
}

/// Adjust levels so a sink that only expands studio range shows full range
/// content correctly.
///
/// Contrast is scaled by 219/255 and saturation by (112*255)/(127*219)
/// relative to the bottom of their ranges, and the black level is raised
/// to compensate for the reduced contrast.
#[must_use]
pub fn emulate_full_range(levels: &PictureLevels) -> PictureLevels {
    let (b_min, b_max) = PictureLevels::BRIGHTNESS_RANGE;
    let (c_min, c_max) = PictureLevels::CONTRAST_RANGE;
    let (s_min, s_max) = PictureLevels::SATURATION_RANGE;
    let levels = levels.clamped();

    let saturation = levels.saturation - s_min;
    let saturation = (saturation * (112 * 255) + (127 * 219 / 2)) / (127 * 219) + s_min;

    let contrast = levels.contrast - c_min;
    let contrast = (contrast * 219 + 127) / 255;
    let a = contrast * (b_max - b_min);
    let b = 256 * (c_max - c_min);
    let brightness = levels.brightness + (16 * a + b / 2) / b;

    PictureLevels {
        brightness: brightness.min(b_max),
        contrast: (contrast + c_min).min(c_max),
        saturation: saturation.min(s_max),
        hue: levels.hue,
    }
}
