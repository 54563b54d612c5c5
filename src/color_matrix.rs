// SPDX-License-Identifier: MPL-2.0

//! Choice of the color matrix used to turn a frame's YUV into RGB.
//!
//! Streams signal their matrix as an ISO/IEC 23001-8 `matrix_coefficients`
//! code plus a full range bit. What is actually used also depends on the
//! user's [`MatrixPolicy`] and [`RangePolicy`], and for unlabelled content
//! on the picture size.

use std::fmt;

use vidout_config::{MatrixPolicy, RangePolicy};

use crate::frame::Crop;

/// Identity matrix, the frame is RGB.
pub const STANDARD_RGB: u8 = 0;
/// ITU-R BT.709.
pub const STANDARD_709: u8 = 1;
/// Not signalled by the stream.
pub const STANDARD_UNSPECIFIED: u8 = 2;
/// FCC 73.682.
pub const STANDARD_FCC: u8 = 4;
/// ITU-R BT.470 BG, equivalent to BT.601 625 lines.
pub const STANDARD_601: u8 = 5;
/// SMPTE 170M, equivalent to BT.601 525 lines.
pub const STANDARD_170M: u8 = 6;
/// SMPTE 240M.
pub const STANDARD_240M: u8 = 7;
/// YCgCo.
pub const STANDARD_YCGCO: u8 = 8;

/// Pictures at least this tall count as HD when guessing the matrix.
pub const HD_MIN_HEIGHT: u32 = 720;
/// Pictures at least this wide count as HD when guessing the matrix.
pub const HD_MIN_WIDTH: u32 = 1280;

/// Standard used for every signalled code when following the stream.
const SIGNAL_ROW: [u8; 16] = [5, 1, 5, 3, 4, 5, 6, 7, 8, 5, 5, 5, 5, 5, 5, 5];

#[cfg(feature = "ycgco")]
const DOMAIN: usize = 32;
#[cfg(not(feature = "ycgco"))]
const DOMAIN: usize = 16;

const NAMES: [&str; 32] = [
    "RGB",
    "RGB",
    "ITU-R 709 / HDTV",
    "full range ITU-R 709 / HDTV",
    "undefined",
    "full range, undefined",
    "ITU-R 470 BG / SDTV",
    "full range ITU-R 470 BG / SDTV",
    "FCC",
    "full range FCC",
    "ITU-R 470 BG / SDTV",
    "full range ITU-R 470 BG / SDTV",
    "SMPTE 170M",
    "full range SMPTE 170M",
    "SMPTE 240M",
    "full range SMPTE 240M",
    "YCgCo",
    "YCgCo",
    "#9",
    "fullrange #9",
    "#10",
    "fullrange #10",
    "#11",
    "fullrange #11",
    "#12",
    "fullrange #12",
    "#13",
    "fullrange #13",
    "#14",
    "fullrange #14",
    "#15",
    "fullrange #15",
];

/// A color standard plus a full range flag, packed as
/// `(standard << 1) | full_range`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColorMatrix(u8);

impl ColorMatrix {
    /// Standard definition default.
    pub const SDTV: Self = Self::new(STANDARD_601, false);
    /// High definition default.
    pub const HDTV: Self = Self::new(STANDARD_709, false);

    #[must_use]
    pub const fn new(standard: u8, full_range: bool) -> Self {
        Self((standard << 1) | full_range as u8)
    }

    /// Interpret a packed code as found in frame flags.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn standard(self) -> u8 {
        self.0 >> 1
    }

    #[must_use]
    pub const fn full_range(self) -> bool {
        self.0 & 1 != 0
    }

    /// Human readable name, for logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        names().get(self.0 as usize).copied().unwrap_or("undefined")
    }
}

impl fmt::Debug for ColorMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColorMatrix({}: {})", self.0, self.name())
    }
}

/// Names of every code [`select`] can produce, indexed by code.
#[must_use]
pub fn names() -> &'static [&'static str] {
    &NAMES[..DOMAIN]
}

/// Whether a picture counts as HD once its crop is removed.
#[must_use]
pub fn is_hd(width: u32, height: u32, crop: Crop) -> bool {
    let width = width.saturating_sub(crop.horizontal());
    let height = height.saturating_sub(crop.vertical());
    height >= HD_MIN_HEIGHT || width >= HD_MIN_WIDTH
}

fn resolve_standard(policy: MatrixPolicy, signalled: u8, hd: bool) -> u8 {
    match policy {
        MatrixPolicy::ForceSd => STANDARD_601,
        MatrixPolicy::ForceHd => STANDARD_709,
        MatrixPolicy::Signal | MatrixPolicy::SignalSize => {
            let signalled = if (signalled as usize) < SIGNAL_ROW.len() {
                signalled
            } else {
                STANDARD_UNSPECIFIED
            };

            if policy == MatrixPolicy::SignalSize && signalled == STANDARD_UNSPECIFIED {
                return if hd { STANDARD_709 } else { STANDARD_601 };
            }

            match SIGNAL_ROW[signalled as usize] {
                STANDARD_YCGCO if cfg!(not(feature = "ycgco")) => STANDARD_UNSPECIFIED,
                standard => standard,
            }
        }
    }
}

/// Pick the output matrix for a frame.
///
/// `hint` is the frame's signalled code, `width`, `height` and `crop` its
/// geometry. The result is always inside [`names`].
#[must_use]
pub fn select(
    matrix_policy: MatrixPolicy,
    range_policy: RangePolicy,
    hint: u8,
    width: u32,
    height: u32,
    crop: Crop,
) -> ColorMatrix {
    let hint = ColorMatrix::from_code(hint);
    let hd = is_hd(width, height, crop);

    let standard = resolve_standard(matrix_policy, hint.standard(), hd);
    let full_range = match range_policy {
        RangePolicy::Auto => hint.full_range(),
        RangePolicy::Mpeg => false,
        RangePolicy::Full => true,
    };

    ColorMatrix::new(standard, full_range)
}

/// The user's matrix and range policies plus the matrix currently in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorMatrixState {
    matrix_policy: MatrixPolicy,
    range_policy: RangePolicy,
    active: Option<ColorMatrix>,
}

impl ColorMatrixState {
    #[must_use]
    pub fn new(matrix_policy: MatrixPolicy, range_policy: RangePolicy) -> Self {
        Self {
            matrix_policy,
            range_policy,
            active: None,
        }
    }

    /// Both policies as one value, `(matrix << 2) | range`.
    #[must_use]
    pub fn packed(&self) -> u8 {
        (self.matrix_policy.index() << 2) | self.range_policy.index()
    }

    #[must_use]
    pub fn from_packed(packed: u8) -> Self {
        Self::new(
            MatrixPolicy::from_index(packed >> 2).unwrap_or_default(),
            RangePolicy::from_index(packed & 3).unwrap_or_default(),
        )
    }

    #[must_use]
    pub fn matrix_policy(&self) -> MatrixPolicy {
        self.matrix_policy
    }

    #[must_use]
    pub fn range_policy(&self) -> RangePolicy {
        self.range_policy
    }

    /// Change the matrix policy, keeping the range policy.
    pub fn set_matrix_policy(&mut self, policy: MatrixPolicy) {
        if policy != self.matrix_policy {
            tracing::info!(policy = policy.label(), "color matrix policy changed");
            self.matrix_policy = policy;
            self.active = None;
        }
    }

    /// Change the range policy, keeping the matrix policy.
    pub fn set_range_policy(&mut self, policy: RangePolicy) {
        if policy != self.range_policy {
            tracing::info!(policy = policy.label(), "color range policy changed");
            self.range_policy = policy;
            self.active = None;
        }
    }

    #[must_use]
    pub fn select(&self, hint: u8, width: u32, height: u32, crop: Crop) -> ColorMatrix {
        select(self.matrix_policy, self.range_policy, hint, width, height, crop)
    }

    /// Select the matrix for a frame and remember it.
    ///
    /// Returns the new matrix when it differs from the one in use, meaning
    /// conversion coefficients have to be rebuilt.
    pub fn update(&mut self, hint: u8, width: u32, height: u32, crop: Crop) -> Option<ColorMatrix> {
        let matrix = self.select(hint, width, height, crop);
        if self.active == Some(matrix) {
            return None;
        }

        tracing::info!(code = matrix.code(), name = matrix.name(), "using color matrix");
        self.active = Some(matrix);
        Some(matrix)
    }

    /// The matrix chosen for the last displayed frame.
    #[must_use]
    pub fn active(&self) -> Option<ColorMatrix> {
        self.active
    }

    /// Forget the active matrix so the next frame reports a change.
    pub fn invalidate(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICIES: [MatrixPolicy; 4] = [
        MatrixPolicy::Signal,
        MatrixPolicy::SignalSize,
        MatrixPolicy::ForceSd,
        MatrixPolicy::ForceHd,
    ];
    const RANGES: [RangePolicy; 3] = [RangePolicy::Auto, RangePolicy::Mpeg, RangePolicy::Full];

    fn hint(standard: u8, full: bool) -> u8 {
        ColorMatrix::new(standard, full).code()
    }

    #[test]
    fn test_selection_is_total() {
        for policy in POLICIES {
            for range in RANGES {
                for code in 0..=255u8 {
                    for (w, h) in [(0, 0), (720, 576), (1920, 1080)] {
                        let matrix = select(policy, range, code, w, h, Crop::default());
                        assert!((matrix.code() as usize) < names().len(), "{matrix:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_signal_policy_follows_stream() {
        let pick = |code| select(MatrixPolicy::Signal, RangePolicy::Auto, code, 720, 576, Crop::default());

        assert_eq!(pick(hint(STANDARD_709, false)), ColorMatrix::HDTV);
        assert_eq!(pick(hint(STANDARD_170M, true)), ColorMatrix::new(STANDARD_170M, true));
        assert_eq!(pick(hint(STANDARD_240M, false)).standard(), STANDARD_240M);
        assert_eq!(pick(hint(STANDARD_FCC, false)).standard(), STANDARD_FCC);
        assert_eq!(pick(hint(STANDARD_RGB, false)), ColorMatrix::SDTV);
        assert_eq!(pick(hint(STANDARD_UNSPECIFIED, false)), ColorMatrix::SDTV);
        assert_eq!(pick(hint(12, false)), ColorMatrix::SDTV);
        assert_eq!(pick(hint(3, false)).standard(), 3);
    }

    #[test]
    fn test_size_policy_guesses_unlabelled_content() {
        let pick = |w, h, crop| {
            select(
                MatrixPolicy::SignalSize,
                RangePolicy::Auto,
                hint(STANDARD_UNSPECIFIED, false),
                w,
                h,
                crop,
            )
        };

        assert_eq!(pick(1920, 1080, Crop::default()), ColorMatrix::HDTV);
        assert_eq!(pick(640, 360, Crop::default()), ColorMatrix::SDTV);
        assert_eq!(pick(1280, 400, Crop::default()), ColorMatrix::HDTV);
        assert_eq!(pick(960, 720, Crop::default()), ColorMatrix::HDTV);
        // cropping below the threshold makes it SD again
        assert_eq!(pick(1280, 720, Crop::new(0, 8, 8, 0)), ColorMatrix::SDTV);

        // labelled content is never overridden by size
        let labelled = select(
            MatrixPolicy::SignalSize,
            RangePolicy::Auto,
            hint(STANDARD_601, false),
            1920,
            1080,
            Crop::default(),
        );
        assert_eq!(labelled, ColorMatrix::SDTV);
    }

    #[test]
    fn test_force_policies_ignore_stream() {
        for code in 0..32u8 {
            let sd = select(MatrixPolicy::ForceSd, RangePolicy::Mpeg, code, 1920, 1080, Crop::default());
            let hd = select(MatrixPolicy::ForceHd, RangePolicy::Mpeg, code, 320, 240, Crop::default());
            assert_eq!(sd, ColorMatrix::SDTV);
            assert_eq!(hd, ColorMatrix::HDTV);
        }
    }

    #[test]
    fn test_range_policy() {
        let full_hint = hint(STANDARD_709, true);
        let pick = |range| select(MatrixPolicy::Signal, range, full_hint, 1920, 1080, Crop::default());

        assert!(pick(RangePolicy::Auto).full_range());
        assert!(!pick(RangePolicy::Mpeg).full_range());
        assert!(pick(RangePolicy::Full).full_range());

        let mpeg_hint = hint(STANDARD_709, false);
        let full = select(MatrixPolicy::Signal, RangePolicy::Full, mpeg_hint, 64, 64, Crop::default());
        assert_eq!(full, ColorMatrix::new(STANDARD_709, true));
    }

    #[cfg(not(feature = "ycgco"))]
    #[test]
    fn test_ycgco_unsupported_maps_to_undefined() {
        let matrix = select(
            MatrixPolicy::Signal,
            RangePolicy::Auto,
            hint(STANDARD_YCGCO, false),
            64,
            64,
            Crop::default(),
        );
        assert_eq!(matrix.standard(), STANDARD_UNSPECIFIED);
        assert_eq!(matrix.name(), "undefined");
        assert_eq!(names().len(), 16);
    }

    #[cfg(feature = "ycgco")]
    #[test]
    fn test_ycgco_supported() {
        let matrix = select(
            MatrixPolicy::Signal,
            RangePolicy::Auto,
            hint(STANDARD_YCGCO, false),
            64,
            64,
            Crop::default(),
        );
        assert_eq!(matrix.standard(), STANDARD_YCGCO);
        assert_eq!(matrix.name(), "YCgCo");
        assert_eq!(names().len(), 32);
    }

    #[test]
    fn test_names() {
        assert_eq!(ColorMatrix::HDTV.name(), "ITU-R 709 / HDTV");
        assert_eq!(ColorMatrix::new(STANDARD_601, true).name(), "full range ITU-R 470 BG / SDTV");
        assert_eq!(ColorMatrix::new(STANDARD_240M, true).name(), "full range SMPTE 240M");
    }

    #[test]
    fn test_packed_policies() {
        let mut state = ColorMatrixState::default();
        assert_eq!(state.packed(), 1 << 2);

        state.set_range_policy(RangePolicy::Full);
        assert_eq!(state.packed(), (1 << 2) | 2);

        state.set_matrix_policy(MatrixPolicy::ForceHd);
        assert_eq!(state.packed(), (3 << 2) | 2);
        assert_eq!(state.range_policy(), RangePolicy::Full);

        assert_eq!(ColorMatrixState::from_packed(state.packed()), state);
        assert_eq!(ColorMatrixState::from_packed(0xff).matrix_policy(), MatrixPolicy::SignalSize);
    }

    #[test]
    fn test_update_reports_changes_only() {
        let mut state = ColorMatrixState::new(MatrixPolicy::SignalSize, RangePolicy::Auto);
        let unlabelled = hint(STANDARD_UNSPECIFIED, false);

        assert_eq!(state.update(unlabelled, 1920, 1080, Crop::default()), Some(ColorMatrix::HDTV));
        assert_eq!(state.update(unlabelled, 1920, 1080, Crop::default()), None);
        assert_eq!(state.update(unlabelled, 720, 576, Crop::default()), Some(ColorMatrix::SDTV));

        state.set_matrix_policy(MatrixPolicy::ForceSd);
        assert!(state.active().is_none());
        assert_eq!(state.update(unlabelled, 720, 576, Crop::default()), Some(ColorMatrix::SDTV));

        state.invalidate();
        assert!(state.update(unlabelled, 720, 576, Crop::default()).is_some());
    }
}
