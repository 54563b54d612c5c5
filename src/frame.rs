// SPDX-License-Identifier: MPL-2.0

//! Decoded pictures and their pixel planes.
//!
//! A [`Frame`] owns up to three planes. Planar 4:2:0 frames carry a luma
//! plane and two chroma planes, packed 4:2:2 frames carry a single YUY2
//! plane. Plane buffers are only replaced when the frame's size or layout
//! changes, see [`crate::frame_store::FrameStore::update_format`].

use std::collections::TryReserveError;
use std::ops::BitOr;

use drm_fourcc::DrmFourcc;

/// Source pixel layout delivered by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Full resolution luma followed by quarter resolution U and V planes.
    Planar420,
    /// YUY2: one plane, luma interleaved with half resolution chroma.
    Packed422,
}

impl PixelFormat {
    #[must_use]
    pub fn fourcc(self) -> DrmFourcc {
        match self {
            PixelFormat::Planar420 => DrmFourcc::Yuv420,
            PixelFormat::Packed422 => DrmFourcc::Yuyv,
        }
    }

    /// Horizontal crop granularity in pixels.
    #[must_use]
    pub fn crop_align_x(self) -> u32 {
        match self {
            PixelFormat::Planar420 => 8,
            PixelFormat::Packed422 => 4,
        }
    }

    /// Vertical crop granularity in pixels.
    #[must_use]
    pub fn crop_align_y(self) -> u32 {
        match self {
            PixelFormat::Planar420 => 2,
            PixelFormat::Packed422 => 1,
        }
    }
}

/// Frame flags as passed along by the decoder.
///
/// Bits 0-1 select the field, bit 5 marks planar frames whose chroma is
/// not vertically subsampled, bits 8-12 carry the signalled color matrix
/// as `(standard << 1) | full_range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameFlags(u32);

impl FrameFlags {
    pub const TOP_FIELD: Self = Self(1);
    pub const BOTTOM_FIELD: Self = Self(2);
    pub const BOTH_FIELDS: Self = Self(3);
    pub const CHROMA_422: Self = Self(0x20);

    const CM_SHIFT: u32 = 8;
    const CM_MASK: u32 = 0x1f << Self::CM_SHIFT;

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Signalled color matrix code, 5 bits.
    #[must_use]
    pub const fn color_hint(self) -> u8 {
        ((self.0 & Self::CM_MASK) >> Self::CM_SHIFT) as u8
    }

    #[must_use]
    pub const fn with_color_hint(self, hint: u8) -> Self {
        Self((self.0 & !Self::CM_MASK) | (((hint as u32) & 0x1f) << Self::CM_SHIFT))
    }

    #[must_use]
    pub fn field(self) -> Field {
        match self.0 & Self::BOTH_FIELDS.0 {
            1 => Field::Top,
            2 => Field::Bottom,
            _ => Field::Both,
        }
    }
}

impl BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Which rows of a frame a display call covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Top,
    Bottom,
    Both,
}

impl Field {
    /// Row the field starts on.
    #[must_use]
    pub fn parity(self) -> usize {
        match self {
            Field::Bottom => 1,
            Field::Top | Field::Both => 0,
        }
    }

    /// Multiplier applied to every stride while converting this field.
    #[must_use]
    pub fn stride_factor(self) -> usize {
        match self {
            Field::Both => 1,
            Field::Top | Field::Bottom => 2,
        }
    }

    /// Number of rows of an image of `rows` rows that belong to this field.
    #[must_use]
    pub fn rows(self, rows: usize) -> usize {
        match self {
            Field::Both => rows,
            Field::Top => rows.div_ceil(2),
            Field::Bottom => rows / 2,
        }
    }
}

/// Pixels trimmed from each edge of a frame before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Crop {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Crop {
    #[must_use]
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    /// Round the leading margins down to what the converter can address.
    #[must_use]
    pub fn aligned(self, format: PixelFormat) -> Self {
        Self {
            left: self.left & !(format.crop_align_x() - 1),
            top: self.top & !(format.crop_align_y() - 1),
            ..self
        }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Self::default()
    }

    /// Left plus right margin, saturating.
    #[must_use]
    pub fn horizontal(self) -> u32 {
        self.left.saturating_add(self.right)
    }

    /// Top plus bottom margin, saturating.
    #[must_use]
    pub fn vertical(self) -> u32 {
        self.top.saturating_add(self.bottom)
    }
}

/// One block of pixel rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    pitch: usize,
    rows: usize,
}

impl Plane {
    fn filled(pitch: usize, rows: usize, fill: u8) -> Result<Self, TryReserveError> {
        // an unrepresentable size fails the reservation like any other
        let len = pitch.checked_mul(rows).unwrap_or(usize::MAX);
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, fill);
        Ok(Self { data, pitch, rows })
    }

    fn packed_black(pitch: usize, rows: usize) -> Result<Self, TryReserveError> {
        const BLACK: [u8; 4] = [0, 128, 0, 128];

        let mut plane = Self::filled(pitch, rows, 0)?;
        for word in plane.data.chunks_exact_mut(4) {
            word.copy_from_slice(&BLACK);
        }
        Ok(plane)
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes between the start of two consecutive rows.
    #[must_use]
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[u8]> {
        let start = row.checked_mul(self.pitch)?;
        self.data.get(start..start + self.pitch)
    }

    pub fn row_mut(&mut self, row: usize) -> Option<&mut [u8]> {
        let start = row.checked_mul(self.pitch)?;
        self.data.get_mut(start..start + self.pitch)
    }
}

/// Luma pitch for planar frames.
#[must_use]
pub fn luma_pitch(width: u32) -> usize {
    (width as usize).checked_next_multiple_of(8).unwrap_or(usize::MAX)
}

/// Pitch of each chroma plane of a planar frame.
#[must_use]
pub fn chroma_pitch(width: u32) -> usize {
    (width as usize).checked_next_multiple_of(16).unwrap_or(usize::MAX) / 2
}

/// Pitch of a packed 4:2:2 frame.
#[must_use]
pub fn packed_pitch(width: u32) -> usize {
    (width as usize)
        .checked_next_multiple_of(4)
        .map_or(usize::MAX, |w| w.saturating_mul(2))
}

/// Delivered ratios outside of this window are treated as garbage.
#[must_use]
pub fn ratio_is_sane(ratio: f64) -> bool {
    ratio.is_finite() && ratio > 0.001 && ratio < 1000.0
}

/// A decoded picture awaiting or undergoing display.
#[derive(Debug)]
pub struct Frame {
    id: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
    chroma_422: bool,
    ratio: f64,
    flags: FrameFlags,
    crop: Crop,
    planes: Vec<Plane>,
}

impl Frame {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            width: 0,
            height: 0,
            format: PixelFormat::Planar420,
            chroma_422: false,
            ratio: 0.0,
            flags: FrameFlags::BOTH_FIELDS,
            crop: Crop::default(),
            planes: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Width in pixels, 0 while the frame has no usable buffers.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Planar frame whose chroma planes have one row per luma row.
    #[must_use]
    pub fn chroma_422(&self) -> bool {
        self.chroma_422
    }

    /// Display aspect ratio, 0 when the decoder never sent a usable one.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Accept the decoder's aspect ratio unless it is garbage.
    ///
    /// Returns whether the stored ratio changed.
    pub fn set_ratio(&mut self, ratio: f64) -> bool {
        if ratio_is_sane(ratio) && ratio != self.ratio {
            self.ratio = ratio;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: FrameFlags) {
        self.flags = flags;
    }

    /// Crop as requested by the decoder, not yet aligned.
    #[must_use]
    pub fn crop(&self) -> Crop {
        self.crop
    }

    pub fn set_crop(&mut self, crop: Crop) {
        self.crop = crop;
    }

    /// Size of the picture once crop margins are removed.
    #[must_use]
    pub fn cropped_size(&self) -> (u32, u32) {
        let crop = self.crop.aligned(self.format);
        (
            self.width.saturating_sub(crop.horizontal()),
            self.height.saturating_sub(crop.vertical()),
        )
    }

    #[must_use]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn plane_mut(&mut self, index: usize) -> Option<&mut Plane> {
        self.planes.get_mut(index)
    }

    /// Row pitches of all planes, 0 for planes the format does not use.
    #[must_use]
    pub fn pitches(&self) -> [usize; 3] {
        let mut pitches = [0; 3];
        for (pitch, plane) in pitches.iter_mut().zip(&self.planes) {
            *pitch = plane.pitch;
        }
        pitches
    }

    /// Whether the frame holds buffers that can be displayed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.planes.is_empty()
    }

    pub(crate) fn layout_matches(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        chroma_422: bool,
    ) -> bool {
        self.is_ready()
            && self.width == width
            && self.height == height
            && self.format == format
            && self.chroma_422 == chroma_422
    }

    /// Replace the plane buffers for a new layout.
    ///
    /// On failure all planes are released and the frame is left with a
    /// zero width so it is skipped until the next successful update.
    pub(crate) fn reallocate(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        chroma_422: bool,
    ) -> Result<(), TryReserveError> {
        self.release_planes();
        self.format = format;
        self.chroma_422 = chroma_422 && format == PixelFormat::Planar420;

        let rows = height as usize;
        let planes = match format {
            PixelFormat::Planar420 => {
                let chroma_rows = if self.chroma_422 {
                    rows
                } else {
                    rows.div_ceil(2)
                };
                let y = Plane::filled(luma_pitch(width), rows, 0)?;
                let u = Plane::filled(chroma_pitch(width), chroma_rows, 128)?;
                let v = Plane::filled(chroma_pitch(width), chroma_rows, 128)?;
                vec![y, u, v]
            }
            PixelFormat::Packed422 => vec![Plane::packed_black(packed_pitch(width), rows)?],
        };

        self.planes = planes;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub(crate) fn release_planes(&mut self) {
        self.planes = Vec::new();
        self.width = 0;
        self.height = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_alignment() {
        for width in 1..=1930u32 {
            let luma = luma_pitch(width);
            assert_eq!(luma, width.div_ceil(8) as usize * 8);
            assert!(luma >= width as usize);

            assert_eq!(chroma_pitch(width), width.div_ceil(16) as usize * 8);
            assert!(chroma_pitch(width) * 2 >= width as usize);

            assert_eq!(packed_pitch(width), width.div_ceil(4) as usize * 8);
        }
    }

    #[test]
    fn test_crop_alignment() {
        for value in 0..64 {
            let crop = Crop::new(value, value, value, value);

            let planar = crop.aligned(PixelFormat::Planar420);
            assert_eq!(planar.left % 8, 0);
            assert_eq!(planar.top % 2, 0);
            assert!(planar.left <= value && value - planar.left < 8);
            assert_eq!(planar.right, value);
            assert_eq!(planar.bottom, value);

            let packed = crop.aligned(PixelFormat::Packed422);
            assert_eq!(packed.left % 4, 0);
            assert_eq!(packed.top, value);
        }
    }

    #[test]
    fn test_color_hint_bits() {
        let flags = FrameFlags::TOP_FIELD.with_color_hint((7 << 1) | 1);
        assert_eq!(flags.color_hint(), 15);
        assert_eq!(flags.field(), Field::Top);

        let flags = flags.with_color_hint(2 << 1);
        assert_eq!(flags.color_hint(), 4);
        assert!(flags.contains(FrameFlags::TOP_FIELD));
        assert!(!flags.contains(FrameFlags::CHROMA_422));
    }

    #[test]
    fn test_field_rows() {
        assert_eq!(Field::Top.rows(481), 241);
        assert_eq!(Field::Bottom.rows(481), 240);
        assert_eq!(Field::Both.rows(481), 481);
        assert_eq!(Field::Bottom.parity(), 1);
        assert_eq!(FrameFlags::from_bits(0).field(), Field::Both);
    }

    #[test]
    fn test_planar_buffers_start_black() {
        let mut frame = Frame::new(0);
        frame.reallocate(17, 5, PixelFormat::Planar420, false).unwrap();

        let planes = frame.planes();
        assert_eq!(planes.len(), 3);
        assert_eq!(planes[0].pitch(), 24);
        assert_eq!(planes[0].rows(), 5);
        assert_eq!(planes[1].pitch(), 16);
        assert_eq!(planes[1].rows(), 3);
        assert!(planes[0].data().iter().all(|&b| b == 0));
        assert!(planes[1].data().iter().all(|&b| b == 128));
        assert!(planes[2].data().iter().all(|&b| b == 128));
    }

    #[test]
    fn test_packed_buffer_starts_black() {
        let mut frame = Frame::new(0);
        frame.reallocate(6, 2, PixelFormat::Packed422, false).unwrap();

        let plane = &frame.planes()[0];
        assert_eq!(plane.pitch(), 16);
        assert_eq!(plane.row(1).unwrap()[..4], [0, 128, 0, 128]);
        assert!(plane.row(2).is_none());
    }

    #[test]
    fn test_chroma_422_planes_are_full_height() {
        let mut frame = Frame::new(0);
        frame.reallocate(32, 10, PixelFormat::Planar420, true).unwrap();
        assert!(frame.chroma_422());
        assert_eq!(frame.planes()[1].rows(), 10);

        // meaningless for packed frames
        frame.reallocate(32, 10, PixelFormat::Packed422, true).unwrap();
        assert!(!frame.chroma_422());
    }

    #[test]
    fn test_ratio_sanity() {
        let mut frame = Frame::new(0);
        assert!(!frame.set_ratio(f64::NAN));
        assert!(!frame.set_ratio(0.0));
        assert!(!frame.set_ratio(5000.0));
        assert!(frame.set_ratio(4.0 / 3.0));
        assert!(!frame.set_ratio(4.0 / 3.0));
        assert!(!frame.set_ratio(f64::INFINITY));
        assert_eq!(frame.ratio(), 4.0 / 3.0);
    }

    #[test]
    fn test_cropped_size_saturates() {
        let mut frame = Frame::new(0);
        frame.reallocate(16, 16, PixelFormat::Planar420, false).unwrap();
        frame.set_crop(Crop::new(8, 10, 20, 10));
        assert_eq!(frame.cropped_size(), (0, 0));

        frame.set_crop(Crop::new(8, u32::MAX, u32::MAX, 2));
        assert_eq!(frame.cropped_size(), (0, 0));
        assert_eq!(Crop::new(1, 0, u32::MAX, 0).horizontal(), u32::MAX);
    }

    #[test]
    fn test_unrepresentable_layout_fails() {
        let mut frame = Frame::new(0);
        assert!(frame.reallocate(u32::MAX, u32::MAX, PixelFormat::Packed422, false).is_err());
        assert!(frame.reallocate(u32::MAX, u32::MAX, PixelFormat::Planar420, false).is_err());
        assert!(!frame.is_ready());
        assert_eq!(frame.width(), 0);
    }
}
