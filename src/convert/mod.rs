// SPDX-License-Identifier: MPL-2.0

//! Software YUV to RGB conversion with nearest neighbour scaling.
//!
//! A [`Converter`] is configured once per source/destination geometry and
//! then called for every frame. Rows are converted in parallel.

pub mod csc;

use drm_fourcc::DrmFourcc;
use rayon::prelude::*;
use vidout_config::PictureLevels;

use crate::color_matrix::ColorMatrix;

pub use csc::{Coefficients, emulate_full_range};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("no converter for {0} output")]
    UnsupportedFourcc(DrmFourcc),
    #[error("no converter for {0} bits per pixel")]
    UnsupportedDepth(u32),
    #[error("invalid conversion geometry: {0}")]
    InvalidGeometry(&'static str),
    #[error("converter used before being configured")]
    NotConfigured,
    #[error("{plane} buffer too small: {actual} bytes, {required} required")]
    BufferTooSmall {
        plane: &'static str,
        required: usize,
        actual: usize,
    },
}

/// Pixel formats the converter can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestFormat {
    /// 16 bit, 5:6:5.
    Rgb565,
    /// 16 bit, 1:5:5:5 with the top bit unused.
    Rgb555,
    /// Bytes R, G, B.
    Rgb24,
    /// Bytes B, G, R.
    Bgr24,
    /// 32 bit little endian, bytes B, G, R, X.
    Xrgb8888,
    /// 8 bit luma.
    Gray8,
}

impl DestFormat {
    pub const ALL: [Self; 6] = [
        Self::Rgb565,
        Self::Rgb555,
        Self::Rgb24,
        Self::Bgr24,
        Self::Xrgb8888,
        Self::Gray8,
    ];

    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb565 | Self::Rgb555 => 2,
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Xrgb8888 => 4,
        }
    }

    #[must_use]
    pub fn fourcc(self) -> DrmFourcc {
        match self {
            Self::Rgb565 => DrmFourcc::Rgb565,
            Self::Rgb555 => DrmFourcc::Xrgb1555,
            Self::Rgb24 => DrmFourcc::Bgr888,
            Self::Bgr24 => DrmFourcc::Rgb888,
            Self::Xrgb8888 => DrmFourcc::Xrgb8888,
            Self::Gray8 => DrmFourcc::R8,
        }
    }

    pub fn from_fourcc(fourcc: DrmFourcc) -> Result<Self, ConvertError> {
        Self::ALL
            .into_iter()
            .find(|format| format.fourcc() == fourcc)
            .ok_or(ConvertError::UnsupportedFourcc(fourcc))
    }

    /// Format of a framebuffer with the given bits per pixel.
    pub fn from_depth(bits_per_pixel: u32) -> Result<Self, ConvertError> {
        match bits_per_pixel {
            8 => Ok(Self::Gray8),
            15 => Ok(Self::Rgb555),
            16 => Ok(Self::Rgb565),
            24 => Ok(Self::Bgr24),
            32 => Ok(Self::Xrgb8888),
            other => Err(ConvertError::UnsupportedDepth(other)),
        }
    }

    /// Pixel value as the format would store it in a native integer.
    #[must_use]
    pub fn pack(self, [r, g, b]: [u8; 3]) -> u32 {
        let (r, g, b) = (u32::from(r), u32::from(g), u32::from(b));
        match self {
            Self::Rgb565 => ((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3),
            Self::Rgb555 => ((r >> 3) << 10) | ((g >> 3) << 5) | (b >> 3),
            Self::Rgb24 | Self::Xrgb8888 => (r << 16) | (g << 8) | b,
            Self::Bgr24 => (b << 16) | (g << 8) | r,
            Self::Gray8 => (r * 77 + g * 150 + b * 29) >> 8,
        }
    }

    /// Store one pixel at the start of `out`.
    #[inline]
    pub fn write(self, out: &mut [u8], rgb: [u8; 3]) {
        let value = self.pack(rgb);
        match self {
            Self::Rgb24 | Self::Bgr24 => out[..3].copy_from_slice(&value.to_be_bytes()[1..]),
            _ => {
                let bpp = self.bytes_per_pixel();
                out[..bpp].copy_from_slice(&value.to_le_bytes()[..bpp]);
            }
        }
    }

    /// Read back the pixel at the start of `src`, expanding reduced
    /// precision formats.
    #[must_use]
    pub fn read(self, src: &[u8]) -> [u8; 3] {
        let expand5 = |v: u16| ((v << 3) | (v >> 2)) as u8;
        match self {
            Self::Rgb565 => {
                let v = u16::from_le_bytes([src[0], src[1]]);
                let g = (v >> 5) & 0x3f;
                [expand5(v >> 11), ((g << 2) | (g >> 4)) as u8, expand5(v & 0x1f)]
            }
            Self::Rgb555 => {
                let v = u16::from_le_bytes([src[0], src[1]]);
                [expand5((v >> 10) & 0x1f), expand5((v >> 5) & 0x1f), expand5(v & 0x1f)]
            }
            Self::Rgb24 => [src[0], src[1], src[2]],
            Self::Bgr24 => [src[2], src[1], src[0]],
            Self::Xrgb8888 => [src[2], src[1], src[0]],
            Self::Gray8 => [src[0]; 3],
        }
    }
}

/// Source and destination dimensions a converter is set up for.
///
/// Pitches are in bytes. For field conversion callers double every pitch
/// and halve the heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub src_width: usize,
    pub src_height: usize,
    pub src_pitch_luma: usize,
    pub src_pitch_chroma: usize,
    pub dst_width: usize,
    pub dst_height: usize,
    pub dst_pitch: usize,
    /// Planar chroma with one row per luma row.
    pub chroma_full_height: bool,
}

impl Geometry {
    #[must_use]
    pub fn new(
        src_width: usize,
        src_height: usize,
        src_pitch_luma: usize,
        src_pitch_chroma: usize,
        dst_width: usize,
        dst_height: usize,
        dst_pitch: usize,
    ) -> Self {
        Self {
            src_width,
            src_height,
            src_pitch_luma,
            src_pitch_chroma,
            dst_width,
            dst_height,
            dst_pitch,
            chroma_full_height: false,
        }
    }

    #[must_use]
    pub fn with_full_height_chroma(mut self, full: bool) -> Self {
        self.chroma_full_height = full;
        self
    }

    fn source_row(&self, dst_row: usize) -> usize {
        ((2 * dst_row + 1) * self.src_height / (2 * self.dst_height)).min(self.src_height - 1)
    }

    fn source_column(&self, dst_column: usize) -> usize {
        ((2 * dst_column + 1) * self.src_width / (2 * self.dst_width)).min(self.src_width - 1)
    }
}

/// YUV to RGB converter for one destination format.
#[derive(Debug, Clone)]
pub struct Converter {
    format: DestFormat,
    coefficients: Coefficients,
    geometry: Option<Geometry>,
    columns: Vec<usize>,
}

impl Converter {
    #[must_use]
    pub fn new(format: DestFormat) -> Self {
        Self {
            format,
            coefficients: Coefficients::default(),
            geometry: None,
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn format(&self) -> DestFormat {
        self.format
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    /// Rebuild the coefficients for new picture levels or a new matrix.
    pub fn set_csc_levels(&mut self, levels: &PictureLevels, matrix: ColorMatrix) {
        tracing::debug!(?levels, ?matrix, "updating conversion coefficients");
        self.coefficients = Coefficients::new(levels, matrix);
    }

    /// Set up source and destination dimensions.
    pub fn configure(&mut self, geometry: Geometry) -> Result<(), ConvertError> {
        if geometry.src_width == 0 || geometry.src_height == 0 {
            return Err(ConvertError::InvalidGeometry("empty source"));
        }
        if geometry.dst_width == 0 || geometry.dst_height == 0 {
            return Err(ConvertError::InvalidGeometry("empty destination"));
        }
        if geometry.src_pitch_luma < geometry.src_width {
            return Err(ConvertError::InvalidGeometry("source pitch below width"));
        }
        if geometry.dst_pitch < geometry.dst_width * self.format.bytes_per_pixel() {
            return Err(ConvertError::InvalidGeometry("destination pitch below width"));
        }

        self.columns = (0..geometry.dst_width)
            .map(|x| geometry.source_column(x))
            .collect();
        self.geometry = Some(geometry);

        tracing::debug!(
            src_width = geometry.src_width,
            src_height = geometry.src_height,
            dst_width = geometry.dst_width,
            dst_height = geometry.dst_height,
            format = ?self.format,
            "converter configured"
        );

        Ok(())
    }

    fn configured(&self) -> Result<&Geometry, ConvertError> {
        self.geometry.as_ref().ok_or(ConvertError::NotConfigured)
    }

    fn check_destination(&self, g: &Geometry, dst: &[u8]) -> Result<(), ConvertError> {
        let required = (g.dst_height - 1) * g.dst_pitch + g.dst_width * self.format.bytes_per_pixel();
        check_len("destination", dst.len(), required)
    }

    #[inline]
    fn put(&self, out: &mut [u8], y: u8, u: u8, v: u8) {
        match self.format {
            DestFormat::Gray8 => out[0] = self.coefficients.gray(y),
            format => format.write(out, self.coefficients.rgb(y, u, v)),
        }
    }

    /// Convert three planes, chroma at half horizontal resolution.
    pub fn convert_planar(
        &self,
        dst: &mut [u8],
        y: &[u8],
        u: &[u8],
        v: &[u8],
    ) -> Result<(), ConvertError> {
        let g = self.configured()?;
        let chroma_width = g.src_width.div_ceil(2);
        if g.src_pitch_chroma < chroma_width {
            return Err(ConvertError::InvalidGeometry("chroma pitch below width"));
        }

        check_len("luma", y.len(), (g.src_height - 1) * g.src_pitch_luma + g.src_width)?;
        check_len("u", u.len(), chroma_width)?;
        check_len("v", v.len(), chroma_width)?;
        self.check_destination(g, dst)?;

        // the last chroma row may be missing for odd field heights
        let chroma_rows = (u.len().min(v.len()) - chroma_width) / g.src_pitch_chroma + 1;
        let bpp = self.format.bytes_per_pixel();

        dst.par_chunks_mut(g.dst_pitch)
            .take(g.dst_height)
            .enumerate()
            .for_each(|(dy, out)| {
                let sy = g.source_row(dy);
                let cy = (if g.chroma_full_height { sy } else { sy / 2 }).min(chroma_rows - 1);

                let y_row = &y[sy * g.src_pitch_luma..][..g.src_width];
                let u_row = &u[cy * g.src_pitch_chroma..][..chroma_width];
                let v_row = &v[cy * g.src_pitch_chroma..][..chroma_width];

                for (pixel, &sx) in out.chunks_exact_mut(bpp).zip(&self.columns) {
                    self.put(pixel, y_row[sx], u_row[sx / 2], v_row[sx / 2]);
                }
            });

        Ok(())
    }

    /// Convert a packed Y0 U Y1 V plane.
    pub fn convert_packed(&self, dst: &mut [u8], src: &[u8]) -> Result<(), ConvertError> {
        let g = self.configured()?;
        let row_bytes = g.src_width.next_multiple_of(2) * 2;
        if g.src_pitch_luma < row_bytes {
            return Err(ConvertError::InvalidGeometry("packed pitch below width"));
        }

        check_len("packed", src.len(), (g.src_height - 1) * g.src_pitch_luma + row_bytes)?;
        self.check_destination(g, dst)?;

        let bpp = self.format.bytes_per_pixel();

        dst.par_chunks_mut(g.dst_pitch)
            .take(g.dst_height)
            .enumerate()
            .for_each(|(dy, out)| {
                let sy = g.source_row(dy);
                let row = &src[sy * g.src_pitch_luma..][..row_bytes];

                for (pixel, &sx) in out.chunks_exact_mut(bpp).zip(&self.columns) {
                    let pair = (sx / 2) * 4;
                    self.put(pixel, row[sx * 2], row[pair + 1], row[pair + 3]);
                }
            });

        Ok(())
    }

    /// Convert one sample, returned the way [`DestFormat::pack`] stores it.
    #[must_use]
    pub fn convert_single_pixel(&self, y: u8, u: u8, v: u8) -> u32 {
        match self.format {
            DestFormat::Gray8 => u32::from(self.coefficients.gray(y)),
            format => format.pack(self.coefficients.rgb(y, u, v)),
        }
    }
}

fn check_len(plane: &'static str, actual: usize, required: usize) -> Result<(), ConvertError> {
    if actual < required {
        Err(ConvertError::BufferTooSmall {
            plane,
            required,
            actual,
        })
    } else {
        Ok(())
    }
}
