// SPDX-License-Identifier: MPL-2.0

//! Presentation sinks: where finished pictures go.
//!
//! A sink either takes RGB produced by the software converter or the YUV
//! frame itself together with the color parameters to apply.

use image::RgbImage;
use vidout_config::PictureLevels;

use crate::color_matrix::ColorMatrix;
use crate::convert::DestFormat;
use crate::frame::{Field, Frame};
use crate::scale::Rect;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("{sink} sink cannot present {got} input")]
    UnexpectedInput {
        sink: &'static str,
        got: &'static str,
    },
    #[error("picture buffer too small: {actual} bytes, {required} required")]
    ShortBuffer { required: usize, actual: usize },
}

/// Input a sink wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkInput {
    /// Converted pixels in the given format.
    Rgb(DestFormat),
    /// The frame as decoded.
    Yuv,
}

/// A picture handed to [`PresentationSink::present`].
#[derive(Debug)]
pub enum Presented<'a> {
    Rgb {
        /// `area.h` rows of `area.w` pixels.
        pixels: &'a [u8],
        pitch: usize,
        format: DestFormat,
        /// Where the pixels go, in viewport coordinates.
        area: Rect,
    },
    Yuv {
        frame: &'a Frame,
        field: Field,
        /// Part of the frame to show.
        source: Rect,
        area: Rect,
        matrix: ColorMatrix,
        levels: PictureLevels,
    },
}

impl Presented<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Presented::Rgb { .. } => "rgb",
            Presented::Yuv { .. } => "yuv",
        }
    }
}

pub trait PresentationSink {
    fn name(&self) -> &'static str;

    fn input(&self) -> SinkInput;

    /// Whether the sink can show a sub-rectangle of the frame enlarged.
    fn supports_zoom(&self) -> bool {
        true
    }

    /// Whether full range YUV is expanded correctly without help.
    fn native_full_range(&self) -> bool {
        true
    }

    fn present(&mut self, picture: Presented<'_>) -> Result<(), SinkError>;
}

/// What a [`NullSink`] saw last.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentRecord {
    pub frame_id: u64,
    pub field: Field,
    pub source: Rect,
    pub area: Rect,
    pub matrix: ColorMatrix,
    pub levels: PictureLevels,
}

/// Accepts YUV frames and only records what it was asked to show.
#[derive(Debug, Default)]
pub struct NullSink {
    studio_range_only: bool,
    presented: u64,
    last: Option<PresentRecord>,
}

impl NullSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that needs full range content emulated through levels.
    #[must_use]
    pub fn studio_range_only() -> Self {
        Self {
            studio_range_only: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn presented(&self) -> u64 {
        self.presented
    }

    #[must_use]
    pub fn last(&self) -> Option<&PresentRecord> {
        self.last.as_ref()
    }
}

impl PresentationSink for NullSink {
    fn name(&self) -> &'static str {
        "null"
    }

    fn input(&self) -> SinkInput {
        SinkInput::Yuv
    }

    fn native_full_range(&self) -> bool {
        !self.studio_range_only
    }

    fn present(&mut self, picture: Presented<'_>) -> Result<(), SinkError> {
        let got = picture.kind();
        let Presented::Yuv {
            frame,
            field,
            source,
            area,
            matrix,
            levels,
        } = picture
        else {
            return Err(SinkError::UnexpectedInput {
                sink: self.name(),
                got,
            });
        };

        tracing::trace!(id = frame.id(), ?area, "null sink present");
        self.presented += 1;
        self.last = Some(PresentRecord {
            frame_id: frame.id(),
            field,
            source,
            area,
            matrix,
            levels,
        });
        Ok(())
    }
}

/// An RGB surface in memory, cleared whenever the picture moves.
#[derive(Debug)]
pub struct MemorySink {
    width: usize,
    height: usize,
    format: DestFormat,
    data: Vec<u8>,
    last_area: Option<Rect>,
    presented: u64,
}

impl MemorySink {
    #[must_use]
    pub fn new(width: usize, height: usize, format: DestFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; width * height * format.bytes_per_pixel()],
            last_area: None,
            presented: 0,
        }
    }

    /// Change the surface size; the contents are lost.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data = vec![0; width * height * self.format.bytes_per_pixel()];
        self.last_area = None;
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.width * self.format.bytes_per_pixel()
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Color at a surface position, black outside of it.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0; 3];
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = y * self.stride() + x * bpp;
        self.format.read(&self.data[offset..offset + bpp])
    }

    /// Copy of the surface as an 8 bit RGB image.
    #[must_use]
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Rgb(self.pixel(x as usize, y as usize))
        })
    }
}

impl PresentationSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn input(&self) -> SinkInput {
        SinkInput::Rgb(self.format)
    }

    fn present(&mut self, picture: Presented<'_>) -> Result<(), SinkError> {
        let got = picture.kind();
        let Presented::Rgb {
            pixels,
            pitch,
            format,
            area,
        } = picture
        else {
            return Err(SinkError::UnexpectedInput {
                sink: self.name(),
                got,
            });
        };

        if format != self.format {
            return Err(SinkError::UnexpectedInput {
                sink: self.name(),
                got: "foreign rgb",
            });
        }

        if area.is_empty() {
            self.presented += 1;
            return Ok(());
        }

        let bpp = self.format.bytes_per_pixel();
        let required = area.h as usize * pitch;
        if pixels.len() < required || pitch < area.w as usize * bpp {
            return Err(SinkError::ShortBuffer {
                required,
                actual: pixels.len(),
            });
        }

        if self.last_area != Some(area) {
            tracing::debug!(?area, "picture moved, clearing surface");
            self.data.fill(0);
            self.last_area = Some(area);
        }

        let stride = self.stride();
        let x0 = area.x.clamp(0, self.width as i32);
        let x1 = (area.x + area.w).clamp(0, self.width as i32);
        if x0 < x1 {
            let skip = (x0 - area.x) as usize * bpp;
            let len = (x1 - x0) as usize * bpp;

            for (row, line) in pixels.chunks(pitch).take(area.h as usize).enumerate() {
                let y = area.y + row as i32;
                if y < 0 || y >= self.height as i32 {
                    continue;
                }
                let start = y as usize * stride + x0 as usize * bpp;
                self.data[start..start + len].copy_from_slice(&line[skip..skip + len]);
            }
        }

        self.presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(pixels: &[u8], pitch: usize, area: Rect) -> Presented<'_> {
        Presented::Rgb {
            pixels,
            pitch,
            format: DestFormat::Rgb24,
            area,
        }
    }

    #[test]
    fn test_memory_sink_places_picture() {
        let mut sink = MemorySink::new(4, 3, DestFormat::Rgb24);
        let pixels = [9u8; 2 * 2 * 3];
        sink.present(rgb(&pixels, 6, Rect::new(1, 1, 2, 2))).unwrap();

        assert_eq!(sink.pixel(0, 0), [0, 0, 0]);
        assert_eq!(sink.pixel(1, 1), [9, 9, 9]);
        assert_eq!(sink.pixel(2, 2), [9, 9, 9]);
        assert_eq!(sink.pixel(3, 2), [0, 0, 0]);
        assert_eq!(sink.presented(), 1);
    }

    #[test]
    fn test_memory_sink_clips() {
        let mut sink = MemorySink::new(2, 2, DestFormat::Rgb24);
        let pixels: Vec<u8> = (0..3 * 3 * 3).collect();
        sink.present(rgb(&pixels, 9, Rect::new(-1, -1, 3, 3))).unwrap();

        // source pixel (1, 1) lands on (0, 0)
        assert_eq!(sink.pixel(0, 0), [12, 13, 14]);
        assert_eq!(sink.pixel(1, 1), [24, 25, 26]);
    }

    #[test]
    fn test_memory_sink_clears_on_move() {
        let mut sink = MemorySink::new(4, 1, DestFormat::Rgb24);
        sink.present(rgb(&[5; 6], 6, Rect::new(0, 0, 2, 1))).unwrap();
        sink.present(rgb(&[7; 6], 6, Rect::new(2, 0, 2, 1))).unwrap();

        assert_eq!(sink.pixel(0, 0), [0, 0, 0]);
        assert_eq!(sink.pixel(3, 0), [7, 7, 7]);
    }

    #[test]
    fn test_memory_sink_rejects_bad_input() {
        let mut sink = MemorySink::new(4, 4, DestFormat::Xrgb8888);
        assert!(matches!(
            sink.present(rgb(&[0; 48], 12, Rect::new(0, 0, 4, 4))),
            Err(SinkError::UnexpectedInput { .. })
        ));

        let mut sink = MemorySink::new(4, 4, DestFormat::Rgb24);
        assert!(matches!(
            sink.present(rgb(&[0; 40], 12, Rect::new(0, 0, 4, 4))),
            Err(SinkError::ShortBuffer { required: 48, actual: 40 })
        ));
    }

    #[test]
    fn test_to_image() {
        let mut sink = MemorySink::new(2, 1, DestFormat::Xrgb8888);
        sink.present(Presented::Rgb {
            pixels: &[1, 2, 3, 0, 4, 5, 6, 0],
            pitch: 8,
            format: DestFormat::Xrgb8888,
            area: Rect::new(0, 0, 2, 1),
        })
        .unwrap();

        let image = sink.to_image();
        assert_eq!(image.get_pixel(0, 0).0, [3, 2, 1]);
        assert_eq!(image.get_pixel(1, 0).0, [6, 5, 4]);
    }

    #[test]
    fn test_null_sink_wants_yuv() {
        let mut sink = NullSink::new();
        assert_eq!(sink.input(), SinkInput::Yuv);
        assert!(sink.native_full_range());
        assert!(!NullSink::studio_range_only().native_full_range());

        let err = sink.present(rgb(&[0; 3], 3, Rect::new(0, 0, 1, 1)));
        assert!(matches!(err, Err(SinkError::UnexpectedInput { got: "rgb", .. })));
        assert_eq!(sink.presented(), 0);
    }
}
