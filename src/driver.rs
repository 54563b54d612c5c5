// SPDX-License-Identifier: MPL-2.0

//! The video output driver.
//!
//! [`VideoOutput`] owns a presentation sink and everything needed to get a
//! decoded frame onto it: the frame store, the scaling state, the color
//! matrix choice and, for RGB sinks, the software converter.

use std::ops::BitOr;
use std::sync::Arc;

use vidout_config::{AspectRatio, MatrixPolicy, OutputConfig, PictureLevels, RangePolicy};

use crate::color_matrix::{ColorMatrix, ColorMatrixState};
use crate::convert::{Coefficients, ConvertError, Converter, DestFormat, Geometry, emulate_full_range};
use crate::frame::{Frame, FrameFlags, PixelFormat};
use crate::frame_store::{FormatChange, FrameStore, RecentFrames, SharedFrame, lock_frame};
use crate::scale::{FrameOutput, ScaleContext};
use crate::sink::{PresentationSink, Presented, SinkError, SinkInput};

/// Features a video output offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const YV12: Self = Self(1 << 0);
    pub const YUY2: Self = Self(1 << 1);
    pub const BRIGHTNESS: Self = Self(1 << 2);
    pub const CONTRAST: Self = Self(1 << 3);
    pub const SATURATION: Self = Self(1 << 4);
    pub const HUE: Self = Self(1 << 5);
    pub const ZOOM_X: Self = Self(1 << 6);
    pub const ZOOM_Y: Self = Self(1 << 7);
    pub const CROP: Self = Self(1 << 8);
    pub const COLOR_MATRIX: Self = Self(1 << 9);
    pub const FULLRANGE: Self = Self(1 << 10);

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Values readable through [`VideoOutput::get_property`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    AspectRatio,
    Brightness,
    Contrast,
    Saturation,
    Hue,
    ZoomX,
    ZoomY,
    WindowWidth,
    WindowHeight,
    OutputWidth,
    OutputHeight,
    OutputXOffset,
    OutputYOffset,
    ColorMatrix,
    ColorRange,
}

/// Why a frame was not shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The frame has no usable buffers.
    NotReady,
    /// Cropping leaves nothing of the frame.
    EmptyCrop,
    /// Nothing to redraw yet.
    NothingShown,
    Convert(ConvertError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayOutcome {
    Presented,
    /// The frame was dropped; whatever was shown before stays visible.
    Skipped(SkipReason),
}

/// A video output bound to one presentation sink.
pub struct VideoOutput<S: PresentationSink> {
    sink: S,
    store: Arc<FrameStore>,
    frame_output: Box<dyn FrameOutput>,
    scale: ScaleContext,
    color: ColorMatrixState,
    levels: PictureLevels,
    converter: Option<Converter>,
    csc_dirty: bool,
    rgb: Vec<u8>,
    recent: RecentFrames,
}

impl<S: PresentationSink> VideoOutput<S> {
    pub fn new(sink: S, frame_output: Box<dyn FrameOutput>, config: &OutputConfig) -> Self {
        let converter = match sink.input() {
            SinkInput::Rgb(format) => Some(Converter::new(format)),
            SinkInput::Yuv => None,
        };

        let mut scale = ScaleContext::new(sink.supports_zoom());
        scale.apply_config(config);

        tracing::info!(sink = sink.name(), input = ?sink.input(), "video output opened");

        Self {
            sink,
            store: Arc::new(FrameStore::default()),
            frame_output,
            scale,
            color: ColorMatrixState::new(config.color_matrix, config.color_range),
            levels: config.levels.clamped(),
            converter,
            csc_dirty: true,
            rgb: Vec::new(),
            recent: RecentFrames::default(),
        }
    }

    /// Use a store shared with other outputs or prepared by the caller.
    #[must_use]
    pub fn with_store(mut self, store: Arc<FrameStore>) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::YV12
            | Capabilities::YUY2
            | Capabilities::BRIGHTNESS
            | Capabilities::CONTRAST
            | Capabilities::SATURATION
            | Capabilities::HUE
            | Capabilities::CROP
            | Capabilities::COLOR_MATRIX
            | Capabilities::FULLRANGE;
        if self.scale.support_zoom() {
            caps = caps | Capabilities::ZOOM_X | Capabilities::ZOOM_Y;
        }
        caps
    }

    /// The store frames come from, for handing to a decoder thread.
    #[must_use]
    pub fn store(&self) -> &Arc<FrameStore> {
        &self.store
    }

    pub fn alloc_frame(&self) -> SharedFrame {
        self.store.alloc_frame()
    }

    /// Prepare a frame for a picture of the given layout.
    pub fn update_frame_format(
        &self,
        frame: &SharedFrame,
        width: u32,
        height: u32,
        ratio: f64,
        format: PixelFormat,
        flags: FrameFlags,
    ) -> FormatChange {
        let change = self.store.update_format(frame, width, height, format, flags);
        lock_frame(frame).set_ratio(ratio);
        change
    }

    /// Show a frame.
    ///
    /// Frames that cannot be shown are dropped with a [`SkipReason`]; only
    /// failures of the sink itself are errors. Either way the output takes
    /// the frame and releases it when done.
    pub fn display_frame(&mut self, frame: SharedFrame) -> Result<DisplayOutcome, SinkError> {
        let outcome = {
            let guard = lock_frame(&frame);
            self.render(&guard)
        };

        if matches!(outcome, Ok(DisplayOutcome::Presented)) {
            let repeated = self
                .recent
                .newest()
                .is_some_and(|newest| Arc::ptr_eq(newest, &frame));
            if repeated {
                return outcome;
            }
            if let Some(evicted) = self.recent.push(frame) {
                self.store.release(evicted);
            }
        } else {
            self.store.release(frame);
        }

        outcome
    }

    /// Poll the host for viewport changes.
    ///
    /// When this returns true the caller should [`redraw`](Self::redraw).
    pub fn redraw_needed(&mut self) -> bool {
        self.update_geometry()
    }

    /// Show the last presented frame again with the current geometry.
    pub fn redraw(&mut self) -> Result<DisplayOutcome, SinkError> {
        let Some(frame) = self.recent.newest().cloned() else {
            return Ok(DisplayOutcome::Skipped(SkipReason::NothingShown));
        };
        let guard = lock_frame(&frame);
        self.render(&guard)
    }

    fn update_geometry(&mut self) -> bool {
        // the host callback is handed the current video pixel aspect
        self.scale.compute_ideal_size();
        if !self.scale.redraw_needed(&mut *self.frame_output) {
            return false;
        }

        // recompute against the pixel aspect the host just reported
        self.scale.compute_ideal_size();
        self.scale.compute_output_size();
        if self.converter.is_some() {
            self.scale.enforce_converter_minimums();
        }
        true
    }

    fn active_matrix(&self) -> ColorMatrix {
        self.color.active().unwrap_or(ColorMatrix::SDTV)
    }

    fn sync_csc(&mut self) {
        if !self.csc_dirty {
            return;
        }
        let matrix = self.active_matrix();
        if let Some(converter) = &mut self.converter {
            converter.set_csc_levels(&self.levels, matrix);
        }
        self.csc_dirty = false;
    }

    fn render(&mut self, frame: &Frame) -> Result<DisplayOutcome, SinkError> {
        if !frame.is_ready() {
            tracing::debug!(id = frame.id(), "frame has no buffers, dropping");
            return Ok(DisplayOutcome::Skipped(SkipReason::NotReady));
        }

        let crop = frame.crop().aligned(frame.format());
        let (cropped_w, cropped_h) = frame.cropped_size();
        if cropped_w == 0 || cropped_h == 0 {
            tracing::debug!(id = frame.id(), ?crop, "frame cropped away, dropping");
            return Ok(DisplayOutcome::Skipped(SkipReason::EmptyCrop));
        }

        let hint = frame.flags().color_hint();
        if self.color.update(hint, frame.width(), frame.height(), crop).is_some() {
            self.csc_dirty = true;
        }

        self.scale.set_crop(crop);
        self.scale.set_delivered(frame.width(), frame.height(), frame.ratio());
        self.update_geometry();
        self.sync_csc();

        match self.converter.as_mut() {
            Some(converter) => {
                let pitch = match convert_frame(converter, &mut self.rgb, frame, &self.scale) {
                    Ok(pitch) => pitch,
                    Err(why) => {
                        tracing::warn!(id = frame.id(), %why, "conversion failed, dropping frame");
                        return Ok(DisplayOutcome::Skipped(SkipReason::Convert(why)));
                    }
                };

                self.sink.present(Presented::Rgb {
                    pixels: &self.rgb,
                    pitch,
                    format: converter.format(),
                    area: self.scale.output(),
                })?;
            }
            None => {
                let mut matrix = self.active_matrix();
                let mut levels = self.levels;
                if matrix.full_range() && !self.sink.native_full_range() {
                    levels = emulate_full_range(&levels);
                    matrix = ColorMatrix::new(matrix.standard(), false);
                }

                self.sink.present(Presented::Yuv {
                    frame,
                    field: frame.flags().field(),
                    source: self.scale.displayed(),
                    area: self.scale.output(),
                    matrix,
                    levels,
                })?;
            }
        }

        Ok(DisplayOutcome::Presented)
    }

    #[must_use]
    pub fn get_property(&self, property: Property) -> i32 {
        let output = self.scale.output();
        match property {
            Property::AspectRatio => self.scale.user_ratio().index(),
            Property::Brightness => self.levels.brightness,
            Property::Contrast => self.levels.contrast,
            Property::Saturation => self.levels.saturation,
            Property::Hue => self.levels.hue,
            Property::ZoomX => self.scale.zoom().0,
            Property::ZoomY => self.scale.zoom().1,
            Property::WindowWidth => self.scale.gui().width,
            Property::WindowHeight => self.scale.gui().height,
            Property::OutputWidth => output.w,
            Property::OutputHeight => output.h,
            Property::OutputXOffset => output.x,
            Property::OutputYOffset => output.y,
            Property::ColorMatrix => i32::from(self.color.matrix_policy().index()),
            Property::ColorRange => i32::from(self.color.range_policy().index()),
        }
    }

    /// Change a property and return the value now in effect.
    ///
    /// Out of range values are clamped or ignored, read only properties are
    /// left alone.
    pub fn set_property(&mut self, property: Property, value: i32) -> i32 {
        let clamp = |(min, max): (i32, i32)| value.clamp(min, max);

        match property {
            Property::AspectRatio => {
                self.scale.set_user_ratio(AspectRatio::from_index(value));
            }
            Property::Brightness => {
                let value = clamp(PictureLevels::BRIGHTNESS_RANGE);
                self.set_levels(self.levels.brightness(value));
            }
            Property::Contrast => {
                let value = clamp(PictureLevels::CONTRAST_RANGE);
                self.set_levels(self.levels.contrast(value));
            }
            Property::Saturation => {
                let value = clamp(PictureLevels::SATURATION_RANGE);
                self.set_levels(self.levels.saturation(value));
            }
            Property::Hue => {
                let value = clamp(PictureLevels::HUE_RANGE);
                self.set_levels(self.levels.hue(value));
            }
            Property::ZoomX if self.scale.support_zoom() => {
                if !self.scale.set_zoom_x(value) {
                    tracing::debug!(value, "ignoring invalid horizontal zoom");
                }
            }
            Property::ZoomY if self.scale.support_zoom() => {
                if !self.scale.set_zoom_y(value) {
                    tracing::debug!(value, "ignoring invalid vertical zoom");
                }
            }
            Property::ColorMatrix => {
                if let Some(policy) = u8::try_from(value).ok().and_then(MatrixPolicy::from_index) {
                    self.color.set_matrix_policy(policy);
                }
            }
            Property::ColorRange => {
                if let Some(policy) = u8::try_from(value).ok().and_then(RangePolicy::from_index) {
                    self.color.set_range_policy(policy);
                }
            }
            _ => tracing::debug!(?property, value, "property is read only"),
        }

        self.get_property(property)
    }

    /// Inclusive range a property accepts, `None` for read only ones.
    #[must_use]
    pub fn property_range(&self, property: Property) -> Option<(i32, i32)> {
        match property {
            Property::AspectRatio => Some((0, AspectRatio::COUNT as i32 - 1)),
            Property::Brightness => Some(PictureLevels::BRIGHTNESS_RANGE),
            Property::Contrast => Some(PictureLevels::CONTRAST_RANGE),
            Property::Saturation => Some(PictureLevels::SATURATION_RANGE),
            Property::Hue => Some(PictureLevels::HUE_RANGE),
            Property::ZoomX | Property::ZoomY if self.scale.support_zoom() => {
                Some((vidout_config::ZOOM_MIN, vidout_config::ZOOM_MAX))
            }
            Property::ColorMatrix => Some((0, MatrixPolicy::LABELS.len() as i32 - 1)),
            Property::ColorRange => Some((0, RangePolicy::LABELS.len() as i32 - 1)),
            _ => None,
        }
    }

    fn set_levels(&mut self, levels: PictureLevels) {
        if levels != self.levels {
            self.levels = levels;
            self.csc_dirty = true;
        }
    }

    /// Take over a new configuration; cached state is rebuilt on the next
    /// frame.
    pub fn apply_config(&mut self, config: &OutputConfig) {
        self.color.set_matrix_policy(config.color_matrix);
        self.color.set_range_policy(config.color_range);
        self.set_levels(config.levels.clamped());
        self.scale.apply_config(config);
    }

    /// Convert an overlay palette of YUV entries to the output's pixel
    /// format, or XRGB8888 when the sink takes YUV.
    pub fn palette_to_rgb(&mut self, palette: &[[u8; 3]]) -> Vec<u32> {
        self.sync_csc();
        match &self.converter {
            Some(converter) => palette
                .iter()
                .map(|&[y, u, v]| converter.convert_single_pixel(y, u, v))
                .collect(),
            None => {
                let coefficients = Coefficients::new(&self.levels, self.active_matrix());
                palette
                    .iter()
                    .map(|&[y, u, v]| DestFormat::Xrgb8888.pack(coefficients.rgb(y, u, v)))
                    .collect()
            }
        }
    }

    /// The matrix used for the last displayed frame.
    #[must_use]
    pub fn active_color_matrix(&self) -> Option<ColorMatrix> {
        self.color.active()
    }

    #[must_use]
    pub fn color_state(&self) -> &ColorMatrixState {
        &self.color
    }

    #[must_use]
    pub fn levels(&self) -> PictureLevels {
        self.levels
    }

    #[must_use]
    pub fn scale(&self) -> &ScaleContext {
        &self.scale
    }

    pub fn set_frame_output(&mut self, frame_output: Box<dyn FrameOutput>) {
        self.frame_output = frame_output;
        self.scale.force_redraw();
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Release every held frame and hand back the sink.
    pub fn close(mut self) -> S {
        for frame in self.recent.drain() {
            self.store.release(frame);
        }
        tracing::info!(sink = self.sink.name(), stats = ?self.store.stats(), "video output closed");
        self.sink
    }
}

fn tail(data: &[u8], offset: usize) -> &[u8] {
    data.get(offset..).unwrap_or_default()
}

/// Convert the displayed part of a frame, one field or both, into `rgb`.
///
/// Returns the pitch of the converted picture.
fn convert_frame(
    converter: &mut Converter,
    rgb: &mut Vec<u8>,
    frame: &Frame,
    scale: &ScaleContext,
) -> Result<usize, ConvertError> {
    let output = scale.output();
    let shown = scale.displayed();
    let (out_w, out_h) = (output.w as usize, output.h as usize);
    let pitch = out_w * converter.format().bytes_per_pixel();

    if rgb.len() != pitch * out_h {
        rgb.clear();
        rgb.resize(pitch * out_h, 0);
    }

    let field = frame.flags().field();
    let factor = field.stride_factor();
    let parity = field.parity();
    let src_rows = field.rows(shown.h as usize);
    let dst_rows = field.rows(out_h);
    if src_rows == 0 || dst_rows == 0 {
        return Ok(pitch);
    }

    // chroma is addressed in pairs of pixels, and of rows for 4:2:0
    let x = shown.x as usize & !1;
    let y = match frame.format() {
        PixelFormat::Planar420 if !frame.chroma_422() => shown.y as usize & !1,
        _ => shown.y as usize,
    };

    let pitches = frame.pitches();
    let geometry = Geometry::new(
        shown.w as usize,
        src_rows,
        pitches[0] * factor,
        pitches[1] * factor,
        out_w,
        dst_rows,
        pitch * factor,
    )
    .with_full_height_chroma(frame.chroma_422());

    if converter.geometry() != Some(&geometry) {
        converter.configure(geometry)?;
    }

    let planes = frame.planes();
    let dst = rgb.get_mut(parity * pitch..).unwrap_or_default();

    match (frame.format(), planes) {
        (PixelFormat::Planar420, [luma, u, v]) => {
            let chroma_y = if frame.chroma_422() { y } else { y / 2 };
            let chroma = (chroma_y + parity) * pitches[1] + x / 2;
            converter.convert_planar(
                dst,
                tail(luma.data(), (y + parity) * pitches[0] + x),
                tail(u.data(), chroma),
                tail(v.data(), chroma),
            )
        }
        (PixelFormat::Packed422, [packed]) => {
            converter.convert_packed(dst, tail(packed.data(), (y + parity) * pitches[0] + x * 2))
        }
        _ => Err(ConvertError::InvalidGeometry("plane count does not match format")),
    }?;

    Ok(pitch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::FixedViewport;
    use crate::sink::{MemorySink, NullSink};

    fn null_output() -> VideoOutput<NullSink> {
        VideoOutput::new(
            NullSink::new(),
            Box::new(FixedViewport::new(640, 480)),
            &OutputConfig::default(),
        )
    }

    struct NoZoom(MemorySink);

    impl PresentationSink for NoZoom {
        fn name(&self) -> &'static str {
            "no zoom"
        }

        fn input(&self) -> SinkInput {
            self.0.input()
        }

        fn supports_zoom(&self) -> bool {
            false
        }

        fn present(&mut self, picture: Presented<'_>) -> Result<(), SinkError> {
            self.0.present(picture)
        }
    }

    #[test]
    fn test_capabilities() {
        let output = null_output();
        let caps = output.capabilities();
        assert!(caps.contains(Capabilities::YV12 | Capabilities::YUY2));
        assert!(caps.contains(Capabilities::COLOR_MATRIX | Capabilities::FULLRANGE));
        assert!(caps.contains(Capabilities::ZOOM_X));

        let output = VideoOutput::new(
            NoZoom(MemorySink::new(8, 8, DestFormat::Rgb565)),
            Box::new(FixedViewport::new(8, 8)),
            &OutputConfig::default(),
        );
        assert!(!output.capabilities().contains(Capabilities::ZOOM_X));
        assert_eq!(output.property_range(Property::ZoomX), None);
    }

    #[test]
    fn test_level_properties_clamp() {
        let mut output = null_output();
        assert_eq!(output.get_property(Property::Contrast), 128);
        assert_eq!(output.set_property(Property::Brightness, 500), 127);
        assert_eq!(output.set_property(Property::Hue, -200), -180);
        assert_eq!(output.set_property(Property::Saturation, 64), 64);
        assert_eq!(output.levels().saturation, 64);
        assert_eq!(
            output.property_range(Property::Contrast),
            Some(PictureLevels::CONTRAST_RANGE)
        );
    }

    #[test]
    fn test_aspect_property() {
        let mut output = null_output();
        assert_eq!(output.set_property(Property::AspectRatio, 3), 3);
        assert_eq!(output.scale().user_ratio(), AspectRatio::Anamorphic);
        assert_eq!(output.set_property(Property::AspectRatio, 42), 0);
        assert_eq!(output.property_range(Property::AspectRatio), Some((0, 4)));
    }

    #[test]
    fn test_zoom_property() {
        let mut output = null_output();
        assert_eq!(output.set_property(Property::ZoomX, 150), 150);
        assert_eq!(output.set_property(Property::ZoomX, 1000), 150);
        assert_eq!(output.set_property(Property::ZoomY, -50), 100);
    }

    #[test]
    fn test_color_policy_properties() {
        let mut output = null_output();
        assert_eq!(output.get_property(Property::ColorMatrix), 1);
        assert_eq!(output.set_property(Property::ColorMatrix, 3), 3);
        assert_eq!(output.set_property(Property::ColorMatrix, 9), 3);
        assert_eq!(output.set_property(Property::ColorRange, 2), 2);
        assert_eq!(output.set_property(Property::ColorRange, -1), 2);
        assert_eq!(output.color_state().packed(), (3 << 2) | 2);
    }

    #[test]
    fn test_read_only_properties() {
        let mut output = null_output();
        assert_eq!(output.set_property(Property::WindowWidth, 99), 0);
        assert_eq!(output.property_range(Property::OutputWidth), None);

        assert!(output.redraw_needed());
        assert_eq!(output.get_property(Property::WindowWidth), 640);
    }

    #[test]
    fn test_unready_frame_is_skipped() {
        let mut output = null_output();
        let frame = output.alloc_frame();

        let outcome = output.display_frame(frame).unwrap();
        assert_eq!(outcome, DisplayOutcome::Skipped(SkipReason::NotReady));
        assert_eq!(output.sink().presented(), 0);
        assert_eq!(output.store().pooled(), 1);
    }

    #[test]
    fn test_cropped_away_frame_is_skipped() {
        let mut output = null_output();
        let frame = output.alloc_frame();
        output.update_frame_format(&frame, 64, 64, 1.0, PixelFormat::Planar420, FrameFlags::BOTH_FIELDS);
        lock_frame(&frame).set_crop(crate::frame::Crop::new(0, 32, 0, 32));

        let outcome = output.display_frame(frame).unwrap();
        assert_eq!(outcome, DisplayOutcome::Skipped(SkipReason::EmptyCrop));
    }

    #[test]
    fn test_huge_crop_margins_are_skipped() {
        let mut output = null_output();
        let frame = output.alloc_frame();
        output.update_frame_format(&frame, 64, 64, 1.0, PixelFormat::Planar420, FrameFlags::BOTH_FIELDS);
        lock_frame(&frame).set_crop(crate::frame::Crop::new(8, 0, u32::MAX, 0));

        let outcome = output.display_frame(frame).unwrap();
        assert_eq!(outcome, DisplayOutcome::Skipped(SkipReason::EmptyCrop));
    }

    #[test]
    fn test_palette_follows_levels() {
        let mut output = null_output();
        let black = output.palette_to_rgb(&[[16, 128, 128], [235, 128, 128]]);
        assert_eq!(black, vec![0, 0x00ff_ffff]);

        output.set_property(Property::Brightness, 127);
        let brighter = output.palette_to_rgb(&[[16, 128, 128]]);
        assert_ne!(brighter[0], 0);

        let mut rgb = VideoOutput::new(
            MemorySink::new(8, 8, DestFormat::Rgb565),
            Box::new(FixedViewport::new(8, 8)),
            &OutputConfig::default(),
        );
        assert_eq!(rgb.palette_to_rgb(&[[235, 128, 128]]), vec![0xffff]);
    }

    #[test]
    fn test_redraw_without_frames() {
        let mut output = null_output();
        assert_eq!(
            output.redraw().unwrap(),
            DisplayOutcome::Skipped(SkipReason::NothingShown)
        );
    }

    #[test]
    fn test_close_returns_frames() {
        let mut output = null_output();
        for _ in 0..3 {
            let frame = output.alloc_frame();
            output.update_frame_format(&frame, 32, 32, 1.0, PixelFormat::Packed422, FrameFlags::BOTH_FIELDS);
            assert_eq!(output.display_frame(frame).unwrap(), DisplayOutcome::Presented);
        }
        let store = output.store().clone();
        let sink = output.close();
        assert_eq!(sink.presented(), 3);
        assert_eq!(store.pooled(), 3);
    }

    #[test]
    fn test_repeated_frame_is_pooled_once() {
        let mut output = null_output();
        let [a, b, c] = [(); 3].map(|()| output.alloc_frame());
        for frame in [&a, &b, &c] {
            output.update_frame_format(frame, 32, 32, 1.0, PixelFormat::Packed422, FrameFlags::BOTH_FIELDS);
        }

        assert_eq!(output.display_frame(a.clone()).unwrap(), DisplayOutcome::Presented);
        assert_eq!(output.display_frame(a).unwrap(), DisplayOutcome::Presented);
        assert_eq!(output.display_frame(b).unwrap(), DisplayOutcome::Presented);
        assert_eq!(output.display_frame(c).unwrap(), DisplayOutcome::Presented);
        assert_eq!(output.store().pooled(), 1);

        let first = output.alloc_frame();
        let second = output.alloc_frame();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
