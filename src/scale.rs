// SPDX-License-Identifier: MPL-2.0

//! Aspect ratio, zoom and crop geometry.
//!
//! Works out which part of a frame is shown ("displayed" area, in source
//! pixels) and where it lands in the host's viewport ("output" area, in
//! screen pixels). No pixel data is touched here.

use std::sync::{Arc, Mutex, PoisonError};

use vidout_config::{AspectRatio, OutputConfig, zoom_is_valid};

use crate::frame::Crop;

/// Smallest output width the software converters handle.
pub const MIN_OUTPUT_WIDTH: i32 = 8;

/// Pixel aspects this close to the viewport's are snapped to it.
const PIXEL_ASPECT_SNAP: f64 = 0.01;

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Picture size without the crop margins, at least 1x1.
fn cropped(width: i32, height: i32, crop: Crop) -> (i32, i32) {
    (
        width.saturating_sub(to_i32(crop.horizontal())).max(1),
        height.saturating_sub(to_i32(crop.vertical())).max(1),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    #[must_use]
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

/// Drawable area reported by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuiGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Aspect of one screen pixel, 1.0 for square pixels.
    pub pixel_aspect: f64,
    pub win_x: i32,
    pub win_y: i32,
}

impl GuiGeometry {
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            pixel_aspect: 1.0,
            win_x: 0,
            win_y: 0,
        }
    }
}

impl Default for GuiGeometry {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Host side negotiation of the drawable area.
///
/// Called with the cropped video size and its pixel aspect; the returned
/// geometry is taken as is.
pub trait FrameOutput: Send {
    fn frame_output(
        &mut self,
        video_width: i32,
        video_height: i32,
        video_pixel_aspect: f64,
    ) -> GuiGeometry;
}

/// A viewport whose size is set by whoever owns the window.
///
/// Clones share the same geometry, so a window thread can keep one to
/// report resizes while the display side holds another.
#[derive(Debug, Clone)]
pub struct FixedViewport(Arc<Mutex<GuiGeometry>>);

impl FixedViewport {
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        Self::with_geometry(GuiGeometry::new(width, height))
    }

    #[must_use]
    pub fn with_geometry(geometry: GuiGeometry) -> Self {
        Self(Arc::new(Mutex::new(geometry)))
    }

    pub fn resize(&self, width: i32, height: i32) {
        let mut geometry = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        geometry.width = width;
        geometry.height = height;
    }

    pub fn set_geometry(&self, geometry: GuiGeometry) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = geometry;
    }

    #[must_use]
    pub fn geometry(&self) -> GuiGeometry {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameOutput for FixedViewport {
    fn frame_output(&mut self, _: i32, _: i32, _: f64) -> GuiGeometry {
        self.geometry()
    }
}

/// Scaling state of one video output.
#[derive(Debug, Clone)]
pub struct ScaleContext {
    support_zoom: bool,
    scaling_disabled: bool,

    delivered_width: i32,
    delivered_height: i32,
    delivered_ratio: f64,
    crop: Crop,

    user_ratio: AspectRatio,
    zoom_x: i32,
    zoom_y: i32,
    horizontal_position: f64,
    vertical_position: f64,

    gui: GuiGeometry,
    force_redraw: bool,

    video_pixel_aspect: f64,
    displayed: Rect,
    output: Rect,
    borders: [Rect; 4],
}

impl ScaleContext {
    #[must_use]
    pub fn new(support_zoom: bool) -> Self {
        Self {
            support_zoom,
            scaling_disabled: false,
            delivered_width: 0,
            delivered_height: 0,
            delivered_ratio: 0.0,
            crop: Crop::default(),
            user_ratio: AspectRatio::Auto,
            zoom_x: 100,
            zoom_y: 100,
            horizontal_position: 0.5,
            vertical_position: 0.5,
            gui: GuiGeometry::new(0, 0),
            force_redraw: true,
            video_pixel_aspect: 1.0,
            displayed: Rect::default(),
            output: Rect::default(),
            borders: [Rect::default(); 4],
        }
    }

    /// Take over the scaling related parts of a configuration.
    pub fn apply_config(&mut self, config: &OutputConfig) {
        self.set_user_ratio(config.aspect);
        self.set_zoom_x(config.zoom_x);
        self.set_zoom_y(config.zoom_y);

        let horizontal = f64::from(config.horizontal_position.min(100)) / 100.0;
        let vertical = f64::from(config.vertical_position.min(100)) / 100.0;
        if horizontal != self.horizontal_position || vertical != self.vertical_position {
            self.horizontal_position = horizontal;
            self.vertical_position = vertical;
            self.force_redraw = true;
        }

        if config.disable_scaling != self.scaling_disabled {
            self.scaling_disabled = config.disable_scaling;
            self.force_redraw = true;
        }
    }

    #[must_use]
    pub fn support_zoom(&self) -> bool {
        self.support_zoom
    }

    /// Record the size and ratio of the frame about to be shown.
    ///
    /// An unusable ratio is replaced by the cropped picture's own ratio.
    /// Returns whether anything changed.
    pub fn set_delivered(&mut self, width: u32, height: u32, ratio: f64) -> bool {
        let (width, height) = (to_i32(width), to_i32(height));
        let ratio = if crate::frame::ratio_is_sane(ratio) {
            ratio
        } else {
            let (cropped_w, cropped_h) = cropped(width, height, self.crop);
            f64::from(cropped_w) / f64::from(cropped_h)
        };

        if width == self.delivered_width
            && height == self.delivered_height
            && ratio == self.delivered_ratio
        {
            return false;
        }

        self.delivered_width = width;
        self.delivered_height = height;
        self.delivered_ratio = ratio;
        self.force_redraw = true;
        true
    }

    /// Set the already aligned crop of the frame about to be shown.
    pub fn set_crop(&mut self, crop: Crop) -> bool {
        if crop == self.crop {
            return false;
        }
        self.crop = crop;
        self.force_redraw = true;
        true
    }

    #[must_use]
    pub fn crop(&self) -> Crop {
        self.crop
    }

    #[must_use]
    pub fn user_ratio(&self) -> AspectRatio {
        self.user_ratio
    }

    pub fn set_user_ratio(&mut self, ratio: AspectRatio) -> bool {
        if ratio == self.user_ratio {
            return false;
        }
        tracing::debug!(ratio = ratio.name(), "aspect ratio changed");
        self.user_ratio = ratio;
        self.force_redraw = true;
        true
    }

    /// Zoom in percent, `(x, y)`.
    #[must_use]
    pub fn zoom(&self) -> (i32, i32) {
        (self.zoom_x, self.zoom_y)
    }

    /// Returns false, leaving the zoom alone, for out of range values.
    pub fn set_zoom_x(&mut self, percent: i32) -> bool {
        if !zoom_is_valid(percent) {
            return false;
        }
        if percent != self.zoom_x {
            self.zoom_x = percent;
            self.force_redraw = true;
        }
        true
    }

    pub fn set_zoom_y(&mut self, percent: i32) -> bool {
        if !zoom_is_valid(percent) {
            return false;
        }
        if percent != self.zoom_y {
            self.zoom_y = percent;
            self.force_redraw = true;
        }
        true
    }

    fn zoom_factors(&self) -> (f64, f64) {
        if self.support_zoom {
            (f64::from(self.zoom_x) / 100.0, f64::from(self.zoom_y) / 100.0)
        } else {
            (1.0, 1.0)
        }
    }

    #[must_use]
    pub fn scaling_disabled(&self) -> bool {
        self.scaling_disabled
    }

    /// Size of the delivered frame minus the crop margins, at least 1x1.
    #[must_use]
    pub fn cropped_size(&self) -> (i32, i32) {
        cropped(self.delivered_width, self.delivered_height, self.crop)
    }

    /// Derive the video pixel aspect from the requested display ratio.
    pub fn compute_ideal_size(&mut self) {
        let gui_pixel_aspect = self.gui_pixel_aspect();

        if self.scaling_disabled {
            self.video_pixel_aspect = gui_pixel_aspect;
            return;
        }

        let (cropped_w, cropped_h) = self.cropped_size();
        let image_ratio = f64::from(cropped_w) / f64::from(cropped_h);

        let desired_ratio = match self.user_ratio {
            AspectRatio::Auto if self.delivered_ratio > 0.0 => self.delivered_ratio,
            AspectRatio::Auto | AspectRatio::Square => image_ratio,
            AspectRatio::FourThree => 4.0 / 3.0,
            AspectRatio::Anamorphic => 16.0 / 9.0,
            AspectRatio::Dvb => 2.0,
        };

        self.video_pixel_aspect = desired_ratio / image_ratio * gui_pixel_aspect;

        if (self.video_pixel_aspect / gui_pixel_aspect - 1.0).abs() < PIXEL_ASPECT_SNAP {
            self.video_pixel_aspect = gui_pixel_aspect;
        }
    }

    /// Unzoomed display size of the cropped picture in screen pixels.
    ///
    /// The height is kept and the width stretched to the display ratio.
    #[must_use]
    pub fn ideal_size(&self) -> (f64, f64) {
        let (cropped_w, cropped_h) = self.cropped_size();
        let aspect = self.video_pixel_aspect / self.gui_pixel_aspect();
        (f64::from(cropped_w) * aspect, f64::from(cropped_h))
    }

    #[must_use]
    pub fn zoomed_ideal_size(&self) -> (f64, f64) {
        let (w, h) = self.ideal_size();
        let (zoom_x, zoom_y) = self.zoom_factors();
        (w * zoom_x, h * zoom_y)
    }

    fn gui_pixel_aspect(&self) -> f64 {
        if self.gui.pixel_aspect > 0.0 && self.gui.pixel_aspect.is_finite() {
            self.gui.pixel_aspect
        } else {
            1.0
        }
    }

    /// Fit the ideal size into the viewport.
    pub fn compute_output_size(&mut self) {
        let (cropped_w, cropped_h) = self.cropped_size();
        let gui_w = self.gui.width.max(1);
        let gui_h = self.gui.height.max(1);
        let (cw, ch) = (f64::from(cropped_w), f64::from(cropped_h));
        let (gw, gh) = (f64::from(gui_w), f64::from(gui_h));

        let aspect = self.video_pixel_aspect / self.gui_pixel_aspect();
        let x_factor = gw / (cw * aspect);
        let y_factor = gh * aspect / ch;
        let width_bound = gw - cw * y_factor < gh - ch * x_factor;

        let (mut out_w, mut out_h, mut disp_w, mut disp_h);

        if self.scaling_disabled {
            out_w = cropped_w;
            out_h = cropped_h;
            disp_w = cropped_w;
            disp_h = cropped_h;
        } else if self.support_zoom {
            let (zoom_x, zoom_y) = self.zoom_factors();
            if width_bound {
                out_w = gui_w;
                disp_w = (cw / zoom_x + 0.5) as i32;
                out_h = (ch * x_factor + 0.5) as i32;
                if f64::from(out_h) * zoom_y <= gh {
                    disp_h = cropped_h;
                    out_h = (f64::from(out_h) * zoom_y + 0.5) as i32;
                } else {
                    disp_h = (ch * gh / f64::from(out_h) / zoom_y + 0.5) as i32;
                    out_h = gui_h;
                }
            } else {
                out_h = gui_h;
                disp_h = (ch / zoom_y + 0.5) as i32;
                out_w = (cw * y_factor + 0.5) as i32;
                if f64::from(out_w) * zoom_x <= gw {
                    disp_w = cropped_w;
                    out_w = (f64::from(out_w) * zoom_x + 0.5) as i32;
                } else {
                    disp_w = (cw * gw / f64::from(out_w) / zoom_x + 0.5) as i32;
                    out_w = gui_w;
                }
            }
        } else {
            if width_bound {
                out_w = gui_w;
                out_h = (ch * x_factor + 0.5) as i32;
            } else {
                out_w = (cw * y_factor + 0.5) as i32;
                out_h = gui_h;
            }
            disp_w = cropped_w;
            disp_h = cropped_h;
        }

        // zooming out asks for more than the cropped picture holds
        if disp_w > cropped_w {
            out_w = (f64::from(out_w) * cw / f64::from(disp_w) + 0.5) as i32;
            disp_w = cropped_w;
        }
        if disp_h > cropped_h {
            out_h = (f64::from(out_h) * ch / f64::from(disp_h) + 0.5) as i32;
            disp_h = cropped_h;
        }

        // unscaled pictures larger than the viewport are shown 1:1, centered
        if out_w > gui_w {
            disp_w = (i64::from(disp_w) * i64::from(gui_w) / i64::from(out_w)) as i32;
            out_w = gui_w;
        }
        if out_h > gui_h {
            disp_h = (i64::from(disp_h) * i64::from(gui_h) / i64::from(out_h)) as i32;
            out_h = gui_h;
        }

        self.output.w = out_w.max(1);
        self.output.h = out_h.max(1);
        self.displayed.w = disp_w.max(1);
        self.displayed.h = disp_h.max(1);
        self.place();

        tracing::debug!(
            delivered_width = self.delivered_width,
            delivered_height = self.delivered_height,
            displayed_width = self.displayed.w,
            displayed_height = self.displayed.h,
            output_width = self.output.w,
            output_height = self.output.h,
            "output size computed"
        );
    }

    /// Grow the output to what the software converters can produce.
    ///
    /// The output may then exceed the viewport; sinks clip.
    pub fn enforce_converter_minimums(&mut self) {
        let min_height = (self.delivered_height + 15) >> 4;
        let mut changed = false;

        if self.output.h < min_height {
            self.output.h = min_height;
            changed = true;
        }
        if self.output.w < MIN_OUTPUT_WIDTH {
            self.output.w = MIN_OUTPUT_WIDTH;
            changed = true;
        }
        if self.output.w % 2 != 0 {
            self.output.w += 1;
            changed = true;
        }

        if changed {
            tracing::debug!(
                output_width = self.output.w,
                output_height = self.output.h,
                "output size raised to converter minimums"
            );
            self.place();
        }
    }

    fn place(&mut self) {
        let (cropped_w, cropped_h) = self.cropped_size();
        let gui_w = self.gui.width.max(0);
        let gui_h = self.gui.height.max(0);

        let free_w = (gui_w - self.output.w).max(0);
        let free_h = (gui_h - self.output.h).max(0);
        self.output.x = (f64::from(free_w) * self.horizontal_position) as i32 + self.gui.x;
        self.output.y = (f64::from(free_h) * self.vertical_position) as i32 + self.gui.y;

        self.displayed.x = ((cropped_w - self.displayed.w) / 2).saturating_add(to_i32(self.crop.left));
        self.displayed.y = ((cropped_h - self.displayed.h) / 2).saturating_add(to_i32(self.crop.top));

        // borders are relative to the viewport origin
        let x = self.output.x - self.gui.x;
        let y = self.output.y - self.gui.y;

        self.borders = [Rect::default(); 4];
        if self.output.h < gui_h {
            self.borders[0] = Rect::new(0, 0, gui_w, y);
            let bottom = y + self.output.h;
            self.borders[1] = Rect::new(0, bottom, gui_w, gui_h - bottom);
        }
        if self.output.w < gui_w {
            self.borders[2] = Rect::new(0, 0, x, gui_h);
            let right = x + self.output.w;
            self.borders[3] = Rect::new(right, 0, gui_w - right, gui_h);
        }
    }

    /// Ask the host for the current viewport.
    ///
    /// Returns true when the viewport changed or a redraw was forced by a
    /// geometry change; the forced flag is cleared either way.
    pub fn redraw_needed(&mut self, output: &mut dyn FrameOutput) -> bool {
        let (cropped_w, cropped_h) = self.cropped_size();
        let gui = output.frame_output(cropped_w, cropped_h, self.video_pixel_aspect);

        let changed = gui != self.gui;
        if changed {
            tracing::debug!(
                width = gui.width,
                height = gui.height,
                pixel_aspect = gui.pixel_aspect,
                "viewport changed"
            );
            self.gui = gui;
        }

        let redraw = changed || self.force_redraw;
        self.force_redraw = false;
        redraw
    }

    /// Make the next [`redraw_needed`](Self::redraw_needed) return true.
    pub fn force_redraw(&mut self) {
        self.force_redraw = true;
    }

    /// Map a viewport position to a position in the delivered frame.
    #[must_use]
    pub fn translate_gui2video(&self, x: i32, y: i32) -> (i32, i32) {
        if self.output.w <= 0 || self.output.h <= 0 {
            return (x, y);
        }

        let x = i64::from(x - self.output.x);
        let y = i64::from(y - self.output.y);
        (
            (x * i64::from(self.displayed.w) / i64::from(self.output.w)) as i32 + self.displayed.x,
            (y * i64::from(self.displayed.h) / i64::from(self.output.h)) as i32 + self.displayed.y,
        )
    }

    #[must_use]
    pub fn gui(&self) -> &GuiGeometry {
        &self.gui
    }

    #[must_use]
    pub fn video_pixel_aspect(&self) -> f64 {
        self.video_pixel_aspect
    }

    /// Area of the viewport the picture covers, absolute coordinates.
    #[must_use]
    pub fn output(&self) -> Rect {
        self.output
    }

    /// Part of the delivered frame that is shown, in source pixels.
    #[must_use]
    pub fn displayed(&self) -> Rect {
        self.displayed
    }

    /// Top, bottom, left and right areas of the viewport left uncovered.
    #[must_use]
    pub fn borders(&self) -> [Rect; 4] {
        self.borders
    }

    #[must_use]
    pub fn delivered_ratio(&self) -> f64 {
        self.delivered_ratio
    }
}
