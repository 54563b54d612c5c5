// SPDX-License-Identifier: MPL-2.0

//! Software video output.
//!
//! Decoded YUV frames are taken from a [`FrameStore`], scaled and cropped
//! according to a [`ScaleContext`], converted with the color matrix picked
//! by [`ColorMatrixState`] and handed to a [`PresentationSink`].
//! [`VideoOutput`] drives the whole chain.

pub mod color_matrix;
pub mod convert;
pub mod driver;
pub mod frame;
pub mod frame_store;
pub mod pattern;
pub mod scale;
pub mod sink;


pub use color_matrix::{ColorMatrix, ColorMatrixState};
pub use convert::{ConvertError, Converter, DestFormat, Geometry};
pub use driver::{Capabilities, DisplayOutcome, Property, SkipReason, VideoOutput};
pub use frame::{Crop, Field, Frame, FrameFlags, PixelFormat};
pub use frame_store::{FormatChange, FrameStore, RecentFrames, SharedFrame, lock_frame};
pub use scale::{FixedViewport, FrameOutput, GuiGeometry, Rect, ScaleContext};
pub use sink::{MemorySink, NullSink, PresentationSink, Presented, SinkError, SinkInput};
pub use vidout_config as config;
