// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use eyre::WrapErr;
use vidout::config::OutputConfig;
use vidout::pattern::fill_color_bars;
use vidout::{DestFormat, DisplayOutcome, FixedViewport, FrameFlags, MemorySink, PixelFormat, VideoOutput, lock_frame};

const WIDTH: usize = 800;
const HEIGHT: usize = 450;
const FRAMES: usize = 8;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let target = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("vidout.png"), PathBuf::from);

    let config = OutputConfig::load_or_default();
    let viewport = FixedViewport::new(WIDTH as i32, HEIGHT as i32);
    let sink = MemorySink::new(WIDTH, HEIGHT, DestFormat::Xrgb8888);
    let mut output = VideoOutput::new(sink, Box::new(viewport), &config);

    for shift in 0..FRAMES {
        let frame = output.alloc_frame();
        output.update_frame_format(
            &frame,
            720,
            480,
            16.0 / 9.0,
            PixelFormat::Planar420,
            FrameFlags::BOTH_FIELDS,
        );
        fill_color_bars(&mut lock_frame(&frame), shift);

        match output.display_frame(frame).wrap_err("presenting frame")? {
            DisplayOutcome::Presented => {}
            DisplayOutcome::Skipped(reason) => tracing::warn!(shift, ?reason, "frame skipped"),
        }
    }

    tracing::info!(
        output = ?output.scale().output(),
        matrix = ?output.active_color_matrix(),
        "last frame shown"
    );

    let sink = output.close();
    sink.to_image()
        .save(&target)
        .wrap_err_with(|| format!("failed to write {}", target.display()))?;

    tracing::info!(path = %target.display(), "picture saved");
    Ok(())
}
