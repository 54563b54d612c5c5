// SPDX-License-Identifier: MPL-2.0

//! Synthetic color bar pictures for demos and tests.

use crate::frame::{Frame, PixelFormat};

/// 75% white, yellow, cyan, green, magenta, red, blue and black.
pub const BARS: [[u8; 3]; 8] = [
    [191, 191, 191],
    [191, 191, 0],
    [0, 191, 191],
    [0, 191, 0],
    [191, 0, 191],
    [191, 0, 0],
    [0, 0, 191],
    [0, 0, 0],
];

/// BT.601 studio range encoding of a full range RGB color.
#[must_use]
pub fn rgb_to_yuv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    [y, u, v].map(|c| c.clamp(0, 255) as u8)
}

/// Index of the bar covering column `x` of a `width` wide picture.
#[must_use]
pub fn bar_at(x: u32, width: u32, shift: usize) -> usize {
    let bar_width = (width / BARS.len() as u32).max(1);
    ((x / bar_width) as usize).wrapping_add(shift) % BARS.len()
}

/// Paint vertical color bars over the whole frame, rotated by `shift` bars.
pub fn fill_color_bars(frame: &mut Frame, shift: usize) {
    let width = frame.width();
    let yuv = BARS.map(rgb_to_yuv);

    match frame.format() {
        PixelFormat::Planar420 => {
            if let Some(luma) = frame.plane_mut(0) {
                for row in 0..luma.rows() {
                    if let Some(line) = luma.row_mut(row) {
                        for (x, sample) in line.iter_mut().take(width as usize).enumerate() {
                            *sample = yuv[bar_at(x as u32, width, shift)][0];
                        }
                    }
                }
            }

            for plane in 1..3 {
                let Some(chroma) = frame.plane_mut(plane) else {
                    continue;
                };
                for row in 0..chroma.rows() {
                    if let Some(line) = chroma.row_mut(row) {
                        let samples = line.iter_mut().take(width.div_ceil(2) as usize);
                        for (x, sample) in samples.enumerate() {
                            *sample = yuv[bar_at(x as u32 * 2, width, shift)][plane];
                        }
                    }
                }
            }
        }
        PixelFormat::Packed422 => {
            let Some(packed) = frame.plane_mut(0) else {
                return;
            };
            for row in 0..packed.rows() {
                if let Some(line) = packed.row_mut(row) {
                    let pairs = line.chunks_exact_mut(4).take(width.div_ceil(2) as usize);
                    for (pair, bytes) in pairs.enumerate() {
                        let left = yuv[bar_at(pair as u32 * 2, width, shift)];
                        let right = yuv[bar_at(pair as u32 * 2 + 1, width, shift)];
                        bytes.copy_from_slice(&[left[0], left[1], right[0], left[2]]);
                    }
                }
            }
        }
    }
}
