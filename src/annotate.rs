//! Frame annotation.
//!
//! Draws onto a copy of the frame, never the captured pixels. Draw order is
//! fixed: each vehicle's box and label in detection order first, the
//! collision banner last so nothing occludes it. Non-vehicle detections are
//! filtered out before this stage and are never drawn.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::frame::Frame;

pub const BANNER_TEXT: &str = "ACCIDENT DETECTED!";

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_PLATE_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const BANNER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Corner tick length as a fraction of the shorter box side.
const CORNER_TICK_MIN: i32 = 6;
const GLYPH_WIDTH: i32 = 6;
const GLYPH_HEIGHT: i32 = 7;

/// Render the filtered vehicle detections (and the collision banner when the
/// frame produced at least one event) onto a copy of `frame`.
pub fn annotate(frame: &Frame, vehicles: &[Detection], collision: bool) -> Result<RgbImage> {
    let mut image = RgbImage::from_vec(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;

    for vehicle in vehicles {
        draw_vehicle_box(&mut image, vehicle);
    }
    for vehicle in vehicles {
        draw_vehicle_label(&mut image, vehicle);
    }
    if collision {
        draw_banner(&mut image);
    }
    Ok(image)
}

fn draw_vehicle_box(image: &mut RgbImage, vehicle: &Detection) {
    let b = vehicle.bbox;
    let rect = Rect::at(b.x1, b.y1).of_size(b.width().max(1), b.height().max(1));
    draw_hollow_rect_mut(image, rect, BOX_COLOR);

    // Corner ticks, two pixels thick, on all four corners.
    let tick = (b.width().min(b.height()) as i32 / 5).max(CORNER_TICK_MIN);
    for (cx, cy, dx, dy) in [
        (b.x1, b.y1, 1, 1),
        (b.x2 - 1, b.y1, -1, 1),
        (b.x1, b.y2 - 1, 1, -1),
        (b.x2 - 1, b.y2 - 1, -1, -1),
    ] {
        fill_clamped(image, cx.min(cx + dx * tick), cy, tick.abs(), 2, BOX_COLOR);
        fill_clamped(image, cx, cy.min(cy + dy * tick), 2, tick.abs(), BOX_COLOR);
    }
}

fn draw_vehicle_label(image: &mut RgbImage, vehicle: &Detection) {
    let text = format!("{} {:.2}", vehicle.label, vehicle.confidence);
    let x = vehicle.bbox.x1.max(0);
    let y = (vehicle.bbox.y1 - GLYPH_HEIGHT - 4).max(0);
    let plate_w = (text.chars().count() as i32 * GLYPH_WIDTH + 4) as u32;
    let plate_h = (GLYPH_HEIGHT + 4) as u32;
    draw_filled_rect_mut(image, Rect::at(x, y).of_size(plate_w, plate_h), LABEL_PLATE_COLOR);
    draw_text(image, x + 2, y + 2, &text, LABEL_TEXT_COLOR, 1);
}

fn draw_banner(image: &mut RgbImage) {
    let scale = 2;
    let x = 20;
    let y = 20;
    let plate_w = (BANNER_TEXT.chars().count() as i32 * GLYPH_WIDTH * scale + 8) as u32;
    let plate_h = (GLYPH_HEIGHT * scale + 8) as u32;
    draw_filled_rect_mut(
        image,
        Rect::at(x - 4, y - 4).of_size(plate_w, plate_h),
        Rgb([0, 0, 0]),
    );
    draw_text(image, x, y, BANNER_TEXT, BANNER_COLOR, scale);
}

fn fill_clamped(image: &mut RgbImage, x: i32, y: i32, w: i32, h: i32, color: Rgb<u8>) {
    if w <= 0 || h <= 0 {
        return;
    }
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(image.width() as i32);
    let y1 = (y + h).min(image.height() as i32);
    for py in y0..y1 {
        for px in x0..x1 {
            image.put_pixel(px as u32, py as u32, color);
        }
    }
}

/// Minimal 5x7 bitmap text. Enough for class labels, confidences, and the
/// banner; no font file to ship.
fn draw_text(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>, scale: i32) {
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_rows(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        fill_clamped(
                            image,
                            x + col * scale,
                            y + row as i32 * scale,
                            scale,
                            scale,
                            color,
                        );
                    }
                }
            }
        }
        x += GLYPH_WIDTH * scale;
    }
}

#[rustfmt::skip]
fn glyph_rows(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
        'B' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
        'C' => Some([0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
        'D' => Some([0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100]),
        'E' => Some([0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
        'F' => Some([0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
        'G' => Some([0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
        'H' => Some([0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
        'I' => Some([0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        'J' => Some([0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
        'K' => Some([0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
        'L' => Some([0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
        'M' => Some([0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
        'N' => Some([0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001]),
        'O' => Some([0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'P' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
        'Q' => Some([0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
        'R' => Some([0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
        'S' => Some([0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
        'T' => Some([0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
        'U' => Some([0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'V' => Some([0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100]),
        'W' => Some([0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001]),
        'X' => Some([0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b01010, 0b10001]),
        'Y' => Some([0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
        'Z' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
        '0' => Some([0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => Some([0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => Some([0b01110, 0b10001, 0b00001, 0b00110, 0b01000, 0b10000, 0b11111]),
        '3' => Some([0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
        '4' => Some([0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => Some([0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => Some([0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => Some([0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => Some([0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        '.' => Some([0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00110, 0b00110]),
        '!' => Some([0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100]),
        '%' => Some([0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011]),
        ' ' => Some([0; 7]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn black_frame(width: u32, height: u32) -> Frame {
        Frame::new(vec![0u8; (width * height * 3) as usize], width, height, 1)
    }

    fn car(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(BoundingBox { x1, y1, x2, y2 }, "car", 0.88)
    }

    #[test]
    fn annotation_draws_on_a_copy() {
        let frame = black_frame(320, 240);
        let vehicles = vec![car(50, 120, 150, 200)];
        let image = annotate(&frame, &vehicles, false).unwrap();

        assert_eq!(image.dimensions(), (320, 240));
        // The source frame stays black.
        assert!(frame.data.iter().all(|&b| b == 0));
        // The box edge got painted.
        assert_eq!(*image.get_pixel(50, 120), Rgb([0, 255, 0]));
    }

    #[test]
    fn banner_is_only_drawn_on_collision_frames() {
        let frame = black_frame(640, 480);
        let vehicles = vec![car(100, 200, 200, 300)];

        let calm = annotate(&frame, &vehicles, false).unwrap();
        let crashed = annotate(&frame, &vehicles, true).unwrap();

        let count_red = |img: &RgbImage| {
            img.pixels().filter(|p| p.0 == [255, 0, 0]).count()
        };
        assert_eq!(count_red(&calm), 0);
        assert!(count_red(&crashed) > 0);
    }

    #[test]
    fn banner_glyphs_are_all_known() {
        for ch in BANNER_TEXT.chars() {
            assert!(glyph_rows(ch).is_some(), "missing glyph for {:?}", ch);
        }
    }
}
