//! On-screen annotation: face boxes with a status label and the status panel.

use crate::font::{self, GLYPH_HEIGHT};
use chrono::NaiveDateTime;
use image::{Rgb, RgbImage};
use proctor_core::BoundingBox;
use std::time::Duration;

const NORMAL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const SUSPICIOUS_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const PANEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: u32 = 2;

/// Panel corners (left, top, right, bottom), inclusive.
const PANEL_RECT: (i32, i32, i32, i32) = (10, 10, 450, 90);
/// Weight of the black fill; the frame keeps the remainder.
const PANEL_OPACITY: f32 = 0.6;
const PANEL_TEXT_X: i32 = 15;
const PANEL_TEXT_Y: i32 = 16;
const PANEL_LINE_SPACING: i32 = 18;
const PANEL_TEXT_SCALE: u32 = 2;

/// Snapshot of the session shown in the status panel.
#[derive(Debug, Clone)]
pub struct StatusPanel {
    pub clock: NaiveDateTime,
    pub face_count: usize,
    pub total_violations: u32,
    /// Set while the missing-face timer is running.
    pub missing_for: Option<Duration>,
}

impl StatusPanel {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("TIME {}", self.clock.format("%H:%M:%S")),
            format!("FACES {}", self.face_count),
            format!("VIOLATIONS {}", self.total_violations),
        ];
        if let Some(missing) = self.missing_for {
            lines.push(format!("MISSING {:.1} S", missing.as_secs_f64()));
        }
        lines
    }
}

/// Label for every box in a frame with `face_count` faces.
pub fn face_label(face_count: usize) -> (&'static str, Rgb<u8>) {
    if face_count == 1 {
        ("NORMAL", NORMAL_COLOR)
    } else {
        ("SUSPICIOUS", SUSPICIOUS_COLOR)
    }
}

/// Draw face boxes and the status panel onto `image`.
pub fn annotate(image: &mut RgbImage, faces: &[BoundingBox], status: &StatusPanel) {
    draw_faces(image, faces);
    draw_status(image, status);
}

/// Outline every face; all boxes share one label and color.
pub fn draw_faces(image: &mut RgbImage, faces: &[BoundingBox]) {
    let (label, color) = face_label(faces.len());
    for face in faces {
        let (left, top, right, bottom) = face.to_pixel_rect(image.width(), image.height());
        for inset in 0..BOX_THICKNESS {
            draw_rectangle(
                image,
                left + inset,
                top + inset,
                right - inset,
                bottom - inset,
                color,
            );
        }
        // Keep the label inside the frame when the face touches the top or right edge.
        let label_width = font::text_width(label, LABEL_SCALE) as i32;
        let label_x = left.min(image.width() as i32 - label_width).max(0);
        let label_y = (top - (GLYPH_HEIGHT * LABEL_SCALE) as i32 - 4).max(0);
        font::draw_text(image, label_x, label_y, label, color, LABEL_SCALE);
    }
}

/// Darken the panel area and write the status lines over it.
pub fn draw_status(image: &mut RgbImage, status: &StatusPanel) {
    let (left, top, right, bottom) = PANEL_RECT;
    darken_rect(image, left, top, right, bottom, PANEL_OPACITY);
    for (i, line) in status.lines().iter().enumerate() {
        font::draw_text(
            image,
            PANEL_TEXT_X,
            PANEL_TEXT_Y + i as i32 * PANEL_LINE_SPACING,
            line,
            PANEL_TEXT_COLOR,
            PANEL_TEXT_SCALE,
        );
    }
}

fn draw_rectangle(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    color: Rgb<u8>,
) {
    if left > right || top > bottom {
        return;
    }
    let (width, height) = (image.width() as i32, image.height() as i32);
    let mut put = |x: i32, y: i32| {
        if (0..width).contains(&x) && (0..height).contains(&y) {
            image.put_pixel(x as u32, y as u32, color);
        }
    };
    for x in left..=right {
        put(x, top);
        put(x, bottom);
    }
    for y in top..=bottom {
        put(left, y);
        put(right, y);
    }
}

/// Blend black over the rectangle with the given opacity.
fn darken_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, opacity: f32) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let keep = 1.0 - opacity.clamp(0.0, 1.0);
    for y in top.max(0)..=bottom.min(height - 1) {
        for x in left.max(0)..=right.min(width - 1) {
            let pixel = image.get_pixel_mut(x as u32, y as u32);
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as f32 * keep).round() as u8;
            }
        }
    }
}
