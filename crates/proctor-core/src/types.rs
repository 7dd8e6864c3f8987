use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box for a detected face, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Integer pixel corners `(left, top, right, bottom)` clamped to a `width` x `height` frame.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> (i32, i32, i32, i32) {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        (
            self.x.clamp(0.0, max_x).round() as i32,
            self.y.clamp(0.0, max_y).round() as i32,
            (self.x + self.width).clamp(0.0, max_x).round() as i32,
            (self.y + self.height).clamp(0.0, max_y).round() as i32,
        )
    }
}
