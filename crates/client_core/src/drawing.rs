//! Freehand raster surface the user draws symbols on.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, ImageResult, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::CanvasSettings;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Base64 PNG exported from a [`DrawingSurface`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawingArtifact(String);

impl DrawingArtifact {
    pub fn from_base64(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Accepts either a bare payload or a `data:image/png;base64,` URL.
    pub fn from_data_url(url: &str) -> Self {
        Self(url.strip_prefix(DATA_URL_PREFIX).unwrap_or(url).to_string())
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    pub fn to_data_url(&self) -> String {
        format!("{DATA_URL_PREFIX}{}", self.0)
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrokeState {
    Idle,
    Drawing,
}

pub struct DrawingSurface {
    raster: RgbImage,
    settings: CanvasSettings,
    stroke: StrokeState,
    last_point: Option<Point>,
}

impl DrawingSurface {
    pub fn new(settings: CanvasSettings) -> Self {
        let raster = RgbImage::from_pixel(
            settings.width,
            settings.height,
            Rgb(settings.background),
        );
        Self {
            raster,
            settings,
            stroke: StrokeState::Idle,
            last_point: None,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke == StrokeState::Drawing
    }

    /// Non-finite pointer positions are ignored.
    pub fn begin_stroke(&mut self, point: Point) {
        if !point.is_finite() {
            return;
        }
        self.stroke = StrokeState::Drawing;
        self.stamp(point);
        self.last_point = Some(point);
    }

    /// Stamps along the segment from the previous point. Only the part of
    /// the segment that can touch the raster is walked, so a pointer far
    /// outside the canvas costs no more than one crossing it.
    pub fn extend_stroke(&mut self, point: Point) {
        if self.stroke != StrokeState::Drawing || !point.is_finite() {
            return;
        }
        let from = self.last_point.replace(point).unwrap_or(point);
        let Some((start, end)) = self.visible_segment(from, point) else {
            return;
        };
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let length = (dx * dx + dy * dy).sqrt();
        let spacing = (self.settings.brush_radius / 2.0).max(0.5);
        let steps = (length / spacing).ceil().max(1.0) as u32;
        let first = if start == from { 1 } else { 0 };
        for step in first..=steps {
            let t = step as f32 / steps as f32;
            self.stamp(Point::new(start.x + dx * t, start.y + dy * t));
        }
    }

    pub fn end_stroke(&mut self) {
        self.stroke = StrokeState::Idle;
        self.last_point = None;
    }

    pub fn clear(&mut self) {
        let background = Rgb(self.settings.background);
        for pixel in self.raster.pixels_mut() {
            *pixel = background;
        }
        self.end_stroke();
    }

    /// True when no pixel differs from the background.
    pub fn is_blank(&self) -> bool {
        let background = Rgb(self.settings.background);
        self.raster.pixels().all(|pixel| *pixel == background)
    }

    pub fn export(&self) -> ImageResult<DrawingArtifact> {
        let mut bytes = Vec::new();
        self.raster
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(DrawingArtifact(STANDARD.encode(bytes)))
    }

    /// Clips `from..to` to the raster grown by the brush radius
    /// (Liang-Barsky). `None` when the segment never comes close.
    fn visible_segment(&self, from: Point, to: Point) -> Option<(Point, Point)> {
        // f64 keeps the clipped endpoints accurate when one end is huge.
        let radius = f64::from(self.settings.brush_radius);
        let (width, height) = self.raster.dimensions();
        let (min_x, min_y) = (-radius, -radius);
        let max_x = f64::from(width) - 1.0 + radius;
        let max_y = f64::from(height) - 1.0 + radius;
        let (x0, y0) = (f64::from(from.x), f64::from(from.y));
        let dx = f64::from(to.x) - x0;
        let dy = f64::from(to.y) - y0;

        let mut enter = 0.0_f64;
        let mut leave = 1.0_f64;
        for (p, q) in [
            (-dx, x0 - min_x),
            (dx, max_x - x0),
            (-dy, y0 - min_y),
            (dy, max_y - y0),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                enter = enter.max(t);
            } else {
                leave = leave.min(t);
            }
            if enter > leave {
                return None;
            }
        }

        let at = |t: f64| Point::new((x0 + dx * t) as f32, (y0 + dy * t) as f32);
        Some((at(enter), at(leave)))
    }

    fn stamp(&mut self, center: Point) {
        let radius = self.settings.brush_radius;
        let (width, height) = self.raster.dimensions();
        let min_x = (center.x - radius).floor().max(0.0) as u32;
        let min_y = (center.y - radius).floor().max(0.0) as u32;
        let max_x = (center.x + radius).ceil().min(width as f32 - 1.0);
        let max_y = (center.y + radius).ceil().min(height as f32 - 1.0);
        if max_x < 0.0 || max_y < 0.0 {
            return;
        }
        let foreground = Rgb(self.settings.foreground);
        for y in min_y..=max_y as u32 {
            for x in min_x..=max_x as u32 {
                let dx = x as f32 - center.x;
                let dy = y as f32 - center.y;
                if dx * dx + dy * dy <= radius * radius {
                    self.raster.put_pixel(x, y, foreground);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/drawing_tests.rs"]
mod tests;
