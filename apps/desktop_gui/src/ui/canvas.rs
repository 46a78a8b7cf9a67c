//! The drawing surface: stroke capture on an egui painter, undo/erase, and
//! export of the doodle as a PNG data URL for the mint payload.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use egui::{Color32, Pos2, Sense, Stroke, Ui, Vec2};
use image::{Rgba, RgbaImage};

pub const CANVAS_SIZE: Vec2 = Vec2::new(480.0, 320.0);
const STROKE_WIDTH: f32 = 3.0;
const SAMPLE_STEP: f32 = 0.5;

#[derive(Default)]
pub struct DoodleCanvas {
    // Stroke points in canvas-local coordinates.
    strokes: Vec<Vec<Pos2>>,
    active: Option<Vec<Pos2>>,
}

impl DoodleCanvas {
    pub fn ui(&mut self, ui: &mut Ui) {
        egui::Frame::canvas(ui.style()).show(ui, |ui| {
            let (response, painter) = ui.allocate_painter(CANVAS_SIZE, Sense::drag());
            let origin = response.rect.min;
            painter.rect_filled(response.rect, egui::CornerRadius::ZERO, Color32::WHITE);

            if let Some(pointer) = response.interact_pointer_pos() {
                let point = (pointer - origin).to_pos2();
                if response.drag_started() {
                    self.active = Some(vec![point]);
                } else if response.dragged() {
                    match &mut self.active {
                        Some(stroke) => {
                            let far_enough = stroke
                                .last()
                                .map_or(true, |last| last.distance(point) > SAMPLE_STEP);
                            if far_enough {
                                stroke.push(point);
                            }
                        }
                        None => self.active = Some(vec![point]),
                    }
                }
            }
            if response.drag_stopped() {
                if let Some(finished) = self.active.take() {
                    if finished.len() > 1 {
                        self.strokes.push(finished);
                    }
                }
            }

            let ink = Stroke::new(STROKE_WIDTH, Color32::BLACK);
            for stroke in self.strokes.iter().chain(self.active.iter()) {
                for segment in stroke.windows(2) {
                    painter.line_segment(
                        [origin + segment[0].to_vec2(), origin + segment[1].to_vec2()],
                        ink,
                    );
                }
            }
        });
    }

    pub fn erase_all(&mut self) {
        self.strokes.clear();
        self.active = None;
    }

    pub fn undo_stroke(&mut self) {
        self.strokes.pop();
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn export_png(&self) -> Result<Vec<u8>> {
        let width = CANVAS_SIZE.x as u32;
        let height = CANVAS_SIZE.y as u32;
        let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        for stroke in &self.strokes {
            for segment in stroke.windows(2) {
                stamp_segment(&mut img, segment[0], segment[1]);
            }
        }

        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .context("failed to encode doodle as png")?;
        Ok(bytes)
    }

    pub fn export_png_data_url(&self) -> Result<String> {
        Ok(format!(
            "data:image/png;base64,{}",
            STANDARD.encode(self.export_png()?)
        ))
    }
}

fn stamp_segment(img: &mut RgbaImage, from: Pos2, to: Pos2) {
    let length = from.distance(to).max(SAMPLE_STEP);
    let steps = (length / SAMPLE_STEP).ceil() as u32;
    let radius = STROKE_WIDTH / 2.0;
    let reach = radius.ceil() as i32;

    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let x = from.x + (to.x - from.x) * t;
        let y = from.y + (to.y - from.y) * t;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if (dx * dx + dy * dy) as f32 > radius * radius {
                    continue;
                }
                let px = x.round() as i32 + dx;
                let py = y.round() as i32 + dy;
                if px < 0 || py < 0 || px >= img.width() as i32 || py >= img.height() as i32 {
                    continue;
                }
                img.put_pixel(px as u32, py as u32, Rgba([0, 0, 0, 255]));
            }
        }
    }
}
