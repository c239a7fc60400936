//! Overlay markers for specialized detections: center dot, box and label.

use crate::detection::Detection;
use crate::prelude::Frame;
use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::sync::OnceLock;

/// Colors are written straight into BGR frames, so the channel order is B, G, R.
pub const CENTER_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const CENTER_RADIUS: i32 = 5;
pub const BOX_THICKNESS: i32 = 2;
pub const LABEL_HEIGHT: f32 = 16.0;
pub const LABEL_OFFSET: i32 = 10;

static LABEL_FONT: OnceLock<Option<Font<'static>>> = OnceLock::new();

fn label_font() -> Option<&'static Font<'static>> {
    LABEL_FONT
        .get_or_init(|| Font::try_from_bytes(include_bytes!("../../assets/DejaVuSansMono.ttf")))
        .as_ref()
}

/// Draws markers for `detections` onto `frame`. Out-of-frame pixels are clipped.
pub fn annotate(frame: &mut Frame, detections: &[Detection]) {
    let Some(mut canvas) = frame.canvas_mut() else {
        return;
    };
    for detection in detections {
        let b = detection.bbox.truncated();
        draw_filled_circle_mut(&mut canvas, detection.center, CENTER_RADIUS, CENTER_COLOR);

        for inset in 0..BOX_THICKNESS {
            let width = b.x2 - b.x1 + 1 - 2 * inset;
            let height = b.y2 - b.y1 + 1 - 2 * inset;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(b.x1 + inset, b.y1 + inset).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }

        if let Some(font) = label_font() {
            let top = b.y1 - LABEL_OFFSET - LABEL_HEIGHT as i32;
            draw_text_mut(
                &mut canvas,
                BOX_COLOR,
                b.x1,
                top,
                Scale::uniform(LABEL_HEIGHT),
                font,
                &detection.class_label,
            );
        }
    }
}
