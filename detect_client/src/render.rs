//! Rendering of detections: overlay drawing, label text and detection list rows.
//!
use std::{fmt, path::Path};

use common::protocol::Detection;
use image::{codecs::jpeg::JpegEncoder, codecs::png::PngEncoder, ImageEncoder, Rgba, RgbaImage};
use image::{ColorType, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use rusttype::{Font, Scale};

use crate::Error;

/// Box colours, picked by detection index.
pub const PALETTE: [Rgba<u8>; 5] = [
    Rgba([0xff, 0x6b, 0x9d, 0xff]),
    Rgba([0x74, 0xb9, 0xff, 0xff]),
    Rgba([0x6c, 0x5c, 0xe7, 0xff]),
    Rgba([0xf8, 0xb5, 0x00, 0xff]),
    Rgba([0xfd, 0x79, 0xa8, 0xff]),
];

pub const PLACEHOLDER_STATIC: &str = "No objects detected";
pub const PLACEHOLDER_LIVE: &str = "No objects detected in current frame";

const LINE_WIDTH: i32 = 3;
const FONT_SIZE: f32 = 16.0;
const LABEL_HEIGHT: i32 = 25;
const LABEL_PADDING: i32 = 5;
/// Average glyph advance used to size label backgrounds without a font.
const FALLBACK_CHAR_WIDTH: f32 = 9.0;
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const WHITE: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);

pub type LabelFont = Font<'static>;

/// Load a TrueType font for label text.
pub fn load_font(path: &Path) -> Result<LabelFont, Error> {
    let data = std::fs::read(path)?;
    Font::try_from_vec(data).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is not a valid font", path.display()),
        )
        .into()
    })
}

pub fn palette_color(index: usize) -> Rgba<u8> {
    PALETTE[index % PALETTE.len()]
}

/// Confidence as percentage with one decimal, e.g. `0.873` becomes `87.3%`.
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Label drawn above a box.
pub fn label_text(detection: &Detection) -> String {
    format!(
        "{}: {}",
        &detection.class,
        format_confidence(detection.confidence)
    )
}

/// Row of a detection list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DetectionRow {
    Item { label: String, confidence: String },
    Placeholder(&'static str),
}

impl fmt::Display for DetectionRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionRow::Item { label, confidence } => write!(f, "{label} — {confidence}"),
            DetectionRow::Placeholder(text) => f.write_str(text),
        }
    }
}

/// One row per detection, or a single placeholder row if there are none.
pub fn format_detections(detections: &[Detection], placeholder: &'static str) -> Vec<DetectionRow> {
    if detections.is_empty() {
        return vec![DetectionRow::Placeholder(placeholder)];
    }

    detections
        .iter()
        .map(|detection| DetectionRow::Item {
            label: detection.class.clone(),
            confidence: format_confidence(detection.confidence),
        })
        .collect()
}

/// Per-axis factors mapping source pixels onto a canvas. An empty source axis maps 1:1.
pub fn scale_factors(canvas: (u32, u32), source: (u32, u32)) -> (f32, f32) {
    let factor = |canvas: u32, source: u32| match source {
        0 => 1.0,
        source => canvas as f32 / source as f32,
    };
    (factor(canvas.0, source.0), factor(canvas.1, source.1))
}

/// Canvas pixel coordinate of `value`, held within `[low, high]`.
///
/// The limits lie outside the canvas, so holding a coordinate there changes no drawn pixel while
/// keeping the drawing code away from huge or non-finite values.
fn canvas_coord(value: f32, low: i32, high: i32) -> i32 {
    (value as i64).clamp(low as i64, high as i64) as i32
}

/// Transparent layer drawn over the live video.
pub struct OverlayCanvas {
    image: RgbaImage,
}

impl OverlayCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    /// Clear the canvas and draw all detections found on a frame of size `source`.
    ///
    /// Boxes are not clamped, whatever falls outside the canvas is clipped while drawing. Without
    /// a font only the label backgrounds are drawn.
    pub fn draw_detections(
        &mut self,
        detections: &[Detection],
        source: (u32, u32),
        font: Option<&LabelFont>,
    ) {
        self.clear();

        let (scale_x, scale_y) = scale_factors(self.dimensions(), source);

        let (canvas_w, canvas_h) = (self.image.width() as i32, self.image.height() as i32);
        let margin = LINE_WIDTH + 1;

        for (index, detection) in detections.iter().enumerate() {
            let [x1, y1, x2, y2] = detection.bbox;
            let color = palette_color(index);

            // Reversed corners still describe the same box
            let left = canvas_coord(x1.min(x2) * scale_x, -margin, canvas_w + margin);
            let right = canvas_coord(x1.max(x2) * scale_x, -margin, canvas_w + margin);
            let top = canvas_coord(y1.min(y2) * scale_y, -margin, canvas_h + margin);
            let bottom = canvas_coord(y1.max(y2) * scale_y, -margin, canvas_h + margin);

            self.stroke_rect(left, top, right - left, bottom - top, color);

            let label = label_text(detection);
            let scale = Scale::uniform(FONT_SIZE);
            let text_width = match font {
                Some(font) => text_size(scale, font, &label).0,
                None => (label.chars().count() as f32 * FALLBACK_CHAR_WIDTH) as i32,
            };
            let label_width = text_width + 2 * LABEL_PADDING;

            // The label hangs off the first corner, above the box
            let x = canvas_coord(x1 * scale_x, -(label_width + margin), canvas_w + margin);
            let y = canvas_coord(y1 * scale_y, -margin, canvas_h + LABEL_HEIGHT + margin);

            draw_filled_rect_mut(
                &mut self.image,
                Rect::at(x, y - LABEL_HEIGHT).of_size(label_width as u32, LABEL_HEIGHT as u32),
                color,
            );

            if let Some(font) = font {
                draw_text_mut(
                    &mut self.image,
                    WHITE,
                    x + LABEL_PADDING,
                    y - LABEL_HEIGHT + (LABEL_HEIGHT - FONT_SIZE as i32) / 2,
                    scale,
                    font,
                    &label,
                );
            }
        }
    }

    /// Stroke a rectangle with a line of `LINE_WIDTH` centred on its outline.
    fn stroke_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: Rgba<u8>) {
        let half = LINE_WIDTH / 2;
        for offset in -half..=half {
            let (w, h) = (width + 2 * offset, height + 2 * offset);
            if w <= 0 || h <= 0 {
                continue;
            }
            draw_hollow_rect_mut(
                &mut self.image,
                Rect::at(x - offset, y - offset).of_size(w as u32, h as u32),
                color,
            );
        }
    }
}

/// Encode a frame as JPEG.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(buf)
}

/// Encode a frame as PNG.
pub fn encode_png(frame: &RgbImage) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(buf)
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.873), "87.3%");
        assert_eq!(format_confidence(0.92), "92.0%");
        assert_eq!(format_confidence(1.0), "100.0%");
        assert_eq!(format_confidence(0.0), "0.0%");
    }

    #[test]
    fn test_rows_for_empty_detections() {
        let rows = format_detections(&[], PLACEHOLDER_LIVE);
        assert_eq!(rows, vec![DetectionRow::Placeholder(PLACEHOLDER_LIVE)]);
        assert_eq!(rows[0].to_string(), "No objects detected in current frame");
    }

    #[test]
    fn test_one_row_per_detection() {
        let detections = vec![
            Detection::new("cat", 0.92, [10.0, 10.0, 50.0, 50.0]),
            Detection::new("dog", 0.873, [0.0, 0.0, 1.0, 1.0]),
            Detection::new("cat", 0.5, [0.0, 0.0, 1.0, 1.0]),
        ];

        let rows = format_detections(&detections, PLACEHOLDER_STATIC);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].to_string(), "cat — 92.0%");
        assert_eq!(rows[1].to_string(), "dog — 87.3%");
        assert_eq!(
            rows[2],
            DetectionRow::Item {
                label: "cat".into(),
                confidence: "50.0%".into()
            }
        );
    }

    #[test]
    fn test_label_text() {
        let detection = Detection::new("person", 0.4567, [0.0; 4]);
        assert_eq!(label_text(&detection), "person: 45.7%");
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(palette_color(0), PALETTE[0]);
        assert_eq!(palette_color(4), PALETTE[4]);
        assert_eq!(palette_color(5), PALETTE[0]);
        assert_eq!(palette_color(12), PALETTE[2]);
    }

    #[test]
    fn test_scale_factors() {
        assert_eq!(scale_factors((640, 480), (1280, 720)), (0.5, 480.0 / 720.0));
        assert_eq!(scale_factors((640, 480), (640, 480)), (1.0, 1.0));
        assert_eq!(scale_factors((640, 480), (0, 0)), (1.0, 1.0));
    }

    #[test]
    fn test_draw_boxes_in_palette_order() {
        let mut canvas = OverlayCanvas::new(200, 200);
        let detections = vec![
            Detection::new("cat", 0.9, [40.0, 60.0, 100.0, 120.0]),
            Detection::new("dog", 0.8, [120.0, 140.0, 180.0, 190.0]),
        ];

        canvas.draw_detections(&detections, (200, 200), None);
        let image = canvas.image();

        // Left edges of both boxes, below the label backgrounds
        assert_eq!(*image.get_pixel(40, 90), PALETTE[0]);
        assert_eq!(*image.get_pixel(39, 90), PALETTE[0]);
        assert_eq!(*image.get_pixel(41, 90), PALETTE[0]);
        assert_eq!(*image.get_pixel(120, 170), PALETTE[1]);
        // Box interior stays transparent
        assert_eq!(*image.get_pixel(70, 90), TRANSPARENT);
        // Label background sits just above the box
        assert_eq!(*image.get_pixel(45, 50), PALETTE[0]);
        assert_eq!(*image.get_pixel(45, 30), TRANSPARENT);
    }

    #[test]
    fn test_draw_scales_to_canvas() {
        let mut canvas = OverlayCanvas::new(100, 50);
        let detections = vec![Detection::new("cat", 0.9, [40.0, 40.0, 120.0, 80.0])];

        // Source is twice the canvas size on both axes
        canvas.draw_detections(&detections, (200, 100), None);

        assert_eq!(*canvas.image().get_pixel(20, 30), PALETTE[0]);
        assert_eq!(*canvas.image().get_pixel(40, 30), TRANSPARENT);
    }

    #[test]
    fn test_redraw_clears_previous_boxes() {
        let mut canvas = OverlayCanvas::new(100, 100);
        let detections = vec![Detection::new("cat", 0.9, [40.0, 40.0, 80.0, 80.0])];
        canvas.draw_detections(&detections, (100, 100), None);
        assert_eq!(*canvas.image().get_pixel(40, 60), PALETTE[0]);

        canvas.draw_detections(&[], (100, 100), None);
        assert!(canvas.image().pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn test_boxes_outside_canvas_are_clipped() {
        let mut canvas = OverlayCanvas::new(50, 50);
        let detections = vec![Detection::new("cat", 0.9, [-20.0, 30.0, 500.0, 400.0])];

        canvas.draw_detections(&detections, (50, 50), None);

        assert_eq!(*canvas.image().get_pixel(0, 29), PALETTE[0]);
    }

    #[test]
    fn test_extreme_boxes_are_drawn_clipped() {
        let mut canvas = OverlayCanvas::new(64, 48);
        let detections = vec![
            Detection::new("cat", 0.9, [0.0, 10.0, 3.0e9, 20.0]),
            Detection::new("dog", 0.8, [-3.0e9, -3.0e9, 10.0, 10.0]),
            Detection::new("car", 0.7, [f32::MIN, 30.0, f32::MAX, f32::NAN]),
        ];

        canvas.draw_detections(&detections, (64, 48), None);
        let image = canvas.image();

        // Top edge of the first box runs across the whole canvas
        assert_eq!(*image.get_pixel(40, 10), PALETTE[0]);
        assert_eq!(*image.get_pixel(63, 10), PALETTE[0]);
        // Right and bottom edges of the second box
        assert_eq!(*image.get_pixel(10, 5), PALETTE[1]);
        assert_eq!(*image.get_pixel(5, 10), PALETTE[1]);
        // Inside the first box
        assert_eq!(*image.get_pixel(30, 15), TRANSPARENT);
    }

    #[test]
    fn test_reversed_corners_draw_outline() {
        let mut canvas = OverlayCanvas::new(100, 100);
        let detections = vec![Detection::new("cat", 0.9, [80.0, 90.0, 40.0, 50.0])];

        canvas.draw_detections(&detections, (100, 100), None);
        let image = canvas.image();

        assert_eq!(*image.get_pixel(40, 70), PALETTE[0]);
        assert_eq!(*image.get_pixel(80, 55), PALETTE[0]);
        assert_eq!(*image.get_pixel(60, 90), PALETTE[0]);
        assert_eq!(*image.get_pixel(60, 70), TRANSPARENT);
    }

    #[test]
    fn test_encode_frames() -> Result<(), Error> {
        let frame = RgbImage::from_pixel(16, 8, image::Rgb([10, 200, 30]));

        let jpeg = encode_jpeg(&frame, 70)?;
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
        let decoded = image::load_from_memory(&jpeg)?;
        assert_eq!((decoded.width(), decoded.height()), (16, 8));

        let png = encode_png(&frame)?;
        assert_eq!(&png[1..4], b"PNG");

        Ok(())
    }
}
