use std::f64::consts::{FRAC_PI_2, TAU};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Transform};

use crate::layout::Wedge;

/// Drawing target for one render pass.
///
/// Wedges are centered on the surface; ring `r` spans radii
/// `r * ring_width ..= (r + 1) * ring_width`.
pub trait Surface: Sized + Send + 'static {
    /// A fully transparent surface.
    fn blank(width: u32, height: u32) -> Result<Self>;

    fn draw_wedge(&mut self, wedge: &Wedge, ring_width: f32);

    /// Alpha-composites `src` over `self`.
    fn composite_over(&mut self, src: &Self);
}

pub struct PixmapCanvas {
    pixmap: Pixmap,
}

impl PixmapCanvas {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight-alpha RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    /// The canvas composited over opaque white.
    pub fn flatten(&self) -> Result<Self> {
        let mut back = Self::blank(self.width(), self.height())?;
        back.pixmap.fill(Color::WHITE);
        back.composite_over(self);
        Ok(back)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        self.flatten()?
            .pixmap
            .encode_png()
            .context("failed to encode canvas as PNG")
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        self.flatten()?
            .pixmap
            .save_png(path)
            .with_context(|| format!("failed to write image {}", path.display()))
    }
}

impl Surface for PixmapCanvas {
    fn blank(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
        Ok(Self { pixmap })
    }

    fn draw_wedge(&mut self, wedge: &Wedge, ring_width: f32) {
        let center_x = f64::from(self.pixmap.width()) / 2.0;
        let center_y = f64::from(self.pixmap.height()) / 2.0;
        let inner = f64::from(wedge.ring) * f64::from(ring_width);
        let outer = inner + f64::from(ring_width);

        let Some(path) = wedge_path(center_x, center_y, inner, outer, wedge.start, wedge.end)
        else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color_rgba8(
            (wedge.color >> 16) as u8,
            (wedge.color >> 8) as u8,
            wedge.color as u8,
            0xFF,
        );
        paint.anti_alias = true;

        self.pixmap.fill_path(
            &path,
            &paint,
            FillRule::EvenOdd,
            Transform::identity(),
            None,
        );
    }

    fn composite_over(&mut self, src: &Self) {
        self.pixmap.draw_pixmap(
            0,
            0,
            src.pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

fn wedge_path(
    center_x: f64,
    center_y: f64,
    inner: f64,
    outer: f64,
    start: f64,
    end: f64,
) -> Option<tiny_skia::Path> {
    if end <= start || outer <= 0.0 {
        return None;
    }

    let mut builder = PathBuilder::new();
    if end - start >= 1.0 {
        builder.push_circle(center_x as f32, center_y as f32, outer as f32);
        if inner > 0.0 {
            builder.push_circle(center_x as f32, center_y as f32, inner as f32);
        }
        return builder.finish();
    }

    let from = start * TAU;
    let to = end * TAU;

    let (x, y) = polar(center_x, center_y, outer, from);
    builder.move_to(x, y);
    arc_to(&mut builder, center_x, center_y, outer, from, to);
    if inner > 0.0 {
        let (x, y) = polar(center_x, center_y, inner, to);
        builder.line_to(x, y);
        arc_to(&mut builder, center_x, center_y, inner, to, from);
    } else {
        builder.line_to(center_x as f32, center_y as f32);
    }
    builder.close();
    builder.finish()
}

fn polar(center_x: f64, center_y: f64, radius: f64, angle: f64) -> (f32, f32) {
    (
        (center_x + radius * angle.cos()) as f32,
        (center_y + radius * angle.sin()) as f32,
    )
}

/// Appends a circular arc as cubic segments of at most a quarter turn each.
fn arc_to(builder: &mut PathBuilder, center_x: f64, center_y: f64, radius: f64, from: f64, to: f64) {
    let sweep = to - from;
    let segments = (sweep.abs() / FRAC_PI_2).ceil().max(1.0) as usize;
    let step = sweep / segments as f64;
    let handle = 4.0 / 3.0 * (step / 4.0).tan() * radius;

    let mut angle = from;
    for _ in 0..segments {
        let next = angle + step;
        let (sin_a, cos_a) = angle.sin_cos();
        let (sin_b, cos_b) = next.sin_cos();

        builder.cubic_to(
            (center_x + radius * cos_a - handle * sin_a) as f32,
            (center_y + radius * sin_a + handle * cos_a) as f32,
            (center_x + radius * cos_b + handle * sin_b) as f32,
            (center_y + radius * sin_b - handle * cos_b) as f32,
            (center_x + radius * cos_b) as f32,
            (center_y + radius * sin_b) as f32,
        );
        angle = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> PixmapCanvas {
        PixmapCanvas::blank(100, 100).unwrap()
    }

    #[test]
    fn blank_canvases_are_transparent() {
        let canvas = canvas();
        assert_eq!(canvas.pixel(50, 50), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(100, 0), None);
    }

    #[test]
    fn full_turn_on_ring_zero_fills_a_disk() {
        let mut canvas = canvas();
        canvas.draw_wedge(&Wedge::new(0xFF0000, 0, 0.0, 1.0), 20.0);
        assert_eq!(canvas.pixel(50, 50), Some([0xFF, 0, 0, 0xFF]));
        assert_eq!(canvas.pixel(50, 35), Some([0xFF, 0, 0, 0xFF]));
        assert_eq!(canvas.pixel(50, 5), Some([0, 0, 0, 0]));
    }

    #[test]
    fn outer_rings_leave_the_center_empty() {
        let mut canvas = canvas();
        canvas.draw_wedge(&Wedge::new(0x00FF00, 1, 0.0, 1.0), 20.0);
        assert_eq!(canvas.pixel(50, 50), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(80, 50), Some([0, 0xFF, 0, 0xFF]));
    }

    #[test]
    fn quarter_wedges_stay_in_their_quadrant() {
        let mut canvas = canvas();
        // First quarter turn runs from +x towards +y, which is down on screen.
        canvas.draw_wedge(&Wedge::new(0x0000FF, 1, 0.0, 0.25), 20.0);
        assert_eq!(canvas.pixel(70, 70), Some([0, 0, 0xFF, 0xFF]));
        assert_eq!(canvas.pixel(30, 30), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(70, 30), Some([0, 0, 0, 0]));
    }

    #[test]
    fn empty_spans_draw_nothing() {
        let mut canvas = canvas();
        canvas.draw_wedge(&Wedge::new(0xFFFFFF, 0, 0.5, 0.5), 20.0);
        assert_eq!(canvas.pixel(50, 50), Some([0, 0, 0, 0]));
    }

    #[test]
    fn compositing_keeps_both_layers() {
        let mut below = canvas();
        below.draw_wedge(&Wedge::new(0xFF0000, 0, 0.0, 1.0), 20.0);
        let mut above = canvas();
        above.draw_wedge(&Wedge::new(0x0000FF, 1, 0.0, 1.0), 20.0);

        below.composite_over(&above);
        assert_eq!(below.pixel(50, 50), Some([0xFF, 0, 0, 0xFF]));
        assert_eq!(below.pixel(80, 50), Some([0, 0, 0xFF, 0xFF]));
    }

    #[test]
    fn flattening_puts_white_behind_transparent_pixels() {
        let flat = canvas().flatten().unwrap();
        assert_eq!(flat.pixel(0, 0), Some([0xFF, 0xFF, 0xFF, 0xFF]));
    }

    #[test]
    fn zero_sized_canvases_are_rejected() {
        assert!(PixmapCanvas::blank(0, 10).is_err());
    }
}
