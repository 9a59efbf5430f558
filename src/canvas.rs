// ============================================================================
// DRAWING SURFACE — freehand canvas with linear undo/redo history
// ============================================================================

use eframe::egui;
use egui::{ColorImage, TextureHandle, TextureOptions};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use crate::codec::{CodecError, EncodedImage};

/// Backing raster resolution. The widget may be displayed at any size; input
/// coordinates are rescaled per axis (see `map_display_point`).
pub const SURFACE_WIDTH: u32 = 960;
pub const SURFACE_HEIGHT: u32 = 540;

/// Fixed brush: 5 px black line with round caps and joins.
const BRUSH_RADIUS: f32 = 2.5;
const BRUSH_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

// ============================================================================
// HISTORY LOG
// ============================================================================

/// Linear snapshot history with a cursor.
///
/// The log is never empty after construction and the cursor always indexes a
/// valid snapshot. Committing while the cursor is behind the end discards
/// every forward snapshot — there is no redo tree.
pub struct HistoryLog {
    snapshots: Vec<RgbaImage>,
    cursor: usize,
}

impl HistoryLog {
    fn new(initial: RgbaImage) -> Self {
        Self {
            snapshots: vec![initial],
            cursor: 0,
        }
    }

    fn commit(&mut self, snapshot: RgbaImage) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;
    }

    /// Move the cursor one step back. Returns false at the oldest entry.
    fn step_back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Move the cursor one step forward. Returns false at the newest entry.
    fn step_forward(&mut self) -> bool {
        if self.cursor + 1 >= self.snapshots.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    fn current(&self) -> &RgbaImage {
        &self.snapshots[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}

// ============================================================================
// DRAW SURFACE
// ============================================================================

pub struct DrawSurface {
    raster: RgbaImage,
    history: HistoryLog,
    /// Guards stroke_extend/stroke_end against input without a stroke_begin.
    is_drawing: bool,
    last_point: Option<(f32, f32)>,
    /// Display cache — re-uploaded only when the raster changed.
    texture: Option<TextureHandle>,
    texture_dirty: bool,
}

impl Default for DrawSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawSurface {
    pub fn new() -> Self {
        let raster = RgbaImage::from_pixel(SURFACE_WIDTH, SURFACE_HEIGHT, BACKGROUND);
        Self {
            history: HistoryLog::new(raster.clone()),
            raster,
            is_drawing: false,
            last_point: None,
            texture: None,
            texture_dirty: true,
        }
    }

    /// Fill the surface with the background color and restart history with
    /// that blank state as the only entry. Called on every transition into
    /// draw mode and on the clear action.
    pub fn reset(&mut self) {
        self.raster = RgbaImage::from_pixel(SURFACE_WIDTH, SURFACE_HEIGHT, BACKGROUND);
        self.history = HistoryLog::new(self.raster.clone());
        self.is_drawing = false;
        self.last_point = None;
        self.texture_dirty = true;
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// The current raster encoded as an opaque PNG payload for the edit call.
    pub fn png_payload(&self) -> Result<EncodedImage, CodecError> {
        EncodedImage::from_raster_png(&self.raster)
    }

    // --- Stroke input -----------------------------------------------------

    pub fn stroke_begin(&mut self, point: (f32, f32)) {
        self.is_drawing = true;
        self.stamp(point);
        self.last_point = Some(point);
        self.texture_dirty = true;
    }

    pub fn stroke_extend(&mut self, point: (f32, f32)) {
        if !self.is_drawing {
            return;
        }
        let from = self.last_point.unwrap_or(point);
        self.draw_segment(from, point);
        self.last_point = Some(point);
        self.texture_dirty = true;
    }

    /// Finish the stroke and commit the raster as a new history entry,
    /// discarding any redo entries first.
    pub fn stroke_end(&mut self) {
        if !self.is_drawing {
            return;
        }
        self.is_drawing = false;
        self.last_point = None;
        self.history.commit(self.raster.clone());
    }

    // --- History ----------------------------------------------------------

    pub fn undo(&mut self) {
        if self.history.step_back() {
            self.raster = self.history.current().clone();
            self.texture_dirty = true;
        }
    }

    pub fn redo(&mut self) {
        if self.history.step_forward() {
            self.raster = self.history.current().clone();
            self.texture_dirty = true;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Draw an external image scaled to fill the surface exactly (each axis
    /// scaled independently), then commit a history entry. Used to seed the
    /// canvas with a generation result for iterative refinement.
    pub fn load_external(&mut self, source: &RgbaImage) {
        let scaled =
            image::imageops::resize(source, SURFACE_WIDTH, SURFACE_HEIGHT, FilterType::Triangle);
        // Keep the surface opaque even if the source carries alpha.
        self.raster = RgbaImage::from_pixel(SURFACE_WIDTH, SURFACE_HEIGHT, BACKGROUND);
        image::imageops::overlay(&mut self.raster, &scaled, 0, 0);
        self.history.commit(self.raster.clone());
        self.texture_dirty = true;
    }

    // --- Coordinates ------------------------------------------------------

    /// Rescale a pointer position from the displayed widget rect into raster
    /// space. The two scale factors are independent: the widget aspect may
    /// not match the raster aspect.
    pub fn map_display_point(&self, pos: egui::Pos2, display_rect: egui::Rect) -> (f32, f32) {
        let scale_x = self.raster.width() as f32 / display_rect.width().max(1.0);
        let scale_y = self.raster.height() as f32 / display_rect.height().max(1.0);
        (
            (pos.x - display_rect.min.x) * scale_x,
            (pos.y - display_rect.min.y) * scale_y,
        )
    }

    // --- Rendering --------------------------------------------------------

    /// Dense sub-pixel stepping along the segment, stamping a filled circle
    /// at each step — round caps and joins fall out of the stamping.
    fn draw_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let dx = to.0 - from.0;
        let dy = to.1 - from.1;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance < 0.1 {
            self.stamp(from);
            return;
        }

        let steps = distance.ceil() as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp((from.0 + dx * t, from.1 + dy * t));
        }
    }

    fn stamp(&mut self, center: (f32, f32)) {
        let (cx, cy) = center;
        let min_x = (cx - BRUSH_RADIUS).floor().max(0.0) as u32;
        let min_y = (cy - BRUSH_RADIUS).floor().max(0.0) as u32;
        let max_x = ((cx + BRUSH_RADIUS).ceil() as i64).clamp(0, self.raster.width() as i64) as u32;
        let max_y =
            ((cy + BRUSH_RADIUS).ceil() as i64).clamp(0, self.raster.height() as i64) as u32;

        for y in min_y..max_y {
            for x in min_x..max_x {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= BRUSH_RADIUS * BRUSH_RADIUS {
                    self.raster.put_pixel(x, y, BRUSH_COLOR);
                }
            }
        }
    }

    /// Upload the raster to the GPU when dirty and return the texture id for
    /// painting.
    pub fn texture_id(&mut self, ctx: &egui::Context) -> egui::TextureId {
        if self.texture_dirty || self.texture.is_none() {
            let size = [self.raster.width() as usize, self.raster.height() as usize];
            let color_image = ColorImage::from_rgba_unmultiplied(size, self.raster.as_raw());
            match &mut self.texture {
                Some(texture) => texture.set(color_image, TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ctx.load_texture("draw_surface", color_image, TextureOptions::LINEAR));
                }
            }
            self.texture_dirty = false;
        }
        match &self.texture {
            Some(texture) => texture.id(),
            None => egui::TextureId::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> RgbaImage {
        RgbaImage::from_pixel(SURFACE_WIDTH, SURFACE_HEIGHT, BACKGROUND)
    }

    fn draw_stroke(surface: &mut DrawSurface, from: (f32, f32), to: (f32, f32)) {
        surface.stroke_begin(from);
        surface.stroke_extend(to);
        surface.stroke_end();
    }

    #[test]
    fn undo_never_steps_below_first_snapshot() {
        let mut surface = DrawSurface::new();
        draw_stroke(&mut surface, (10.0, 10.0), (50.0, 50.0));
        for _ in 0..20 {
            surface.undo();
        }
        assert!(!surface.can_undo());
        assert_eq!(surface.raster().as_raw(), blank().as_raw());
    }

    #[test]
    fn redo_after_undo_restores_identical_raster() {
        let mut surface = DrawSurface::new();
        draw_stroke(&mut surface, (10.0, 10.0), (50.0, 50.0));
        let after_stroke = surface.raster().clone();

        surface.undo();
        assert_eq!(surface.raster().as_raw(), blank().as_raw());

        surface.redo();
        assert_eq!(surface.raster().as_raw(), after_stroke.as_raw());
    }

    #[test]
    fn commit_after_undo_discards_forward_snapshots() {
        let mut surface = DrawSurface::new();
        draw_stroke(&mut surface, (10.0, 10.0), (50.0, 50.0));
        draw_stroke(&mut surface, (100.0, 10.0), (150.0, 50.0));
        assert_eq!(surface.history().len(), 3);

        surface.undo();
        assert!(surface.can_redo());

        draw_stroke(&mut surface, (200.0, 10.0), (250.0, 50.0));
        // blank + first stroke + replacement stroke; the undone one is gone
        assert_eq!(surface.history().len(), 3);
        assert!(!surface.can_redo());

        let unchanged = surface.raster().clone();
        surface.redo();
        assert_eq!(surface.raster().as_raw(), unchanged.as_raw());
    }

    #[test]
    fn extend_without_begin_is_ignored() {
        let mut surface = DrawSurface::new();
        surface.stroke_extend((30.0, 30.0));
        surface.stroke_end();
        assert_eq!(surface.raster().as_raw(), blank().as_raw());
        assert_eq!(surface.history().len(), 1);
    }

    #[test]
    fn extend_after_end_is_ignored() {
        let mut surface = DrawSurface::new();
        draw_stroke(&mut surface, (10.0, 10.0), (50.0, 50.0));
        let committed = surface.raster().clone();
        surface.stroke_extend((300.0, 300.0));
        assert_eq!(surface.raster().as_raw(), committed.as_raw());
    }

    #[test]
    fn stroke_covers_the_drawn_segment() {
        let mut surface = DrawSurface::new();
        draw_stroke(&mut surface, (100.0, 100.0), (200.0, 100.0));
        assert_eq!(*surface.raster().get_pixel(150, 100), BRUSH_COLOR);
        // Well away from the line stays background.
        assert_eq!(*surface.raster().get_pixel(150, 300), BACKGROUND);
    }

    #[test]
    fn load_external_fills_surface_and_commits() {
        let mut surface = DrawSurface::new();
        let red = RgbaImage::from_pixel(10, 20, Rgba([255, 0, 0, 255]));
        surface.load_external(&red);
        assert_eq!(surface.width(), SURFACE_WIDTH);
        assert_eq!(surface.height(), SURFACE_HEIGHT);
        assert_eq!(surface.history().len(), 2);
        assert_eq!(*surface.raster().get_pixel(480, 270), Rgba([255, 0, 0, 255]));

        surface.undo();
        assert_eq!(surface.raster().as_raw(), blank().as_raw());
    }

    #[test]
    fn display_points_rescale_per_axis() {
        let surface = DrawSurface::new();
        // Displayed at half width and a quarter height.
        let rect = egui::Rect::from_min_size(
            egui::pos2(100.0, 50.0),
            egui::vec2(SURFACE_WIDTH as f32 / 2.0, SURFACE_HEIGHT as f32 / 4.0),
        );
        let (x, y) = surface.map_display_point(egui::pos2(100.0 + 240.0, 50.0 + 67.5), rect);
        assert!((x - 480.0).abs() < 1e-3);
        assert!((y - 270.0).abs() < 1e-3);
    }

    #[test]
    fn reset_restarts_history() {
        let mut surface = DrawSurface::new();
        draw_stroke(&mut surface, (10.0, 10.0), (50.0, 50.0));
        surface.reset();
        assert_eq!(surface.history().len(), 1);
        assert!(!surface.can_undo() && !surface.can_redo());
        assert_eq!(surface.raster().as_raw(), blank().as_raw());
    }
}
