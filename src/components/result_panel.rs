// ============================================================================
// RESULT PANEL — showcase for the latest generation
// ============================================================================

use eframe::egui;
use egui::{Color32, ColorImage, TextureHandle, TextureOptions};

use crate::codec::{self, OutputFormat};
use crate::session::{Mode, SessionState};
use crate::{log_err, log_info};

pub struct ResultPanel {
    /// One entry per result image; `None` when a payload failed to decode.
    textures: Vec<Option<TextureHandle>>,
    /// Matches `SessionState::results_revision` when `textures` is current.
    cached_revision: u64,
}

impl Default for ResultPanel {
    fn default() -> Self {
        Self {
            textures: Vec::new(),
            cached_revision: u64::MAX,
        }
    }
}

impl ResultPanel {
    pub fn ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, session: &mut SessionState) {
        if session.is_submitting() {
            ui.vertical_centered(|ui| {
                ui.add_space(80.0);
                ui.spinner();
                ui.add_space(8.0);
                ui.label(progress_text(session));
            });
            return;
        }

        self.ensure_textures(ctx, session);

        if session.results.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(80.0);
                ui.label(match session.mode {
                    Mode::DrawToImage => "Start drawing and see your ideas come to life",
                    _ => "Your result will appear here",
                });
            });
            return;
        }

        // --- Selected image ------------------------------------------------
        match self.textures.get(session.selected_result) {
            Some(Some(texture)) => {
                let tex_size = texture.size_vec2();
                let max_w = ui.available_width().max(64.0);
                let max_h = 420.0_f32;
                let scale = (max_w / tex_size.x).min(max_h / tex_size.y);
                let size = tex_size * scale;

                let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());
                ui.painter().image(
                    texture.id(),
                    rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            _ => {
                ui.colored_label(
                    ui.visuals().error_fg_color,
                    "This result could not be displayed.",
                );
            }
        }

        ui.add_space(6.0);
        if ui
            .button(format!(
                "\u{2B07} Download {}",
                session.output_format.label()
            ))
            .clicked()
        {
            download_selected(session);
        }

        // --- Thumbnail strip ----------------------------------------------
        if session.results.len() > 1 {
            ui.add_space(6.0);
            let mut select = None;
            ui.horizontal_wrapped(|ui| {
                for (idx, slot) in self.textures.iter().enumerate() {
                    let Some(texture) = slot else { continue };
                    let tex_size = texture.size_vec2();
                    let thumb_h = 64.0;
                    let size = egui::vec2(tex_size.x / tex_size.y * thumb_h, thumb_h);
                    let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click());
                    ui.painter().image(
                        texture.id(),
                        rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        Color32::WHITE,
                    );
                    if idx == session.selected_result {
                        ui.painter().rect_stroke(
                            rect,
                            2.0,
                            egui::Stroke::new(2.0, ui.visuals().selection.bg_fill),
                        );
                    }
                    if response.clicked() {
                        select = Some(idx);
                    }
                }
            });
            if let Some(idx) = select {
                session.select_result(idx);
            }
        }
    }

    /// Rebuild the texture set when the result list was replaced.
    fn ensure_textures(&mut self, ctx: &egui::Context, session: &SessionState) {
        if self.cached_revision == session.results_revision {
            return;
        }
        self.cached_revision = session.results_revision;
        self.textures = session
            .results
            .iter()
            .enumerate()
            .map(|(idx, image)| match image.decode() {
                Ok(raster) => {
                    let size = [raster.width() as usize, raster.height() as usize];
                    let color_image = ColorImage::from_rgba_unmultiplied(size, raster.as_raw());
                    Some(ctx.load_texture(
                        format!("result_{}_{}", session.results_revision, idx),
                        color_image,
                        TextureOptions::LINEAR,
                    ))
                }
                Err(e) => {
                    log_err!("Result image {} failed to decode: {}", idx, e);
                    None
                }
            })
            .collect();
    }
}

fn progress_text(session: &SessionState) -> String {
    match session.mode {
        Mode::ImageToImage | Mode::DrawToImage => "Processing your image...".to_string(),
        Mode::TextToImage => format!("Generating {} image(s)...", session.image_count),
    }
}

/// Re-encode the displayed result to the selected format and save it. A
/// conversion failure is surfaced inline and nothing is written.
fn download_selected(session: &mut SessionState) {
    let Some(image) = session.selected_image() else {
        return;
    };

    let converted = match codec::reencode(image, session.output_format) {
        Ok(converted) => converted,
        Err(e) => {
            session.inline_error = Some(e.to_string());
            return;
        }
    };

    let format = session.output_format;
    let default_name = format!("imagestudio-image.{}", format.extension());
    let extensions: &[&str] = match format {
        OutputFormat::Png => &["png"],
        OutputFormat::Jpeg => &["jpeg", "jpg"],
    };
    let Some(path) = rfd::FileDialog::new()
        .set_file_name(&default_name)
        .add_filter(format.label(), extensions)
        .save_file()
    else {
        return;
    };

    match std::fs::write(&path, &converted.bytes) {
        Ok(()) => {
            log_info!("Saved result to {}", path.display());
        }
        Err(e) => {
            session.inline_error = Some(format!("Failed to save image: {}", e));
        }
    }
}
