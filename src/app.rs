use crate::canvas::DrawSurface;
use crate::codec::OutputFormat;
use crate::components::dialogs::{ApiKeyAction, ApiKeyDialog, ErrorDialog};
use crate::components::result_panel::ResultPanel;
use crate::generate::{self, GenerateError, GenerationOutcome, GenerationRequest};
use crate::session::{ASPECT_RATIOS, MAX_IMAGE_COUNT, MIN_IMAGE_COUNT, Mode, SessionState};
use crate::sources::{self, SourceImage};
use crate::theme::Theme;
use crate::{log_err, log_info, log_warn};
use eframe::egui;
use egui::{Color32, ColorImage, TextureOptions};
use std::path::PathBuf;
use std::sync::mpsc;

// ============================================================================
// ASYNC PIPELINES — background work joined via channels polled per frame
// ============================================================================

/// Result delivered from a background file-decode thread. A batch either
/// decodes completely or fails as a whole.
enum DecodeResult {
    Loaded(Vec<SourceImage>),
    Failed(String),
}

type GenerationReport = Result<GenerationOutcome, GenerateError>;

// ============================================================================
// APPLICATION
// ============================================================================

pub struct StudioApp {
    session: SessionState,
    surface: DrawSurface,
    theme: Theme,

    // Modal dialogs (at most one open at a time in practice)
    error_dialog: ErrorDialog,
    api_key_dialog: ApiKeyDialog,

    // Result display
    result_panel: ResultPanel,

    // Async file-decode pipeline
    decode_sender: mpsc::Sender<DecodeResult>,
    decode_receiver: mpsc::Receiver<DecodeResult>,
    /// When > 0, a decode batch is in progress; keep repainting.
    pending_decodes: usize,

    // Async generation pipeline (the single in-flight slot lives in
    // `session.phase`; this is just the transport back to the GUI thread)
    generation_sender: mpsc::Sender<GenerationReport>,
    generation_receiver: mpsc::Receiver<GenerationReport>,
}

impl StudioApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let (decode_sender, decode_receiver) = mpsc::channel();
        let (generation_sender, generation_receiver) = mpsc::channel();
        Self {
            session: SessionState::default(),
            surface: DrawSurface::new(),
            theme: Theme::default(),
            error_dialog: ErrorDialog::default(),
            api_key_dialog: ApiKeyDialog::default(),
            result_panel: ResultPanel::default(),
            decode_sender,
            decode_receiver,
            pending_decodes: 0,
            generation_sender,
            generation_receiver,
        }
    }

    // --- Mode & input transitions ----------------------------------------

    fn change_mode(&mut self, new_mode: Mode) {
        if self.session.switch_mode(new_mode) {
            if new_mode == Mode::DrawToImage {
                self.surface.reset();
            }
            log_info!("Mode switched to {}", new_mode.label());
        }
    }

    fn clear_inputs(&mut self) {
        self.session.clear();
        self.error_dialog.open = false;
        if self.session.mode == Mode::DrawToImage {
            self.surface.reset();
        }
    }

    /// Route a set of candidate files into the collector: filter by declared
    /// type, then decode the survivors on a worker thread. An empty filtered
    /// set changes nothing.
    fn accept_files(&mut self, files: Vec<PathBuf>) {
        let filtered = sources::filter_image_files(files);
        if filtered.is_empty() {
            return;
        }
        log_info!("Decoding {} source file(s)", filtered.len());
        self.pending_decodes += 1;
        let sender = self.decode_sender.clone();
        std::thread::spawn(move || {
            let result = match sources::decode_batch(&filtered) {
                Ok(batch) => DecodeResult::Loaded(batch),
                Err(e) => DecodeResult::Failed(e.to_string()),
            };
            let _ = sender.send(result);
        });
    }

    fn pick_source_files(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp", "gif"])
            .pick_files();
        if let Some(files) = picked {
            self.accept_files(files);
        }
    }

    fn paste_source_image(&mut self) {
        match sources::from_clipboard() {
            Ok(source) => {
                self.session.sources.push(source);
                self.session.take_results();
                self.session.inline_error = None;
                log_info!("Added source image from clipboard");
            }
            Err(e) => {
                self.session.inline_error = Some(e);
            }
        }
    }

    // --- Submission -------------------------------------------------------

    fn try_submit(&mut self) {
        // No credential: suspend the submission and ask for one. The dialog
        // resumes the submission once a key is entered.
        let Some(api_key) = self.session.api_key.clone() else {
            self.api_key_dialog.request(true);
            return;
        };

        if let Err(e) = self.session.validate() {
            self.session.inline_error = Some(e.to_string());
            return;
        }

        // Build the request before claiming the in-flight slot so a canvas
        // encode failure leaves the session Idle.
        let request = match self.build_request() {
            Ok(request) => request,
            Err(message) => {
                self.session.inline_error = Some(message);
                return;
            }
        };

        // Single in-flight slot: a second submission is dropped, not queued.
        if !self.session.begin_submission() {
            return;
        }

        log_info!("Submitting {} request", self.session.mode.label());
        generate::spawn_worker(request, api_key, self.generation_sender.clone());
    }

    fn build_request(&self) -> Result<GenerationRequest, String> {
        let prompt = self.session.prompt.trim().to_string();
        match self.session.mode {
            Mode::TextToImage => Ok(GenerationRequest::Batch {
                prompt,
                count: self.session.image_count,
                aspect_ratio: self.session.aspect_ratio.clone(),
                output_format: self.session.output_format,
            }),
            Mode::ImageToImage => Ok(GenerationRequest::Edit {
                prompt,
                images: self.session.sources.payloads(),
            }),
            Mode::DrawToImage => {
                let canvas = self.surface.png_payload().map_err(|e| e.to_string())?;
                Ok(GenerationRequest::Edit {
                    prompt,
                    images: vec![canvas],
                })
            }
        }
    }

    // --- Channel polling ---------------------------------------------------

    fn poll_decode_results(&mut self) {
        while let Ok(result) = self.decode_receiver.try_recv() {
            self.pending_decodes = self.pending_decodes.saturating_sub(1);
            match result {
                DecodeResult::Loaded(batch) => {
                    log_info!("Accepted {} source image(s)", batch.len());
                    self.session.sources.append_batch(batch);
                    // New input invalidates the displayed output.
                    self.session.take_results();
                    self.session.inline_error = None;
                }
                DecodeResult::Failed(message) => {
                    log_err!("Source decode failed: {}", message);
                    self.error_dialog.show_message(message);
                }
            }
        }
    }

    fn poll_generation_results(&mut self) {
        while let Ok(report) = self.generation_receiver.try_recv() {
            // A mode switch or clear while the call was in flight reset the
            // phase; such a report is stale and is discarded.
            if !self.session.is_submitting() {
                log_warn!("Discarding generation report from a superseded submission");
                continue;
            }
            match report {
                Ok(GenerationOutcome::Images(images)) => {
                    log_info!("Generation succeeded: {} image(s)", images.len());
                    // Seed the canvas with the result so the drawing can be
                    // refined iteratively.
                    if self.session.mode == Mode::DrawToImage
                        && let Some(first) = images.first()
                        && let Ok(raster) = first.decode()
                    {
                        self.surface.load_external(&raster);
                    }
                    self.session.install_results(images);
                }
                Ok(GenerationOutcome::NoImage { explanation }) => {
                    self.session.fail_submission();
                    let message = explanation.unwrap_or_else(|| {
                        "The model did not return an image. Please try a different prompt."
                            .to_string()
                    });
                    log_warn!("Soft failure: {}", message);
                    self.error_dialog.show_message(message);
                }
                Err(e) => {
                    self.session.fail_submission();
                    log_err!("Generation failed: {}", e);
                    self.error_dialog.show_message(e.to_string());
                }
            }
        }
    }

    // --- Input card ---------------------------------------------------------

    fn input_card(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            ui.strong("INPUT");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let mut selected = self.session.mode;
                egui::ComboBox::from_id_source("mode_combo")
                    .selected_text(selected.label())
                    .show_ui(ui, |ui| {
                        for mode in Mode::ALL {
                            ui.selectable_value(&mut selected, mode, mode.label());
                        }
                    });
                if selected != self.session.mode {
                    self.change_mode(selected);
                }
            });
        });
        ui.separator();

        match self.session.mode {
            Mode::ImageToImage => self.uploader_ui(ui, ctx),
            Mode::DrawToImage => self.canvas_ui(ui, ctx),
            Mode::TextToImage => {}
        }

        // --- Prompt ---
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label("Prompt");
            let model = match self.session.mode {
                Mode::TextToImage => generate::BATCH_MODEL,
                _ => generate::EDIT_MODEL,
            };
            ui.small("\u{2139}")
                .on_hover_text(format!("Model for this mode: {}", model));
        });
        ui.add(
            egui::TextEdit::multiline(&mut self.session.prompt)
                .hint_text(self.session.mode.prompt_hint())
                .desired_rows(3)
                .desired_width(f32::INFINITY),
        );

        // --- Advanced settings ---
        ui.add_space(4.0);
        egui::CollapsingHeader::new("Advanced Settings")
            .default_open(true)
            .show(ui, |ui| {
                if self.session.mode == Mode::TextToImage {
                    ui.add(
                        egui::Slider::new(
                            &mut self.session.image_count,
                            MIN_IMAGE_COUNT..=MAX_IMAGE_COUNT,
                        )
                        .text("Number of Images"),
                    );
                    egui::ComboBox::from_id_source("aspect_ratio_combo")
                        .selected_text(self.session.aspect_ratio.clone())
                        .show_ui(ui, |ui| {
                            for ratio in ASPECT_RATIOS {
                                ui.selectable_value(
                                    &mut self.session.aspect_ratio,
                                    ratio.to_string(),
                                    ratio,
                                );
                            }
                        });
                }
                egui::ComboBox::from_id_source("download_format_combo")
                    .selected_text(self.session.output_format.label())
                    .show_ui(ui, |ui| {
                        for format in [OutputFormat::Png, OutputFormat::Jpeg] {
                            ui.selectable_value(
                                &mut self.session.output_format,
                                format,
                                format.label(),
                            );
                        }
                    });
            });

        // --- Inline errors (validation / conversion) ---
        if let Some(message) = &self.session.inline_error {
            ui.add_space(4.0);
            ui.colored_label(ui.visuals().error_fg_color, message);
        }

        // --- Actions ---
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            let submitting = self.session.is_submitting();
            let label = if submitting {
                self.session.mode.working_label()
            } else {
                self.session.mode.submit_label()
            };
            let submit = ui.add_enabled(!submitting, egui::Button::new(label));
            if submitting {
                ui.spinner();
            }
            if submit.clicked() {
                self.try_submit();
            }
            if ui
                .button("\u{1F5D1}")
                .on_hover_text("Clear inputs")
                .clicked()
            {
                self.clear_inputs();
            }
        });
    }

    fn uploader_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.label("Source Image(s)");

        // Lazy preview uploads for newly accepted images.
        for source in self.session.sources.iter_mut() {
            if source.texture.is_none() {
                let size = [
                    source.raster.width() as usize,
                    source.raster.height() as usize,
                ];
                let color_image = ColorImage::from_rgba_unmultiplied(size, source.raster.as_raw());
                source.texture =
                    Some(ctx.load_texture("source_image", color_image, TextureOptions::LINEAR));
            }
        }

        let mut remove_index = None;
        let mut pick = false;
        let mut paste = false;

        let frame = egui::Frame::group(ui.style());
        frame.show(ui, |ui| {
            if self.session.sources.is_empty() {
                ui.vertical_centered(|ui| {
                    ui.add_space(18.0);
                    if ui.button("\u{1F4C2} Click or Drag & Drop").clicked() {
                        pick = true;
                    }
                    ui.small("Only image files are accepted");
                    ui.add_space(18.0);
                });
            } else {
                ui.horizontal_wrapped(|ui| {
                    for (idx, source) in self.session.sources.iter().enumerate() {
                        let Some(texture) = &source.texture else {
                            continue;
                        };
                        let (rect, _response) = ui
                            .allocate_exact_size(egui::vec2(72.0, 72.0), egui::Sense::hover());
                        ui.painter().image(
                            texture.id(),
                            rect,
                            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                            Color32::WHITE,
                        );
                        let button_rect = egui::Rect::from_min_size(
                            egui::pos2(rect.max.x - 18.0, rect.min.y + 2.0),
                            egui::vec2(16.0, 16.0),
                        );
                        if ui
                            .put(button_rect, egui::Button::new("\u{2715}").small())
                            .on_hover_text("Remove image")
                            .clicked()
                        {
                            remove_index = Some(idx);
                        }
                    }
                    if ui.button("+ Add").clicked() {
                        pick = true;
                    }
                });
            }
            ui.horizontal(|ui| {
                if ui
                    .button("\u{1F4CB} Paste")
                    .on_hover_text("Add an image from the clipboard")
                    .clicked()
                {
                    paste = true;
                }
            });
        });

        if let Some(idx) = remove_index {
            self.session.sources.remove(idx);
        }
        if pick {
            self.pick_source_files();
        }
        if paste {
            self.paste_source_image();
        }
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.label("Canvas");

        // Display at the available width, preserving the raster aspect; the
        // raster resolution stays fixed and input is rescaled per axis.
        let display_width = ui.available_width().max(64.0);
        let aspect = self.surface.height() as f32 / self.surface.width() as f32;
        let display_size = egui::vec2(display_width, display_width * aspect);

        let (rect, response) =
            ui.allocate_exact_size(display_size, egui::Sense::click_and_drag());
        let texture_id = self.surface.texture_id(ctx);
        ui.painter().image(
            texture_id,
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            Color32::WHITE,
        );
        ui.painter()
            .rect_stroke(rect, 2.0, ui.visuals().widgets.noninteractive.bg_stroke);

        if let Some(pos) = response.interact_pointer_pos() {
            let point = self.surface.map_display_point(pos, rect);
            if response.drag_started() {
                self.surface.stroke_begin(point);
            } else if response.dragged() {
                self.surface.stroke_extend(point);
            }
        }
        if response.drag_released() {
            self.surface.stroke_end();
        }
        // A plain click paints a single dot.
        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            let point = self.surface.map_display_point(pos, rect);
            self.surface.stroke_begin(point);
            self.surface.stroke_end();
        }

        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.surface.can_undo(), egui::Button::new("\u{27F2} Undo"))
                .clicked()
            {
                self.surface.undo();
            }
            if ui
                .add_enabled(self.surface.can_redo(), egui::Button::new("\u{27F3} Redo"))
                .clicked()
            {
                self.surface.redo();
            }
        });
    }
}

// ============================================================================
// UPDATE LOOP
// ============================================================================

impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Sync visuals + OS chrome with the theme ---
        self.theme.apply(ctx);

        // --- Poll async completions first so this frame renders fresh state ---
        self.poll_decode_results();
        self.poll_generation_results();
        if self.pending_decodes > 0 || self.session.is_submitting() {
            ctx.request_repaint();
        }

        let modal_open = self.error_dialog.open || self.api_key_dialog.open;

        // --- Drag-and-drop: add files to the uploader in edit mode ---
        if self.session.mode == Mode::ImageToImage && !modal_open {
            let dropped: Vec<egui::DroppedFile> = ctx.input(|i| i.raw.dropped_files.clone());
            if !dropped.is_empty() {
                let paths: Vec<PathBuf> = dropped.into_iter().filter_map(|f| f.path).collect();
                self.accept_files(paths);
            }
        }

        // --- Canvas history shortcuts ---
        if self.session.mode == Mode::DrawToImage && !modal_open {
            let undo = ctx.input_mut(|i| i.consume_key(egui::Modifiers::CTRL, egui::Key::Z));
            let redo = ctx.input_mut(|i| {
                i.consume_key(egui::Modifiers::CTRL, egui::Key::Y)
                    || i.consume_key(egui::Modifiers::CTRL | egui::Modifiers::SHIFT, egui::Key::Z)
            });
            if undo {
                self.surface.undo();
            }
            if redo {
                self.surface.redo();
            }
        }

        // --- Header ---
        egui::TopBottomPanel::top("app_header").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.heading("ImageStudio");
                    ui.small("Generative image creation and editing");
                });
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .button(self.theme.toggle_glyph())
                        .on_hover_text("Toggle theme")
                        .clicked()
                    {
                        self.theme.toggle();
                    }
                });
            });
            ui.add_space(4.0);
        });

        // --- Input and result cards side by side ---
        let card_frame = egui::Frame::group(&ctx.style());
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                card_frame.show(&mut columns[0], |ui| {
                    self.input_card(ui, ctx);
                });
                card_frame.show(&mut columns[1], |ui| {
                    ui.strong("RESULT");
                    ui.separator();
                    self.result_panel.ui(ui, ctx, &mut self.session);
                });
            });
        });

        // --- Modals last so they draw on top ---
        self.error_dialog.ui(ctx);
        match self.api_key_dialog.ui(ctx) {
            ApiKeyAction::Submitted(key) => {
                self.session.set_credential(key);
                log_info!("Credential stored for this session");
                if self.api_key_dialog.resume_pending {
                    self.api_key_dialog.resume_pending = false;
                    self.try_submit();
                }
            }
            ApiKeyAction::Cancelled | ApiKeyAction::None => {}
        }
    }
}
