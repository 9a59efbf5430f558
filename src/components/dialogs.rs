// ============================================================================
// MODAL DIALOGS — request failures and credential entry
// ============================================================================
//
// Both dialogs follow the same shape: a centered, title-bar-less
// `egui::Window` with keyboard handling (Esc dismisses, Enter confirms)
// consumed before layout so no widget underneath reacts to the same press.

use eframe::egui;

// ============================================================================
// REQUEST FAILED
// ============================================================================

/// Dismissible modal for transport errors and soft failures. Showing a new
/// message replaces the previous one.
#[derive(Default)]
pub struct ErrorDialog {
    pub open: bool,
    message: String,
}

impl ErrorDialog {
    pub fn show_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.open = true;
    }

    pub fn ui(&mut self, ctx: &egui::Context) {
        if !self.open {
            return;
        }

        let esc = ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Escape));
        if esc {
            self.open = false;
            return;
        }

        let mut close = false;
        egui::Window::new("request_failed_dialog")
            .title_bar(false)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_min_width(320.0);
                ui.set_max_width(420.0);

                ui.horizontal(|ui| {
                    ui.strong("REQUEST FAILED");
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("\u{2715}").clicked() {
                            close = true;
                        }
                    });
                });
                ui.separator();
                ui.add_space(4.0);
                ui.label(&self.message);
                ui.add_space(8.0);
                if ui.button("Dismiss").clicked() {
                    close = true;
                }
            });

        if close {
            self.open = false;
        }
    }
}

// ============================================================================
// API KEY ENTRY
// ============================================================================

pub enum ApiKeyAction {
    None,
    /// The user entered a key. When `resume_pending` was set, the suspended
    /// submission should be retried now.
    Submitted(String),
    Cancelled,
}

#[derive(Default)]
pub struct ApiKeyDialog {
    pub open: bool,
    buffer: String,
    /// Set when a submission was suspended waiting for the credential.
    pub resume_pending: bool,
}

impl ApiKeyDialog {
    /// Open the dialog. `resume` marks that a submission is waiting on the
    /// key and should fire once it is entered.
    pub fn request(&mut self, resume: bool) {
        self.open = true;
        self.resume_pending = resume;
    }

    pub fn ui(&mut self, ctx: &egui::Context) -> ApiKeyAction {
        if !self.open {
            return ApiKeyAction::None;
        }

        let enter = ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Enter));
        let esc = ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Escape));

        let mut action = ApiKeyAction::None;
        let mut submit = enter;
        let mut close = esc;

        egui::Window::new("api_key_dialog")
            .title_bar(false)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_min_width(360.0);

                ui.horizontal(|ui| {
                    ui.strong("Add Your API Key");
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("\u{2715}").clicked() {
                            close = true;
                        }
                    });
                });
                ui.separator();
                ui.add_space(4.0);
                ui.label(
                    "Your API key is only held in memory for this session and is \
                     gone when the application exits. It is never written to disk.",
                );
                ui.add_space(6.0);

                let field = ui.add(
                    egui::TextEdit::singleline(&mut self.buffer)
                        .password(true)
                        .hint_text("Enter your API key")
                        .desired_width(f32::INFINITY),
                );
                if !field.has_focus() && self.buffer.is_empty() {
                    field.request_focus();
                }

                ui.add_space(6.0);
                if ui.button("Submit & Run").clicked() {
                    submit = true;
                }
            });

        if submit {
            let key = self.buffer.trim().to_string();
            if key.is_empty() {
                // Keep the dialog up until something is entered.
                return ApiKeyAction::None;
            }
            self.buffer.clear();
            self.open = false;
            return ApiKeyAction::Submitted(key);
        }
        if close {
            self.buffer.clear();
            self.open = false;
            self.resume_pending = false;
            action = ApiKeyAction::Cancelled;
        }
        action
    }
}
