// ============================================================================
// THEME — light/dark visuals for the whole window
// ============================================================================

use eframe::egui;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

pub struct Theme {
    pub mode: ThemeMode,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Light,
        }
    }
}

impl Theme {
    pub fn is_dark(&self) -> bool {
        self.mode == ThemeMode::Dark
    }

    pub fn toggle(&mut self) {
        self.mode = match self.mode {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        };
    }

    /// Button glyph for switching to the other theme.
    pub fn toggle_glyph(&self) -> &'static str {
        match self.mode {
            ThemeMode::Light => "\u{1F319}", // moon
            ThemeMode::Dark => "\u{2600}",   // sun
        }
    }

    /// Apply the visuals and keep the OS window chrome in sync. Called every
    /// frame so theme changes from any widget take effect immediately.
    pub fn apply(&self, ctx: &egui::Context) {
        let mut visuals = match self.mode {
            ThemeMode::Light => egui::Visuals::light(),
            ThemeMode::Dark => egui::Visuals::dark(),
        };
        visuals.window_rounding = egui::Rounding::same(6.0);
        ctx.set_visuals(visuals);

        let system_theme = if self.is_dark() {
            egui::SystemTheme::Dark
        } else {
            egui::SystemTheme::Light
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::SetTheme(system_theme));
    }
}
