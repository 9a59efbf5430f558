// ============================================================================
// SESSION STATE — the single explicit state struct behind the UI
// ============================================================================
//
// All mode-dependent state lives here, and every reset rule is a named
// transition (`switch_mode`, `clear`, `begin_submission`, ...) rather than
// scattered assignments. The app struct owns exactly one of these per
// process; nothing is shared across sessions and nothing is persisted.

use crate::codec::{EncodedImage, OutputFormat};
use crate::sources::SourceCollector;

/// The active generation workflow. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    TextToImage,
    ImageToImage,
    DrawToImage,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::TextToImage, Mode::ImageToImage, Mode::DrawToImage];

    pub fn label(&self) -> &'static str {
        match self {
            Mode::TextToImage => "Text-to-Image",
            Mode::ImageToImage => "Image-to-Image",
            Mode::DrawToImage => "Draw-to-Image",
        }
    }

    pub fn prompt_hint(&self) -> &'static str {
        match self {
            Mode::TextToImage => "A photorealistic cat astronaut on Mars...",
            Mode::ImageToImage => "Describe how to edit the image(s)...",
            Mode::DrawToImage => "Describe the image you want to create from your drawing...",
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match self {
            Mode::TextToImage => "Generate Image",
            Mode::ImageToImage => "Edit Image",
            Mode::DrawToImage => "Generate from Drawing",
        }
    }

    pub fn working_label(&self) -> &'static str {
        match self {
            Mode::ImageToImage => "Editing...",
            _ => "Generating...",
        }
    }
}

/// Aspect ratios accepted by the batch generation call.
pub const ASPECT_RATIOS: [&str; 5] = ["1:1", "16:9", "9:16", "4:3", "3:4"];
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

pub const MIN_IMAGE_COUNT: u32 = 1;
pub const MAX_IMAGE_COUNT: u32 = 4;

/// Submission lifecycle. Re-entered fresh on every submission; `Submitting`
/// is the single in-flight slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RequestPhase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Input problems caught before any network call.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    EmptyPrompt,
    NoSourceImages,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyPrompt => write!(f, "Please enter a prompt to continue."),
            ValidationError::NoSourceImages => {
                write!(f, "Please upload at least one source image for editing.")
            }
        }
    }
}

pub struct SessionState {
    pub mode: Mode,
    pub prompt: String,
    pub sources: SourceCollector,

    /// Last successful generation, wholesale-replaced on success.
    pub results: Vec<EncodedImage>,
    pub selected_result: usize,
    /// Bumped whenever `results` is replaced or cleared; display caches key
    /// off this.
    pub results_revision: u64,

    pub phase: RequestPhase,
    /// Validation / conversion errors shown inline under the form.
    pub inline_error: Option<String>,

    pub aspect_ratio: String,
    pub output_format: OutputFormat,
    pub image_count: u32,

    /// Bearer credential for the generation service. Process memory only —
    /// never written to disk, gone on restart.
    pub api_key: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            prompt: String::new(),
            sources: SourceCollector::default(),
            results: Vec::new(),
            selected_result: 0,
            results_revision: 0,
            phase: RequestPhase::Idle,
            inline_error: None,
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            output_format: OutputFormat::Png,
            image_count: MIN_IMAGE_COUNT,
            api_key: None,
        }
    }
}

impl SessionState {
    /// Switch the active mode, resetting all mode-dependent state. Returns
    /// false (and changes nothing) when the mode is already active.
    pub fn switch_mode(&mut self, new_mode: Mode) -> bool {
        if self.mode == new_mode {
            return false;
        }
        self.mode = new_mode;
        self.prompt.clear();
        self.sources.clear();
        self.take_results();
        self.image_count = MIN_IMAGE_COUNT;
        self.inline_error = None;
        self.phase = RequestPhase::Idle;
        true
    }

    /// The explicit clear action: inputs, outputs, and advanced settings all
    /// return to their initial values. The active mode is kept.
    pub fn clear(&mut self) {
        self.prompt.clear();
        self.sources.clear();
        self.take_results();
        self.inline_error = None;
        self.aspect_ratio = DEFAULT_ASPECT_RATIO.to_string();
        self.output_format = OutputFormat::Png;
        self.image_count = MIN_IMAGE_COUNT;
        self.phase = RequestPhase::Idle;
    }

    /// Entry guard for a submission. Checked before any network work.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if self.mode == Mode::ImageToImage && self.sources.is_empty() {
            return Err(ValidationError::NoSourceImages);
        }
        Ok(())
    }

    /// Claim the single in-flight slot. Returns false when a submission is
    /// already pending — the new attempt is dropped, not queued. On success
    /// the stale result list is cleared for the fresh run.
    pub fn begin_submission(&mut self) -> bool {
        if self.phase == RequestPhase::Submitting {
            return false;
        }
        self.phase = RequestPhase::Submitting;
        self.take_results();
        self.inline_error = None;
        true
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == RequestPhase::Submitting
    }

    /// Wholesale result replacement; selection returns to the first image.
    pub fn install_results(&mut self, results: Vec<EncodedImage>) {
        self.results = results;
        self.selected_result = 0;
        self.results_revision += 1;
        self.phase = RequestPhase::Succeeded;
    }

    pub fn fail_submission(&mut self) {
        self.phase = RequestPhase::Failed;
    }

    /// Drop the displayed results (new input invalidates stale output).
    pub fn take_results(&mut self) {
        if !self.results.is_empty() || self.selected_result != 0 {
            self.results_revision += 1;
        }
        self.results.clear();
        self.selected_result = 0;
    }

    pub fn select_result(&mut self, index: usize) {
        if index < self.results.len() {
            self.selected_result = index;
        }
    }

    pub fn selected_image(&self) -> Option<&EncodedImage> {
        self.results.get(self.selected_result)
    }

    pub fn set_credential(&mut self, key: String) {
        self.api_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_image() -> EncodedImage {
        EncodedImage::with_mime(vec![1, 2, 3], "image/png".to_string())
    }

    #[test]
    fn edit_mode_without_sources_fails_validation() {
        let mut session = SessionState::default();
        session.switch_mode(Mode::ImageToImage);
        session.prompt = "make it blue".to_string();
        assert_eq!(session.validate(), Err(ValidationError::NoSourceImages));
        // The guard fires before any submission state change.
        assert_eq!(session.phase, RequestPhase::Idle);
    }

    #[test]
    fn empty_prompt_fails_validation_in_every_mode() {
        let mut session = SessionState::default();
        for mode in Mode::ALL {
            session.switch_mode(mode);
            session.prompt = "   ".to_string();
            assert_eq!(session.validate(), Err(ValidationError::EmptyPrompt));
        }
    }

    #[test]
    fn second_submission_while_pending_is_dropped() {
        let mut session = SessionState::default();
        session.prompt = "a cat".to_string();
        assert!(session.begin_submission());
        assert!(!session.begin_submission());
        assert_eq!(session.phase, RequestPhase::Submitting);

        session.install_results(vec![dummy_image()]);
        assert!(session.begin_submission());
    }

    #[test]
    fn mode_change_resets_dependent_state() {
        let mut session = SessionState::default();
        session.prompt = "a dog".to_string();
        session.image_count = 3;
        session.install_results(vec![dummy_image(), dummy_image()]);
        session.select_result(1);

        assert!(session.switch_mode(Mode::DrawToImage));
        assert!(session.prompt.is_empty());
        assert!(session.results.is_empty());
        assert_eq!(session.selected_result, 0);
        assert_eq!(session.image_count, MIN_IMAGE_COUNT);

        // Re-selecting the active mode changes nothing.
        session.prompt = "kept".to_string();
        assert!(!session.switch_mode(Mode::DrawToImage));
        assert_eq!(session.prompt, "kept");
    }

    #[test]
    fn install_results_replaces_wholesale_and_selects_first() {
        let mut session = SessionState::default();
        session.install_results(vec![dummy_image(); 4]);
        session.select_result(3);

        session.install_results(vec![dummy_image()]);
        assert_eq!(session.results.len(), 1);
        assert_eq!(session.selected_result, 0);
        assert_eq!(session.phase, RequestPhase::Succeeded);
    }

    #[test]
    fn select_result_ignores_out_of_range() {
        let mut session = SessionState::default();
        session.install_results(vec![dummy_image(), dummy_image()]);
        session.select_result(7);
        assert_eq!(session.selected_result, 0);
    }

    #[test]
    fn clear_restores_advanced_settings() {
        let mut session = SessionState::default();
        session.prompt = "something".to_string();
        session.aspect_ratio = "16:9".to_string();
        session.output_format = OutputFormat::Jpeg;
        session.image_count = 4;

        session.clear();
        assert!(session.prompt.is_empty());
        assert_eq!(session.aspect_ratio, DEFAULT_ASPECT_RATIO);
        assert_eq!(session.output_format, OutputFormat::Png);
        assert_eq!(session.image_count, MIN_IMAGE_COUNT);
    }
}
