pub mod dialogs;
pub mod result_panel;
