#![allow(dead_code)] // API surface kept for the session/canvas modules' full contracts

mod app;
mod canvas;
mod cli;
mod codec;
mod components;
mod generate;
pub mod logger;
mod session;
mod sources;
mod theme;

use app::StudioApp;
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ------------------------------------------------
    // Routed before any window or logger setup so scripted use stays quiet.
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        std::process::exit(cli::run(args));
    }

    // -- GUI mode -------------------------------------------------------------

    // Initialize session log (overwrites the previous session's log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("ImageStudio"),
        ..Default::default()
    };

    eframe::run_native(
        "ImageStudio",
        options,
        Box::new(|cc| Box::new(StudioApp::new(cc))),
    )
}
