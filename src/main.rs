use midikeys::{KeyboardApp, Settings, settings::DEFAULT_SETTINGS_FILE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = Settings::load_or_default(&settings_path);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 320.0])
            .with_title("MIDI Keyboard"),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "midikeys",
        options,
        Box::new(|_cc| Ok(Box::new(KeyboardApp::new(settings, settings_path)))),
    ) {
        tracing::error!("{}", e);
    }
}
