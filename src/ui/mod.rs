mod piano;

pub use piano::{KeyEvent, PianoState};

use crate::midi::Channel;
use crate::{Keyboard, PortSelector, Settings};
use eframe::egui;
use piano::Piano;
use std::path::PathBuf;
use tracing::{error, info};

const PROGRAM_DELTAS: [i32; 4] = [-10, -1, 1, 10];

pub struct KeyboardApp {
    keyboard: Keyboard<PortSelector>,
    settings: Settings,
    settings_path: PathBuf,
    error_message: Option<String>,
    piano: PianoState,
}

impl KeyboardApp {
    pub fn new(settings: Settings, settings_path: PathBuf) -> Self {
        let mut error_message = None;

        let selector = match PortSelector::new(&settings.client_name) {
            Ok(mut selector) => {
                if let Some(preferred) = &settings.preferred_port {
                    match selector.select_by_name(preferred) {
                        Ok(true) => {}
                        Ok(false) => info!(port = %preferred, "preferred port not found"),
                        Err(e) => error_message = Some(e.to_string()),
                    }
                }
                Some(selector)
            }
            Err(e) => {
                error!("{}", e);
                error_message = Some(e.to_string());
                None
            }
        };

        Self {
            keyboard: Keyboard::new(selector, &settings),
            settings,
            settings_path,
            error_message,
            piano: PianoState::default(),
        }
    }

    fn apply_settings(&mut self, settings: Settings) {
        self.keyboard.set_channel(settings.channel as usize);
        self.keyboard.set_velocity(settings.default_velocity);
        self.keyboard.set_policy(settings.data_bytes);
        if let (Some(preferred), Some(selector)) =
            (&settings.preferred_port, self.keyboard.selector_mut())
        {
            if let Err(e) = selector.select_by_name(preferred) {
                self.error_message = Some(e.to_string());
            }
        }
        self.settings = settings;
    }

    fn menu_bar(&mut self, ui: &mut egui::Ui) {
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open Settings...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .set_title("Open Keyboard Settings")
                        .add_filter("RON", &["ron"])
                        .pick_file()
                    {
                        match Settings::load(&path) {
                            Ok(settings) => {
                                self.apply_settings(settings);
                                self.settings_path = path;
                                self.error_message = None;
                            }
                            Err(e) => {
                                self.error_message =
                                    Some(format!("Failed to load settings: {}", e));
                            }
                        }
                    }
                    ui.close();
                }

                if ui.button("💾 Save Settings").clicked() {
                    self.settings.channel = self.keyboard.channel().index();
                    if let Some((_, name)) = self.keyboard.selector().and_then(|s| s.selected()) {
                        self.settings.preferred_port = Some(name.to_string());
                    }
                    if let Err(e) = self.settings.save(&self.settings_path) {
                        self.error_message = Some(format!("Failed to save settings: {}", e));
                    }
                    ui.close();
                }

                ui.separator();

                if ui.button("Quit").clicked() {
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });
    }

    fn port_controls(&mut self, ui: &mut egui::Ui) {
        let Some(selector) = self.keyboard.selector_mut() else {
            ui.label("No MIDI output available");
            return;
        };

        let names: Vec<String> = selector.port_names().map(str::to_string).collect();
        let current = selector.selected().map(|(index, _)| index);
        let mut choice = current;

        egui::ComboBox::from_label("Output")
            .selected_text(
                current
                    .and_then(|i| names.get(i))
                    .map(String::as_str)
                    .unwrap_or("(none)"),
            )
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut choice, None, "(none)");
                for (i, name) in names.iter().enumerate() {
                    ui.selectable_value(&mut choice, Some(i), name.as_str());
                }
            });

        let mut result = None;
        if choice != current {
            result = Some(selector.select(choice));
        }
        if ui.button("⟳").on_hover_text("Rescan ports").clicked() {
            let rescan = selector.refresh();
            result = Some(result.unwrap_or(Ok(())).and(rescan));
        }
        if let Some(result) = result {
            update_banner(&mut self.error_message, result);
        }
    }

    /// Sends note-off for a held key, then releases the output port.
    fn release(&mut self) {
        if let Some(pitch) = self.piano.held() {
            self.keyboard.key_up(pitch);
        }
        self.piano.track(None);
        self.keyboard.shutdown();
    }

    fn channel_controls(&mut self, ui: &mut egui::Ui) {
        let current = self.keyboard.channel();
        let mut choice = current;
        egui::ComboBox::from_label("Channel")
            .selected_text(current.number().to_string())
            .show_ui(ui, |ui| {
                for channel in Channel::all() {
                    ui.selectable_value(&mut choice, channel, channel.number().to_string());
                }
            });
        if choice != current {
            self.keyboard.set_channel(choice.index() as usize);
        }
    }

    fn program_controls(&mut self, ui: &mut egui::Ui) {
        ui.label("Program");
        let (down, up) = PROGRAM_DELTAS.split_at(2);
        for delta in down {
            if ui.button(delta.to_string()).clicked() {
                self.keyboard.change_program(*delta);
            }
        }
        if ui
            .button(self.keyboard.program().to_string())
            .on_hover_text("Resend program")
            .clicked()
        {
            self.keyboard.send_program();
        }
        for delta in up {
            if ui.button(format!("+{}", delta)).clicked() {
                self.keyboard.change_program(*delta);
            }
        }
    }

    fn sysex_controls(&mut self, ui: &mut egui::Ui) {
        if ui.button("SysEx").clicked() {
            self.keyboard.send_sysex_demo();
        }
        if ui.button("SysEx 2").clicked() {
            self.keyboard.send_sysex_ramp();
        }
    }
}

impl eframe::App for KeyboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ui);
        });

        if let Some(ref error) = self.error_message {
            egui::TopBottomPanel::top("error").show(ctx, |ui| {
                ui.colored_label(egui::Color32::RED, error);
            });
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                self.port_controls(ui);
                ui.separator();
                self.channel_controls(ui);
            });
            ui.horizontal(|ui| {
                self.program_controls(ui);
                ui.separator();
                self.sysex_controls(ui);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let events = Piano::new(
                self.settings.first_key,
                self.settings.last_key(),
                &mut self.piano,
            )
            .show(ui);

            for event in events {
                match event {
                    KeyEvent::Down(pitch) => self.keyboard.key_down(pitch),
                    KeyEvent::Up(pitch) => self.keyboard.key_up(pitch),
                }
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.release();
    }
}

/// A port action that succeeds clears the banner; one that fails replaces it.
fn update_banner(banner: &mut Option<String>, result: crate::Result<()>) {
    match result {
        Ok(()) => *banner = None,
        Err(e) => {
            error!("{}", e);
            *banner = Some(e.to_string());
        }
    }
}
