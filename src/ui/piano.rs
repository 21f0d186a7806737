use eframe::egui;

const BLACK_KEY_WIDTH: f32 = 0.6;
const BLACK_KEY_HEIGHT: f32 = 0.6;

pub fn is_black_key(pitch: u8) -> bool {
    matches!(pitch % 12, 1 | 3 | 6 | 8 | 10)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down(u8),
    Up(u8),
}

/// Key positions for the notes `first..=last` laid out across `rect`.
pub struct KeyLayout {
    first: u8,
    last: u8,
    rect: egui::Rect,
}

impl KeyLayout {
    pub fn new(first: u8, last: u8, rect: egui::Rect) -> Self {
        Self { first, last, rect }
    }

    fn white_key_width(&self) -> f32 {
        let whites = (self.first..=self.last)
            .filter(|p| !is_black_key(*p))
            .count()
            .max(1);
        self.rect.width() / whites as f32
    }

    fn whites_before(&self, pitch: u8) -> usize {
        (self.first..pitch).filter(|p| !is_black_key(*p)).count()
    }

    pub fn key_rect(&self, pitch: u8) -> egui::Rect {
        let white_width = self.white_key_width();
        let x = self.rect.left() + self.whites_before(pitch) as f32 * white_width;

        if is_black_key(pitch) {
            let width = white_width * BLACK_KEY_WIDTH;
            egui::Rect::from_min_size(
                egui::Pos2::new(x - width / 2.0, self.rect.top()),
                egui::Vec2::new(width, self.rect.height() * BLACK_KEY_HEIGHT),
            )
        } else {
            egui::Rect::from_min_size(
                egui::Pos2::new(x, self.rect.top()),
                egui::Vec2::new(white_width, self.rect.height()),
            )
        }
    }

    /// Black keys sit on top, so they win the hit test.
    pub fn key_at(&self, pos: egui::Pos2) -> Option<u8> {
        if !self.rect.contains(pos) {
            return None;
        }
        let keys = self.first..=self.last;
        keys.clone()
            .filter(|p| is_black_key(*p))
            .find(|p| self.key_rect(*p).contains(pos))
            .or_else(|| {
                keys.filter(|p| !is_black_key(*p))
                    .find(|p| self.key_rect(*p).contains(pos))
            })
    }
}

#[derive(Default)]
pub struct PianoState {
    held: Option<u8>,
}

impl PianoState {
    pub fn held(&self) -> Option<u8> {
        self.held
    }

    /// Follows the key under a pressed pointer. Sliding onto another key
    /// releases the old one first.
    pub fn track(&mut self, under_pointer: Option<u8>) -> Vec<KeyEvent> {
        if under_pointer == self.held {
            return Vec::new();
        }
        let mut events = Vec::with_capacity(2);
        if let Some(old) = self.held.take() {
            events.push(KeyEvent::Up(old));
        }
        if let Some(new) = under_pointer {
            events.push(KeyEvent::Down(new));
        }
        self.held = under_pointer;
        events
    }
}

pub struct Piano<'a> {
    first: u8,
    last: u8,
    state: &'a mut PianoState,
}

impl<'a> Piano<'a> {
    pub fn new(first: u8, last: u8, state: &'a mut PianoState) -> Self {
        Self { first, last, state }
    }

    pub fn show(self, ui: &mut egui::Ui) -> Vec<KeyEvent> {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let layout = KeyLayout::new(self.first, self.last, response.rect);

        let under_pointer = if response.is_pointer_button_down_on() {
            response
                .interact_pointer_pos()
                .and_then(|pos| layout.key_at(pos))
        } else {
            None
        };
        let events = self.state.track(under_pointer);

        painter.rect_filled(response.rect, 0.0, egui::Color32::from_rgb(30, 30, 30));

        let (black, white): (Vec<u8>, Vec<u8>) =
            (self.first..=self.last).partition(|p| is_black_key(*p));
        for pitch in white.into_iter().chain(black) {
            self.draw_key(&painter, &layout, pitch);
        }

        events
    }

    fn draw_key(&self, painter: &egui::Painter, layout: &KeyLayout, pitch: u8) {
        let key_rect = layout.key_rect(pitch);
        let is_black = is_black_key(pitch);
        let pressed = self.state.held == Some(pitch);

        let key_color = match (is_black, pressed) {
            (_, true) => egui::Color32::from_rgb(60, 180, 100),
            (true, false) => egui::Color32::from_rgb(20, 20, 20),
            (false, false) => egui::Color32::from_rgb(220, 220, 220),
        };

        painter.rect_filled(key_rect, 2.0, key_color);
        painter.rect_stroke(
            key_rect,
            2.0,
            egui::Stroke::new(1.0, egui::Color32::from_rgb(100, 100, 100)),
            egui::StrokeKind::Inside,
        );

        // Label C notes
        if pitch % 12 == 0 {
            let octave = (pitch / 12) as i32 - 1;
            painter.text(
                egui::Pos2::new(key_rect.center().x, key_rect.bottom() - 12.0),
                egui::Align2::CENTER_CENTER,
                format!("C{}", octave),
                egui::FontId::proportional(10.0),
                egui::Color32::BLACK,
            );
        }
    }
}
