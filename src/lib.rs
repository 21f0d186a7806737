pub mod error;
pub mod keyboard;
pub mod midi;
pub mod ports;
pub mod receiver;
pub mod settings;
pub mod ui;

pub use error::{Error, Result};
pub use keyboard::Keyboard;
pub use midi::{Channel, DataBytePolicy, MidiMessage};
pub use ports::PortSelector;
pub use receiver::{MidiReceiver, ReceiverSelector};
pub use settings::Settings;
pub use ui::KeyboardApp;
