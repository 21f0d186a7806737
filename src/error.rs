use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("MIDI not supported: {0}")]
    MidiInit(#[from] midir::InitError),

    #[error("failed to connect to {port}: {reason}")]
    Connect { port: String, reason: String },

    #[error("failed to read port info: {0}")]
    PortInfo(#[from] midir::PortInfoError),

    #[error("no output port at index {0}")]
    NoSuchPort(usize),

    #[error("MIDI send failed: {0}")]
    Transport(#[from] midir::SendError),

    #[error("data byte {0} is outside 0..=127")]
    DataOutOfRange(i32),

    #[error("message of {len} bytes does not fit in a {capacity} byte buffer")]
    MessageTooLong { len: usize, capacity: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("failed to write settings: {0}")]
    RonSerialize(#[from] ron::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
