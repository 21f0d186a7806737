use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::error::{Error, Result};

pub const STATUS_NOTE_OFF: u8 = 0x80;
pub const STATUS_NOTE_ON: u8 = 0x90;
pub const STATUS_PROGRAM_CHANGE: u8 = 0xC0;
pub const STATUS_SYSTEM_EXCLUSIVE: u8 = 0xF0;
pub const STATUS_END_SYSEX: u8 = 0xF7;

pub const MAX_CHANNELS: usize = 16;
pub const MAX_DATA_VALUE: u8 = 127;

/// Capacity of a [`MessageBuf`], and so the longest sysex we can frame.
pub const MAX_MESSAGE_LEN: usize = 64;

/// One of the 16 MIDI channels, stored as its 0-based index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < MAX_CHANNELS).then_some(Self(index))
    }

    /// Keeps the low nibble, so any selector position maps onto a channel.
    pub fn from_position(pos: usize) -> Self {
        Self((pos & 0x0F) as u8)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// 1-based number as printed on hardware.
    pub fn number(self) -> u8 {
        self.0 + 1
    }

    pub fn all() -> impl Iterator<Item = Channel> {
        (0..MAX_CHANNELS as u8).map(Channel)
    }
}

/// What to do with a data byte above 127.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBytePolicy {
    /// Cut to the low eight bits and send as-is, even when the high bit is set.
    Truncate,
    /// Keep the low seven bits.
    Mask,
    /// Saturate to 0..=127.
    #[default]
    Clamp,
    /// Refuse to encode the message.
    Reject,
}

impl DataBytePolicy {
    pub fn apply(self, value: i32) -> Result<u8> {
        match self {
            DataBytePolicy::Truncate => Ok(value as u8),
            DataBytePolicy::Mask => Ok((value & 0x7F) as u8),
            DataBytePolicy::Clamp => Ok(value.clamp(0, MAX_DATA_VALUE as i32) as u8),
            DataBytePolicy::Reject => {
                if (0..=MAX_DATA_VALUE as i32).contains(&value) {
                    Ok(value as u8)
                } else {
                    Err(Error::DataOutOfRange(value))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn {
        channel: Channel,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        channel: Channel,
        pitch: u8,
        velocity: u8,
    },
    ProgramChange {
        channel: Channel,
        program: u8,
    },
    /// Interior bytes only; the F0/F7 frame is added by [`MidiMessage::encode`].
    SysEx { payload: Vec<u8> },
}

impl MidiMessage {
    /// F0 00 21 10 78 3F F7
    pub fn sysex_demo() -> Self {
        MidiMessage::SysEx {
            payload: vec![0x00, 0x21, 0x10, 0x78, 0x3F],
        }
    }

    /// Fills a whole buffer: each interior byte holds its own offset.
    pub fn sysex_ramp() -> Self {
        MidiMessage::SysEx {
            payload: (1..MAX_MESSAGE_LEN as u8 - 1).collect(),
        }
    }

    pub fn encode(&self, policy: DataBytePolicy) -> Result<MessageBuf> {
        let data = |value: u8| policy.apply(i32::from(value));

        match self {
            MidiMessage::NoteOn {
                channel,
                pitch,
                velocity,
            } => MessageBuf::from_slice(&[
                STATUS_NOTE_ON + channel.index(),
                data(*pitch)?,
                data(*velocity)?,
            ]),
            MidiMessage::NoteOff {
                channel,
                pitch,
                velocity,
            } => MessageBuf::from_slice(&[
                STATUS_NOTE_OFF + channel.index(),
                data(*pitch)?,
                data(*velocity)?,
            ]),
            MidiMessage::ProgramChange { channel, program } => {
                MessageBuf::from_slice(&[STATUS_PROGRAM_CHANGE + channel.index(), data(*program)?])
            }
            MidiMessage::SysEx { payload } => {
                let len = payload.len() + 2;
                if len > MAX_MESSAGE_LEN {
                    return Err(Error::MessageTooLong {
                        len,
                        capacity: MAX_MESSAGE_LEN,
                    });
                }
                let mut buf = MessageBuf::new();
                buf.push(STATUS_SYSTEM_EXCLUSIVE);
                for byte in payload {
                    buf.push(data(*byte)?);
                }
                buf.push(STATUS_END_SYSEX);
                Ok(buf)
            }
        }
    }

    /// Whether the message is sent with a "now" timestamp. Sysex goes out unscheduled.
    pub fn is_timestamped(&self) -> bool {
        !matches!(self, MidiMessage::SysEx { .. })
    }
}

/// Fixed-capacity byte buffer, one per send.
#[derive(Clone, Copy)]
pub struct MessageBuf {
    bytes: [u8; MAX_MESSAGE_LEN],
    len: usize,
}

impl MessageBuf {
    fn new() -> Self {
        Self {
            bytes: [0; MAX_MESSAGE_LEN],
            len: 0,
        }
    }

    fn from_slice(src: &[u8]) -> Result<Self> {
        if src.len() > MAX_MESSAGE_LEN {
            return Err(Error::MessageTooLong {
                len: src.len(),
                capacity: MAX_MESSAGE_LEN,
            });
        }
        let mut buf = Self::new();
        buf.bytes[..src.len()].copy_from_slice(src);
        buf.len = src.len();
        Ok(buf)
    }

    // Callers check the length up front.
    fn push(&mut self, byte: u8) {
        self.bytes[self.len] = byte;
        self.len += 1;
    }
}

impl Deref for MessageBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl std::fmt::Debug for MessageBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X?}", &**self)
    }
}
