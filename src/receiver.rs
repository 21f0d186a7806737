use crate::error::Result;

/// Downstream endpoint for complete MIDI messages.
pub trait MidiReceiver {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Scheduled delivery. Transports without a scheduler deliver immediately.
    fn send_at(&mut self, bytes: &[u8], timestamp: u64) -> Result<()> {
        tracing::trace!(timestamp, "no scheduler, delivering immediately");
        self.send(bytes)
    }
}

/// Source of the currently selected receiver, if any.
pub trait ReceiverSelector {
    fn receiver(&mut self) -> Option<&mut dyn MidiReceiver>;

    /// Releases the selected receiver. Later sends are dropped until a new one is selected.
    fn close(&mut self);
}

impl MidiReceiver for midir::MidiOutputConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        midir::MidiOutputConnection::send(self, bytes)?;
        Ok(())
    }
}
