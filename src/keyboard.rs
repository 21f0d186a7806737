use std::time::Instant;
use tracing::{debug, error, trace, warn};

use crate::midi::{Channel, DataBytePolicy, MAX_CHANNELS, MAX_DATA_VALUE, MidiMessage};
use crate::receiver::ReceiverSelector;
use crate::settings::Settings;

/// Turns key presses and button clicks into MIDI sent to the selected receiver.
///
/// With no selector (MIDI unavailable) or no receiver selected, every send is
/// silently dropped.
pub struct Keyboard<S: ReceiverSelector> {
    selector: Option<S>,
    channel: Channel,
    programs: [u8; MAX_CHANNELS],
    velocity: u8,
    policy: DataBytePolicy,
    epoch: Instant,
}

impl<S: ReceiverSelector> Keyboard<S> {
    pub fn new(selector: Option<S>, settings: &Settings) -> Self {
        Self {
            selector,
            channel: Channel::from_position(settings.channel as usize),
            programs: [0; MAX_CHANNELS],
            velocity: settings.default_velocity,
            policy: settings.data_bytes,
            epoch: Instant::now(),
        }
    }

    pub fn selector(&self) -> Option<&S> {
        self.selector.as_ref()
    }

    pub fn selector_mut(&mut self) -> Option<&mut S> {
        self.selector.as_mut()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn set_channel(&mut self, pos: usize) {
        self.channel = Channel::from_position(pos);
        debug!(channel = self.channel.number(), "channel selected");
    }

    /// Program stored for the active channel.
    pub fn program(&self) -> u8 {
        self.programs[self.channel.index() as usize]
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        self.velocity = velocity;
    }

    pub fn set_policy(&mut self, policy: DataBytePolicy) {
        self.policy = policy;
    }

    pub fn key_down(&mut self, pitch: u8) {
        self.send(MidiMessage::NoteOn {
            channel: self.channel,
            pitch,
            velocity: self.velocity,
        });
    }

    pub fn key_up(&mut self, pitch: u8) {
        self.send(MidiMessage::NoteOff {
            channel: self.channel,
            pitch,
            velocity: self.velocity,
        });
    }

    pub fn send_program(&mut self) {
        self.send(MidiMessage::ProgramChange {
            channel: self.channel,
            program: self.program(),
        });
    }

    /// Saturating add on the active channel's program; returns the new value.
    pub fn change_program(&mut self, delta: i32) -> u8 {
        let program =
            (i32::from(self.program()) + delta).clamp(0, i32::from(MAX_DATA_VALUE)) as u8;
        self.send(MidiMessage::ProgramChange {
            channel: self.channel,
            program,
        });
        self.programs[self.channel.index() as usize] = program;
        program
    }

    pub fn send_sysex_demo(&mut self) {
        self.send(MidiMessage::sysex_demo());
    }

    pub fn send_sysex_ramp(&mut self) {
        self.send(MidiMessage::sysex_ramp());
    }

    pub fn send(&mut self, message: MidiMessage) {
        let bytes = match message.encode(self.policy) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(?message, "dropping message: {}", e);
                return;
            }
        };
        let timestamp = message.is_timestamped().then(|| self.now());
        self.midi_send(&bytes, timestamp);
    }

    /// Nanoseconds since this keyboard was created.
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn midi_send(&mut self, bytes: &[u8], timestamp: Option<u64>) {
        let Some(receiver) = self.selector.as_mut().and_then(|s| s.receiver()) else {
            return;
        };

        let result = match timestamp {
            Some(timestamp) => {
                trace!(timestamp, "scheduled send");
                receiver.send_at(bytes, timestamp)
            }
            None => receiver.send(bytes),
        };

        match result {
            Ok(()) => debug!("sent {:02X?}", bytes),
            Err(e) => error!("MIDI send failed: {}", e),
        }
    }

    /// Releases the selected receiver.
    pub fn shutdown(&mut self) {
        if let Some(selector) = self.selector.as_mut() {
            selector.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::receiver::MidiReceiver;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(Vec<u8>, Option<u64>)>,
        fail: bool,
    }

    impl MidiReceiver for Recorder {
        fn send(&mut self, bytes: &[u8]) -> Result<()> {
            if self.fail {
                return Err(Error::Transport(midir::SendError::Other("unplugged")));
            }
            self.sent.push((bytes.to_vec(), None));
            Ok(())
        }

        fn send_at(&mut self, bytes: &[u8], timestamp: u64) -> Result<()> {
            if self.fail {
                return Err(Error::Transport(midir::SendError::Other("unplugged")));
            }
            self.sent.push((bytes.to_vec(), Some(timestamp)));
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestSelector {
        receiver: Option<Recorder>,
        closed: bool,
    }

    impl ReceiverSelector for TestSelector {
        fn receiver(&mut self) -> Option<&mut dyn MidiReceiver> {
            self.receiver
                .as_mut()
                .map(|r| r as &mut dyn MidiReceiver)
        }

        fn close(&mut self) {
            self.receiver = None;
            self.closed = true;
        }
    }

    fn connected() -> Keyboard<TestSelector> {
        let selector = TestSelector {
            receiver: Some(Recorder::default()),
            closed: false,
        };
        Keyboard::new(Some(selector), &Settings::default())
    }

    fn sent(keyboard: &Keyboard<TestSelector>) -> Vec<Vec<u8>> {
        sent_with_time(keyboard)
            .into_iter()
            .map(|(bytes, _)| bytes)
            .collect()
    }

    fn sent_with_time(keyboard: &Keyboard<TestSelector>) -> Vec<(Vec<u8>, Option<u64>)> {
        keyboard
            .selector()
            .and_then(|s| s.receiver.as_ref())
            .map(|r| r.sent.clone())
            .unwrap_or_default()
    }

    #[test]
    fn program_change_clamps_and_stores() {
        let mut keyboard = connected();
        keyboard.set_channel(2);

        assert_eq!(keyboard.change_program(5), 5);
        assert_eq!(keyboard.program(), 5);
        assert_eq!(keyboard.change_program(-10), 0);

        assert_eq!(sent(&keyboard), vec![vec![0xC2, 5], vec![0xC2, 0]]);
    }

    #[test]
    fn program_never_leaves_range() {
        let mut keyboard = connected();
        let deltas = [1, 10, 200, -1, -500, 127, 1, 1, -64, 90, -3];
        for channel in 0..16 {
            keyboard.set_channel(channel);
            for delta in deltas {
                let program = keyboard.change_program(delta);
                assert!(program <= 127);
                assert_eq!(program, keyboard.program());
            }
        }
        for (bytes, _) in sent_with_time(&keyboard) {
            assert_eq!(bytes.len(), 2);
            assert!(bytes[1] <= 127);
        }
    }

    #[test]
    fn programs_are_kept_per_channel() {
        let mut keyboard = connected();
        keyboard.set_channel(0);
        keyboard.change_program(7);
        keyboard.set_channel(1);
        assert_eq!(keyboard.program(), 0);
        keyboard.set_channel(0);
        assert_eq!(keyboard.program(), 7);

        keyboard.send_program();
        assert_eq!(sent(&keyboard).last(), Some(&vec![0xC0, 7]));
    }

    #[test]
    fn keys_send_notes_on_active_channel() {
        let mut keyboard = connected();
        keyboard.set_channel(9);
        keyboard.key_down(60);
        keyboard.key_up(60);

        let sent = sent_with_time(&keyboard);
        assert_eq!(sent[0].0, vec![0x99, 60, 64]);
        assert_eq!(sent[1].0, vec![0x89, 60, 64]);
        assert!(sent.iter().all(|(_, t)| t.is_some()));
        assert!(sent[0].1 <= sent[1].1);
    }

    #[test]
    fn channel_position_is_masked() {
        let mut keyboard = connected();
        keyboard.set_channel(18);
        assert_eq!(keyboard.channel().index(), 2);
    }

    #[test]
    fn sysex_goes_out_unscheduled() {
        let mut keyboard = connected();
        keyboard.send_sysex_demo();
        keyboard.send_sysex_ramp();

        let sent = sent_with_time(&keyboard);
        assert_eq!(
            sent[0],
            (vec![0xF0, 0x00, 0x21, 0x10, 0x78, 0x3F, 0xF7], None)
        );
        assert_eq!(sent[1].0.len(), 64);
        assert_eq!(sent[1].1, None);
    }

    #[test]
    fn no_receiver_drops_silently() {
        let mut keyboard = Keyboard::new(Some(TestSelector::default()), &Settings::default());
        keyboard.key_down(60);
        keyboard.send_sysex_demo();
        assert_eq!(keyboard.change_program(3), 3);
        assert!(sent(&keyboard).is_empty());

        let mut unsupported: Keyboard<TestSelector> = Keyboard::new(None, &Settings::default());
        unsupported.key_down(60);
        assert_eq!(unsupported.change_program(-1), 0);
    }

    #[test]
    fn transport_failure_is_swallowed() {
        let selector = TestSelector {
            receiver: Some(Recorder {
                sent: Vec::new(),
                fail: true,
            }),
            closed: false,
        };
        let mut keyboard = Keyboard::new(Some(selector), &Settings::default());
        keyboard.key_down(60);
        assert_eq!(keyboard.change_program(4), 4);
    }

    #[test]
    fn rejected_data_is_not_sent() {
        let mut keyboard = connected();
        keyboard.set_policy(DataBytePolicy::Reject);
        keyboard.key_down(130);
        assert!(sent(&keyboard).is_empty());

        keyboard.set_policy(DataBytePolicy::Truncate);
        keyboard.key_down(130);
        assert_eq!(sent(&keyboard), vec![vec![0x90, 130, 64]]);
    }

    #[test]
    fn shutdown_closes_selector() {
        let mut keyboard = connected();
        keyboard.shutdown();
        keyboard.key_down(60);
        let selector = keyboard.selector().unwrap();
        assert!(selector.closed);
        assert!(selector.receiver.is_none());
    }
}
