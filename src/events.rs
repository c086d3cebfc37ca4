use serde::{Deserialize, Serialize};

use crate::error::MessageError;

pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const AFTERTOUCH: u8 = 0xA0;
    pub const CONTROLLER: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_PRESSURE: u8 = 0xD0;
    pub const PITCH_WHEEL: u8 = 0xE0;
    pub const SYSEX: u8 = 0xF0;
    pub const SYSEX_END: u8 = 0xF7;
    pub const META: u8 = 0xFF;
}

/// A raw MIDI message stamped with a time.
///
/// The payload never changes once built; only the timestamp is mutable. The
/// unit of the timestamp is up to the caller (seconds, ticks, beats...).
///
/// Channels are numbered 1 to 16. Messages that don't belong to a channel
/// (sysex, meta, system realtime) report channel 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct MidiMessage {
    data: Vec<u8>,
    timestamp: f64,
}

/// Unchecked wire form; deserialised data goes through `from_bytes`.
#[derive(Deserialize)]
struct RawMessage {
    data: Vec<u8>,
    timestamp: f64,
}

impl TryFrom<RawMessage> for MidiMessage {
    type Error = MessageError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        Self::from_bytes(&raw.data, raw.timestamp)
    }
}

impl MidiMessage {
    /// Parses a raw message. Bytes past the expected length of a channel
    /// message are ignored.
    pub fn from_bytes(bytes: &[u8], timestamp: f64) -> Result<Self, MessageError> {
        let Some(&first) = bytes.first() else {
            return Err(MessageError::Empty);
        };

        let expected = match first {
            0x00..=0x7F => return Err(MessageError::InvalidStatus(first)),
            status::SYSEX => {
                if bytes.last() != Some(&status::SYSEX_END) || bytes.len() < 2 {
                    return Err(MessageError::UnterminatedSysEx);
                }
                bytes.len()
            }
            status::META => bytes.len().max(2),
            0xF1 | 0xF3 => 2,
            0xF2 => 3,
            0xF4..=0xFE => 1,
            _ => match first & 0xF0 {
                status::PROGRAM_CHANGE | status::CHANNEL_PRESSURE => 2,
                _ => 3,
            },
        };

        if bytes.len() < expected {
            return Err(MessageError::Truncated {
                status: first,
                expected,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            data: bytes[..expected].to_vec(),
            timestamp,
        })
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_message(status::NOTE_ON, channel, &[note, velocity])
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::channel_message(status::NOTE_OFF, channel, &[note, 0])
    }

    pub fn controller(channel: u8, number: u8, value: u8) -> Self {
        Self::channel_message(status::CONTROLLER, channel, &[number, value])
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::channel_message(status::PROGRAM_CHANGE, channel, &[program])
    }

    /// `value` is the 14-bit wheel position, 8192 being centred.
    pub fn pitch_wheel(channel: u8, value: u16) -> Self {
        let value = value.min(0x3FFF);
        Self::channel_message(
            status::PITCH_WHEEL,
            channel,
            &[(value & 0x7F) as u8, (value >> 7) as u8],
        )
    }

    /// Wraps `payload` in the 0xF0 / 0xF7 framing bytes.
    pub fn sysex(payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(payload.len() + 2);
        data.push(status::SYSEX);
        data.extend(payload.iter().map(|b| b & 0x7F));
        data.push(status::SYSEX_END);
        Self {
            data,
            timestamp: 0.0,
        }
    }

    pub fn meta(kind: u8, payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(payload.len() + 2);
        data.push(status::META);
        data.push(kind & 0x7F);
        data.extend_from_slice(payload);
        Self {
            data,
            timestamp: 0.0,
        }
    }

    fn channel_message(kind: u8, channel: u8, payload: &[u8]) -> Self {
        let channel = channel.clamp(1, 16) - 1;
        let mut data = Vec::with_capacity(payload.len() + 1);
        data.push(kind | channel);
        data.extend(payload.iter().map(|b| b & 0x7F));
        Self {
            data,
            timestamp: 0.0,
        }
    }

    /// Copy of this message carrying a different timestamp.
    pub fn with_timestamp(&self, timestamp: f64) -> Self {
        Self {
            data: self.data.clone(),
            timestamp,
        }
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: f64) {
        self.timestamp = timestamp;
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    fn status(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    fn kind(&self) -> u8 {
        self.status() & 0xF0
    }

    fn data_byte(&self, index: usize) -> u8 {
        self.data.get(index).copied().unwrap_or(0)
    }

    fn is_channel_message(&self) -> bool {
        (0x80..0xF0).contains(&self.status())
    }

    pub fn channel(&self) -> u8 {
        if self.is_channel_message() {
            (self.status() & 0x0F) + 1
        } else {
            0
        }
    }

    pub fn is_for_channel(&self, channel: u8) -> bool {
        channel != 0 && self.channel() == channel
    }

    /// A note-on with velocity 0 counts as a note-off, not a note-on.
    pub fn is_note_on(&self) -> bool {
        self.kind() == status::NOTE_ON && self.velocity() != 0
    }

    pub fn is_note_off(&self) -> bool {
        self.kind() == status::NOTE_OFF
            || (self.kind() == status::NOTE_ON && self.velocity() == 0)
    }

    pub fn is_controller(&self) -> bool {
        self.kind() == status::CONTROLLER
    }

    pub fn is_program_change(&self) -> bool {
        self.kind() == status::PROGRAM_CHANGE
    }

    pub fn is_pitch_wheel(&self) -> bool {
        self.kind() == status::PITCH_WHEEL
    }

    pub fn is_sysex(&self) -> bool {
        self.status() == status::SYSEX
    }

    pub fn is_meta_event(&self) -> bool {
        self.status() == status::META
    }

    pub fn note_number(&self) -> u8 {
        self.data_byte(1)
    }

    pub fn velocity(&self) -> u8 {
        match self.kind() {
            status::NOTE_ON | status::NOTE_OFF => self.data_byte(2),
            _ => 0,
        }
    }

    pub fn controller_number(&self) -> u8 {
        self.data_byte(1)
    }

    pub fn controller_value(&self) -> u8 {
        self.data_byte(2)
    }

    pub fn program_number(&self) -> u8 {
        self.data_byte(1)
    }

    pub fn pitch_wheel_value(&self) -> u16 {
        (self.data_byte(1) as u16) | ((self.data_byte(2) as u16) << 7)
    }

    /// Sysex bytes without the framing, or the meta payload after its type byte.
    pub fn payload(&self) -> &[u8] {
        let (start, end) = if self.is_sysex() {
            (1, self.data.len().saturating_sub(1))
        } else if self.is_meta_event() {
            (2, self.data.len())
        } else {
            (1, self.data.len())
        };
        self.data.get(start..end).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_from_bytes() {
        let msg = MidiMessage::from_bytes(&[0x92, 60, 100], 1.5).unwrap();

        assert!(msg.is_note_on());
        assert!(!msg.is_note_off());
        assert_eq!(msg.channel(), 3);
        assert_eq!(msg.note_number(), 60);
        assert_eq!(msg.velocity(), 100);
        assert_eq!(msg.timestamp(), 1.5);
    }

    #[test]
    fn test_note_on_velocity_zero_is_note_off() {
        let msg = MidiMessage::from_bytes(&[0x90, 64, 0], 0.0).unwrap();

        assert!(msg.is_note_off());
        assert!(!msg.is_note_on());
    }

    #[test]
    fn test_builders_use_one_based_channels() {
        let on = MidiMessage::note_on(1, 60, 100);
        assert_eq!(on.raw_data(), &[0x90, 60, 100]);

        let off = MidiMessage::note_off(16, 60);
        assert_eq!(off.raw_data(), &[0x8F, 60, 0]);
        assert!(off.is_for_channel(16));
        assert!(!off.is_for_channel(1));
    }

    #[test]
    fn test_builders_clamp_out_of_range_values() {
        let cc = MidiMessage::controller(0, 200, 255);
        assert_eq!(cc.channel(), 1);
        assert_eq!(cc.controller_number(), 200 & 0x7F);
        assert_eq!(cc.controller_value(), 0x7F);

        let bend = MidiMessage::pitch_wheel(2, u16::MAX);
        assert_eq!(bend.pitch_wheel_value(), 0x3FFF);
    }

    #[test]
    fn test_pitch_wheel_value() {
        let bend = MidiMessage::from_bytes(&[0xE0, 0x00, 0x40], 0.0).unwrap();
        assert!(bend.is_pitch_wheel());
        assert_eq!(bend.pitch_wheel_value(), 8192);
        assert_eq!(MidiMessage::pitch_wheel(1, 8192).raw_data(), bend.raw_data());
    }

    #[test]
    fn test_program_change_is_two_bytes() {
        let msg = MidiMessage::from_bytes(&[0xC4, 12, 99], 0.0).unwrap();
        assert!(msg.is_program_change());
        assert_eq!(msg.program_number(), 12);
        assert_eq!(msg.raw_data().len(), 2);
    }

    #[test]
    fn test_sysex_and_meta_have_no_channel() {
        let sysex = MidiMessage::sysex(&[0x43, 0x10, 0x4C]);
        assert!(sysex.is_sysex());
        assert_eq!(sysex.channel(), 0);
        assert!(!sysex.is_for_channel(0));
        assert_eq!(sysex.payload(), &[0x43, 0x10, 0x4C]);

        let tempo = MidiMessage::meta(0x51, &[0x07, 0xA1, 0x20]);
        assert!(tempo.is_meta_event());
        assert_eq!(tempo.channel(), 0);
        assert_eq!(tempo.payload(), &[0x07, 0xA1, 0x20]);
    }

    #[test]
    fn test_invalid_messages() {
        assert_eq!(MidiMessage::from_bytes(&[], 0.0), Err(MessageError::Empty));
        assert_eq!(
            MidiMessage::from_bytes(&[0x40, 1, 2], 0.0),
            Err(MessageError::InvalidStatus(0x40))
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0x90, 60], 0.0),
            Err(MessageError::Truncated {
                status: 0x90,
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0xF0, 0x43, 0x10], 0.0),
            Err(MessageError::UnterminatedSysEx)
        );
    }

    #[test]
    fn test_deserialize_rejects_malformed_bytes() {
        for text in [
            "(data: [], timestamp: 0.0)",
            "(data: [64, 1], timestamp: 0.0)",
            "(data: [144], timestamp: 0.0)",
            "(data: [240, 1, 2], timestamp: 0.0)",
        ] {
            assert!(ron::from_str::<MidiMessage>(text).is_err(), "accepted {text}");
        }
    }

    #[test]
    fn test_deserialize_accepts_built_messages() {
        for msg in [
            MidiMessage::note_on(2, 60, 100).with_timestamp(1.5),
            MidiMessage::program_change(1, 7),
            MidiMessage::sysex(&[0x43, 0x10]),
            MidiMessage::meta(0x2F, &[]),
        ] {
            let text = ron::to_string(&msg).unwrap();
            assert_eq!(ron::from_str::<MidiMessage>(&text).unwrap(), msg);
        }
    }

    #[test]
    fn test_with_timestamp_keeps_payload() {
        let cc = MidiMessage::controller(1, 7, 100);
        let moved = cc.with_timestamp(4.0);

        assert_eq!(moved.raw_data(), cc.raw_data());
        assert_eq!(moved.timestamp(), 4.0);
        assert_eq!(cc.timestamp(), 0.0);
    }
}
