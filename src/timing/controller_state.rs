use std::collections::HashSet;

use super::sequence::EventSequence;
use crate::events::MidiMessage;

impl EventSequence {
    /// Messages that put `channel` back into the state it has at `time`: the
    /// latest program change, the latest value of each controller and the
    /// latest pitch-wheel position, all re-stamped to 0.0.
    ///
    /// Messages come out in the order they are found walking backwards from
    /// the end of the sequence.
    pub fn controller_state_at(&self, channel: u8, time: f64) -> Vec<MidiMessage> {
        let mut state = Vec::new();
        let mut done_program = false;
        let mut done_pitch_wheel = false;
        let mut done_controllers = HashSet::with_capacity(32);

        for holder in self.iter().rev() {
            let message = holder.message();
            let in_scope = message.is_for_channel(channel) && message.timestamp() <= time;
            if !in_scope {
                continue;
            }

            let wanted = if message.is_program_change() {
                !std::mem::replace(&mut done_program, true)
            } else if message.is_controller() {
                done_controllers.insert(message.controller_number())
            } else if message.is_pitch_wheel() {
                !std::mem::replace(&mut done_pitch_wheel, true)
            } else {
                false
            };

            if wanted {
                state.push(message.with_timestamp(0.0));
            }
        }

        state
    }
}
