use tracing::debug;

use super::sequence::{EventHolder, EventSequence};
use crate::events::MidiMessage;

/// What the note-off link of an event currently resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOffLink {
    Unpaired,
    Paired(usize),
    /// The linked note-off has been deleted since pairs were last matched.
    Stale,
}

impl EventSequence {
    pub fn note_off_link(&self, index: usize) -> Option<NoteOffLink> {
        let holder = self.event(index)?;
        Some(match holder.note_off {
            None => NoteOffLink::Unpaired,
            Some(key) => self
                .index_of(key)
                .map_or(NoteOffLink::Stale, NoteOffLink::Paired),
        })
    }

    /// Links every note-on to the next note-off with the same note number and
    /// channel.
    ///
    /// If another note-on for that note comes first, a note-off is inserted
    /// right before it at the same time, so overlapping notes of the same
    /// pitch never share an off event. Links are only reliable until the
    /// sequence is next edited.
    pub fn update_matched_pairs(&mut self) {
        let mut synthesized = 0usize;
        let mut i = 0;

        while i < self.order.len() {
            let key = self.order[i];
            let (note, channel) = match self.events.get_mut(key) {
                Some(holder) if holder.message.is_note_on() => {
                    holder.note_off = None;
                    (holder.message.note_number(), holder.message.channel())
                }
                _ => {
                    i += 1;
                    continue;
                }
            };

            for j in (i + 1)..self.order.len() {
                let candidate = self.order[j];
                let Some(message) = self.events.get(candidate).map(|h| &h.message) else {
                    continue;
                };
                let is_note = message.is_note_on() || message.is_note_off();
                if !is_note || message.note_number() != note || message.channel() != channel {
                    continue;
                }

                let off = if message.is_note_off() {
                    candidate
                } else {
                    let retrigger_time = message.timestamp();
                    let implicit = MidiMessage::note_off(channel, note).with_timestamp(retrigger_time);
                    let off = self.events.insert(EventHolder {
                        message: implicit,
                        note_off: None,
                    });
                    self.order.insert(j, off);
                    synthesized += 1;
                    off
                };

                if let Some(holder) = self.events.get_mut(key) {
                    holder.note_off = Some(off);
                }
                break;
            }

            i += 1;
        }

        debug!(synthesized, events = self.order.len(), "matched note pairs");
    }
}
