use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, trace};

use crate::events::MidiMessage;

new_key_type! {
    /// Identity of one event while it is a member of an [`EventSequence`].
    pub struct EventKey;
}

/// One event of a sequence: the message plus, for note-ons, a link to the
/// event that ends the note.
#[derive(Debug, Clone)]
pub struct EventHolder {
    pub(crate) message: MidiMessage,
    pub(crate) note_off: Option<EventKey>,
}

impl EventHolder {
    fn new(message: MidiMessage) -> Self {
        Self {
            message,
            note_off: None,
        }
    }

    pub fn message(&self) -> &MidiMessage {
        &self.message
    }

    pub fn timestamp(&self) -> f64 {
        self.message.timestamp()
    }

    /// Key of the matching note-off, as set by the last
    /// [`EventSequence::update_matched_pairs`]. The key may no longer resolve
    /// if that event has been deleted since.
    pub fn note_off(&self) -> Option<EventKey> {
        self.note_off
    }
}

/// A list of MIDI events kept in ascending timestamp order.
///
/// Events live in a generational arena and the sequence order is a separate
/// list of keys, so note-on/note-off links survive insertions and never point
/// at the wrong event after a removal.
///
/// Cloning copies every message but drops the note-off links.
#[derive(Debug, Default)]
pub struct EventSequence {
    pub(crate) events: SlotMap<EventKey, EventHolder>,
    pub(crate) order: Vec<EventKey>,
}

/// NaN sorts after every number so the ordering stays total.
pub(crate) fn compare_times(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

impl EventSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: SlotMap::with_capacity_and_key(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            keys: self.order.iter(),
            events: &self.events,
        }
    }

    pub fn event(&self, index: usize) -> Option<&EventHolder> {
        self.order.get(index).and_then(|key| self.events.get(*key))
    }

    pub fn key_at(&self, index: usize) -> Option<EventKey> {
        self.order.get(index).copied()
    }

    pub fn get(&self, key: EventKey) -> Option<&EventHolder> {
        self.events.get(key)
    }

    pub fn index_of(&self, key: EventKey) -> Option<usize> {
        self.order.iter().position(|k| *k == key)
    }

    fn time_of(&self, key: EventKey) -> f64 {
        self.events.get(key).map_or(0.0, EventHolder::timestamp)
    }

    /// Timestamp of the event at `index`, or 0.0 when out of range.
    pub fn event_time(&self, index: usize) -> f64 {
        self.event(index).map_or(0.0, EventHolder::timestamp)
    }

    pub fn start_time(&self) -> f64 {
        self.event_time(0)
    }

    pub fn end_time(&self) -> f64 {
        match self.order.last() {
            Some(key) => self.time_of(*key),
            None => 0.0,
        }
    }

    /// Timestamp of the note-off paired with the event at `index`, or 0.0 if
    /// the event is unpaired, its link went stale, or `index` is out of range.
    pub fn time_of_matching_off(&self, index: usize) -> f64 {
        self.event(index)
            .and_then(|holder| holder.note_off)
            .and_then(|key| self.events.get(key))
            .map_or(0.0, EventHolder::timestamp)
    }

    pub fn index_of_matching_off(&self, index: usize) -> Option<usize> {
        let off = self.event(index)?.note_off?;
        self.index_of(off)
    }

    /// First index whose timestamp is at or after `time`, or `len()` if none.
    /// Only meaningful while the sequence is sorted.
    pub fn first_index_at_or_after(&self, time: f64) -> usize {
        self.order
            .iter()
            .position(|key| self.time_of(*key) >= time)
            .unwrap_or(self.order.len())
    }

    /// Inserts a copy of `message` at `message.timestamp() + time_adjustment`.
    /// An event landing on the same time as existing ones goes after them.
    /// NaN times go last, as in [`sort`](Self::sort).
    pub fn add_event(&mut self, message: &MidiMessage, time_adjustment: f64) -> EventKey {
        let time = message.timestamp() + time_adjustment;
        let position = self
            .order
            .iter()
            .rposition(|key| compare_times(self.time_of(*key), time) != Ordering::Greater)
            .map_or(0, |i| i + 1);

        let key = self.events.insert(EventHolder::new(message.with_timestamp(time)));
        self.order.insert(position, key);
        trace!(position, time, "added event");
        key
    }

    /// Removes the event at `index`, optionally together with its paired
    /// note-off. Out-of-range indices are ignored.
    pub fn delete_event(&mut self, index: usize, also_delete_matching_off: bool) {
        let Some(key) = self.key_at(index) else {
            return;
        };

        if also_delete_matching_off {
            if let Some(off_index) = self.index_of_matching_off(index) {
                self.delete_event(off_index, false);
            }
        }

        if let Some(index) = self.index_of(key) {
            self.remove_at(index);
        }
    }

    fn remove_at(&mut self, index: usize) -> Option<MidiMessage> {
        if index >= self.order.len() {
            return None;
        }
        let key = self.order.remove(index);
        trace!(index, "removed event");
        self.events.remove(key).map(|holder| holder.message)
    }

    /// Merges the events of `other` whose time `t` satisfies
    /// `first_allowable_time <= t + time_adjustment < end_of_allowable_dest_time`,
    /// shifted by `time_adjustment`. The result is re-sorted, keeping the
    /// existing order of events with equal times.
    pub fn add_sequence(
        &mut self,
        other: &EventSequence,
        time_adjustment: f64,
        first_allowable_time: f64,
        end_of_allowable_dest_time: f64,
    ) {
        let first = first_allowable_time - time_adjustment;
        let end = end_of_allowable_dest_time - time_adjustment;
        let before = self.len();

        for holder in other {
            let t = holder.timestamp();
            if t >= first && t < end {
                let key = self.events.insert(EventHolder::new(
                    holder.message.with_timestamp(time_adjustment + t),
                ));
                self.order.push(key);
            }
        }

        self.sort();
        debug!(
            added = self.len() - before,
            offered = other.len(),
            "merged sequence"
        );
    }

    /// Stable sort by timestamp.
    pub fn sort(&mut self) {
        let events = &self.events;
        let time = |key: &EventKey| events.get(*key).map_or(0.0, EventHolder::timestamp);
        self.order.sort_by(|a, b| compare_times(time(a), time(b)));
    }

    /// Adds `delta` to every timestamp. The sequence is not re-sorted, so a
    /// caller mixing this with out-of-order times must call [`sort`](Self::sort).
    pub fn shift_all_timestamps(&mut self, delta: f64) {
        for key in self.order.iter().rev() {
            if let Some(holder) = self.events.get_mut(*key) {
                let time = holder.message.timestamp() + delta;
                holder.message.set_timestamp(time);
            }
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.order.clear();
    }

    pub fn swap_with(&mut self, other: &mut EventSequence) {
        std::mem::swap(self, other);
    }

    /// Copies every event on `channel` (and meta events, if asked) into `dest`.
    pub fn extract_channel_messages(
        &self,
        channel: u8,
        dest: &mut EventSequence,
        include_meta: bool,
    ) {
        for holder in self {
            let message = holder.message();
            if message.is_for_channel(channel) || (include_meta && message.is_meta_event()) {
                dest.add_event(message, 0.0);
            }
        }
    }

    pub fn extract_sysex(&self, dest: &mut EventSequence) {
        for holder in self.iter().filter(|h| h.message.is_sysex()) {
            dest.add_event(holder.message(), 0.0);
        }
    }

    pub fn delete_channel_messages(&mut self, channel: u8) {
        let removed = self.remove_where(|m| m.is_for_channel(channel));
        debug!(channel, removed, "deleted channel messages");
    }

    pub fn delete_sysex(&mut self) {
        let removed = self.remove_where(MidiMessage::is_sysex);
        debug!(removed, "deleted sysex messages");
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(&MidiMessage) -> bool) -> usize {
        let mut removed = 0;
        for index in (0..self.order.len()).rev() {
            let matches = self
                .event(index)
                .is_some_and(|holder| predicate(&holder.message));
            if matches && self.remove_at(index).is_some() {
                removed += 1;
            }
        }
        removed
    }
}

impl Clone for EventSequence {
    fn clone(&self) -> Self {
        let mut copy = Self::with_capacity(self.len());
        for holder in self {
            let key = copy.events.insert(EventHolder::new(holder.message.clone()));
            copy.order.push(key);
        }
        copy
    }
}

pub struct Iter<'a> {
    keys: std::slice::Iter<'a, EventKey>,
    events: &'a SlotMap<EventKey, EventHolder>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a EventHolder;

    fn next(&mut self) -> Option<Self::Item> {
        let events = self.events;
        self.keys.find_map(|key| events.get(*key))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.keys.len()))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let events = self.events;
        self.keys.by_ref().rev().find_map(|key| events.get(*key))
    }
}

impl<'a> IntoIterator for &'a EventSequence {
    type Item = &'a EventHolder;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<MidiMessage> for EventSequence {
    fn from_iter<I: IntoIterator<Item = MidiMessage>>(iter: I) -> Self {
        let mut sequence = Self::new();
        sequence.extend(iter);
        sequence
    }
}

impl Extend<MidiMessage> for EventSequence {
    fn extend<I: IntoIterator<Item = MidiMessage>>(&mut self, iter: I) {
        for message in iter {
            self.add_event(&message, 0.0);
        }
    }
}

impl Serialize for EventSequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(EventHolder::message))
    }
}

impl<'de> Deserialize<'de> for EventSequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let messages = Vec::<MidiMessage>::deserialize(deserializer)?;
        Ok(messages.into_iter().collect())
    }
}
