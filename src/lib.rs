//! Time-ordered MIDI event sequences.
//!
//! [`EventSequence`] keeps timestamped [`MidiMessage`]s sorted under inserts,
//! deletes and merges, pairs note-ons with their note-offs, and rebuilds the
//! controller/program/pitch-wheel state of a channel at any point in time.

pub mod error;
pub mod events;
pub mod timing;

pub use error::MessageError;
pub use events::MidiMessage;
pub use timing::{EventHolder, EventKey, EventSequence, NoteOffLink};
