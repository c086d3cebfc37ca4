mod controller_state;
mod pairing;
mod sequence;

pub use pairing::NoteOffLink;
pub use sequence::{EventHolder, EventKey, EventSequence, Iter};
