//! Everything between the physical switch matrix and a clean set of key-down and key-up events.
//!
//! The [`Sampler`] runs in interrupt context and pushes one raw [`KeyBitset`] per tick into a [`DebounceRing`].
//! The main loop takes a copy of that ring, reduces it to a stable state, and hands the stable state to an
//! [`EdgeTracker`], which reports which keys went down and which came up since the previous poll.

mod bitset;
pub use bitset::*;

mod debounce;
pub use debounce::*;

mod edges;
pub use edges::*;

mod matrix;
pub use matrix::*;

mod sampler;
pub use sampler::*;
