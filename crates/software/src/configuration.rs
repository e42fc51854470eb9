//! User-configurable device settings, plus the build-time [`Tuning`] that shapes timing behavior.
//!
//! [`Settings`] is what the host reads and writes over SysEx and what gets persisted. The enums it contains derive
//! `FromPrimitive` so that raw wire bytes can be turned into variants without hand-written match tables.

mod animation;
pub use animation::*;

mod output_mode;
pub use output_mode::*;

mod settings;
pub use settings::*;

mod side_bank;
pub use side_bank::*;

mod tuning;
pub use tuning::*;
