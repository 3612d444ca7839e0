//! NAND timing model
//!
//! Models when the flash array can serve an operation. It never touches
//! data: the backend store moves bytes, this module only answers "how long
//! would the media have taken".
//!
//! ```text
//!   channel 0 ── die 0 ── block[0..blocks_per_die]
//!             └─ die 1 ── ...
//!   channel 1 ── ...
//! ```

pub mod clock;
pub mod model;

pub use clock::{Clock, ManualClock, SystemClock};
pub use model::{NandModel, NandOp, Ppa, WritePointerCursor};
