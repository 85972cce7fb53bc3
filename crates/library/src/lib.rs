pub mod cleanup;
pub mod clock;
pub mod error;
mod lifecycle;
pub mod validate;

pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::lifecycle::{DEFAULT_MAX_IMAGE_SIZE, Lifecycle, Limits, Realignment};
