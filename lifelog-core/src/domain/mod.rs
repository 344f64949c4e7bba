//! Domain types: lifelog records, calendar days, sort direction, clocks.

pub mod clock;
pub mod day;
pub mod lifelog;

pub use clock::{Clock, FixedClock, SystemClock};
pub use day::{next_day, DayRange, Direction};
pub use lifelog::{DateExtractionError, Lifelog};
