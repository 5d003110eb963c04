//! Containers with a fixed capacity.
//!
//! The engine never grows beyond the number of connections it was configured for. Exhaustion is
//! reported to the caller instead of allocating more.
mod slotmap;

pub use self::slotmap::{Key, SlotMap};
