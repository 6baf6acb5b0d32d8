//! This crate mirrors coursework from Gradescope and Canvas into a CalDAV task list.
//!
//! Tasks are fetched by [`TaskSource`](traits::TaskSource)s (see the [`source`] module), normalized, and compared
//! with the to-dos found in the calendar by the [`reconcile`] module. The resulting plan is applied by a
//! [`Writer`](writer::Writer) through a [`CalendarStore`](traits::CalendarStore), usually a CalDAV [`Client`](client::Client).
//!
//! A [`Synchronizer`](sync::Synchronizer) wires all of this together. \
//! Only the to-dos this crate created are ever modified or deleted. They are recognized by their UID.

pub mod traits;

mod task;
pub use task::{Origin, Task};
pub mod entry;
pub use entry::{CalendarEntry, RemoteEntry};
pub mod error;
pub mod config;

pub mod normalize;
pub mod reconcile;
pub mod retry;
pub mod writer;
pub mod sync;
pub use sync::Synchronizer;

pub mod source;
pub mod client;
mod resource;
pub mod ical;

pub mod utils;
mod mock_behaviour;
