//! Task sources
//!
//! Each source talks to its service through a client handle (a trait object or generic),
//! so that the mapping from upstream records to [`Task`](crate::Task)s can be tested without a network.

pub mod canvas;
pub mod gradescope;

pub use canvas::CanvasSource;
pub use gradescope::GradescopeSource;
