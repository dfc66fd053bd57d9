//! nginx configuration engine, pure half.
//!
//! Scanning, candidate scoring, insert/remove planning and snippet rendering.
//! No filesystem access happens here.

pub mod locate;
pub mod mutate;
pub mod scan;
pub mod snippet;

pub use locate::Candidate;
pub use mutate::InsertPlan;
pub use scan::ParseFailure;
