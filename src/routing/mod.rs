//! Request routing.
//!
//! - [`pattern`]: segment kinds and the path matcher.
//! - [`table`]: the ordered, first-match-wins route table.
//! - [`controller`]: turns handler-bearing controllers into table entries.

pub mod controller;
pub mod pattern;
pub mod table;

pub use controller::{Controller, RouteDef, register};
pub use pattern::{Params, Pattern, Segment, match_path};
pub use table::{Matched, Route, Router};
