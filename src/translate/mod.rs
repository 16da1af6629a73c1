//! Object ⇄ JSON translation.
//!
//! - [`strategy`]: per-kind field tables of getters and setters.
//! - [`registry`]: kind → strategies, built once at startup.
//! - [`translator`]: runs the strategies in both directions.

pub mod error;
pub mod registry;
pub mod strategy;
pub mod translator;

pub use error::{Rejection, SetError, TranslateError};
pub use registry::StrategyRegistry;
pub use strategy::{Strategy, StrategyBuilder, Translatable};
pub use translator::{JsonObject, JsonTranslator};
