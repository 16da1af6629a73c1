//! Strategy registry.
//!
//! Maps an object kind to the strategies registered for exactly that kind,
//! in registration order. Built once at startup and read-only afterwards.
//! There is no fallback between kinds: a composite object (a wrapper and
//! the payload it owns) is translated by naming both layers explicitly, see
//! [`JsonTranslator::to_json_composite`](crate::JsonTranslator::to_json_composite).

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::error::RegistrationError;
use crate::translate::strategy::{Strategy, Translatable};

pub struct StrategyRegistry<O: Translatable> {
    by_kind: HashMap<O::Kind, Vec<Strategy<O>>>,
}

impl<O: Translatable> StrategyRegistry<O> {
    pub fn new() -> Self {
        Self { by_kind: HashMap::new() }
    }

    /// Builds a registry from a declaration list.
    pub fn load(strategies: impl IntoIterator<Item = Strategy<O>>) -> Result<Self, RegistrationError> {
        let mut registry = Self::new();
        for strategy in strategies {
            registry.register(strategy)?;
        }
        Ok(registry)
    }

    /// Adds a strategy after those already registered for its kind.
    ///
    /// Property names must be unique per role within one strategy; two
    /// strategies may share a name.
    pub fn register(&mut self, strategy: Strategy<O>) -> Result<(), RegistrationError> {
        let kind = strategy.target();
        check_unique(kind, "getter", strategy.getter_names())?;
        check_unique(kind, "setter", strategy.setter_names())?;

        debug!(
            kind = ?kind,
            getters = strategy.getter_names().count(),
            setters = strategy.setter_names().count(),
            "strategy registered"
        );
        self.by_kind.entry(kind).or_default().push(strategy);
        Ok(())
    }

    /// Strategies for exactly `kind`, in registration order.
    pub fn strategies_for(&self, kind: O::Kind) -> &[Strategy<O>] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_strategy_for(&self, kind: O::Kind) -> bool {
        !self.strategies_for(kind).is_empty()
    }

    /// Total number of registered strategies.
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

fn check_unique<K: fmt::Debug>(
    kind: K,
    role: &'static str,
    names: impl Iterator<Item = &'static str>,
) -> Result<(), RegistrationError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(RegistrationError::DuplicateProperty {
                kind: format!("{kind:?}"),
                property: name,
                role,
            });
        }
    }
    Ok(())
}

impl<O: Translatable> Default for StrategyRegistry<O> {
    fn default() -> Self { Self::new() }
}

impl<O: Translatable> fmt::Debug for StrategyRegistry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.by_kind.iter()).finish()
    }
}
