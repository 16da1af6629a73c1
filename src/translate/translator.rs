//! Object ⇄ JSON translation.
//!
//! Stateless per call: every lookup goes through the immutable
//! [`StrategyRegistry`] built at startup, so one translator is shared by all
//! request handlers.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::translate::error::TranslateError;
use crate::translate::registry::StrategyRegistry;
use crate::translate::strategy::{Setter, Translatable};

pub type JsonObject = Map<String, Value>;

pub struct JsonTranslator<O: Translatable> {
    registry: Arc<StrategyRegistry<O>>,
}

impl<O: Translatable> Clone for JsonTranslator<O> {
    fn clone(&self) -> Self {
        Self { registry: Arc::clone(&self.registry) }
    }
}

impl<O: Translatable> JsonTranslator<O> {
    pub fn new(registry: StrategyRegistry<O>) -> Self {
        Self { registry: Arc::new(registry) }
    }

    pub fn registry(&self) -> &StrategyRegistry<O> {
        &self.registry
    }

    pub fn has_strategy_for(&self, obj: &O) -> bool {
        self.registry.has_strategy_for(obj.kind())
    }

    /// Runs every getter registered for the object's kind.
    ///
    /// A kind with no strategy yields an empty object.
    pub fn to_json(&self, obj: &O) -> Result<JsonObject, TranslateError> {
        let mut out = Map::new();
        self.to_json_into(obj, &mut out)?;
        Ok(out)
    }

    /// Like [`to_json`](Self::to_json) but writes into `out`, overwriting any
    /// property of the same name already there.
    pub fn to_json_into(&self, obj: &O, out: &mut JsonObject) -> Result<(), TranslateError> {
        let kind = obj.kind();
        let strategies = self.registry.strategies_for(kind);
        if strategies.is_empty() {
            trace!(kind = ?kind, "no strategy registered");
        }

        for strategy in strategies {
            for (name, getter) in strategy.getters() {
                out.insert(name.to_owned(), getter(obj)?);
            }
        }
        Ok(())
    }

    /// Merges several layers of one conceptual entity, outermost first.
    /// Later layers shadow earlier ones on shared property names.
    pub fn to_json_composite(&self, layers: &[&O]) -> Result<JsonObject, TranslateError> {
        let mut out = Map::new();
        for layer in layers {
            self.to_json_into(layer, &mut out)?;
        }
        Ok(out)
    }

    /// Applies every property of `json` to `target` through its setters.
    ///
    /// All keys are resolved before any setter runs, so an unknown key
    /// (with `fail_on_unknown`) leaves `target` untouched. Without
    /// `fail_on_unknown`, keys no setter claims are skipped. A setter
    /// failure stops the update; setters that already ran keep their
    /// effect. Use [`from_json_atomic`](Self::from_json_atomic) when that
    /// matters.
    pub fn from_json(&self, json: &JsonObject, target: &mut O, fail_on_unknown: bool) -> Result<(), TranslateError> {
        let kind = target.kind();
        let strategies = self.registry.strategies_for(kind);

        let mut plan: Vec<(&Setter<O>, &Value)> = Vec::with_capacity(json.len());
        for (key, value) in json {
            let before = plan.len();
            plan.extend(strategies.iter().filter_map(|s| s.setter(key)).map(|setter| (setter, value)));

            if plan.len() == before {
                if fail_on_unknown {
                    return Err(TranslateError::UnknownProperty { property: key.clone() });
                }
                trace!(kind = ?kind, property = %key, "ignoring property with no setter");
            }
        }

        for (setter, value) in plan {
            setter(target, value.clone())?;
        }
        Ok(())
    }

    /// [`from_json`](Self::from_json) applied to a copy of `target`, which
    /// replaces `target` only if every setter succeeded.
    pub fn from_json_atomic(&self, json: &JsonObject, target: &mut O, fail_on_unknown: bool) -> Result<(), TranslateError>
    where
        O: Clone,
    {
        let mut staged = target.clone();
        self.from_json(json, &mut staged, fail_on_unknown)?;
        *target = staged;
        Ok(())
    }
}
