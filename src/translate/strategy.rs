//! Per-kind translation strategies.
//!
//! The host's object graph is a closed set of kinds. A host describes it by
//! implementing [`Translatable`] on its object type (usually an enum with
//! one variant per kind) and then declares one or more [`Strategy`] values
//! per kind. A strategy is a field table: JSON property name to getter
//! and/or setter. The object types themselves never see JSON.
//!
//! ```rust
//! use fascia::{SetError, Strategy, Translatable};
//!
//! #[derive(Clone)]
//! struct Crate { open: bool }
//!
//! #[derive(Clone)]
//! enum Object { Crate(Crate) }
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum Kind { Crate }
//!
//! impl Translatable for Object {
//!     type Kind = Kind;
//!     fn kind(&self) -> Kind { Kind::Crate }
//! }
//!
//! fn as_crate(o: &Object) -> Option<&Crate> { let Object::Crate(c) = o; Some(c) }
//! fn as_crate_mut(o: &mut Object) -> Option<&mut Crate> { let Object::Crate(c) = o; Some(c) }
//!
//! let strategy = Strategy::builder(Kind::Crate, as_crate, as_crate_mut)
//!     .get("open", |c: &Crate| c.open)
//!     .set("open", |c: &mut Crate, open: bool| -> Result<(), SetError> {
//!         c.open = open;
//!         Ok(())
//!     })
//!     .build();
//! assert_eq!(strategy.getter_names().collect::<Vec<_>>(), ["open"]);
//! ```

use std::fmt;
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::translate::error::{SetError, TranslateError};

/// The host's closed set of translatable objects.
pub trait Translatable {
    /// Tag identifying the exact kind of an object.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

pub(crate) type Getter<O> = Box<dyn Fn(&O) -> Result<Value, TranslateError> + Send + Sync>;
pub(crate) type Setter<O> = Box<dyn Fn(&mut O, Value) -> Result<(), TranslateError> + Send + Sync>;

/// A field table for one object kind.
pub struct Strategy<O: Translatable> {
    target: O::Kind,
    getters: Vec<(&'static str, Getter<O>)>,
    setters: Vec<(&'static str, Setter<O>)>,
}

impl<O: Translatable + 'static> Strategy<O> {
    /// Starts a strategy for `target`.
    ///
    /// `view` and `view_mut` project the host object onto the concrete type
    /// the getters and setters work with. They return `None` only if the
    /// object is not of kind `target`, which the registry never asks for.
    pub fn builder<T: 'static>(
        target: O::Kind,
        view: fn(&O) -> Option<&T>,
        view_mut: fn(&mut O) -> Option<&mut T>,
    ) -> StrategyBuilder<O, T> {
        StrategyBuilder {
            target,
            view,
            view_mut,
            getters: Vec::new(),
            setters: Vec::new(),
        }
    }
}

impl<O: Translatable> Strategy<O> {
    pub fn target(&self) -> O::Kind {
        self.target
    }

    pub fn getter_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.getters.iter().map(|(n, _)| *n)
    }

    pub fn setter_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.setters.iter().map(|(n, _)| *n)
    }

    pub(crate) fn getters(&self) -> impl Iterator<Item = (&'static str, &Getter<O>)> {
        self.getters.iter().map(|(n, g)| (*n, g))
    }

    pub(crate) fn setter(&self, name: &str) -> Option<&Setter<O>> {
        self.setters.iter().find(|(n, _)| *n == name).map(|(_, s)| s)
    }
}

impl<O: Translatable> fmt::Debug for Strategy<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("target", &self.target)
            .field("getters", &self.getter_names().collect::<Vec<_>>())
            .field("setters", &self.setter_names().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder returned by [`Strategy::builder`].
pub struct StrategyBuilder<O: Translatable, T> {
    target: O::Kind,
    view: fn(&O) -> Option<&T>,
    view_mut: fn(&mut O) -> Option<&mut T>,
    getters: Vec<(&'static str, Getter<O>)>,
    setters: Vec<(&'static str, Setter<O>)>,
}

impl<O: Translatable + 'static, T: 'static> StrategyBuilder<O, T> {
    /// Declares a serialized property.
    ///
    /// Non-finite floats serialize as JSON `null`.
    pub fn get<V, F>(mut self, name: &'static str, f: F) -> Self
    where
        V: Serialize,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let view = self.view;
        let kind = self.target;
        let getter: Getter<O> = Box::new(move |obj: &O| {
            let target = view(obj).ok_or_else(|| TranslateError::Projection {
                property: name.to_owned(),
                kind: format!("{kind:?}"),
            })?;
            serde_json::to_value(f(target)).map_err(|source| TranslateError::Serialize {
                property: name.to_owned(),
                source,
            })
        });
        self.getters.push((name, getter));
        self
    }

    /// Declares a deserialized property.
    ///
    /// The JSON value is decoded into `V` before the setter runs; a decode
    /// failure never reaches the object. A `null` only decodes if `V`
    /// accepts it (e.g. `Option<f32>`).
    pub fn set<V, F>(mut self, name: &'static str, f: F) -> Self
    where
        V: DeserializeOwned,
        F: Fn(&mut T, V) -> Result<(), SetError> + Send + Sync + 'static,
    {
        let view_mut = self.view_mut;
        let kind = self.target;
        let setter: Setter<O> = Box::new(move |obj: &mut O, value: Value| {
            let decoded: V = serde_json::from_value(value).map_err(|source| TranslateError::InvalidValue {
                property: name.to_owned(),
                source,
            })?;
            let target = view_mut(obj).ok_or_else(|| TranslateError::Projection {
                property: name.to_owned(),
                kind: format!("{kind:?}"),
            })?;
            f(target, decoded).map_err(|source| TranslateError::Rejected {
                property: name.to_owned(),
                source,
            })
        });
        self.setters.push((name, setter));
        self
    }

    pub fn build(self) -> Strategy<O> {
        Strategy {
            target: self.target,
            getters: self.getters,
            setters: self.setters,
        }
    }
}
