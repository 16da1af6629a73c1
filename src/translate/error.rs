//! Translation failures.

/// How a setter judged a value it refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The value itself is wrong (unknown reference id, out of range).
    Invalid,
    /// The value is fine but the object is not in a state that accepts it.
    Conflict,
}

/// Returned by a strategy setter that refuses a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SetError {
    kind: Rejection,
    message: String,
}

impl SetError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self { kind: Rejection::Invalid, message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self { kind: Rejection::Conflict, message: message.into() }
    }

    pub fn kind(&self) -> Rejection {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A structured translation failure, always naming the property involved.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("unknown property `{property}`")]
    UnknownProperty { property: String },

    #[error("invalid value for `{property}`: {source}")]
    InvalidValue {
        property: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{property}` rejected: {source}")]
    Rejected {
        property: String,
        #[source]
        source: SetError,
    },

    #[error("`{property}`: strategy for {kind} cannot view this object")]
    Projection { property: String, kind: String },

    #[error("`{property}` could not be serialized: {source}")]
    Serialize {
        property: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TranslateError {
    pub fn property(&self) -> &str {
        match self {
            Self::UnknownProperty { property }
            | Self::InvalidValue { property, .. }
            | Self::Rejected { property, .. }
            | Self::Projection { property, .. }
            | Self::Serialize { property, .. } => property,
        }
    }
}
