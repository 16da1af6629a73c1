//! HTTP method as a typed enum.
//!
//! Covers the RFC 9110 methods. Routes are declared with a [`Method`]; the
//! wire string of an incoming request is parsed case-sensitively, so `get`
//! never matches a `GET` route. A string that parses to no method can never
//! reach a handler; the façade answers it with `405 Method Not Allowed`.

use std::fmt;
use std::str::FromStr;

/// A known HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
        }
    }
}

/// Returned when a wire string names no known method.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown HTTP method `{0}`")]
pub struct UnknownMethod(pub String);

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            other     => Err(UnknownMethod(other.to_owned())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uppercase_methods() {
        assert_eq!("GET".parse::<Method>(), Ok(Method::Get));
        assert_eq!("DELETE".parse::<Method>(), Ok(Method::Delete));
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert_eq!("get".parse::<Method>(), Err(UnknownMethod("get".into())));
        assert!("Post".parse::<Method>().is_err());
    }

    #[test]
    fn unknown_method_names_the_wire_string() {
        let err = "BREW".parse::<Method>().unwrap_err();
        assert_eq!(err.to_string(), "unknown HTTP method `BREW`");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn display_round_trips_wire_form() {
        for m in [Method::Get, Method::Put, Method::Options] {
            assert_eq!(m.to_string().parse::<Method>(), Ok(m));
        }
    }
}
