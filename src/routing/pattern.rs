//! Path patterns and the segment matcher.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! | Syntax   | Matches                                                 |
//! |----------|---------------------------------------------------------|
//! | `things` | exactly that segment, ASCII case-insensitively          |
//! | `:id`    | any one segment, bound verbatim to `id`                 |
//! | `**rest` | one or more trailing segments, joined with `/`          |
//!
//! Patterns are relative to the mount root: `api/things/:id` is matched
//! against a request path `/api/things/42`. The request path is split on
//! `/` and its first token (the empty string before the leading slash) is
//! dropped before the index-by-index comparison. The bare root `/` has no
//! segments, so it is matched by the empty pattern.
//!
//! Segments are percent-decoded after splitting, so `a%2Fb` stays one
//! segment and binds as `a/b`. A rest capture never binds an empty value:
//! `things/**rest` does not match `/things/`.

use std::borrow::Cow;
use std::fmt;

use crate::error::RegistrationError;

/// One segment of a [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Capture(String),
    Rest(String),
}

/// A parsed, immutable path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses a pattern.
    ///
    /// Empty segments and `~` segments are dropped, so `api//things/~` and
    /// `api/things` are the same pattern. A rest capture must be the final
    /// segment and capture names must be unique and non-empty.
    pub fn parse(pattern: &str) -> Result<Self, RegistrationError> {
        let mut segments = Vec::new();

        for raw in pattern.split('/').filter(|s| !s.is_empty() && *s != "~") {
            if let Some(Segment::Rest(name)) = segments.last() {
                return Err(RegistrationError::RestNotLast {
                    pattern: pattern.to_owned(),
                    name: name.clone(),
                });
            }

            let segment = if let Some(name) = raw.strip_prefix("**") {
                Segment::Rest(name.to_owned())
            } else if let Some(name) = raw.strip_prefix(':') {
                Segment::Capture(name.to_owned())
            } else {
                Segment::Literal(raw.to_owned())
            };

            if let Segment::Capture(name) | Segment::Rest(name) = &segment {
                if name.is_empty() {
                    return Err(RegistrationError::EmptyCaptureName { pattern: pattern.to_owned() });
                }
                let seen = segments.iter().any(|s| match s {
                    Segment::Capture(n) | Segment::Rest(n) => n == name,
                    Segment::Literal(_) => false,
                });
                if seen {
                    return Err(RegistrationError::DuplicateCapture {
                        pattern: pattern.to_owned(),
                        name: name.clone(),
                    });
                }
            }

            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Joins a base path and a sub-path into one pattern without doubled
    /// separators. A sub-path of `~` or `""` is the base path itself.
    pub fn join(base: &str, sub: &str) -> Result<Self, RegistrationError> {
        let base = base.trim_matches('/');
        let sub = sub.trim_matches('/');
        match (base.is_empty(), sub.is_empty() || sub == "~") {
            (_, true) => Self::parse(base),
            (true, false) => Self::parse(sub),
            (false, false) => Self::parse(&format!("{base}/{sub}")),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of every capture in pattern order.
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(n) | Segment::Rest(n) => Some(n.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_rest(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Rest(_)))
    }

    /// Matches a request path, returning the captured values on success.
    pub fn matches(&self, request_path: &str) -> Option<Params> {
        let mut request: Vec<Cow<'_, str>> = request_path.split('/').skip(1).map(decode_segment).collect();
        if request.len() == 1 && request[0].is_empty() {
            request.clear();
        }

        if self.has_rest() {
            if request.len() < self.segments.len() {
                return None;
            }
        } else if request.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::default();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(expected) => {
                    if !expected.eq_ignore_ascii_case(&request[i]) {
                        return None;
                    }
                }
                Segment::Capture(name) => params.push(name, &request[i]),
                Segment::Rest(name) => {
                    let rest = request[i..].join("/");
                    if rest.is_empty() {
                        return None;
                    }
                    params.push(name, &rest);
                    break;
                }
            }
        }
        Some(params)
    }
}

/// Percent-decodes one segment. Bytes that do not decode to UTF-8 are
/// matched as written.
fn decode_segment(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match segment {
                Segment::Literal(s) => f.write_str(s)?,
                Segment::Capture(n) => write!(f, ":{n}")?,
                Segment::Rest(n) => write!(f, "**{n}")?,
            }
        }
        Ok(())
    }
}

/// Matches `request_path` against the pattern string `pattern`.
///
/// `None` covers both "no match" and an unparseable pattern; routes parse
/// their pattern once at registration and call [`Pattern::matches`].
pub fn match_path(request_path: &str, pattern: &str) -> Option<Params> {
    Pattern::parse(pattern).ok()?.matches(request_path)
}

// ── Params ────────────────────────────────────────────────────────────────────

/// Captured path parameters, in order.
///
/// From the route table the order is pattern order. A handler registered
/// through a [`Controller`](crate::Controller) receives only the parameters
/// it declared, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub(crate) fn push(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_owned(), value.to_owned()));
    }

    /// Looks up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Positional access.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reorders into `names` order, keeping only those names.
    pub(crate) fn bind(&self, names: &[String]) -> Params {
        let entries = names.iter()
            .filter_map(|n| self.get(n).map(|v| (n.clone(), v.to_owned())))
            .collect();
        Params { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Pattern {
        Pattern::parse(s).unwrap()
    }

    #[test]
    fn literal_match_ignores_case() {
        assert!(p("api/time/speed").matches("/API/Time/speed").is_some());
        assert!(p("api/time/speed").matches("/api/time/beat").is_none());
    }

    #[test]
    fn segment_count_must_be_equal_without_rest() {
        assert!(p("api/time").matches("/api/time/speed").is_none());
        assert!(p("api/time/speed").matches("/api/time").is_none());
    }

    #[test]
    fn trailing_slash_is_an_extra_segment() {
        assert!(p("api/time").matches("/api/time/").is_none());
    }

    #[test]
    fn capture_binds_verbatim() {
        let params = p("api/things/:id").matches("/api/things/AbC").unwrap();
        assert_eq!(params.get("id"), Some("AbC"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn rest_absorbs_trailing_segments() {
        let pattern = p("api/by-path/**path");
        let params = pattern.matches("/api/by-path/~/tabletop/Token!x").unwrap();
        assert_eq!(params.get("path"), Some("~/tabletop/Token!x"));

        let one = pattern.matches("/api/by-path/x").unwrap();
        assert_eq!(one.get("path"), Some("x"));
    }

    #[test]
    fn rest_needs_at_least_one_segment() {
        assert!(p("api/by-path/**path").matches("/api/by-path").is_none());
    }

    #[test]
    fn rest_rejects_empty_trailing_segment() {
        assert!(p("things/**rest").matches("/things/").is_none());
        assert_eq!(p("things/**rest").matches("/things/a/").unwrap().get("rest"), Some("a/"));
    }

    #[test]
    fn empty_pattern_matches_root() {
        let root = Pattern::join("", "~").unwrap();
        assert!(root.segments().is_empty());
        assert_eq!(root.matches("/"), Some(Params::default()));
        assert!(root.matches("/api").is_none());
        assert!(p("/").matches("/").is_some());
        assert!(p("api").matches("/").is_none());
    }

    #[test]
    fn segments_are_decoded_after_splitting() {
        let params = p("api/things/:id").matches("/api/things/a%2Fb").unwrap();
        assert_eq!(params.get("id"), Some("a/b"));

        assert!(p("api/by-path/**path").matches("/api/by-path/%7E/tabletop%21t1").is_some());
        assert_eq!(
            p("api/by-path/**path").matches("/api/by-path/~/tabletop%21t1").unwrap().get("path"),
            Some("~/tabletop!t1")
        );
        assert!(p("api/time").matches("/api%2Ftime").is_none());
    }

    #[test]
    fn undecodable_segment_is_matched_as_written() {
        let params = p("things/:id").matches("/things/%FF").unwrap();
        assert_eq!(params.get("id"), Some("%FF"));
    }

    #[test]
    fn literal_mismatch_before_rest_short_circuits() {
        assert!(p("api/by-path/**path").matches("/api/other/a/b").is_none());
    }

    #[test]
    fn multiple_captures_keep_pattern_order() {
        let params = p("api/:a/x/:b").matches("/api/one/X/two").unwrap();
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("a", "one"), ("b", "two")]);
        assert_eq!(params.arg(1), Some("two"));
    }

    #[test]
    fn rest_must_be_last() {
        assert_eq!(
            Pattern::parse("api/**path/tokens"),
            Err(RegistrationError::RestNotLast {
                pattern: "api/**path/tokens".into(),
                name: "path".into(),
            })
        );
    }

    #[test]
    fn empty_and_duplicate_names_are_rejected() {
        assert!(matches!(
            Pattern::parse("api/:"),
            Err(RegistrationError::EmptyCaptureName { .. })
        ));
        assert!(matches!(
            Pattern::parse("api/:id/**id"),
            Err(RegistrationError::DuplicateCapture { .. })
        ));
    }

    #[test]
    fn join_normalizes_separators() {
        assert_eq!(Pattern::join("/api/time/", "/speed").unwrap(), p("api/time/speed"));
        assert_eq!(Pattern::join("api/game-state", "~").unwrap(), p("api/game-state"));
        assert_eq!(Pattern::join("api/game-state", "").unwrap(), p("api/game-state"));
        assert_eq!(Pattern::join("", "things").unwrap(), p("things"));
        assert_eq!(Pattern::join("api/by-path", "~/spheres").unwrap(), p("api/by-path/spheres"));
    }

    #[test]
    fn display_reproduces_syntax() {
        assert_eq!(p("/api/:id/**rest").to_string(), "api/:id/**rest");
    }

    #[test]
    fn match_path_parses_on_the_fly() {
        assert_eq!(match_path("/things/42", "things/:id").unwrap().get("id"), Some("42"));
        assert!(match_path("/things/42", "things/**").is_none());
    }

    #[test]
    fn bind_reorders_to_declaration() {
        let params = p("api/:a/:b").matches("/api/1/2").unwrap();
        let bound = params.bind(&["b".to_owned(), "a".to_owned()]);
        assert_eq!(bound.arg(0), Some("2"));
        assert_eq!(bound.arg(1), Some("1"));
    }
}
