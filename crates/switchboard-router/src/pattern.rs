//! Path patterns for subscription matching.
//!
//! A pattern is a `/`-separated list of literal segments, optionally ending
//! in a `*` wildcard that matches any (possibly empty) remaining suffix.
//! The bare pattern `*` therefore matches every path. Matching is performed
//! against the request path only; a query string is stripped first.

/// A single compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Matches the rest of the path, including nothing.
    Wildcard,
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern string. Everything after the first `*` segment is
    /// ignored, since the wildcard already consumes the remaining suffix.
    pub fn parse(pattern: &str) -> Self {
        let mut segments = Vec::new();
        for raw in pattern.trim_matches('/').split('/') {
            if raw.is_empty() {
                continue;
            }
            if raw == "*" {
                segments.push(Segment::Wildcard);
                break;
            }
            segments.push(Segment::Literal(raw.to_string()));
        }
        Self { segments }
    }

    /// Test a request path (query string tolerated) against this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        let mut parts = path.trim_matches('/').split('/').filter(|s| !s.is_empty());

        for segment in &self.segments {
            match segment {
                Segment::Wildcard => return true,
                Segment::Literal(lit) => match parts.next() {
                    Some(part) if part == lit => {}
                    _ => return false,
                },
            }
        }

        // Pattern exhausted: the path must be too.
        parts.next().is_none()
    }
}
