//! Compiled policy rules

use regex::Regex;
use std::fmt;

/// What a rule does with the requests it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forward the request to the upstream target
    Allow,
    /// Reject the request with 403 Forbidden
    Deny,
}

impl Action {
    /// Parses an action token, ignoring case.
    ///
    /// Returns `None` for anything other than `ALLOW` or `DENY`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "ALLOW" => Some(Action::Allow),
            "DENY" => Some(Action::Deny),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "ALLOW",
            Action::Deny => "DENY",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path glob compiled into an anchored matcher.
///
/// `*` matches any run of characters, including `/`. Every other character,
/// `?` included, matches only itself. The pattern must cover the whole path.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push_str("^(?s:");

        for (i, literal) in pattern.split('*').enumerate() {
            if i > 0 {
                expr.push_str(".*");
            }
            expr.push_str(&regex::escape(literal));
        }

        expr.push_str(")$");

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    /// Returns true if the whole of `path` matches the pattern.
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The pattern as written in the rule file.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// A single line of the rule file.
#[derive(Debug, Clone)]
pub struct Rule {
    pub action: Action,
    /// Upper-cased HTTP method
    pub method: String,
    pub path: PathPattern,
    /// 1-based line number in the rule file
    pub line_number: usize,
}

impl Rule {
    pub fn new(action: Action, method: &str, path: PathPattern, line_number: usize) -> Self {
        Self {
            action,
            method: method.to_ascii_uppercase(),
            path,
            line_number,
        }
    }

    /// Returns true if both the method and the path match.
    ///
    /// Method comparison is exact: the request method is expected as it
    /// arrived on the wire.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.method == method && self.path.matches(path)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} (line {})",
            self.action,
            self.method,
            self.path.as_str(),
            self.line_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_crosses_segments() {
        let pattern = PathPattern::compile("/api/*").unwrap();
        assert!(pattern.matches("/api/anything/nested"));
        assert!(pattern.matches("/api/"));
        assert!(!pattern.matches("/api"));
    }

    #[test]
    fn question_mark_is_literal() {
        let pattern = PathPattern::compile("/item?1").unwrap();
        assert!(pattern.matches("/item?1"));
        assert!(!pattern.matches("/item21"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let pattern = PathPattern::compile("/file.txt").unwrap();
        assert!(pattern.matches("/file.txt"));
        assert!(!pattern.matches("/fileXtxt"));

        let pattern = PathPattern::compile("/a+(b)[c]{d}|e^$\\").unwrap();
        assert!(pattern.matches("/a+(b)[c]{d}|e^$\\"));
    }

    #[test]
    fn pattern_is_anchored() {
        let pattern = PathPattern::compile("/public").unwrap();
        assert!(!pattern.matches("/public/x"));
        assert!(!pattern.matches("/x/public"));
    }

    #[test]
    fn action_tokens_ignore_case() {
        assert_eq!(Action::from_token("allow"), Some(Action::Allow));
        assert_eq!(Action::from_token("Deny"), Some(Action::Deny));
        assert_eq!(Action::from_token("ALOW"), None);
    }
}
