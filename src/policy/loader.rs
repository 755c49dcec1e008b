//! Rule file loading
//!
//! The rule file holds one rule per line:
//!
//! ```text
//! # comment
//! ALLOW GET  /public/*
//! DENY  GET  /public/secret
//! ALLOW POST /api/items
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Any other line must
//! have exactly three whitespace-separated fields, otherwise the whole file
//! is rejected.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::policy::rule::{Action, PathPattern, Rule};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read rule file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rule format on line {line_number}: {line}. Expected: <ALLOW|DENY> <METHOD> <PATH>")]
    InvalidRule { line_number: usize, line: String },

    #[error("unknown action '{action}' on line {line_number}: {line}. Expected ALLOW or DENY")]
    UnknownAction {
        line_number: usize,
        line: String,
        action: String,
    },

    #[error("invalid path pattern '{pattern}' on line {line_number}")]
    InvalidPattern {
        line_number: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// The ordered, immutable set of rules the proxy enforces.
///
/// Built once at startup and shared read-only between connections.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    rules: Vec<Rule>,
}

impl PolicySet {
    /// Reads and compiles a rule file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Compiles the full text of a rule file, keeping file order.
    pub fn parse(content: &str) -> Result<Self, PolicyError> {
        let mut rules = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            rules.push(parse_rule(line, index + 1)?);
        }

        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromStr for PolicySet {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_rule(line: &str, line_number: usize) -> Result<Rule, PolicyError> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    let [action, method, pattern] = fields[..] else {
        return Err(PolicyError::InvalidRule {
            line_number,
            line: line.to_string(),
        });
    };

    let action = Action::from_token(action).ok_or_else(|| PolicyError::UnknownAction {
        line_number,
        line: line.to_string(),
        action: action.to_string(),
    })?;

    let path = PathPattern::compile(pattern).map_err(|source| PolicyError::InvalidPattern {
        line_number,
        pattern: pattern.to_string(),
        source,
    })?;

    Ok(Rule::new(action, method, path, line_number))
}
