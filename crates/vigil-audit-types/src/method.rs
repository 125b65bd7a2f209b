//! Audited method identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identity of an audited method: owning type, name and parameter signature.
///
/// The textual form is `Owner::name(T1, T2)`; free functions omit the owner
/// (`name(T1)`). That form is also what configuration files use, so the type
/// serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodIdentity {
    owner: String,
    name: String,
    parameter_types: Vec<String>,
}

/// Errors produced when parsing a method identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodIdentityError {
    #[error("method identity is empty")]
    Empty,

    #[error("method identity `{0}` has no method name")]
    MissingName(String),

    #[error("method identity `{0}` has unbalanced brackets")]
    Unbalanced(String),
}

impl MethodIdentity {
    /// Create an identity for a method on `owner`.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            parameter_types: Vec::new(),
        }
    }

    /// Create an identity for a free function.
    pub fn function(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    /// Set the parameter type names.
    pub fn with_parameters<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Owning type, empty for free functions.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter type names.
    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.parameter_types.len()
    }

    /// Signature without the owner, e.g. `save(Order, bool)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameter_types.join(", "))
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.owner.is_empty() {
            write!(f, "{}", self.signature())
        } else {
            write!(f, "{}::{}", self.owner, self.signature())
        }
    }
}

/// Split on top-level commas, ignoring those nested in generics or tuples.
fn split_parameters(list: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();

    for c in list.chars() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    if depth != 0 {
        return None;
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    Some(parts)
}

impl FromStr for MethodIdentity {
    type Err = MethodIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MethodIdentityError::Empty);
        }

        let (path, parameter_types) = match s.find('(') {
            Some(open) => {
                let rest = s[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| MethodIdentityError::Unbalanced(s.to_string()))?;
                let params = split_parameters(rest)
                    .ok_or_else(|| MethodIdentityError::Unbalanced(s.to_string()))?;
                (&s[..open], params)
            }
            None => (s, Vec::new()),
        };

        let (owner, name) = match path.rfind("::") {
            Some(idx) => (&path[..idx], &path[idx + 2..]),
            None => ("", path),
        };

        if name.trim().is_empty() {
            return Err(MethodIdentityError::MissingName(s.to_string()));
        }

        Ok(Self {
            owner: owner.trim().to_string(),
            name: name.trim().to_string(),
            parameter_types,
        })
    }
}

impl TryFrom<String> for MethodIdentity {
    type Error = MethodIdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MethodIdentity> for String {
    fn from(identity: MethodIdentity) -> Self {
        identity.to_string()
    }
}
