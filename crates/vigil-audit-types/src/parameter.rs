//! Per-parameter metadata attached to an audit declaration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One piece of metadata declared on a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterAnnotation {
    /// Marks the parameter as audited and gives it a human-readable label.
    Audited { description: String },
    /// Free-form metadata the strategy may interpret.
    Tag { name: String, value: String },
}

impl ParameterAnnotation {
    /// The label carried by this annotation, if it is label-bearing.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Audited { description } => Some(description),
            Self::Tag { .. } => None,
        }
    }
}

/// Metadata declared for one parameter position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Label under which the argument is exposed to strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Additional metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl ParameterDescriptor {
    /// A descriptor with no metadata.
    pub fn none() -> Self {
        Self::default()
    }

    /// A descriptor labelling the parameter.
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// The parameter label, if one was declared.
    pub fn label(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// All annotations on this parameter; the label comes first.
    pub fn annotations(&self) -> Vec<ParameterAnnotation> {
        let label = self.description.iter().map(|d| ParameterAnnotation::Audited {
            description: d.clone(),
        });
        let tags = self.tags.iter().map(|(name, value)| ParameterAnnotation::Tag {
            name: name.clone(),
            value: value.clone(),
        });
        label.chain(tags).collect()
    }

    /// Whether nothing at all is declared for this parameter.
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.tags.is_empty()
    }
}
