//! Neurona: a typed, taggable knowledge node.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Connection, ConnectionType, Value};
use crate::{Error, Result};

/// Neurona type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeuronaType {
    #[default]
    Concept,
    Reference,
    Artifact,
    StateMachine,
    Lesson,
    Requirement,
    TestCase,
    Issue,
    Feature,
}

impl NeuronaType {
    pub const ALL: [NeuronaType; 9] = [
        NeuronaType::Concept,
        NeuronaType::Reference,
        NeuronaType::Artifact,
        NeuronaType::StateMachine,
        NeuronaType::Lesson,
        NeuronaType::Requirement,
        NeuronaType::TestCase,
        NeuronaType::Issue,
        NeuronaType::Feature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NeuronaType::Concept => "concept",
            NeuronaType::Reference => "reference",
            NeuronaType::Artifact => "artifact",
            NeuronaType::StateMachine => "state_machine",
            NeuronaType::Lesson => "lesson",
            NeuronaType::Requirement => "requirement",
            NeuronaType::TestCase => "test_case",
            NeuronaType::Issue => "issue",
            NeuronaType::Feature => "feature",
        }
    }
}

impl fmt::Display for NeuronaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NeuronaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        NeuronaType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| Error::UnknownType {
                kind: "neurona type",
                value: s.to_string(),
            })
    }
}

/// Type-specific context block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Context {
    #[default]
    None,
    Requirement {
        status: Option<String>,
        priority: Option<u8>,
        assignee: Option<String>,
    },
    TestCase {
        status: Option<String>,
        framework: Option<String>,
    },
    Issue {
        status: Option<String>,
        priority: Option<u8>,
        assignee: Option<String>,
    },
    Artifact {
        runtime: Option<String>,
        file_path: Option<String>,
        safe_to_exec: bool,
    },
    Custom {
        fields: BTreeMap<String, String>,
    },
}

impl Context {
    /// Look up a context field by name. Free-form fields are typed with
    /// `Value::parse_literal`, so `"3"` compares as a number.
    pub fn get(&self, key: &str) -> Option<Value> {
        fn text(v: &Option<String>) -> Option<Value> {
            v.as_deref().map(Value::from)
        }
        match (self, key) {
            (Context::None, _) => None,
            (Context::Requirement { status, .. }, "status")
            | (Context::Issue { status, .. }, "status")
            | (Context::TestCase { status, .. }, "status") => text(status),
            (Context::Requirement { priority, .. }, "priority")
            | (Context::Issue { priority, .. }, "priority") => priority.map(Value::from),
            (Context::Requirement { assignee, .. }, "assignee")
            | (Context::Issue { assignee, .. }, "assignee") => text(assignee),
            (Context::TestCase { framework, .. }, "framework") => text(framework),
            (Context::Artifact { runtime, .. }, "runtime") => text(runtime),
            (Context::Artifact { file_path, .. }, "file_path") => text(file_path),
            (Context::Artifact { safe_to_exec, .. }, "safe_to_exec") => Some(Value::Bool(*safe_to_exec)),
            (Context::Custom { fields }, key) => fields.get(key).map(|v| Value::parse_literal(v)),
            _ => None,
        }
    }

    pub fn custom<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Context::Custom {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Optional LLM-facing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMetadata {
    pub short_title: Option<String>,
    /// Information density, 1 (sparse) to 4 (dense).
    pub density: u8,
    pub keywords: Vec<String>,
    pub token_count: Option<u32>,
    pub strategy: Option<String>,
}

impl Default for LlmMetadata {
    fn default() -> Self {
        Self {
            short_title: None,
            density: 2,
            keywords: Vec::new(),
            token_count: None,
            strategy: None,
        }
    }
}

impl LlmMetadata {
    pub fn validate(&self) -> Result<()> {
        if !(1..=4).contains(&self.density) {
            return Err(Error::Validation(format!(
                "llm density must be 1-4, got {}",
                self.density
            )));
        }
        Ok(())
    }
}

/// A knowledge node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neurona {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub neurona_type: NeuronaType,
    pub tags: BTreeSet<String>,
    pub context: Context,
    pub connections: Vec<Connection>,
    pub body: String,
    pub updated: Option<DateTime<Utc>>,
    pub llm_metadata: Option<LlmMetadata>,
}

impl Neurona {
    pub fn new(id: impl Into<String>, title: impl Into<String>, neurona_type: NeuronaType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            neurona_type,
            tags: BTreeSet::new(),
            context: Context::None,
            connections: Vec::new(),
            body: String::new(),
            updated: None,
            llm_metadata: None,
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_connection(
        mut self,
        target_id: impl Into<String>,
        connection_type: ConnectionType,
        weight: u8,
    ) -> Self {
        self.connections.push(Connection::new(target_id, connection_type, weight));
        self
    }

    pub fn with_updated(mut self, updated: DateTime<Utc>) -> Self {
        self.updated = Some(updated);
        self
    }

    pub fn with_llm_metadata(mut self, meta: LlmMetadata) -> Self {
        self.llm_metadata = Some(meta);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// First connection to `target_id`.
    pub fn connection_to(&self, target_id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.target_id == target_id)
    }

    /// Text fed to lexical and embedding indexes: title, tags, body.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.body.len() + 16);
        text.push_str(&self.title);
        for tag in &self.tags {
            text.push(' ');
            text.push_str(tag);
        }
        text.push(' ');
        text.push_str(&self.body);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neurona_type_parse() {
        assert_eq!("test_case".parse::<NeuronaType>().unwrap(), NeuronaType::TestCase);
        assert_eq!("State_Machine".parse::<NeuronaType>().unwrap(), NeuronaType::StateMachine);
        assert!(matches!(
            "bug".parse::<NeuronaType>(),
            Err(Error::UnknownType { kind: "neurona type", .. })
        ));
    }

    #[test]
    fn test_context_lookup() {
        let ctx = Context::Issue {
            status: Some("open".into()),
            priority: Some(1),
            assignee: None,
        };
        assert_eq!(ctx.get("status"), Some(Value::from("open")));
        assert_eq!(ctx.get("priority"), Some(Value::Int(1)));
        assert_eq!(ctx.get("assignee"), None);
        assert_eq!(ctx.get("framework"), None);
    }

    #[test]
    fn test_custom_context_is_typed() {
        let ctx = Context::custom([("phase", "2"), ("owner", "ops")]);
        assert_eq!(ctx.get("phase"), Some(Value::Int(2)));
        assert_eq!(ctx.get("owner"), Some(Value::from("ops")));
    }

    #[test]
    fn test_llm_density_range() {
        assert!(LlmMetadata::default().validate().is_ok());
        let meta = LlmMetadata { density: 5, ..Default::default() };
        assert!(matches!(meta.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_searchable_text_includes_tags() {
        let n = Neurona::new("a", "Auth flow", NeuronaType::Concept)
            .with_tags(["security"])
            .with_body("Token refresh");
        let text = n.searchable_text();
        assert!(text.contains("Auth flow"));
        assert!(text.contains("security"));
        assert!(text.contains("Token refresh"));
    }
}
