//! Connection (typed, weighted edge) attached to its source Neurona.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound for connection weights.
pub const MAX_WEIGHT: u8 = 100;

/// Semantic connection type.
///
/// Six pairs are mutual inverses (`parent`/`child`, `validates`/`validated_by`,
/// ...); `related`, `relates_to` and `opposes` are their own inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Parent,
    Child,
    Validates,
    ValidatedBy,
    Blocks,
    BlockedBy,
    Implements,
    ImplementedBy,
    Tests,
    TestedBy,
    Prerequisite,
    Next,
    Related,
    RelatesTo,
    Opposes,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 15] = [
        ConnectionType::Parent,
        ConnectionType::Child,
        ConnectionType::Validates,
        ConnectionType::ValidatedBy,
        ConnectionType::Blocks,
        ConnectionType::BlockedBy,
        ConnectionType::Implements,
        ConnectionType::ImplementedBy,
        ConnectionType::Tests,
        ConnectionType::TestedBy,
        ConnectionType::Prerequisite,
        ConnectionType::Next,
        ConnectionType::Related,
        ConnectionType::RelatesTo,
        ConnectionType::Opposes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionType::Parent => "parent",
            ConnectionType::Child => "child",
            ConnectionType::Validates => "validates",
            ConnectionType::ValidatedBy => "validated_by",
            ConnectionType::Blocks => "blocks",
            ConnectionType::BlockedBy => "blocked_by",
            ConnectionType::Implements => "implements",
            ConnectionType::ImplementedBy => "implemented_by",
            ConnectionType::Tests => "tests",
            ConnectionType::TestedBy => "tested_by",
            ConnectionType::Prerequisite => "prerequisite",
            ConnectionType::Next => "next",
            ConnectionType::Related => "related",
            ConnectionType::RelatesTo => "relates_to",
            ConnectionType::Opposes => "opposes",
        }
    }

    /// The edge type a bidirectional link writes on the target, if any.
    pub fn inverse(self) -> Option<ConnectionType> {
        use ConnectionType::*;
        let inv = match self {
            Parent => Child,
            Child => Parent,
            Validates => ValidatedBy,
            ValidatedBy => Validates,
            Blocks => BlockedBy,
            BlockedBy => Blocks,
            Implements => ImplementedBy,
            ImplementedBy => Implements,
            Tests => TestedBy,
            TestedBy => Tests,
            Prerequisite => Next,
            Next => Prerequisite,
            Related => Related,
            RelatesTo => RelatesTo,
            Opposes => Opposes,
        };
        Some(inv)
    }

    pub fn is_self_inverse(self) -> bool {
        self.inverse() == Some(self)
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        ConnectionType::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| Error::UnknownType {
                kind: "connection type",
                value: s.to_string(),
            })
    }
}

/// A directed, typed, weighted edge. The source is the owning Neurona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub target_id: String,
    pub connection_type: ConnectionType,
    /// 0–100.
    pub weight: u8,
}

impl Connection {
    /// Weights above 100 are clamped.
    pub fn new(target_id: impl Into<String>, connection_type: ConnectionType, weight: u8) -> Self {
        Self {
            target_id: target_id.into(),
            connection_type,
            weight: weight.min(MAX_WEIGHT),
        }
    }
}
