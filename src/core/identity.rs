//! Entity identity system: managed entity kinds and kind-prefixed ULIDs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Managed school entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Teacher,
    Student,
    Parent,
    Subject,
    Class,
    /// School year / level a class belongs to
    Grade,
    Lesson,
    Exam,
    Assignment,
    /// Score recorded against an exam or assignment
    Result,
    Event,
    Announcement,
}

impl EntityKind {
    /// Lowercase kind name, as used in schema files and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Teacher => "teacher",
            EntityKind::Student => "student",
            EntityKind::Parent => "parent",
            EntityKind::Subject => "subject",
            EntityKind::Class => "class",
            EntityKind::Grade => "grade",
            EntityKind::Lesson => "lesson",
            EntityKind::Exam => "exam",
            EntityKind::Assignment => "assignment",
            EntityKind::Result => "result",
            EntityKind::Event => "event",
            EntityKind::Announcement => "announcement",
        }
    }

    /// Identifier prefix for entities of this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Teacher => "TCH",
            EntityKind::Student => "STU",
            EntityKind::Parent => "PAR",
            EntityKind::Subject => "SUB",
            EntityKind::Class => "CLS",
            EntityKind::Grade => "GRD",
            EntityKind::Lesson => "LSN",
            EntityKind::Exam => "EXM",
            EntityKind::Assignment => "ASG",
            EntityKind::Result => "RES",
            EntityKind::Event => "EVT",
            EntityKind::Announcement => "ANN",
        }
    }

    /// Get all entity kinds
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Teacher,
            EntityKind::Student,
            EntityKind::Parent,
            EntityKind::Subject,
            EntityKind::Class,
            EntityKind::Grade,
            EntityKind::Lesson,
            EntityKind::Exam,
            EntityKind::Assignment,
            EntityKind::Result,
            EntityKind::Event,
            EntityKind::Announcement,
        ]
    }

    /// Resolve a kind from its identifier prefix (e.g. "TCH")
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let upper = prefix.to_uppercase();
        Self::all().iter().copied().find(|k| k.prefix() == upper)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        // Accept plural list names ("teachers") as well
        let singular = lower.strip_suffix('s').filter(|_| lower != "class");
        EntityKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == lower || Some(k.as_str()) == singular)
            .or_else(|| (lower == "classes").then_some(EntityKind::Class))
            .ok_or_else(|| IdParseError::UnknownEntityKind(s.to_string()))
    }
}

/// A unique entity identifier combining a kind prefix and ULID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    kind: EntityKind,
    ulid: Ulid,
}

impl EntityId {
    /// Allocate a fresh identifier for the given kind
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            ulid: Ulid::new(),
        }
    }

    /// Get the entity kind encoded in the prefix
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// Parse an EntityId from a string
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind.prefix(), self.ulid)
    }
}

impl FromStr for EntityId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix_str, ulid_str) = s
            .split_once('-')
            .ok_or_else(|| IdParseError::MissingDelimiter(s.to_string()))?;

        let kind = EntityKind::from_prefix(prefix_str)
            .ok_or_else(|| IdParseError::InvalidPrefix(prefix_str.to_string()))?;
        let ulid = Ulid::from_string(ulid_str)
            .map_err(|e| IdParseError::InvalidUlid(ulid_str.to_string(), e.to_string()))?;

        Ok(Self { kind, ulid })
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing entity kinds and IDs
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("unknown entity kind: '{0}' (valid: teacher, student, parent, subject, class, grade, lesson, exam, assignment, result, event, announcement)")]
    UnknownEntityKind(String),

    #[error("invalid entity prefix: '{0}' (valid: TCH, STU, PAR, SUB, CLS, GRD, LSN, EXM, ASG, RES, EVT, ANN)")]
    InvalidPrefix(String),

    #[error("missing '-' delimiter in entity ID: '{0}'")]
    MissingDelimiter(String),

    #[error("invalid ULID '{0}': {1}")]
    InvalidUlid(String, String),
}
