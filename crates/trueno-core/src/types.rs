//! Enumerations shared by the driver and its wire format.
//!
//! Every enum here has a fixed wire spelling (the `serde` rename) which is
//! what the remote service expects, and a `FromStr` that accepts the wire
//! spelling plus a few human-friendly aliases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TruenoError;

// ── Component Type ────────────────────────────────────────────────

/// The kind of a component. Fixed at construction of an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    #[serde(rename = "g")]
    Graph,
    #[serde(rename = "v")]
    Vertex,
    #[serde(rename = "e")]
    Edge,
    #[serde(rename = "c")]
    Compute,
    #[default]
    #[serde(rename = "")]
    Undefined,
}

impl ComponentType {
    /// The single-letter code used in payloads (`"g"`, `"v"`, `"e"`, `"c"`, `""`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graph => "g",
            Self::Vertex => "v",
            Self::Edge => "e",
            Self::Compute => "c",
            Self::Undefined => "",
        }
    }

    /// Human-readable name, used in log lines and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Vertex => "vertex",
            Self::Edge => "edge",
            Self::Compute => "compute",
            Self::Undefined => "undefined",
        }
    }

    /// Whether this type can be the target of fetch, count, destroy-by-type
    /// and neighbor queries.
    pub fn is_queryable(&self) -> bool {
        matches!(self, Self::Graph | Self::Vertex | Self::Edge)
    }

    pub fn is_undefined(&self) -> bool {
        *self == Self::Undefined
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComponentType {
    type Err = TruenoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "g" | "graph" => Ok(Self::Graph),
            "v" | "vertex" => Ok(Self::Vertex),
            "e" | "edge" => Ok(Self::Edge),
            "c" | "compute" => Ok(Self::Compute),
            _ => Err(TruenoError::UnknownComponentType(s.to_string())),
        }
    }
}

// ── Algorithm ─────────────────────────────────────────────────────

/// Algorithms the remote compute cluster can run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[serde(rename = "Dependencies")]
    Dependencies,
    #[serde(rename = "Page Rank")]
    PageRank,
    #[serde(rename = "Word Count")]
    WordCount,
    #[serde(rename = "Triangle Counting")]
    TriangleCounting,
    #[serde(rename = "Connected Components")]
    ConnectedComponents,
    #[serde(rename = "Strongly Connected Components")]
    StronglyConnectedComponents,
    #[serde(rename = "Shortest Paths")]
    ShortestPaths,
    #[default]
    #[serde(rename = "None")]
    None,
}

impl Algorithm {
    pub const ALL: [Algorithm; 8] = [
        Self::Dependencies,
        Self::PageRank,
        Self::WordCount,
        Self::TriangleCounting,
        Self::ConnectedComponents,
        Self::StronglyConnectedComponents,
        Self::ShortestPaths,
        Self::None,
    ];

    /// Wire name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dependencies => "Dependencies",
            Self::PageRank => "Page Rank",
            Self::WordCount => "Word Count",
            Self::TriangleCounting => "Triangle Counting",
            Self::ConnectedComponents => "Connected Components",
            Self::StronglyConnectedComponents => "Strongly Connected Components",
            Self::ShortestPaths => "Shortest Paths",
            Self::None => "None",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TruenoError;

    /// Accepts the wire name in any case, with spaces, dashes or underscores
    /// (`"Page Rank"`, `"page-rank"`, `"PAGE_RANK"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|algo| normalize(algo.as_str()) == wanted)
            .ok_or_else(|| TruenoError::UnknownAlgorithm(s.to_string()))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ── Job Status ────────────────────────────────────────────────────

/// Lifecycle of a deployed compute job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Started,
    Running,
    Finished,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }

    /// Polling stops once a job reaches a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    /// Extract the status from a job-status response document.
    ///
    /// Looks for a `status` string under `result` first and then at the top
    /// level. Returns `None` when neither is present or recognized.
    pub fn from_document(doc: &serde_json::Value) -> Option<Self> {
        doc.get("result")
            .and_then(|r| r.get("status"))
            .or_else(|| doc.get("status"))
            .and_then(|s| s.as_str())
            .and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = TruenoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STARTED" => Ok(Self::Started),
            "RUNNING" => Ok(Self::Running),
            "FINISHED" => Ok(Self::Finished),
            "ERROR" => Ok(Self::Error),
            _ => Err(TruenoError::UnknownJobStatus(s.to_string())),
        }
    }
}

// ── Direction ─────────────────────────────────────────────────────

/// Edge direction for neighbor and degree queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = TruenoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            _ => Err(TruenoError::UnknownDirection(s.to_string())),
        }
    }
}
