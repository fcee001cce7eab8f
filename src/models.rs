//! Core data model — rows persisted in the index store (C3) plus the
//! derived/in-memory records passed between components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Active,
    Deleted,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Active => "active",
            FileStatus::Deleted => "deleted",
            FileStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "deleted" => FileStatus::Deleted,
            "error" => FileStatus::Error,
            _ => FileStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedFile {
    pub id: i64,
    pub file_path: String,
    pub file_hash: String,
    pub format: String,
    pub status: FileStatus,
    pub error_msg: Option<String>,
    pub file_size: i64,
    pub file_mtime: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Circular,
    Linear,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Circular => "circular",
            Topology::Linear => "linear",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "circular" => Topology::Circular,
            _ => Topology::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoleculeType {
    Dna,
    Rna,
    Protein,
}

impl MoleculeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoleculeType::Dna => "DNA",
            MoleculeType::Rna => "RNA",
            MoleculeType::Protein => "protein",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    pub id: i64,
    pub file_id: i64,
    pub name: String,
    pub size_bp: i64,
    pub topology: Topology,
    pub sequence: String,
    pub description: Option<String>,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sequence {
    pub fn tags(&self) -> Vec<String> {
        self.meta
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|x| x.as_str().map(String::from)).collect())
            .unwrap_or_default()
    }

    pub fn molecule_type(&self) -> MoleculeType {
        match self.meta.get("molecule_type").and_then(|v| v.as_str()) {
            Some("RNA") => MoleculeType::Rna,
            Some("protein") => MoleculeType::Protein,
            _ => MoleculeType::Dna,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    Plus,
    Minus,
    None,
}

impl Strand {
    pub fn as_i8(&self) -> i8 {
        match self {
            Strand::Plus => 1,
            Strand::Minus => -1,
            Strand::None => 0,
        }
    }

    pub fn from_i8(v: i8) -> Self {
        match v {
            1 => Strand::Plus,
            -1 => Strand::Minus,
            _ => Strand::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: i64,
    pub seq_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub feature_type: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
    pub qualifiers: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primer {
    pub id: i64,
    pub seq_id: i64,
    pub name: String,
    pub sequence: String,
    pub tm: Option<f64>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub strand: Option<Strand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub slug: String,
    pub token: String,
    pub preferences: Value,
    pub created_at: DateTime<Utc>,
}

pub fn slugify(username: &str) -> String {
    username
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: Option<String>,
    pub rating: String,
    pub priority: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Quarantined,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Quarantined => "quarantined",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => ApprovalStatus::Approved,
            "rejected" => ApprovalStatus::Rejected,
            _ => ApprovalStatus::Quarantined,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolApproval {
    pub id: i64,
    pub filename: String,
    pub file_hash: String,
    pub tool_name: Option<String>,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Outcome of matching a filename against the rule engine (C2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub action: String,
    pub parser: Option<String>,
    pub extract: Vec<String>,
    pub message: Option<String>,
}

impl MatchResult {
    pub fn log(message: impl Into<String>) -> Self {
        Self { action: "log".into(), parser: None, extract: Vec::new(), message: Some(message.into()) }
    }
}

/// What a parser (C1) produces from a file, independent of persistence.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub name: String,
    pub sequence: String,
    pub size_bp: i64,
    pub topology: String,
    pub description: Option<String>,
    pub features: Vec<ParsedFeature>,
    pub primers: Vec<ParsedPrimer>,
    pub meta: Value,
}

#[derive(Debug, Clone)]
pub struct ParsedFeature {
    pub name: String,
    pub feature_type: String,
    pub start: i64,
    pub end: i64,
    pub strand: i8,
    pub qualifiers: Value,
}

#[derive(Debug, Clone)]
pub struct ParsedPrimer {
    pub name: String,
    pub sequence: String,
    pub tm: Option<f64>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub strand: Option<i8>,
}

/// One step recorded in an agentic-loop chain, surfaced to the UI widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStep {
    pub tool: String,
    pub params: Value,
    pub summary: String,
    pub widget: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ProgressEvent {
    Thinking,
    Tool { tool: String, tools_used: usize, tokens: TokenUsage },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(rename = "in")]
    pub input: u64,
    #[serde(rename = "out")]
    pub output: u64,
}
