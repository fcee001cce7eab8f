//! Parser interface (C1): produce a `ParseResult` from a file path. Parsers
//! are pure functions; the registry below mirrors
//! `hive/parsers/__init__.py`'s `PARSERS` / `BIOPYTHON_PARSERS` tables.

pub mod fasta;
pub mod genbank;
pub mod snapgene;

use std::path::Path;

use crate::error::{HiveError, HiveResult};
use crate::models::ParseResult;

/// Resolve a parser by the rule-declared name, with a per-extension
/// override when the name is the generic `"biopython"` parser (the
/// original's `hive.parsers.BIOPYTHON_PARSERS` table).
pub fn resolve_parser(parser_name: &str, path: &Path) -> HiveResult<fn(&Path) -> HiveResult<ParseResult>> {
    if parser_name == "biopython" {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        return match ext.as_str() {
            "gb" | "gbk" => Ok(genbank::parse_genbank),
            "fasta" | "fa" => Ok(fasta::parse_fasta),
            other => Err(HiveError::Parse(format!("no biopython parser for extension '{other}'"))),
        };
    }
    match parser_name {
        "sgffp" => Ok(snapgene::parse_snapgene),
        other => Err(HiveError::Parse(format!("unknown parser '{other}'"))),
    }
}
