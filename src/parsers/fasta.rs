//! FASTA parser. Grounded on `hive/parsers/fasta.py::parse_fasta()`: a
//! FASTA file is expected to hold exactly one record; linear topology is
//! assumed since FASTA carries no topology annotation.

use std::path::Path;

use serde_json::json;

use crate::error::{HiveError, HiveResult};
use crate::models::ParseResult;

pub fn parse_fasta(path: &Path) -> HiveResult<ParseResult> {
    let text = std::fs::read_to_string(path)?;

    let mut records: Vec<(String, String)> = Vec::new();
    let mut cur_header: Option<String> = None;
    let mut cur_seq = String::new();

    for line in text.lines() {
        if let Some(header) = line.strip_prefix('>') {
            if let Some(h) = cur_header.take() {
                records.push((h, std::mem::take(&mut cur_seq)));
            }
            cur_header = Some(header.trim().to_string());
        } else {
            cur_seq.push_str(line.trim());
        }
    }
    if let Some(h) = cur_header.take() {
        records.push((h, cur_seq));
    }

    if records.len() != 1 {
        return Err(HiveError::Parse(format!(
            "expected exactly one FASTA record, found {}",
            records.len()
        )));
    }

    let (header, sequence) = records.into_iter().next().unwrap();
    let name = header.split_whitespace().next().unwrap_or(&header).to_string();
    let description = if header != name { Some(header.clone()) } else { None };

    Ok(ParseResult {
        size_bp: sequence.len() as i64,
        name,
        sequence,
        topology: "linear".into(),
        description,
        features: Vec::new(),
        primers: Vec::new(),
        meta: json!({}),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_single_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.fasta");
        std::fs::write(&path, ">seq1 a plasmid\nATGC\nGGGG\n").unwrap();
        let result = parse_fasta(&path).unwrap();
        assert_eq!(result.name, "seq1");
        assert_eq!(result.sequence, "ATGCGGGG");
        assert_eq!(result.size_bp, 8);
        assert_eq!(result.topology, "linear");
        assert_eq!(result.description.as_deref(), Some("seq1 a plasmid"));
    }

    #[test]
    fn rejects_multi_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.fasta");
        std::fs::write(&path, ">a\nAT\n>b\nGC\n").unwrap();
        assert!(parse_fasta(&path).is_err());
    }
}
