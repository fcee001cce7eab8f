//! SnapGene binary parser (`.dna`/`.rna`/`.prot`). Grounded on
//! `hive/parsers/snapgene.py` and the public SnapGene block-file layout:
//! a sequence of `[1-byte type][4-byte big-endian length][payload]`
//! blocks. The blocks this parser understands:
//!
//! - type `0x00` — the DNA/RNA/protein sequence itself; payload's first
//!   byte is a flag byte (bit 0 set => circular topology), the rest is
//!   the residue string.
//! - type `0x0A` — an XML `<Features>` document.
//! - type `0x05` — an XML `<Primers>` document.
//!
//! Any other block type is skipped. This mirrors the original's "sgffp"
//! parser name (SnapGene Flat File Parser).

use std::path::Path;

use regex::Regex;
use serde_json::json;

use crate::error::{HiveError, HiveResult};
use crate::models::{ParseResult, ParsedFeature, ParsedPrimer};

const BLOCK_SEQUENCE: u8 = 0x00;
const BLOCK_FEATURES: u8 = 0x0A;
const BLOCK_PRIMERS: u8 = 0x05;

pub fn parse_snapgene(path: &Path) -> HiveResult<ParseResult> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 5 {
        return Err(HiveError::Parse("file too small to be a SnapGene document".into()));
    }

    let mut offset = 0usize;
    let mut sequence = String::new();
    let mut topology = "linear".to_string();
    let mut molecule = "DNA";
    let mut features = Vec::new();
    let mut primers = Vec::new();

    while offset + 5 <= bytes.len() {
        let block_type = bytes[offset];
        let len = u32::from_be_bytes(bytes[offset + 1..offset + 5].try_into().unwrap()) as usize;
        let payload_start = offset + 5;
        let payload_end = (payload_start + len).min(bytes.len());
        let payload = &bytes[payload_start..payload_end];

        match block_type {
            BLOCK_SEQUENCE => {
                if let Some(&flags) = payload.first() {
                    topology = if flags & 0x01 != 0 { "circular".into() } else { "linear".into() };
                    if flags & 0x04 != 0 {
                        molecule = "protein";
                    }
                }
                sequence = String::from_utf8_lossy(&payload[1.min(payload.len())..])
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .map(|c| c.to_ascii_uppercase())
                    .collect();
            }
            BLOCK_FEATURES => {
                let xml = String::from_utf8_lossy(payload);
                features = parse_features_xml(&xml);
            }
            BLOCK_PRIMERS => {
                let xml = String::from_utf8_lossy(payload);
                primers = parse_primers_xml(&xml);
            }
            _ => {}
        }

        offset = payload_end;
    }

    if sequence.is_empty() {
        return Err(HiveError::Parse("no sequence block found in SnapGene file".into()));
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string();

    Ok(ParseResult {
        size_bp: sequence.len() as i64,
        name,
        sequence,
        topology,
        description: None,
        features,
        primers,
        meta: json!({ "molecule_type": molecule }),
    })
}

fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let re = Regex::new(&format!(r#"{name}="([^"]*)""#)).ok()?;
    re.captures(tag).map(|c| c.get(1).unwrap().as_str())
}

fn attr_owned(tag: &str, name: &str) -> Option<String> {
    attr(tag, name).map(|s| s.to_string())
}

fn parse_features_xml(xml: &str) -> Vec<ParsedFeature> {
    let feature_re = Regex::new(r"(?s)<Feature\b([^>]*)>(.*?)</Feature>").unwrap();
    let segment_re = Regex::new(r#"<Segment\b[^>]*range="(\d+)-(\d+)"[^>]*>"#).unwrap();

    let mut out = Vec::new();
    for cap in feature_re.captures_iter(xml) {
        let header = &cap[1];
        let body = &cap[2];
        let name = attr_owned(header, "name").unwrap_or_else(|| "feature".into());
        let feature_type = attr_owned(header, "type").unwrap_or_else(|| "misc_feature".into());
        let directionality: i8 = attr(header, "directionality")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let strand = if directionality == 2 { -1 } else { 1 };

        let mut start = i64::MAX;
        let mut end = i64::MIN;
        for seg in segment_re.captures_iter(body) {
            let s: i64 = seg[1].parse().unwrap_or(1);
            let e: i64 = seg[2].parse().unwrap_or(1);
            start = start.min(s - 1);
            end = end.max(e);
        }
        if start == i64::MAX {
            continue;
        }
        out.push(ParsedFeature {
            name,
            feature_type,
            start: start.max(0),
            end,
            strand,
            qualifiers: json!({}),
        });
    }
    out
}

fn parse_primers_xml(xml: &str) -> Vec<ParsedPrimer> {
    let primer_re = Regex::new(r"(?s)<Primer\b([^>]*)/?>").unwrap();
    let mut out = Vec::new();
    for cap in primer_re.captures_iter(xml) {
        let header = &cap[1];
        let Some(name) = attr_owned(header, "name") else { continue };
        let Some(sequence) = attr_owned(header, "sequence") else { continue };
        let tm = attr(header, "Tm").and_then(|v| v.parse().ok());
        out.push(ParsedPrimer {
            name,
            sequence: sequence.to_uppercase(),
            tm,
            start: None,
            end: None,
            strand: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn block(block_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![block_type];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn parses_circular_sequence_block() {
        let mut seq_payload = vec![0x01u8];
        seq_payload.extend_from_slice(b"ATGCATGC");
        let mut bytes = block(BLOCK_SEQUENCE, &seq_payload);
        let features_xml = br#"<Features><Feature name="ori" type="rep_origin" directionality="1"><Segment range="1-4"/></Feature></Features>"#;
        bytes.extend(block(BLOCK_FEATURES, features_xml));

        let dir = tempdir().unwrap();
        let path = dir.path().join("x.dna");
        std::fs::write(&path, &bytes).unwrap();

        let result = parse_snapgene(&path).unwrap();
        assert_eq!(result.sequence, "ATGCATGC");
        assert_eq!(result.topology, "circular");
        assert_eq!(result.features.len(), 1);
        assert_eq!(result.features[0].name, "ori");
        assert_eq!(result.features[0].start, 0);
        assert_eq!(result.features[0].end, 4);
    }
}
