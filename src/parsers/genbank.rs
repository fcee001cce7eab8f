//! GenBank flat-file parser. Grounded on `hive/parsers/genbank.py`'s use
//! of Biopython's `SeqIO.read(path, "genbank")`: we re-derive the same
//! fields (name, sequence, topology, features) directly from the flat
//! file grammar since no GenBank-parsing crate is in the dependency
//! stack this project inherited.

use std::path::Path;

use regex::Regex;
use serde_json::json;

use crate::error::{HiveError, HiveResult};
use crate::models::{ParseResult, ParsedFeature};

pub fn parse_genbank(path: &Path) -> HiveResult<ParseResult> {
    let text = std::fs::read_to_string(path)?;
    let mut lines = text.lines();

    let locus_line = lines
        .next()
        .ok_or_else(|| HiveError::Parse("empty GenBank file".into()))?;
    if !locus_line.starts_with("LOCUS") {
        return Err(HiveError::Parse("missing LOCUS line".into()));
    }
    let tokens: Vec<&str> = locus_line.split_whitespace().collect();
    let name = tokens.get(1).copied().unwrap_or("unnamed").to_string();
    let topology = if locus_line.to_lowercase().contains("circular") {
        "circular".to_string()
    } else {
        "linear".to_string()
    };

    let mut definition: Option<String> = None;
    let mut features = Vec::new();
    let mut sequence = String::new();
    let mut section = Section::None;

    let feature_header = Regex::new(r"^\s{5}(\S+)\s+(.+)$").unwrap();
    let qualifier_re = Regex::new(r#"^\s+/(\w+)(?:=(.*))?$"#).unwrap();
    let origin_re = Regex::new(r"^\s*\d+\s+(.+)$").unwrap();

    let mut cur_feature: Option<PendingFeature> = None;

    let body: Vec<&str> = text.lines().skip(1).collect();
    for line in body {
        if line.starts_with("DEFINITION") {
            definition = Some(line["DEFINITION".len()..].trim().to_string());
            section = Section::None;
            continue;
        }
        if line.starts_with("FEATURES") {
            section = Section::Features;
            continue;
        }
        if line.starts_with("ORIGIN") {
            if let Some(f) = cur_feature.take() {
                features.push(f.finish());
            }
            section = Section::Origin;
            continue;
        }
        if line.starts_with("//") {
            break;
        }
        if line.starts_with(char::is_alphabetic) && section != Section::Origin {
            // A new top-level section (SOURCE, REFERENCE, ...); features end.
            if section == Section::Features {
                if let Some(f) = cur_feature.take() {
                    features.push(f.finish());
                }
                section = Section::None;
            }
            continue;
        }

        match section {
            Section::Features => {
                if let Some(caps) = feature_header.captures(line) {
                    if let Some(f) = cur_feature.take() {
                        features.push(f.finish());
                    }
                    let ftype = caps[1].to_string();
                    let location = caps[2].trim().to_string();
                    cur_feature = Some(PendingFeature::new(ftype, location));
                } else if let Some(caps) = qualifier_re.captures(line) {
                    if let Some(f) = cur_feature.as_mut() {
                        let key = caps[1].to_string();
                        let val = caps
                            .get(2)
                            .map(|m| m.as_str().trim().trim_matches('"').to_string())
                            .unwrap_or_else(|| "true".to_string());
                        f.qualifiers.push((key, val));
                    }
                } else if let Some(f) = cur_feature.as_mut() {
                    // Continuation of a qualifier value wrapped onto the next line.
                    if let Some((_, last_val)) = f.qualifiers.last_mut() {
                        last_val.push(' ');
                        last_val.push_str(line.trim().trim_matches('"'));
                    }
                }
            }
            Section::Origin => {
                if let Some(caps) = origin_re.captures(line) {
                    for ch in caps[1].chars() {
                        if ch.is_alphabetic() {
                            sequence.push(ch.to_ascii_uppercase());
                        }
                    }
                }
            }
            Section::None => {}
        }
    }

    if sequence.is_empty() {
        return Err(HiveError::Parse("no ORIGIN sequence found".into()));
    }

    Ok(ParseResult {
        size_bp: sequence.len() as i64,
        name,
        sequence,
        topology,
        description: definition,
        features,
        primers: Vec::new(),
        meta: json!({}),
    })
}

#[derive(PartialEq, Eq)]
enum Section {
    None,
    Features,
    Origin,
}

struct PendingFeature {
    feature_type: String,
    location: String,
    qualifiers: Vec<(String, String)>,
}

impl PendingFeature {
    fn new(feature_type: String, location: String) -> Self {
        Self { feature_type, location, qualifiers: Vec::new() }
    }

    fn finish(self) -> ParsedFeature {
        let (start, end, strand) = parse_location(&self.location);
        let name = self
            .qualifiers
            .iter()
            .find(|(k, _)| k == "gene" || k == "label" || k == "locus_tag")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.feature_type.clone());
        let qualifiers = json!(self
            .qualifiers
            .into_iter()
            .collect::<std::collections::HashMap<_, _>>());
        ParsedFeature { name, feature_type: self.feature_type, start, end, strand, qualifiers }
    }
}

/// Parse a GenBank location string into a 0-based, end-exclusive range
/// plus strand. `complement(...)` marks strand -1; `join(...)` is
/// approximated by the enclosing span's min/max, which is sufficient
/// for the single-exon features this library deals with.
fn parse_location(loc: &str) -> (i64, i64, i8) {
    let strand = if loc.starts_with("complement") { -1 } else { 1 };
    let digits: Vec<i64> = Regex::new(r"\d+")
        .unwrap()
        .find_iter(loc)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if digits.is_empty() {
        return (0, 0, strand);
    }
    let start = *digits.iter().min().unwrap() - 1;
    let end = *digits.iter().max().unwrap();
    (start.max(0), end, strand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "LOCUS       pUC19                   40 bp    DNA     circular SYN 05-FEB-2018
DEFINITION  cloning vector pUC19.
FEATURES             Location/Qualifiers
     source          1..40
                     /organism=\"synthetic\"
     gene            complement(5..15)
                     /gene=\"bla\"
ORIGIN
        1 gacgaaaggg cctcgtgata cgcctatttt tataggttaa
//
";

    #[test]
    fn parses_locus_and_features() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.gb");
        std::fs::write(&path, SAMPLE).unwrap();
        let result = parse_genbank(&path).unwrap();
        assert_eq!(result.name, "pUC19");
        assert_eq!(result.topology, "circular");
        assert_eq!(result.size_bp, 40);
        assert_eq!(result.features.len(), 2);
        let gene = result.features.iter().find(|f| f.name == "bla").unwrap();
        assert_eq!(gene.start, 4);
        assert_eq!(gene.end, 15);
        assert_eq!(gene.strand, -1);
    }
}
