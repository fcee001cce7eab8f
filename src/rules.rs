//! Rule engine (C2): maps a filename to an action by evaluating glob
//! patterns top-down, first match wins. Grounded on
//! `hive/watcher/rules.py::match_file()`.

use crate::config::WatcherConfig;
use crate::models::MatchResult;

/// Minimal shell-glob matcher supporting `*`, `?`, and literal segments —
/// enough for the flat filename patterns the watcher rules use.
fn glob_match(pattern: &str, name: &str) -> bool {
    fn rec(p: &[u8], n: &[u8]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                rec(&p[1..], n) || (!n.is_empty() && rec(p, &n[1..]))
            }
            (Some(b'?'), Some(_)) => rec(&p[1..], &n[1..]),
            (Some(pc), Some(nc)) if pc == nc => rec(&p[1..], &n[1..]),
            _ => false,
        }
    }
    rec(pattern.as_bytes(), name.as_bytes())
}

/// Evaluate `config.rules` top-down against `filename`; the first matching
/// rule wins. A file matching nothing produces a log-only result.
pub fn match_file(config: &WatcherConfig, filename: &str) -> MatchResult {
    for rule in &config.rules {
        if glob_match(&rule.pattern, filename) {
            return MatchResult {
                action: rule.action.clone(),
                parser: rule.parser.clone(),
                extract: rule.extract.clone(),
                message: None,
            };
        }
    }
    MatchResult::log(format!("No rule matched: {filename}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatcherRule;

    fn cfg() -> WatcherConfig {
        WatcherConfig {
            root: "/lib".into(),
            recursive: true,
            poll_interval: 2,
            rules: vec![
                WatcherRule { pattern: "*.gb".into(), action: "parse".into(), parser: Some("biopython".into()), extract: vec![] },
                WatcherRule { pattern: "*.tmp".into(), action: "ignore".into(), parser: None, extract: vec![] },
            ],
        }
    }

    #[test]
    fn first_match_wins() {
        let r = match_file(&cfg(), "plasmid.gb");
        assert_eq!(r.action, "parse");
        assert_eq!(r.parser.as_deref(), Some("biopython"));
    }

    #[test]
    fn no_match_logs() {
        let r = match_file(&cfg(), "notes.txt");
        assert_eq!(r.action, "log");
        assert!(r.message.unwrap().contains("notes.txt"));
    }

    #[test]
    fn ignore_rule_matches() {
        let r = match_file(&cfg(), "scratch.tmp");
        assert_eq!(r.action, "ignore");
    }
}
