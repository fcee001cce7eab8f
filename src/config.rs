//! Layered configuration: YAML file overlaid with `HIVE_*` environment
//! variables. Resolution order mirrors the original Python service:
//! explicit path argument -> `HIVE_CONFIG` env var -> `config/config.local.yaml`
//! relative to cwd -> built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_root: PathBuf,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub blast: BlastConfig,
    pub chat: ChatConfig,
    pub watcher: WatcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            blast: BlastConfig::default(),
            chat: ChatConfig::default(),
            watcher: WatcherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8420 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://./data/hivekeep.db".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ModelEntry {
    /// Stable key used to address this model in the pool and in chat records.
    pub fn id(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub models: Vec<ModelEntry>,
    pub auto_discover: bool,
    pub summary_token_limit: usize,
    pub agent_max_turns: usize,
    pub pipe_min_length: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            auto_discover: true,
            summary_token_limit: 500,
            agent_max_turns: 10,
            pipe_min_length: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlastConfig {
    pub bin_dir: Option<PathBuf>,
    pub default_evalue: f64,
    pub default_max_hits: usize,
}

impl Default for BlastConfig {
    fn default() -> Self {
        Self { bin_dir: None, default_evalue: 1.0e-5, default_max_hits: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub max_history_pairs: usize,
    pub auto_save_after: usize,
    pub widget_data_threshold: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { max_history_pairs: 20, auto_save_after: 1, widget_data_threshold: 2048 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherRule {
    pub pattern: String,
    pub action: String,
    #[serde(default)]
    pub parser: Option<String>,
    #[serde(default)]
    pub extract: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub root: PathBuf,
    pub recursive: bool,
    pub poll_interval: u64,
    pub rules: Vec<WatcherRule>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./library"),
            recursive: true,
            poll_interval: 2,
            rules: default_rules(),
        }
    }
}

fn default_rules() -> Vec<WatcherRule> {
    vec![
        WatcherRule { pattern: "*.gb".into(), action: "parse".into(), parser: Some("biopython".into()), extract: vec![] },
        WatcherRule { pattern: "*.gbk".into(), action: "parse".into(), parser: Some("biopython".into()), extract: vec![] },
        WatcherRule { pattern: "*.fa".into(), action: "parse".into(), parser: Some("biopython".into()), extract: vec![] },
        WatcherRule { pattern: "*.fasta".into(), action: "parse".into(), parser: Some("biopython".into()), extract: vec![] },
        WatcherRule { pattern: "*.dna".into(), action: "parse".into(), parser: Some("sgffp".into()), extract: vec![] },
        WatcherRule { pattern: "*.rna".into(), action: "parse".into(), parser: Some("sgffp".into()), extract: vec![] },
        WatcherRule { pattern: "*.prot".into(), action: "parse".into(), parser: Some("sgffp".into()), extract: vec![] },
    ]
}

impl Config {
    pub fn blast_dir(&self) -> PathBuf {
        self.data_root.join("blast")
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.data_root.join("chats")
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.data_root.join("tools")
    }

    /// Filesystem path behind `database.url`, stripping the `sqlite://`
    /// scheme the config table documents (`SPEC_FULL.md` §6.1).
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(self.database.url.trim_start_matches("sqlite://"))
    }

    /// Load per the precedence order documented above, applying env overrides last.
    pub fn load(explicit_path: Option<&Path>) -> anyhow::Result<Self> {
        let path = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("HIVE_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/config.local.yaml"));

        let mut cfg = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&text)?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var("HIVE_DATABASE_URL") {
            cfg.database.url = url;
        }
        if let Ok(root) = std::env::var("HIVE_DATA_ROOT") {
            cfg.data_root = PathBuf::from(root);
        }
        if let Ok(root) = std::env::var("HIVE_WATCHER_ROOT") {
            cfg.watcher.root = PathBuf::from(root);
        }

        Ok(cfg)
    }
}

/// Render a library-relative path the way the UI should display it:
/// relative to the watcher root when it falls under it, absolute otherwise.
pub fn display_file_path(cfg: &Config, abs: &Path) -> String {
    match abs.strip_prefix(&cfg.watcher.root) {
        Ok(rel) => rel.display().to_string(),
        Err(_) => abs.display().to_string(),
    }
}
