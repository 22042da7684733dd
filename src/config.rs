// src/config.rs
//! TOML configuration with the usual discovery order: explicit path,
//! then $EDITORIAL_CONFIG_PATH, then fallback locations, then defaults.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::FeedSource;
use crate::refresh::{RefreshWindow, DEFAULT_RETENTION_DAYS, DEFAULT_TOLERANCE_MINUTES};
use crate::summarize::{
    AnthropicSummarizer, CliSummarizer, OpenAiSummarizer, PromptSet, SimpleSummarizer,
    SummarizerBackend,
};

const ENV_PATH: &str = "EDITORIAL_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub feeds: FeedsCfg,
    #[serde(default)]
    pub ai: AiCfg,
    #[serde(default)]
    pub refresh: RefreshCfg,
    #[serde(default)]
    pub storage: StorageCfg,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub prompts: Option<PromptSet>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FeedsCfg {
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Anthropic,
    Cli,
    Simple,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AiCfg {
    #[serde(default)]
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub cli: CliCfg,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CliCfg {
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshCfg {
    /// "HH:MM" times of day manual refresh is allowed around.
    #[serde(default = "default_times")]
    pub times: Vec<String>,
    #[serde(default = "default_tolerance")]
    pub tolerance_minutes: i64,
    #[serde(default = "default_retention")]
    pub retention_days: i64,
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

fn default_times() -> Vec<String> {
    vec!["08:00".to_string(), "20:00".to_string()]
}
fn default_tolerance() -> i64 {
    DEFAULT_TOLERANCE_MINUTES
}
fn default_retention() -> i64 {
    DEFAULT_RETENTION_DAYS
}
fn default_cooldown() -> u64 {
    60
}

impl Default for RefreshCfg {
    fn default() -> Self {
        Self {
            times: default_times(),
            tolerance_minutes: default_tolerance(),
            retention_days: default_retention(),
            cooldown_secs: default_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageCfg {
    pub data_dir: Option<PathBuf>,
}

/// Built-in tech feeds, used when nothing is configured anywhere.
pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::with_title("https://news.ycombinator.com/rss", "Hacker News"),
        FeedSource::with_title("https://github.blog/feed/", "GitHub Blog"),
        FeedSource::with_title("https://www.theverge.com/rss/index.xml", "The Verge - Tech"),
        FeedSource::with_title("https://techcrunch.com/feed/", "TechCrunch"),
        FeedSource::with_title("https://feeds.arstechnica.com/arstechnica/index", "Ars Technica"),
    ]
}

/// Load config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $EDITORIAL_CONFIG_PATH
/// 2) config/editorial.toml
/// 3) <user config dir>/editorial-engine/config.toml
/// 4) built-in defaults
pub fn load_config_default() -> Result<Config> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_PATH} points to a non-existent path"));
    }
    let local = PathBuf::from("config/editorial.toml");
    if local.exists() {
        return load_config_from(&local);
    }
    if let Some(user) = dirs::config_dir() {
        let user_cfg = user.join("editorial-engine").join("config.toml");
        if user_cfg.exists() {
            return load_config_from(&user_cfg);
        }
    }
    Ok(Config::default())
}

impl Config {
    /// Where the watermark, refresh log, and editorials live.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage.data_dir {
            return dir.clone();
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("editorial-engine")
    }

    /// Parsed admission windows. Malformed entries are skipped with a
    /// warning; an empty result makes the RefreshManager fall back to
    /// its default window.
    pub fn windows(&self) -> Vec<RefreshWindow> {
        let mut out = Vec::new();
        for raw in &self.refresh.times {
            match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
                Ok(t) => out.push(RefreshWindow::new(t, self.refresh.tolerance_minutes)),
                Err(e) => {
                    tracing::warn!(error = ?e, raw, "skipping unparseable refresh time");
                }
            }
        }
        out
    }

    pub fn feed_sources(&self) -> Vec<FeedSource> {
        let cleaned: Vec<FeedSource> = self
            .feeds
            .urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(FeedSource::new)
            .collect();
        if cleaned.is_empty() {
            default_feeds()
        } else {
            cleaned
        }
    }
}

/// Resolve the summarizer backend once, config key first, environment
/// second. Missing credentials degrade to the simple backend with a
/// warning instead of failing startup.
pub fn build_summarizer(cfg: &Config) -> SummarizerBackend {
    match cfg.ai.provider {
        ProviderKind::Openai => {
            let key = cfg
                .ai
                .openai_api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            match key {
                Some(key) => match OpenAiSummarizer::new(key, cfg.ai.model.clone()) {
                    Ok(s) => SummarizerBackend::OpenAi(s),
                    Err(e) => {
                        tracing::warn!(error = ?e, "could not build openai backend, falling back to simple");
                        SummarizerBackend::Simple(SimpleSummarizer)
                    }
                },
                None => {
                    tracing::warn!("OPENAI_API_KEY not found, falling back to simple backend");
                    SummarizerBackend::Simple(SimpleSummarizer)
                }
            }
        }
        ProviderKind::Anthropic => {
            let key = cfg
                .ai
                .anthropic_api_key
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
            match key {
                Some(key) => match AnthropicSummarizer::new(key, cfg.ai.model.clone()) {
                    Ok(s) => SummarizerBackend::Anthropic(s),
                    Err(e) => {
                        tracing::warn!(error = ?e, "could not build anthropic backend, falling back to simple");
                        SummarizerBackend::Simple(SimpleSummarizer)
                    }
                },
                None => {
                    tracing::warn!("ANTHROPIC_API_KEY not found, falling back to simple backend");
                    SummarizerBackend::Simple(SimpleSummarizer)
                }
            }
        }
        ProviderKind::Cli => match &cfg.ai.cli.program {
            Some(program) => SummarizerBackend::Cli(CliSummarizer::new(
                program.clone(),
                cfg.ai.cli.args.clone(),
            )),
            None => {
                tracing::warn!("ai.cli.program not configured, falling back to simple backend");
                SummarizerBackend::Simple(SimpleSummarizer)
            }
        },
        ProviderKind::Simple => SummarizerBackend::Simple(SimpleSummarizer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::env;

    #[test]
    fn sample_config_parses() {
        let toml = r#"
            keywords = ["rust", "databases"]

            [feeds]
            urls = ["https://example.com/feed.xml", " "]

            [ai]
            provider = "anthropic"

            [refresh]
            times = ["07:30", "19:00"]
            tolerance_minutes = 15
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.ai.provider, ProviderKind::Anthropic);
        assert_eq!(cfg.feed_sources().len(), 1);
        assert_eq!(cfg.keywords, vec!["rust", "databases"]);

        let windows = cfg.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].at.hour(), 7);
        assert_eq!(windows[0].tolerance_minutes, 15);
    }

    #[test]
    fn empty_config_has_usable_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.windows().len(), 2);
        assert_eq!(cfg.refresh.retention_days, 30);
        assert_eq!(cfg.refresh.cooldown_secs, 60);
        assert!(!cfg.feed_sources().is_empty());
    }

    #[test]
    fn bad_refresh_times_are_skipped() {
        let toml = r#"
            [refresh]
            times = ["08:00", "late-ish"]
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.windows().len(), 1);
    }

    #[serial_test::serial]
    #[test]
    fn env_path_wins_and_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("cfg.toml");
        std::fs::write(&p, "[ai]\nprovider = \"simple\"\n").unwrap();

        env::set_var(ENV_PATH, p.display().to_string());
        let cfg = load_config_default().unwrap();
        assert_eq!(cfg.ai.provider, ProviderKind::Simple);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_config_default().is_err());
        env::remove_var(ENV_PATH);
    }

    #[serial_test::serial]
    #[test]
    fn missing_key_degrades_to_simple() {
        env::remove_var("OPENAI_API_KEY");
        let cfg = Config::default();
        let backend = build_summarizer(&cfg);
        assert!(matches!(backend, SummarizerBackend::Simple(_)));
    }
}
