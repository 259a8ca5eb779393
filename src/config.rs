//! Pipeline configuration with environment-variable overrides.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for a pipeline instance.
///
/// Defaults match the documented contract: 350-token chunk windows with a
/// 70-token overlap and top-12 retrieval. `branch_timeout` bounds each
/// collector; `None` disables the bound.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub window_tokens: usize,
    pub overlap_tokens: usize,
    pub top_k: usize,
    pub branch_timeout: Option<Duration>,
    pub archive_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_tokens: 350,
            overlap_tokens: 70,
            top_k: 12,
            branch_timeout: Some(Duration::from_secs(120)),
            archive_dir: PathBuf::from("research_archive"),
        }
    }
}

impl PipelineConfig {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset or unparseable. Loads `.env` if present.
    ///
    /// Recognized variables: `GATHERWEAVE_WINDOW_TOKENS`,
    /// `GATHERWEAVE_OVERLAP_TOKENS`, `GATHERWEAVE_TOP_K`,
    /// `GATHERWEAVE_BRANCH_TIMEOUT_SECS` (0 disables),
    /// `GATHERWEAVE_ARCHIVE_DIR`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("GATHERWEAVE_WINDOW_TOKENS") {
            config.window_tokens = v;
        }
        if let Some(v) = env_parse::<usize>("GATHERWEAVE_OVERLAP_TOKENS") {
            config.overlap_tokens = v;
        }
        if let Some(v) = env_parse::<usize>("GATHERWEAVE_TOP_K") {
            config.top_k = v;
        }
        if let Some(secs) = env_parse::<u64>("GATHERWEAVE_BRANCH_TIMEOUT_SECS") {
            config.branch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Ok(dir) = std::env::var("GATHERWEAVE_ARCHIVE_DIR") {
            if !dir.trim().is_empty() {
                config.archive_dir = PathBuf::from(dir);
            }
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = PipelineConfig::default();
        assert_eq!(config.window_tokens, 350);
        assert_eq!(config.overlap_tokens, 70);
        assert_eq!(config.top_k, 12);
        assert_eq!(config.branch_timeout, Some(Duration::from_secs(120)));
    }
}
