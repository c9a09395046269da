use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::vote::{ONE_WEEK_IN_SECONDS, SCORE_PER_VOTE};

const ENV_PREFIX: &str = "POST_RANK_";

/// 运行配置：TOML 文件 → 环境变量（POST_RANK_*）→ CLI 参数，后者覆盖前者
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: SocketAddr,
    pub vote_window_secs: u64,
    pub score_per_vote: f64,
    pub community_cache_ttl_secs: u64,
    pub snapshot_path: PathBuf,
    /// 0 表示关闭周期快照
    pub snapshot_interval_secs: u64,
    pub node_id: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8081)),
            vote_window_secs: ONE_WEEK_IN_SECONDS,
            score_per_vote: SCORE_PER_VOTE,
            community_cache_ttl_secs: 60,
            snapshot_path: default_snapshot_path(),
            snapshot_interval_secs: 300,
            node_id: 1,
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("post-rank")
        .join("ranking.bin")
}

impl Config {
    /// 读取配置文件（可选）并应用环境变量覆盖
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Some(v) = env_parse("LISTEN")? {
            self.listen = v;
        }
        if let Some(v) = env_parse("VOTE_WINDOW_SECS")? {
            self.vote_window_secs = v;
        }
        if let Some(v) = env_parse("SCORE_PER_VOTE")? {
            self.score_per_vote = v;
        }
        if let Some(v) = env_parse("COMMUNITY_CACHE_TTL_SECS")? {
            self.community_cache_ttl_secs = v;
        }
        if let Some(v) = env_parse::<String>("SNAPSHOT_PATH")? {
            self.snapshot_path = PathBuf::from(v);
        }
        if let Some(v) = env_parse("SNAPSHOT_INTERVAL_SECS")? {
            self.snapshot_interval_secs = v;
        }
        if let Some(v) = env_parse("NODE_ID")? {
            self.node_id = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.score_per_vote.is_finite() || self.score_per_vote <= 0.0 {
            bail!("score_per_vote must be a positive finite number, got {}", self.score_per_vote);
        }
        if self.vote_window_secs == 0 {
            bail!("vote_window_secs must be greater than zero");
        }
        if self.community_cache_ttl_secs == 0 {
            bail!("community_cache_ttl_secs must be greater than zero");
        }
        if self.node_id >= 1024 {
            bail!("node_id must fit in 10 bits, got {}", self.node_id);
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(suffix: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    match env::var(&key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // apply_env 读取全部变量，测试间需串行
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

    struct EnvGuard {
        key: &'static str,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            env::remove_var(self.key);
        }
    }

    fn set_env(key: &'static str, value: &str) -> EnvGuard {
        env::set_var(key, value);
        EnvGuard { key }
    }

    #[test]
    fn defaults_match_voting_rules() {
        let c = Config::default();
        assert_eq!(c.vote_window_secs, 7 * 24 * 3600);
        assert_eq!(c.score_per_vote, 432.0);
        assert_eq!(c.community_cache_ttl_secs, 60);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let c = Config::from_toml("score_per_vote = 100.0\nlisten = \"0.0.0.0:9000\"\n").unwrap();
        assert_eq!(c.score_per_vote, 100.0);
        assert_eq!(c.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(c.community_cache_ttl_secs, 60);
    }

    #[test]
    fn env_overrides_apply() {
        let _l = ENV_LOCK.lock();
        let _g = set_env("POST_RANK_COMMUNITY_CACHE_TTL_SECS", "15");
        let mut c = Config::default();
        c.apply_env().unwrap();
        assert_eq!(c.community_cache_ttl_secs, 15);
    }

    #[test]
    fn invalid_env_value_is_an_error() {
        let _l = ENV_LOCK.lock();
        let _g = set_env("POST_RANK_NODE_ID", "not-a-number");
        let mut c = Config::default();
        assert!(c.apply_env().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_weight() {
        let c = Config {
            score_per_vote: 0.0,
            ..Config::default()
        };
        assert!(c.validate().is_err());
    }
}
