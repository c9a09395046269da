use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

use crate::index::{RankingSnapshot, RankingStore};

const CHECKPOINT_VERSION: u32 = 1;

// 每次保存独立的 tmp 文件，并发保存不会互相 rename 半成品
static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

/// 排名状态的落盘格式
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// unix 毫秒
    pub saved_at_ms: i64,
    pub ranking: RankingSnapshot,
}

impl Checkpoint {
    pub fn capture(store: &RankingStore) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            saved_at_ms: store.clock().now_millis(),
            ranking: store.export_snapshot(),
        }
    }

    /// 原子替换：写 tmp → rename
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let data = bincode::serialize(self)?;
        let tmp = tmp_path(path, SAVE_SEQ.fetch_add(1, Ordering::Relaxed));
        if let Err(e) = fs::write(&tmp, data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read(path).await?;
        let checkpoint: Checkpoint = bincode::deserialize(&data)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            anyhow::bail!(
                "unsupported checkpoint version {} (expected {})",
                checkpoint.version,
                CHECKPOINT_VERSION
            );
        }
        Ok(checkpoint)
    }

    /// 存在则加载并导入；返回是否恢复了状态
    pub async fn restore_into(store: &RankingStore, path: &Path) -> anyhow::Result<bool> {
        if !fs::try_exists(path).await? {
            return Ok(false);
        }
        let cp = Self::load(path).await?;
        let posts = cp.ranking.time.len();
        store.import_snapshot(cp.ranking)?;
        tracing::info!("Checkpoint restored from {:?}: {} posts", path, posts);
        Ok(true)
    }
}

fn tmp_path(path: &Path, seq: u64) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(format!(".{}.{}.tmp", std::process::id(), seq));
    PathBuf::from(s)
}

/// 周期快照；失败只告警，下一轮重试
pub async fn checkpoint_loop(store: Arc<RankingStore>, path: PathBuf, interval_secs: u64) {
    if interval_secs == 0 {
        return;
    }
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    // 首个 tick 立即触发，跳过
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let cp = Checkpoint::capture(&store);
        match cp.save(&path).await {
            Ok(()) => tracing::debug!("Checkpoint saved: {} posts", cp.ranking.time.len()),
            Err(e) => tracing::warn!("Checkpoint save failed: {}", e),
        }
    }
}
