use clap::Parser;
use post_rank::config::Config;
use post_rank::core::{Clock, IdGenerator, SystemClock};
use post_rank::query::{AppState, HeaderIdentity, PostService, QueryServer};
use post_rank::records::MemoryRecords;
use post_rank::storage::{checkpoint_loop, Checkpoint};
use post_rank::RankingEngine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "post-rank", version, about = "Ranking and voting engine for community posts")]
struct Args {
    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    listen: Option<SocketAddr>,

    #[arg(long)]
    snapshot_path: Option<PathBuf>,

    /// 0 关闭周期快照
    #[arg(long)]
    snapshot_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(p) = args.snapshot_path {
        config.snapshot_path = p;
    }
    if let Some(s) = args.snapshot_interval_secs {
        config.snapshot_interval_secs = s;
    }

    info!("Starting post-rank: ranking and voting engine");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(RankingEngine::new(&config, clock.clone()));

    // 恢复上次快照；损坏时从空状态启动
    match Checkpoint::restore_into(engine.store(), &config.snapshot_path).await {
        Ok(true) => {}
        Ok(false) => info!("No checkpoint at {:?}, starting empty", config.snapshot_path),
        Err(e) => tracing::warn!("Checkpoint restore failed, starting empty: {}", e),
    }

    // 持久记录协作者：演示用内存实现（重启不保留帖子正文）
    let records = Arc::new(MemoryRecords::new());
    let posts = PostService::new(
        engine.clone(),
        records,
        IdGenerator::new(config.node_id, clock),
    );
    let state = Arc::new(AppState {
        posts,
        identity: Arc::new(HeaderIdentity),
    });

    let checkpointer = tokio::spawn(checkpoint_loop(
        engine.store().clone(),
        config.snapshot_path.clone(),
        config.snapshot_interval_secs,
    ));

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    let server = QueryServer::new(state);
    tokio::spawn(async move {
        if let Err(e) = server.run(listener).await {
            tracing::error!("HTTP server stopped: {}", e);
        }
    });

    info!("post-rank ready. Query via: http://{}/api/v1/posts?order=score", config.listen);

    // 优雅退出：落一次最终快照
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    // 先停周期快照，最终快照是唯一写者
    checkpointer.abort();
    let _ = checkpointer.await;
    Checkpoint::capture(engine.store())
        .save(&config.snapshot_path)
        .await?;
    info!("{}", engine.report());

    Ok(())
}
