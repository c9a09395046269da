#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod index;
pub mod query;
pub mod records;
pub mod stats;
pub mod storage;
pub mod vote;

pub use engine::RankingEngine;
pub use error::{RankError, Result};
