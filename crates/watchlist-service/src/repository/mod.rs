//! 数据库仓储层
//!
//! 片单与观看历史的数据访问，提供 Postgres 与内存两种实现

pub mod memory;
mod history_repo;
mod traits;
mod watchlist_repo;

pub use history_repo::HistoryRepository;
pub use memory::{InMemoryHistoryRepository, InMemoryWatchlistRepository};
pub use traits::*;
pub use watchlist_repo::WatchlistRepository;
