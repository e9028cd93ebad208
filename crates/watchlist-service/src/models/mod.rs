//! 领域模型定义

mod history;
mod watchlist;

pub use history::{AddHistoryRequest, HistoryItem};
pub use watchlist::{AddWatchlistRequest, WatchlistItem};
