//! Per-view state. Each store keeps its state behind a mutex, mutates it
//! only through the state's own setters and hands the renderer an owned
//! snapshot.

pub mod history;
pub mod lottery;
pub mod overview;

pub use history::{
    HISTORY_PAGE_SIZE,
    HISTORY_POLL_INTERVAL,
    HistoryPage,
    HistorySnapshot,
};
pub use lottery::{
    LOTTERY_POLL_INTERVAL,
    LotteryView,
    LotterySnapshot,
    RECENT_ROUNDS,
};
pub use overview::{
    OVERVIEW_POLL_INTERVAL,
    OverviewPage,
    OverviewSnapshot,
};
