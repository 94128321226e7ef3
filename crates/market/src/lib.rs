pub mod replay;
pub mod store;

pub use replay::{list_datasets, read_ticks, ReplayData};
pub use store::{HistorySnapshot, MarketDataStore, StoreConfig};
