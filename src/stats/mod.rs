pub mod runner;
pub mod store;
pub mod types;
pub mod warehouse;

pub use runner::StatsJobService;
pub use store::{MemoryStatsStore, PgStatsStore, StatsStore};
pub use types::{StatsError, StatsUser, UserStats};
pub use warehouse::{ListenWarehouse, PgListenWarehouse, WarehouseCredentials};
