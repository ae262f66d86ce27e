pub mod app_config;
pub mod database;
pub mod file_store;
pub mod memory;
pub mod redis_repo;

pub use app_config::Config;
pub use database::PgStatsStore;
pub use file_store::{FileLedgerStore, JsonlStatsStore};
pub use memory::{MemoryLedgerStore, MemoryStatsStore};
pub use redis_repo::RedisLedgerStore;
