//! Scan services: shard planning, shard processing and the dataset
//! lifecycle.

pub mod lifecycle;
pub mod shard_planner;
pub mod shard_processor;

pub use lifecycle::{
    BackupReport, ImportReport, Transfer, TransferReport, backup, import_names, transfer,
};
pub use shard_planner::{PrefixTier, ShardPlanner, tier_for_category, tier_for_table};
pub use shard_processor::{FLUSH_BATCH_SIZE, ShardProcessor, ShardReport};
