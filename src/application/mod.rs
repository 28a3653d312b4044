//! Application layer: planning and running scans.
//!
//! Services consume the domain traits ([`Store`](crate::domain::repositories::Store),
//! [`RegistryClient`](crate::domain::registry::RegistryClient)) and never
//! touch a concrete backend.
//!
//! # Modules
//!
//! - [`services::shard_planner::ShardPlanner`] - Splits tables into disjoint shards
//! - [`services::shard_processor::ShardProcessor`] - Looks up and writes back one shard
//! - [`execution`] - Sequential, task pool and process pool strategies

pub mod execution;
pub mod services;
