//! Domain layer: entities and the contracts the scanner is built on.
//!
//! # Architecture
//!
//! - [`entities`] - Domain records, shards and lookup outcomes
//! - [`candidates`] - Name generation for character-combination tables
//! - [`dictionary`] - Word lists as candidate names
//! - [`repositories`] - The [`repositories::Store`] contract
//! - [`registry`] - The [`registry::RegistryClient`] contract
//!
//! The domain layer has no dependency on a concrete backend or protocol.
//! Implementations live in `crate::infrastructure`, orchestration in
//! `crate::application`.

pub mod candidates;
pub mod dictionary;
pub mod entities;
pub mod registry;
pub mod repositories;
