//! Process-related modules for discovery and classification.
//!
//! This module provides:
//! - `record`: the per-process value and package-id derivation
//! - `classifier`: uid-based privilege tiers
//! - `parser`: listing and `/proc` status parsers
//! - `catalog`: shell-driven scanning with a structured fallback

pub mod catalog;
pub mod classifier;
pub mod parser;
pub mod record;

// Re-export commonly used types
pub use catalog::{retain_tier, ProcessCatalog, ScanReport, ScanSettings, ScanStrategy};
pub use classifier::{
    is_core_system, is_system_process, is_system_service, is_user_app, PrivilegeTier,
};
pub use parser::ParsedBatch;
pub use record::{extract_package_id, ProcessRecord};
