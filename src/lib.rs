//! Forge -- Self-Repair Governor
//!
//! A governor for automated, self-applied code changes to a workspace.
//! Proposals are policy-checked, staged, verified, and snapshotted before
//! anything touches the live tree. Every decision lands in an append-only
//! audit log.

pub mod types;
pub mod config;
pub mod error;
pub mod state;
pub mod audit;
pub mod policy;
pub mod stage;
pub mod gate;
pub mod strategy;
pub mod snapshot;
pub mod governor;
