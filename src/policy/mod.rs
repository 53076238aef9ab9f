//! Policy Module ("Warden")
//!
//! Loads the human-editable repair policy and evaluates change proposals
//! against it: banned-content scan, escalation gate, change budget.

mod config;
mod warden;

pub use config::PolicyConfig;
pub use warden::{change_delta, evaluate, Verdict, BUILTIN_BANNED};
