//! Policy Configuration
//!
//! Strict YAML schema for `policies/repair.policy.yaml`. Unknown keys are
//! a hard error rather than being silently skipped, so a typoed guard can
//! never weaken the policy unnoticed. The file is loaded fresh for every
//! repair attempt; edits take effect immediately.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use yaml_rust2::{Yaml, YamlLoader};

use crate::error::ForgeError;

/// Default acknowledgment artifact at the workspace root.
const DEFAULT_ACK_FILE: &str = "human-ack.txt";
/// Default change budget, in percent.
const DEFAULT_BUDGET_PCT: u32 = 5;

/// Guards for one repair attempt. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Maximum change size (integer percent) without acknowledgment.
    pub change_budget_pct: u32,
    /// Whether a red gate aborts the attempt.
    pub require_green_tests: bool,
    /// Banned content patterns (regular expressions), in file order.
    pub banned_patterns: Vec<String>,
    /// Strategy names that always require acknowledgment.
    pub trigger_strategies: Vec<String>,
    /// Change size above which acknowledgment is required.
    pub max_budget_pct_without_ack: u32,
    /// Acknowledgment file name, relative to the workspace root.
    pub ack_file: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            change_budget_pct: DEFAULT_BUDGET_PCT,
            require_green_tests: true,
            banned_patterns: Vec::new(),
            trigger_strategies: Vec::new(),
            max_budget_pct_without_ack: DEFAULT_BUDGET_PCT,
            ack_file: DEFAULT_ACK_FILE.to_string(),
        }
    }
}

impl PolicyConfig {
    /// Load the policy file at `path`. A missing file yields the defaults;
    /// a malformed or unknown-keyed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file: {}", path.display()))?;
        Self::parse(&raw).map_err(|e| ForgeError::PolicyConfig(e.to_string()).into())
    }

    /// Parse the strict policy schema from a YAML document.
    pub fn parse(raw: &str) -> Result<Self> {
        let docs = YamlLoader::load_from_str(raw).context("policy file is not valid YAML")?;
        let doc = match docs.first() {
            Some(d) => d,
            // An empty file means "all defaults", same as a missing one.
            None => return Ok(Self::default()),
        };

        let hash = doc
            .as_hash()
            .context("policy file root must be a mapping")?;

        let mut policy = Self::default();
        let mut max_no_ack: Option<u32> = None;

        for (key, value) in hash {
            let key = key.as_str().context("policy keys must be strings")?;
            match key {
                "change_budget_pct" => {
                    policy.change_budget_pct = int_field(value, key)?;
                }
                "require_green_tests" => {
                    policy.require_green_tests = value
                        .as_bool()
                        .with_context(|| format!("'{key}' must be a boolean"))?;
                }
                "banned_patterns" => {
                    policy.banned_patterns = string_list(value, key)?;
                }
                "escalation" => {
                    let esc = value
                        .as_hash()
                        .context("'escalation' must be a mapping")?;
                    for (ekey, evalue) in esc {
                        let ekey = ekey.as_str().context("escalation keys must be strings")?;
                        match ekey {
                            "trigger_strategies" => {
                                policy.trigger_strategies = string_list(evalue, ekey)?;
                            }
                            "max_budget_pct_without_ack" => {
                                max_no_ack = Some(int_field(evalue, ekey)?);
                            }
                            "require" => {
                                policy.ack_file = evalue
                                    .as_str()
                                    .with_context(|| format!("'{ekey}' must be a string"))?
                                    .to_string();
                            }
                            other => {
                                anyhow::bail!("unknown escalation key: '{other}'");
                            }
                        }
                    }
                }
                other => {
                    anyhow::bail!("unknown policy key: '{other}'");
                }
            }
        }

        // Absent threshold falls back to the plain budget.
        policy.max_budget_pct_without_ack = max_no_ack.unwrap_or(policy.change_budget_pct);
        Ok(policy)
    }
}

fn int_field(value: &Yaml, key: &str) -> Result<u32> {
    let n = value
        .as_i64()
        .with_context(|| format!("'{key}' must be an integer"))?;
    u32::try_from(n).with_context(|| format!("'{key}' must be non-negative"))
}

fn string_list(value: &Yaml, key: &str) -> Result<Vec<String>> {
    let items = value
        .as_vec()
        .with_context(|| format!("'{key}' must be a list"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .with_context(|| format!("'{key}' entries must be strings"))
        })
        .collect()
}
