//! Dataflow engine configuration.

use serde::{Deserialize, Serialize};

/// How a definition kills other definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KillPolicy {
    /// A definition kills every other definition with the same variable
    /// name, regardless of scope or path. This over-approximates kills for
    /// shadowed names and is not SSA-precise.
    #[default]
    ConservativeSameNameKill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DfaConfig {
    /// Dump per-block bit vectors at `trace` level after the fixpoint.
    pub trace: bool,
    pub kill_policy: KillPolicy,
    /// Also keep `RchOut` per block after the fixpoint.
    pub build_out_map: bool,
}

impl Default for DfaConfig {
    fn default() -> Self {
        Self {
            trace: false,
            kill_policy: KillPolicy::ConservativeSameNameKill,
            build_out_map: false,
        }
    }
}
