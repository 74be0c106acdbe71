use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Facts a Salt minion reports about itself (`grains.items`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grains {
    #[serde(default)]
    pub osfinger: Option<String>,
    #[serde(default)]
    pub kernel: Option<String>,
    /// MiB.
    #[serde(default)]
    pub mem_total: Option<u64>,
    #[serde(rename = "virtual", default)]
    pub virtual_kind: Option<String>,
    #[serde(default)]
    pub swap_total: Option<u64>,
    #[serde(default)]
    pub saltversion: Option<String>,
    #[serde(default)]
    pub fqdn_ip4: Vec<String>,
    #[serde(default)]
    pub num_cpus: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinionGrains {
    pub minion_id: String,
    pub grains: Grains,
}

impl MinionGrains {
    /// Build per-minion grains from one `return` object of a Salt job.
    ///
    /// Minions that did not answer are reported as `false`; they, and any
    /// entry that fails to decode, get empty grains. Output is sorted by id.
    pub fn from_return(map: &serde_json::Map<String, Value>) -> Vec<MinionGrains> {
        let mut out: Vec<MinionGrains> = map
            .iter()
            .map(|(minion_id, raw)| {
                let grains = match raw {
                    Value::Object(_) => serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
                        tracing::warn!(minion = %minion_id, error = %e, "Undecodable grains, treating as empty");
                        Grains::default()
                    }),
                    _ => Grains::default(),
                };
                MinionGrains {
                    minion_id: minion_id.clone(),
                    grains,
                }
            })
            .collect();
        out.sort_by(|a, b| a.minion_id.cmp(&b.minion_id));
        out
    }
}
