use crate::model::{deep_merge, params_from, Params, Tuple};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One key-reshaping step of a [`Transformer`] pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Rename keys per mapping; keys not in the mapping are untouched.
    RenameKeys { mapping: IndexMap<String, String> },
    /// Prefix every key as `<prefix>_<key>`.
    PrefixKeys { prefix: String },
    /// Keep only the listed keys, in list order.
    AcceptKeys { keys: Vec<String> },
    /// Deep-merge defaults under the tuple (the tuple wins per leaf key).
    Merge { defaults: Params },
}

impl Step {
    fn apply(&self, tuple: &Tuple) -> Tuple {
        match self {
            Step::RenameKeys { mapping } => tuple
                .iter()
                .map(|(k, v)| {
                    let key = mapping.get(k).cloned().unwrap_or_else(|| k.clone());
                    (key, v.clone())
                })
                .collect(),
            Step::PrefixKeys { prefix } => tuple
                .iter()
                .map(|(k, v)| (format!("{prefix}_{k}"), v.clone()))
                .collect(),
            Step::AcceptKeys { keys } => keys
                .iter()
                .filter_map(|k| tuple.get(k).map(|v| (k.clone(), v.clone())))
                .collect(),
            Step::Merge { defaults } => {
                let own: Params = tuple.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                deep_merge(defaults, &own)
                    .into_iter()
                    .collect()
            }
        }
    }
}

/// Composable key-rename/prefix/accept/merge pipeline over tuples and tuple
/// collections. Steps run left to right; an empty pipeline is the identity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transformer {
    steps: Vec<Step>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename_keys(mut self, mapping: &[(&str, &str)]) -> Self {
        self.steps.push(Step::RenameKeys {
            mapping: mapping
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        });
        self
    }

    pub fn prefix_keys(mut self, prefix: impl Into<String>) -> Self {
        self.steps.push(Step::PrefixKeys {
            prefix: prefix.into(),
        });
        self
    }

    pub fn accept_keys<S: AsRef<str>>(mut self, keys: &[S]) -> Self {
        self.steps.push(Step::AcceptKeys {
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
        });
        self
    }

    pub fn merge(mut self, defaults: Value) -> Self {
        self.steps.push(Step::Merge {
            defaults: params_from(defaults),
        });
        self
    }

    pub fn call_tuple(&self, tuple: &Tuple) -> Tuple {
        self.steps
            .iter()
            .fold(tuple.clone(), |acc, step| step.apply(&acc))
    }

    pub fn call(&self, tuples: &[Tuple]) -> Vec<Tuple> {
        tuples.iter().map(|t| self.call_tuple(t)).collect()
    }
}
