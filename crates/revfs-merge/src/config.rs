use serde::{Deserialize, Serialize};

/// Which built-in policy a configured merge uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// The latest candidate's value wins every conflict.
    Latest,
    /// Presence conflicts are judged against the common ancestor.
    #[default]
    AncestorAware,
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Self::Latest),
            "ancestor-aware" => Ok(Self::AncestorAware),
            other => Err(format!("unknown merge policy: {other}")),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Latest => "latest",
            Self::AncestorAware => "ancestor-aware",
        })
    }
}

/// Settings for [`merge`](crate::merge) and [`merge_tips`](crate::merge_tips).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Most candidates merged into one commit; larger sets merge in chunks.
    pub max_parents: usize,
    pub policy: PolicyKind,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_parents: 16,
            policy: PolicyKind::default(),
        }
    }
}
