use serde::{Deserialize, Serialize};

/// One of the four universal subdirectories a canonical package payload may
/// carry, materialised differently per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniversalSubdir {
    Rules,
    Commands,
    Agents,
    Skills,
}

impl UniversalSubdir {
    pub const ALL: [Self; 4] = [Self::Rules, Self::Commands, Self::Agents, Self::Skills];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::Commands => "commands",
            Self::Agents => "agents",
            Self::Skills => "skills",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|subdir| subdir.as_str() == s)
    }
}

impl std::fmt::Display for UniversalSubdir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
