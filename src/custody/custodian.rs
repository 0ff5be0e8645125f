use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two parents a day can belong to
///
/// Serialized lowercase ("mamae", "papai") to match the stored ledger format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Custodian {
    Mamae,
    Papai,
}

impl Custodian {
    /// The other parent
    pub fn opposite(self) -> Self {
        match self {
            Custodian::Mamae => Custodian::Papai,
            Custodian::Papai => Custodian::Mamae,
        }
    }

    /// Display name used in tool responses
    pub fn label(self) -> &'static str {
        match self {
            Custodian::Mamae => "Mamãe",
            Custodian::Papai => "Papai",
        }
    }

    /// Identifier used in the stored ledger and tool parameters
    pub fn as_str(self) -> &'static str {
        match self {
            Custodian::Mamae => "mamae",
            Custodian::Papai => "papai",
        }
    }
}

impl fmt::Display for Custodian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Custodian {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mamae" | "mamãe" => Ok(Custodian::Mamae),
            "papai" => Ok(Custodian::Papai),
            _ => Err(format!(
                "Invalid custodian '{}'. Valid options are: mamae, papai",
                s
            )),
        }
    }
}
