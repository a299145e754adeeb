use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

/// PDB entry id, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProteinId(String);

impl ProteinId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProteinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProteinId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let is_valid =
            normalized.len() == 4 && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(KiraError::InvalidProteinId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// KNApSAcK compound id such as `C00001234`. The detail page sometimes
/// renders it with thousands separators, which are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompoundId(String);

impl CompoundId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompoundId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value.trim().chars().filter(|ch| *ch != ',').collect();
        let digits = normalized.strip_prefix('C').unwrap_or_default();
        if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(KiraError::InvalidCompoundId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Plant name -> KNApSAcK metabolites, one row per compound.
    Knapsack,
    /// Compound SMILES -> BindingDB targets, joined per compound.
    Bindingdb,
    /// Joined BindingDB targets -> one row per target.
    Explode,
    /// RCSB link -> search query.
    PdbQuery,
    /// Search query -> PDB entries, one row per entry.
    Structures,
    /// PDB entry -> structure title.
    Titles,
    /// PDB entry -> FASTA sequence file.
    Fasta,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::Knapsack,
        StageKind::Bindingdb,
        StageKind::Explode,
        StageKind::PdbQuery,
        StageKind::Structures,
        StageKind::Titles,
        StageKind::Fasta,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Knapsack => "knapsack",
            StageKind::Bindingdb => "bindingdb",
            StageKind::Explode => "explode",
            StageKind::PdbQuery => "pdb-query",
            StageKind::Structures => "structures",
            StageKind::Titles => "titles",
            StageKind::Fasta => "fasta",
        }
    }

    /// Position in the default run order, used for file name prefixes.
    pub fn ordinal(self) -> usize {
        StageKind::ALL
            .iter()
            .position(|kind| *kind == self)
            .unwrap_or_default()
            + 1
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        StageKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| KiraError::InvalidStage(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_protein_id_valid() {
        let id: ProteinId = "4hvp".parse().unwrap();
        assert_eq!(id.as_str(), "4HVP");
    }

    #[test]
    fn parse_protein_id_invalid() {
        let err = "NaN".parse::<ProteinId>().unwrap_err();
        assert_matches!(err, KiraError::InvalidProteinId(_));
    }

    #[test]
    fn compound_id_drops_separators() {
        let id: CompoundId = "C00,001,234".parse().unwrap();
        assert_eq!(id.as_str(), "C00001234");
    }

    #[test]
    fn compound_id_invalid() {
        assert_matches!(
            "Quercetin".parse::<CompoundId>(),
            Err(KiraError::InvalidCompoundId(_))
        );
    }

    #[test]
    fn stage_names_round_trip() {
        for kind in StageKind::ALL {
            assert_eq!(kind.as_str().parse::<StageKind>().unwrap(), kind);
        }
        assert_eq!("PDB_QUERY".parse::<StageKind>().unwrap(), StageKind::PdbQuery);
        assert_matches!("docking".parse::<StageKind>(), Err(KiraError::InvalidStage(_)));
    }
}
