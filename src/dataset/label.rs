//! Binary class label.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DatasetError;

/// Ground-truth class of a clip.  `Fake` is the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    /// Both labels in target order.
    pub const ALL: [Label; 2] = [Label::Real, Label::Fake];

    /// Binary target fed to the loss: `0.0` for real, `1.0` for fake.
    pub fn as_target(self) -> f32 {
        match self {
            Self::Real => 0.0,
            Self::Fake => 1.0,
        }
    }

    /// Name of the subdirectory holding clips of this class.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Fake => "fake",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Real => Self::Fake,
            Self::Fake => Self::Real,
        }
    }
}

impl FromStr for Label {
    type Err = DatasetError;

    /// Accepts the directory names only; metadata vocabularies are mapped by
    /// the staging layer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "real" => Ok(Self::Real),
            "fake" => Ok(Self::Fake),
            other => Err(DatasetError::UnknownLabel(other.to_string())),
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_is_positive_class() {
        assert_eq!(Label::Real.as_target(), 0.0);
        assert_eq!(Label::Fake.as_target(), 1.0);
    }

    #[test]
    fn parses_directory_names_only() {
        assert_eq!("real".parse::<Label>().unwrap(), Label::Real);
        assert_eq!("fake".parse::<Label>().unwrap(), Label::Fake);
        assert!(matches!(
            "spoof".parse::<Label>(),
            Err(DatasetError::UnknownLabel(s)) if s == "spoof"
        ));
    }

    #[test]
    fn opposite_flips() {
        for label in Label::ALL {
            assert_ne!(label.opposite(), label);
            assert_eq!(label.opposite().opposite(), label);
        }
    }
}
