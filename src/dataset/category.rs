//! Skin lesion diagnostic categories.

use serde::{Deserialize, Serialize};

/// Diagnostic category of a lesion image, in ground-truth column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LesionCategory {
    /// Melanoma.
    Mel,
    /// Melanocytic nevus.
    Nv,
    /// Basal cell carcinoma.
    Bcc,
    /// Actinic keratosis.
    Ak,
    /// Benign keratosis.
    Bkl,
    /// Dermatofibroma.
    Df,
    /// Vascular lesion.
    Vasc,
    /// Squamous cell carcinoma.
    Scc,
    /// Out-of-distribution / none of the above.
    Unk,
}

impl LesionCategory {
    /// Get all category variants, in ground-truth column order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Mel,
            Self::Nv,
            Self::Bcc,
            Self::Ak,
            Self::Bkl,
            Self::Df,
            Self::Vasc,
            Self::Scc,
            Self::Unk,
        ]
    }

    /// Column index of this category in an ISIC 2019 ground truth table.
    #[must_use]
    pub fn index(self) -> usize {
        Self::all().iter().position(|c| *c == self).unwrap_or(0)
    }

    /// Category at a column index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::all().get(index).copied()
    }

    /// Whether this is the synthetic unknown category.
    #[must_use]
    pub fn is_unknown(self) -> bool {
        self == Self::Unk
    }

    /// Parse from string (case-insensitive, accepts common long names).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mel" | "melanoma" => Some(Self::Mel),
            "nv" | "nevus" | "melanocytic_nevus" => Some(Self::Nv),
            "bcc" | "basal_cell_carcinoma" => Some(Self::Bcc),
            "ak" | "akiec" | "actinic_keratosis" => Some(Self::Ak),
            "bkl" | "benign_keratosis" => Some(Self::Bkl),
            "df" | "dermatofibroma" => Some(Self::Df),
            "vasc" | "vascular_lesion" => Some(Self::Vasc),
            "scc" | "squamous_cell_carcinoma" => Some(Self::Scc),
            "unk" | "unknown" | "ood" => Some(Self::Unk),
            _ => None,
        }
    }

    /// Get a description of this category.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Mel => "Melanoma",
            Self::Nv => "Melanocytic nevus",
            Self::Bcc => "Basal cell carcinoma",
            Self::Ak => "Actinic keratosis",
            Self::Bkl => "Benign keratosis",
            Self::Df => "Dermatofibroma",
            Self::Vasc => "Vascular lesion",
            Self::Scc => "Squamous cell carcinoma",
            Self::Unk => "None of the others (out of distribution)",
        }
    }
}

impl std::fmt::Display for LesionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mel => write!(f, "MEL"),
            Self::Nv => write!(f, "NV"),
            Self::Bcc => write!(f, "BCC"),
            Self::Ak => write!(f, "AK"),
            Self::Bkl => write!(f, "BKL"),
            Self::Df => write!(f, "DF"),
            Self::Vasc => write!(f, "VASC"),
            Self::Scc => write!(f, "SCC"),
            Self::Unk => write!(f, "UNK"),
        }
    }
}

impl std::str::FromStr for LesionCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| format!("Unknown category: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for cat in LesionCategory::all() {
            let s = cat.to_string();
            let parsed: LesionCategory = s.parse().unwrap();
            assert_eq!(*cat, parsed);
        }
    }

    #[test]
    fn test_category_from_str_loose() {
        assert_eq!(LesionCategory::from_str_loose("mel"), Some(LesionCategory::Mel));
        assert_eq!(LesionCategory::from_str_loose("AKIEC"), Some(LesionCategory::Ak));
        assert_eq!(LesionCategory::from_str_loose("unknown"), Some(LesionCategory::Unk));
        assert_eq!(LesionCategory::from_str_loose("invalid"), None);
    }

    #[test]
    fn test_column_order() {
        assert_eq!(LesionCategory::Mel.index(), 0);
        assert_eq!(LesionCategory::Unk.index(), 8);
        assert_eq!(LesionCategory::from_index(7), Some(LesionCategory::Scc));
        assert_eq!(LesionCategory::from_index(9), None);
        assert!(LesionCategory::Unk.is_unknown());
    }
}
