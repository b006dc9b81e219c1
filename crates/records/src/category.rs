// ABOUTME: The fixed atlas topic enumeration plus the UNCATEGORIZED sentinel.
// ABOUTME: Provides label lookup, containment matching and lenient serde support.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Topic label of a clinical record.
///
/// The seventeen topic values come from the atlas itself; `Uncategorized`
/// is the sentinel for anything that does not map onto one of them. Values
/// are never built from raw page text, only through the lookups below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Category {
    Cataract,
    ContactLens,
    Cornea,
    ExternalDisease,
    Genetics,
    Glaucoma,
    InheritedDisease,
    Iris,
    Lens,
    NeuroOp,
    Pathology,
    Oculoplastics,
    Retina,
    Systems,
    Trauma,
    Uveitis,
    Vitreous,
    #[default]
    Uncategorized,
}

impl Category {
    /// Every topic value in enumeration order (sentinel excluded).
    pub const ALL: [Category; 17] = [
        Category::Cataract,
        Category::ContactLens,
        Category::Cornea,
        Category::ExternalDisease,
        Category::Genetics,
        Category::Glaucoma,
        Category::InheritedDisease,
        Category::Iris,
        Category::Lens,
        Category::NeuroOp,
        Category::Pathology,
        Category::Oculoplastics,
        Category::Retina,
        Category::Systems,
        Category::Trauma,
        Category::Uveitis,
        Category::Vitreous,
    ];

    /// The canonical upper-case label, as written in persisted collections.
    pub fn label(self) -> &'static str {
        match self {
            Category::Cataract => "CATARACT",
            Category::ContactLens => "CONTACT LENS",
            Category::Cornea => "CORNEA",
            Category::ExternalDisease => "EXTERNAL DISEASE",
            Category::Genetics => "GENETICS",
            Category::Glaucoma => "GLAUCOMA",
            Category::InheritedDisease => "INHERITED DISEASE",
            Category::Iris => "IRIS",
            Category::Lens => "LENS",
            Category::NeuroOp => "NEURO-OP",
            Category::Pathology => "PATHOLOGY",
            Category::Oculoplastics => "OCULOPLASTICS",
            Category::Retina => "RETINA",
            Category::Systems => "SYSTEMS",
            Category::Trauma => "TRAUMA",
            Category::Uveitis => "UVEITIS",
            Category::Vitreous => "VITREOUS",
            Category::Uncategorized => "UNCATEGORIZED",
        }
    }

    /// Directory-friendly form of the label: `NEURO-OP` -> `neuro_op`.
    pub fn slug(self) -> String {
        self.label().to_lowercase().replace([' ', '-'], "_")
    }

    pub fn is_uncategorized(self) -> bool {
        self == Category::Uncategorized
    }

    /// Exact (case, hyphen and whitespace insensitive) label lookup.
    ///
    /// `OTHER` and `UNCATEGORIZED` both resolve to the sentinel.
    pub fn from_label(s: &str) -> Option<Category> {
        let key = normalize(s);
        if key == "UNCATEGORIZED" || key == "OTHER" {
            return Some(Category::Uncategorized);
        }
        Category::ALL
            .into_iter()
            .find(|cat| normalize(cat.label()) == key)
    }

    /// Maps free text onto the enumeration by containment.
    ///
    /// An exact label match wins first. Otherwise the first label (in
    /// enumeration order) contained in the text is returned, and failing
    /// that the first label that contains the text. Fragments shorter than
    /// three characters never match.
    pub fn match_text(text: &str) -> Option<Category> {
        let needle = normalize(text);
        if needle.chars().count() < 3 {
            return None;
        }

        if let Some(cat) = Category::ALL
            .into_iter()
            .find(|cat| normalize(cat.label()) == needle)
        {
            return Some(cat);
        }

        if let Some(cat) = Category::ALL
            .into_iter()
            .find(|cat| needle.contains(&normalize(cat.label())))
        {
            return Some(cat);
        }

        Category::ALL
            .into_iter()
            .find(|cat| normalize(cat.label()).contains(&needle))
    }
}

/// Upper-cases, treats hyphens as spaces and collapses whitespace.
fn normalize(s: &str) -> String {
    s.to_uppercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Error for [`Category::from_str`] on text that names no category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_label(s).ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    /// Unknown or non-string values load as the sentinel instead of failing.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .and_then(Category::from_label)
            .unwrap_or_default())
    }
}
