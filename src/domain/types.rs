//! Core identifier and attribute types for attendee records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned document identifier (primary key of an attendee record)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random document id (20 hex chars, same length as hosted store ids)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string()[..20].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Human-readable attendee identifier (roll or registration number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollNumber(pub String);

impl RollNumber {
    pub fn new(roll: impl Into<String>) -> Self {
        Self(roll.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RollNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RollNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Food preference recorded at registration.
///
/// Stored as free text upstream: `"veg"` and `"non veg"` are recognised,
/// anything else is treated as unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoodPreference {
    Veg,
    NonVeg,
    #[default]
    Unspecified,
}

impl FoodPreference {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "veg" => Self::Veg,
            "non veg" | "non-veg" | "nonveg" => Self::NonVeg,
            _ => Self::Unspecified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Veg => "veg",
            Self::NonVeg => "non veg",
            Self::Unspecified => "unspecified",
        }
    }

    /// Label shown to staff next to the attendee name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Veg => "Vegetarian",
            Self::NonVeg => "Non-Vegetarian",
            Self::Unspecified => "Not Specified",
        }
    }
}

impl Serialize for FoodPreference {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FoodPreference {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

impl fmt::Display for FoodPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display attributes that differ between deployments.
///
/// A dining deployment records a food preference; an academic one records
/// department and year of study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum AttendeeProfile {
    Dining {
        #[serde(default)]
        preference: FoodPreference,
    },
    Academic {
        department: String,
        year: u8,
    },
}

impl AttendeeProfile {
    pub fn dining(preference: FoodPreference) -> Self {
        Self::Dining { preference }
    }

    /// One-line summary for staff displays
    pub fn summary(&self) -> String {
        match self {
            Self::Dining { preference } => format!("Food Preference: {}", preference.label()),
            Self::Academic { department, year } => format!("{department}, year {year}"),
        }
    }
}
