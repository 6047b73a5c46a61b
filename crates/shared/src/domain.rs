use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(RiddleId);
id_newtype!(RoomId);
id_newtype!(ChallengeId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Hi,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language '{0}', expected 'en' or 'hi'")]
pub struct ParseLanguageError(pub String);

impl FromStr for Language {
    type Err = ParseLanguageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "hi" | "hindi" => Ok(Self::Hi),
            other => Err(ParseLanguageError(other.to_string())),
        }
    }
}

/// Riddle difficulty. Generated riddles carry free-form labels, so matching is
/// case-insensitive and anything unrecognised is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Other(String),
}

impl Difficulty {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for Difficulty {
    fn from(label: String) -> Self {
        let label = label.trim();
        match label.to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "" | "medium" => Self::Medium,
            "hard" => Self::Hard,
            _ => Self::Other(label.to_string()),
        }
    }
}

impl From<Difficulty> for String {
    fn from(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Active,
    Finished,
}

/// Achievement tier as the server reports it for a points total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankInfo {
    pub points: i64,
    pub rank: String,
    pub title: String,
    #[serde(default)]
    pub icon: String,
}
