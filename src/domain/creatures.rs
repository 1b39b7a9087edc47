//! Creature records as served to clients, and the rules derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::text::collapse_whitespace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub is_legendary: bool,
    pub name: String,
    pub habitat: String,
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    pub pokemon: Creature,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl LookupResult {
    pub fn plain(pokemon: Creature) -> Self {
        Self {
            pokemon,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationKind {
    Yoda,
    Shakespeare,
}

impl TranslationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TranslationKind::Yoda => "yoda",
            TranslationKind::Shakespeare => "shakespeare",
        }
    }

    /// Cave dwellers and legendaries speak like Yoda; everyone else gets Shakespeare.
    pub fn for_creature(creature: &Creature) -> Self {
        if creature.is_legendary || creature.habitat.eq_ignore_ascii_case("cave") {
            TranslationKind::Yoda
        } else {
            TranslationKind::Shakespeare
        }
    }
}

impl fmt::Display for TranslationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical lookup name: lowercased with whitespace collapsed.
pub fn normalize_name(raw: &str) -> String {
    collapse_whitespace(&raw.to_lowercase())
}
