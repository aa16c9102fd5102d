//! Fixed-order label vocabulary

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^empty[0-9A-Za-z]+$").expect("valid placeholder pattern"));

/// Labels of the unit icons the dataset tracks, in column order.
pub const DEFAULT_LABELS: &[&str] = &[
    "knight", "small_rock", "baseball", "dog", "ice", "crocodile", "snowball", "gatlin",
    "sheep", "boxer", "sarkaz", "neon", "mouse", "shield", "pig", "jesselton", "bleeding",
    "acid", "sax", "spider", "beast", "pompeii", "samii", "aoe_wizard", "hermit_crab",
    "candlestick", "boom", "big_rock", "sailer", "reborn", "bite", "reddao", "zizai", "zaaro",
    "coral", "small_axe", "big_crab", "flower", "pirate", "fast_axe", "saw_machine", "kicker",
    "mortar", "rpg", "sarkaz_wizard", "big_axe", "stabber", "door", "sandman", "water_cannon",
    "archer", "swimmer", "bear", "ice_boom", "fast_hammer", "small_reddao",
];

/// Whether `label` names an empty slot rather than a unit.
pub fn is_placeholder(label: &str) -> bool {
    PLACEHOLDER_RE.is_match(label)
}

/// Ordered label set with a dense index built once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build from labels in column order. Duplicates keep their first position.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut index = HashMap::new();
        for label in labels {
            let label = label.into();
            if index.contains_key(&label) {
                continue;
            }
            index.insert(label.clone(), ordered.len());
            ordered.push(label);
        }
        Self {
            labels: ordered,
            index,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Column of `label`, if tracked.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Resolve a batch of labels to columns, e.g. a template catalog at startup.
    pub fn resolve_all<'a, I>(&self, labels: I) -> Vec<Option<usize>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels.into_iter().map(|l| self.index_of(l)).collect()
    }

    /// Whether `header` lists exactly this vocabulary in order.
    pub fn matches_header<S: AsRef<str>>(&self, header: &[S]) -> bool {
        header.len() == self.labels.len()
            && header
                .iter()
                .zip(&self.labels)
                .all(|(h, l)| h.as_ref().trim() == l)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().copied())
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(labels: Vec<String>) -> Self {
        Self::new(labels)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.labels
    }
}
