//! Entity extraction and session-scoped aliasing.
//!
//! Addresses and hashes are long; prompts refer to them by short aliases
//! (`addr1`, `tx1`, `token1`). Aliases are assigned monotonically per kind and
//! never reused within a session. The reverse table expands them back before
//! any tool sees its arguments.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tool::ToolCategory;

/// Kind of on-chain value recognised in text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Address,
    TxHash,
    TokenContract,
}

impl EntityKind {
    pub const fn alias_prefix(self) -> &'static str {
        match self {
            Self::Address => "addr",
            Self::TxHash => "tx",
            Self::TokenContract => "token",
        }
    }

    /// Tool categories worth offering while an entity of this kind is active
    pub const fn categories(self) -> &'static [ToolCategory] {
        match self {
            Self::Address => &[ToolCategory::Balance, ToolCategory::Transfer],
            Self::TxHash => &[ToolCategory::Transaction],
            Self::TokenContract => &[ToolCategory::Token],
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Address => 0,
            Self::TxHash => 1,
            Self::TokenContract => 2,
        }
    }
}

/// Classify a bare value by shape: `0x` + 40 hex is an address, `0x` + 64 hex a hash.
pub fn classify_value(value: &str) -> Option<EntityKind> {
    let hex = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        40 => Some(EntityKind::Address),
        64 => Some(EntityKind::TxHash),
        _ => None,
    }
}

/// Address- and hash-shaped tokens in order of first appearance
///
/// An address directly preceded by the word `token` or `contract` is taken to
/// be a token contract.
pub fn extract_entities(text: &str) -> Vec<(EntityKind, String)> {
    let mut found: Vec<(EntityKind, String)> = Vec::new();
    let mut previous_word = String::new();

    let is_separator =
        |c: char| c.is_whitespace() || matches!(c, ',' | ';' | '(' | ')' | '"' | '\'' | '`');
    for raw in text.split(is_separator) {
        let word = raw.trim_end_matches(['.', '?', '!', ':']);
        if word.is_empty() {
            continue;
        }

        if let Some(mut kind) = classify_value(word) {
            let names_a_contract = matches!(previous_word.as_str(), "token" | "contract");
            if kind == EntityKind::Address && names_a_contract {
                kind = EntityKind::TokenContract;
            }
            if !found.iter().any(|(_, v)| v.eq_ignore_ascii_case(word)) {
                found.push((kind, word.to_string()));
            }
        }
        previous_word = word.to_lowercase();
    }

    found
}

/// One alias table row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub kind: EntityKind,
    pub value: String,
}

/// Bidirectional value ↔ alias mapping for one session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
    by_value: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
    counters: [u32; 3],
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias for `value`, assigning the next one for `kind` on first sight
    pub fn assign(&mut self, kind: EntityKind, value: &str) -> String {
        let key = value.to_lowercase();
        if let Some(&idx) = self.by_value.get(&key) {
            return self.entries[idx].alias.clone();
        }

        let counter = &mut self.counters[kind.index()];
        *counter += 1;
        let alias = format!("{}{}", kind.alias_prefix(), counter);

        let idx = self.entries.len();
        self.entries.push(AliasEntry {
            alias: alias.clone(),
            kind,
            value: value.to_string(),
        });
        self.by_value.insert(key, idx);
        self.by_alias.insert(alias.clone(), idx);
        alias
    }

    /// Full value for an alias
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.by_alias
            .get(&alias.to_lowercase())
            .map(|&idx| self.entries[idx].value.as_str())
    }

    pub fn entry(&self, alias: &str) -> Option<&AliasEntry> {
        self.by_alias.get(&alias.to_lowercase()).map(|&idx| &self.entries[idx])
    }

    /// Alias previously assigned to a value
    pub fn alias_of(&self, value: &str) -> Option<&str> {
        self.by_value
            .get(&value.to_lowercase())
            .map(|&idx| self.entries[idx].alias.as_str())
    }

    /// Whether `s` has the shape of an alias (`addr3`, `tx12`, `token1`)
    pub fn is_alias_shaped(s: &str) -> bool {
        let lower = s.to_lowercase();
        [EntityKind::Address, EntityKind::TxHash, EntityKind::TokenContract]
            .iter()
            .any(|kind| {
                lower.strip_prefix(kind.alias_prefix()).is_some_and(|digits| {
                    !digits.is_empty()
                        && digits.chars().all(|c| c.is_ascii_digit())
                        && !digits.starts_with('0')
                })
            })
    }

    /// Replace every known value in `text` with its alias
    pub fn compress(&self, text: &str) -> String {
        let mut out = text.to_string();
        for entry in &self.entries {
            out = replace_ignore_ascii_case(&out, &entry.value, &entry.alias);
        }
        out
    }

    /// Rows in assignment order
    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }
    let lower_hay = haystack.to_ascii_lowercase();
    let lower_needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut cursor = 0;
    while let Some(pos) = lower_hay[cursor..].find(&lower_needle) {
        let start = cursor + pos;
        out.push_str(&haystack[cursor..start]);
        out.push_str(replacement);
        cursor = start + needle.len();
    }
    out.push_str(&haystack[cursor..]);
    out
}
