//! Intent inference: closed-set keyword classification of free text.

use serde::{Deserialize, Serialize};

use super::entity::{EntityKind, extract_entities};
use crate::config::IntentConfig;
use crate::tool::ToolCategory;

/// What the user is trying to do this turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BalanceCheck,
    GasAnalysis,
    TokenAnalysis,
    TransactionLookup,
    Generic,
}

impl Intent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BalanceCheck => "balance_check",
            Self::GasAnalysis => "gas_analysis",
            Self::TokenAnalysis => "token_analysis",
            Self::TransactionLookup => "transaction_lookup",
            Self::Generic => "generic",
        }
    }

    /// Tool categories that serve this intent
    pub const fn categories(self) -> &'static [ToolCategory] {
        match self {
            Self::BalanceCheck => &[ToolCategory::Balance],
            Self::GasAnalysis => &[ToolCategory::Gas, ToolCategory::Block],
            Self::TokenAnalysis => &[ToolCategory::Token, ToolCategory::Contract],
            Self::TransactionLookup => {
                &[ToolCategory::Transaction, ToolCategory::TransactionHistory]
            }
            Self::Generic => &[],
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword classifier. Keywords and priority come from configuration.
#[derive(Clone, Debug)]
pub struct IntentClassifier {
    rules: Vec<(Intent, Vec<String>)>,
}

impl IntentClassifier {
    pub fn new(config: &IntentConfig) -> Self {
        let mut rules: Vec<(Intent, Vec<String>)> = Vec::new();

        // Priority order first, then any configured intent the priority list omits.
        for intent in &config.priority {
            if let Some(words) = config.keywords.get(intent) {
                rules.push((*intent, normalize(words)));
            }
        }
        let mut rest: Vec<_> = config
            .keywords
            .iter()
            .filter(|(intent, _)| !config.priority.contains(intent))
            .collect();
        rest.sort_by_key(|(intent, _)| intent.as_str());
        for (intent, words) in rest {
            rules.push((*intent, normalize(words)));
        }

        Self { rules }
    }

    /// Highest keyword score wins; ties go to the earlier rule; no match is `Generic`.
    pub fn classify(&self, text: &str) -> Intent {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '-')
            .filter(|t| !t.is_empty())
            .collect();
        let has_tx_hash = extract_entities(text)
            .iter()
            .any(|(kind, _)| *kind == EntityKind::TxHash);

        let mut best = (Intent::Generic, 0usize);
        for (intent, words) in &self.rules {
            let mut score = words
                .iter()
                .filter(|word| keyword_matches(word, &lowered, &tokens))
                .count();
            if *intent == Intent::TransactionLookup && has_tx_hash {
                score += 1;
            }
            if score > best.1 {
                best = (*intent, score);
            }
        }
        best.0
    }
}

fn normalize(words: &[String]) -> Vec<String> {
    words.iter().map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()).collect()
}

fn keyword_matches(word: &str, lowered: &str, tokens: &[&str]) -> bool {
    if word.contains(' ') {
        lowered.contains(word)
    } else {
        tokens.iter().any(|t| {
            t.strip_prefix(word)
                .is_some_and(|suffix| matches!(suffix, "" | "s" | "es"))
        })
    }
}
