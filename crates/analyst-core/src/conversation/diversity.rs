//! Diversity set selection.
//!
//! Keeps the offered tool subset small without starving a plausible next
//! request: the core tools are always present, so an earlier turn's intent
//! can never crowd out the most common lookups.

use super::ConversationEntry;
use super::entity::EntityKind;
use super::intent::Intent;
use crate::config::DiversityConfig;
use crate::tool::{ToolCategory, ToolSchema};

/// Deterministic diversity-set selector
#[derive(Clone, Debug)]
pub struct DiversitySelector {
    config: DiversityConfig,
}

impl DiversitySelector {
    pub const fn new(config: DiversityConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &DiversityConfig {
        &self.config
    }

    /// Tool names to offer for a conversation entry
    pub fn select(&self, entry: &ConversationEntry, catalog: &[ToolSchema]) -> Vec<String> {
        let recent: Vec<&str> = entry.recent_tool_names().collect();
        self.select_for(entry.current_intent, &entry.entity_kinds(), &recent, catalog)
    }

    /// Selection from explicit inputs.
    ///
    /// Order: core, intent categories, recent tools, entity categories; then
    /// top up to `min_tools` from the fallback list and the rest of the catalog;
    /// then drop non-core tools from the end past `max_tools`.
    pub fn select_for(
        &self,
        intent: Intent,
        entity_kinds: &[EntityKind],
        recent_tools: &[&str],
        catalog: &[ToolSchema],
    ) -> Vec<String> {
        let in_catalog = |name: &str| catalog.iter().any(|t| t.name == name);
        let mut selected: Vec<String> = Vec::new();
        let add = |selected: &mut Vec<String>, name: &str| {
            if in_catalog(name) && !selected.iter().any(|s| s == name) {
                selected.push(name.to_string());
            }
        };

        for name in &self.config.core_tools {
            add(&mut selected, name.as_str());
        }
        for tool in tools_in(catalog, intent.categories()) {
            add(&mut selected, tool);
        }
        for name in recent_tools {
            add(&mut selected, *name);
        }
        for kind in entity_kinds {
            for tool in tools_in(catalog, kind.categories()) {
                add(&mut selected, tool);
            }
        }

        let min = self.config.min_tools.min(catalog.len());
        if selected.len() < min {
            let top_up = self
                .config
                .fallback_tools
                .iter()
                .map(String::as_str)
                .chain(catalog.iter().map(|t| t.name.as_str()));
            for name in top_up {
                if selected.len() >= min {
                    break;
                }
                add(&mut selected, name);
            }
        }

        while selected.len() > self.config.max_tools {
            let Some(pos) = selected
                .iter()
                .rposition(|name| !self.config.core_tools.contains(name))
            else {
                break;
            };
            selected.remove(pos);
        }

        selected
    }
}

fn tools_in<'a>(
    catalog: &'a [ToolSchema],
    categories: &'a [ToolCategory],
) -> impl Iterator<Item = &'a str> {
    catalog
        .iter()
        .filter(move |t| categories.contains(&t.category))
        .map(|t| t.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ParameterSchema;

    fn tool(name: &str, category: ToolCategory) -> ToolSchema {
        ToolSchema {
            name: name.into(),
            description: String::new(),
            parameters: vec![ParameterSchema::required("address", "string", "")],
            category,
        }
    }

    fn catalog() -> Vec<ToolSchema> {
        vec![
            tool("get_balance", ToolCategory::Balance),
            tool("get_gas_price", ToolCategory::Gas),
            tool("get_transaction", ToolCategory::Transaction),
            tool("get_transaction_history", ToolCategory::TransactionHistory),
            tool("get_token_info", ToolCategory::Token),
            tool("get_token_balance", ToolCategory::Token),
            tool("get_token_transfers", ToolCategory::Transfer),
            tool("get_block", ToolCategory::Block),
            tool("get_contract_abi", ToolCategory::Contract),
            tool("get_price", ToolCategory::Price),
        ]
    }

    fn selector() -> DiversitySelector {
        DiversitySelector::new(DiversityConfig::default())
    }

    const INTENTS: [Intent; 5] = [
        Intent::BalanceCheck,
        Intent::GasAnalysis,
        Intent::TokenAnalysis,
        Intent::TransactionLookup,
        Intent::Generic,
    ];

    fn entity_sets() -> Vec<Vec<EntityKind>> {
        vec![
            vec![],
            vec![EntityKind::Address],
            vec![EntityKind::TxHash],
            vec![EntityKind::TokenContract],
            vec![EntityKind::Address, EntityKind::TxHash, EntityKind::TokenContract],
        ]
    }

    #[test]
    fn test_every_combination_is_core_superset_within_bounds() {
        let selector = selector();
        let catalog = catalog();
        let config = selector.config().clone();

        for intent in INTENTS {
            for kinds in entity_sets() {
                for recent in [vec![], vec!["get_price", "get_contract_abi", "get_block"]] {
                    let set = selector.select_for(intent, &kinds, &recent, &catalog);
                    for core in &config.core_tools {
                        assert!(set.contains(core), "{intent} {kinds:?} missing {core}");
                    }
                    assert!(
                        set.len() >= config.min_tools && set.len() <= config.max_tools,
                        "{intent} {kinds:?} -> {set:?}"
                    );
                    let mut dedup = set.clone();
                    dedup.sort();
                    dedup.dedup();
                    assert_eq!(dedup.len(), set.len());
                }
            }
        }
    }

    #[test]
    fn test_generic_tops_up_from_fallback() {
        let set = selector().select_for(Intent::Generic, &[], &[], &catalog());
        assert_eq!(
            set,
            vec![
                "get_balance",
                "get_gas_price",
                "get_transaction",
                "get_transaction_history",
                "get_token_info",
            ]
        );
    }

    #[test]
    fn test_intent_and_recency_precede_entities() {
        let set = selector().select_for(
            Intent::TokenAnalysis,
            &[EntityKind::Address],
            &["get_price"],
            &catalog(),
        );
        // core(4) + token tools(2) + contract(1) = 7 = max; recency and entity tools are cut
        assert_eq!(set.len(), 7);
        assert_eq!(&set[4..], ["get_token_info", "get_token_balance", "get_contract_abi"]);
    }

    #[test]
    fn test_small_catalog_returns_everything() {
        let small: Vec<_> = catalog().into_iter().take(3).collect();
        let set = selector().select_for(Intent::Generic, &[], &[], &small);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_tools_missing_from_catalog_are_never_offered() {
        let set = selector().select_for(Intent::Generic, &[], &["does_not_exist"], &catalog());
        assert!(!set.iter().any(|s| s == "does_not_exist"));
    }
}
