//! Prompt assembly — instructions, grounding, bounded history, utterance.
//!
//! Three sections are non-evictable: the system instructions, the grounding
//! context, and the newest turn (the user's utterance on the first model
//! call, the freshest tool result on later ones). Only older history turns
//! are dropped when the budget is tight, oldest first, as a contiguous
//! window ending at the most recent turn. Assembly is deterministic:
//! identical inputs always produce identical output.

use std::collections::HashMap;

use tabletalk_core::error::{Error, Result};
use tabletalk_core::grounding::{GroundingEntry, TableId};
use tabletalk_core::model::PromptMessage;
use tabletalk_core::turn::Turn;

use crate::token;

/// The assembled prompt, ready for a model call.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// Instructions plus serialized grounding context
    pub system: String,

    /// History window plus the current turn, in order
    pub messages: Vec<PromptMessage>,

    /// History turns that fit the budget
    pub history_included: usize,

    /// History turns available before trimming
    pub history_total: usize,

    /// Estimated tokens across all included sections
    pub total_tokens: usize,
}

/// Stateless prompt assembler. Create one and reuse it.
pub struct PromptAssembler {
    instructions: String,
    budget_tokens: usize,
}

impl PromptAssembler {
    pub fn new(instructions: impl Into<String>, budget_tokens: usize) -> Self {
        Self {
            instructions: instructions.into(),
            budget_tokens,
        }
    }

    /// Assemble a prompt.
    ///
    /// `history` is every prior turn; `current` is the newest turn and is
    /// never evicted. Fails with `PromptBudgetExceeded` when instructions +
    /// grounding + current turn alone do not fit; the caller must then
    /// narrow the requested tables.
    pub fn build(
        &self,
        grounding: &HashMap<TableId, GroundingEntry>,
        history: &[Turn],
        current: &Turn,
    ) -> Result<AssembledPrompt> {
        let system = if grounding.is_empty() {
            self.instructions.clone()
        } else {
            format!("{}\n\n{}", self.instructions, render_grounding(grounding))
        };

        let system_tokens = token::estimate_tokens(&system);
        let current_tokens = token::estimate_turn_tokens(current);

        let reserved = system_tokens + current_tokens;
        if reserved > self.budget_tokens {
            return Err(Error::PromptBudgetExceeded {
                required: reserved,
                budget: self.budget_tokens,
            });
        }

        // History window: walk newest → oldest, stop at the first turn that
        // does not fit so the window stays contiguous.
        let mut remaining = self.budget_tokens - reserved;
        let mut window: Vec<PromptMessage> = Vec::new();
        let mut history_tokens = 0usize;
        for turn in history.iter().rev() {
            let cost = token::estimate_turn_tokens(turn);
            if cost > remaining {
                break;
            }
            remaining -= cost;
            history_tokens += cost;
            window.push(PromptMessage {
                role: turn.role,
                content: turn.content.clone(),
            });
        }
        let history_included = window.len();
        window.reverse();

        let mut messages = window;
        messages.push(PromptMessage {
            role: current.role,
            content: current.content.clone(),
        });

        Ok(AssembledPrompt {
            system,
            messages,
            history_included,
            history_total: history.len(),
            total_tokens: reserved + history_tokens,
        })
    }
}

/// Serialize grounding entries under stable headers, in table-name order.
fn render_grounding(grounding: &HashMap<TableId, GroundingEntry>) -> String {
    let mut tables: Vec<&TableId> = grounding.keys().collect();
    tables.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    let mut out = String::from("# Grounding context\n");
    for table in tables {
        let entry = &grounding[table];
        out.push_str(&format!("\n## Table: {}\n{}\n", table, entry.ddl));

        if let Some(profile) = &entry.profile {
            let json = serde_json::to_string_pretty(profile).unwrap_or_default();
            out.push_str(&format!("\nColumn statistics:\n{json}\n"));
        } else if let Some(samples) = &entry.sample_rows {
            let json = serde_json::to_string_pretty(samples).unwrap_or_default();
            out.push_str(&format!("\nSample rows:\n{json}\n"));
        } else {
            out.push_str("\n(no column statistics or sample rows available)\n");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn entry(table: &str, profile: Option<serde_json::Value>) -> (TableId, GroundingEntry) {
        let id = TableId::from(table);
        (
            id.clone(),
            GroundingEntry {
                table_id: id,
                ddl: format!("CREATE TABLE {table} (id INT64, status STRING)"),
                profile,
                sample_rows: None,
                fetched_at: Utc::now(),
                ttl: Duration::from_secs(3600),
            },
        )
    }

    fn assembler(budget: usize) -> PromptAssembler {
        PromptAssembler::new("You are a data analyst agent.", budget)
    }

    #[test]
    fn instructions_and_current_turn_always_present() {
        let asm = assembler(4096);
        let prompt = asm
            .build(&HashMap::new(), &[], &Turn::user("List products"))
            .unwrap();
        assert!(prompt.system.contains("data analyst"));
        assert_eq!(prompt.messages.len(), 1);
        assert_eq!(prompt.messages[0].content, "List products");
    }

    #[test]
    fn grounding_serialized_in_table_order() {
        let asm = assembler(8192);
        let grounding: HashMap<_, _> = [
            entry("products", None),
            entry("orders", Some(serde_json::json!([{"column_name": "status"}]))),
        ]
        .into_iter()
        .collect();

        let prompt = asm.build(&grounding, &[], &Turn::user("hi")).unwrap();
        let orders_pos = prompt.system.find("## Table: orders").unwrap();
        let products_pos = prompt.system.find("## Table: products").unwrap();
        assert!(orders_pos < products_pos);
        assert!(prompt.system.contains("Column statistics"));
        assert!(prompt.system.contains("CREATE TABLE orders"));
    }

    #[test]
    fn ddl_only_entry_notes_missing_stats() {
        let asm = assembler(8192);
        let grounding: HashMap<_, _> = [entry("orders", None)].into_iter().collect();
        let prompt = asm.build(&grounding, &[], &Turn::user("hi")).unwrap();
        assert!(prompt
            .system
            .contains("no column statistics or sample rows available"));
    }

    #[test]
    fn oldest_history_evicted_first() {
        // Budget sized so only the most recent turns fit.
        let instructions_tokens = token::estimate_tokens("You are a data analyst agent.");
        let asm = assembler(instructions_tokens + 40);

        let history: Vec<Turn> = (0..10)
            .map(|i| Turn::user(format!("question number {i} with some padding")))
            .collect();

        let prompt = asm
            .build(&HashMap::new(), &history, &Turn::user("now"))
            .unwrap();
        assert!(prompt.history_included < prompt.history_total);

        // The included window must end at the newest turn.
        let last_history = &prompt.messages[prompt.messages.len() - 2];
        assert!(last_history.content.contains("question number 9"));
        // And the oldest turns must be the ones missing.
        assert!(!prompt
            .messages
            .iter()
            .any(|m| m.content.contains("question number 0")));
    }

    #[test]
    fn current_turn_is_always_last() {
        let asm = assembler(4096);
        let history = vec![Turn::user("earlier"), Turn::agent("reply")];
        let prompt = asm
            .build(&HashMap::new(), &history, &Turn::user("current"))
            .unwrap();
        assert_eq!(prompt.messages.last().unwrap().content, "current");
    }

    #[test]
    fn fixed_sections_over_budget_fail() {
        let asm = assembler(10);
        let err = asm
            .build(
                &HashMap::new(),
                &[],
                &Turn::user("a question that cannot possibly fit"),
            )
            .unwrap_err();
        match err {
            Error::PromptBudgetExceeded { required, budget } => {
                assert!(required > budget);
                assert_eq!(budget, 10);
            }
            other => panic!("Expected PromptBudgetExceeded, got: {other:?}"),
        }
    }

    #[test]
    fn history_never_steals_from_fixed_sections() {
        // Enough for fixed sections plus exactly nothing else.
        let current = Turn::user("hi");
        let instructions_tokens = token::estimate_tokens("You are a data analyst agent.");
        let current_tokens = token::estimate_turn_tokens(&current);
        let asm = assembler(instructions_tokens + current_tokens);

        let history = vec![Turn::user("some history that will not fit")];
        let prompt = asm.build(&HashMap::new(), &history, &current).unwrap();
        assert_eq!(prompt.history_included, 0);
        assert_eq!(prompt.messages.len(), 1);
    }

    #[test]
    fn deterministic_assembly() {
        let asm = assembler(8192);
        let grounding: HashMap<_, _> = [
            entry("orders", Some(serde_json::json!([{"column_name": "id"}]))),
            entry("products", None),
        ]
        .into_iter()
        .collect();
        let history = vec![Turn::user("q1"), Turn::agent("a1")];

        let current = Turn::user("q2");
        let p1 = asm.build(&grounding, &history, &current).unwrap();
        let p2 = asm.build(&grounding, &history, &current).unwrap();
        assert_eq!(p1.system, p2.system);
        assert_eq!(p1.total_tokens, p2.total_tokens);
        assert_eq!(p1.messages.len(), p2.messages.len());
    }
}
