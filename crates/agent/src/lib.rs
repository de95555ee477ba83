//! The agent core — the heart of tabletalk.
//!
//! Each user utterance drives an explicit state machine:
//!
//! 1. **AwaitingModel** — the assembled prompt (instructions + grounding +
//!    bounded history + utterance) goes to the model
//! 2. **ExecutingTool** — tool invocations run through the dispatcher and
//!    their results are appended as turns, then back to AwaitingModel
//! 3. **Done** — a final answer was produced (or the step bound forced one)
//! 4. **AwaitingUser** — the model asked a clarifying question; the next
//!    user message re-enters AwaitingModel with the augmented context
//!
//! The step bound is the liveness guarantee: no sequence of model decisions
//! can keep the loop running past it.

pub mod instructions;
pub mod loop_runner;
pub mod prompt;
pub mod render;
pub mod token;

pub use instructions::system_instructions;
pub use loop_runner::{ChatOutcome, LoopConfig, LoopState, ReasoningLoop};
pub use prompt::{AssembledPrompt, PromptAssembler};
pub use render::{render, RenderedMessage};
