//! Grounding prompts for answer generation

pub mod prompt;

pub use prompt::{PromptBuilder, NO_CONTEXT_ANSWER};
