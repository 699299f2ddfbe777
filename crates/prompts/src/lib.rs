//! `erpbridge-prompts`: static analysis prompt templates.

pub mod catalog;
mod templates;

pub use catalog::{PromptArgument, PromptCatalog, PromptDescriptor, RenderedPrompt};
