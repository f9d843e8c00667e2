//! AI backend clients.
//!
//! Every supported provider speaks the OpenAI-compatible chat API, so a
//! single client serves both; provider metadata lives in
//! [`crate::core::provider`].

pub mod chat;

pub use chat::{ImageInput, Prompt, complete};
pub use crate::core::provider::{AiProvider, Capability, ProviderDescriptor, ProviderTable};
