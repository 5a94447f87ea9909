//! ScholarHub AI: LLM providers that write researcher profile text.
//!
//! Every provider implements [`scholarhub_science::ProfileTextGenerator`], so
//! the researcher enricher stays unaware of which backend is configured.

pub mod error;
pub mod prompt;
pub mod provider;

pub use error::{AiError, Result};
pub use prompt::researcher_profile_prompt;
pub use provider::{
    AnthropicProvider, ChatCompletionsProvider, Generation, provider_from_config, provider_with_env,
};
