//! # chorus_llm - Model Gateway for Chorus
//!
//! A single `generate(system, user) -> text` capability with one backend per
//! provider:
//!
//! - **lmstudio**: local OpenAI-compatible model server (default)
//! - **ollama**: locally hosted open model runtime
//! - **openai**: hosted chat completions
//! - **anthropic**: hosted messages API
//!
//! The provider is chosen once from [`LlmConfig`] and resolved into an
//! `Arc<dyn ModelGateway>` with [`resolve_gateway`]. Failures of any kind
//! surface as [`LlmError`]; there are no retries.
//!
//! # Example
//!
//! ```rust,no_run
//! use chorus_llm::{resolve_gateway, LlmConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = resolve_gateway(&LlmConfig::from_env())?;
//!     let text = gateway
//!         .generate("You are a terse pirate.", "Say hello.")
//!         .await?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```

pub mod anthropic;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicBackend;
pub use config::{LlmConfig, LlmProvider, ProviderEndpoint, DEFAULT_TIMEOUT_SECS};
pub use error::{LlmError, LlmResult};
pub use gateway::{resolve_gateway, ModelGateway};
pub use mock::{CapturedPrompt, MockGateway};
pub use ollama::OllamaBackend;
pub use openai::ChatCompletionsBackend;
