//! Provider Adapter (C3)
//!
//! A uniform capability over model backends, grounded on the teacher's
//! `src/brain/provider/` trait + `custom_openai_compatible.rs` HTTP-adapter
//! pattern.

pub mod error;
pub mod local;
pub mod remote;
pub mod test_provider;
#[allow(clippy::module_inception)]
mod r#trait;
pub mod types;

pub use error::{ProviderError, Result};
pub use local::LocalHttpProvider;
pub use r#trait::Provider;
pub use remote::RemoteHttpProvider;
pub use test_provider::{Behavior, TestProvider};
pub use types::{GenerationParams, LLMResponse, ProviderMessage};
