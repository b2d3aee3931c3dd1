pub mod connection;
pub mod endpoints;

use async_trait::async_trait;
use std::time::Duration;

pub use connection::ApiConnectionError;
pub use endpoints::Provider;

/// A text-generation backend: prompt in, free text out, no schema promised.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, ApiConnectionError>;
}

#[async_trait]
impl TextGenerator for Provider {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, ApiConnectionError> {
        self.call_generate(prompt, timeout).await
    }
}
