use async_trait::async_trait;

use crate::error::Result;

/// The interactive-prompt collaborator: engines never talk to a
/// terminal directly, they call through this trait, which the `openpackage_cli`
/// façade implements with a real prompt library and non-interactive runs
/// satisfy with [`NonInteractive`].
#[async_trait]
pub trait UserInteraction: Send + Sync {
    async fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;
    async fn select(&self, prompt: &str, options: &[String]) -> Result<Option<usize>>;
    async fn prompt(&self, prompt: &str) -> Result<Option<String>>;
}

/// A no-op collaborator for non-interactive runs: every `confirm` resolves to
/// its default, every `select`/`prompt` resolves to `None`/declines.
pub struct NonInteractive;

#[async_trait]
impl UserInteraction for NonInteractive {
    async fn confirm(&self, _prompt: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    async fn select(&self, _prompt: &str, _options: &[String]) -> Result<Option<usize>> {
        Ok(None)
    }

    async fn prompt(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
