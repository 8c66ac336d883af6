//! Language-model client trait.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Receives reply text as it arrives. Returning `false` abandons the turn.
pub type ChunkCallback<'a> = Box<dyn FnMut(&str) -> bool + Send + 'a>;

/// Sends one compiled prompt pair to a language model.
///
/// Implementations own any retry policy. Failures are reported as
/// [`Error::Upstream`] and callers pass them on unchanged.
#[async_trait]
pub trait TutorClient: Send + Sync {
    /// Short identifier for logs
    fn name(&self) -> &'static str;

    /// Request a complete reply.
    async fn complete(&self, system_prompt: &str, user_turn: &str) -> Result<String>;

    /// Request a reply, handing text to `on_chunk` as it arrives.
    ///
    /// Returns the full reply. If `on_chunk` returns `false` the request is
    /// dropped and [`Error::TurnAbandoned`] is returned.
    ///
    /// The default implementation delivers the whole reply as one chunk.
    async fn complete_streaming<'a>(
        &'a self,
        system_prompt: &'a str,
        user_turn: &'a str,
        mut on_chunk: ChunkCallback<'a>,
    ) -> Result<String> {
        let text = self.complete(system_prompt, user_turn).await?;
        if !on_chunk(&text) {
            return Err(Error::TurnAbandoned);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl TutorClient for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn complete(&self, _system_prompt: &str, user_turn: &str) -> Result<String> {
            Ok(user_turn.to_uppercase())
        }
    }

    #[test]
    fn test_default_streaming_delivers_one_chunk() {
        let mut chunks = Vec::new();
        let reply = tokio_test::block_on(Echo.complete_streaming(
            "s",
            "hello",
            Box::new(|c: &str| {
                chunks.push(c.to_string());
                true
            }),
        ))
        .unwrap();
        assert_eq!(reply, "HELLO");
        assert_eq!(chunks, vec!["HELLO"]);
    }

    #[test]
    fn test_default_streaming_abandon() {
        let result = tokio_test::block_on(Echo.complete_streaming("s", "hi", Box::new(|_| false)));
        assert!(matches!(result, Err(Error::TurnAbandoned)));
    }
}
