//! The model gateway: the seam between the conversation core and a model server.
//!
//! A [`ModelGateway`] turns a conversation history into the assistant's reply, either
//! all at once or as a stream of text fragments.  The streaming path never fails: any
//! error is rendered as a single fragment of the form `"Error: <description>"` so that
//! it shows up in the conversation like any other reply.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};

use crate::Ollama;
use crate::error::{Error, Result};
use crate::types::{ChatRequest, ModelInfo, ProviderMessage};

/// An ordered, finite sequence of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Source of assistant replies.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Ask `model` for a complete reply to `history`.
    async fn chat_once(&self, model: &str, history: Vec<ProviderMessage>) -> Result<String>;

    /// Ask `model` for a reply to `history`, delivered incrementally.
    ///
    /// Failures are yielded as one final fragment built by [`error_fragment`]; the stream
    /// itself always terminates normally.
    async fn chat_stream(&self, model: &str, history: Vec<ProviderMessage>) -> FragmentStream;

    /// Models the server can answer with.
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Err(Error::unknown("this gateway cannot list models"))
    }
}

/// Render an error the way it appears inside the conversation.
pub fn error_fragment(err: &Error) -> String {
    format!("Error: {err}")
}

/// A stream consisting of just the rendered error.
///
/// ```
/// # use futures::StreamExt;
/// # tokio_test::block_on(async {
/// let err = klatsch::Error::busy("session is busy");
/// let fragments: Vec<String> = klatsch::gateway::error_stream(&err).collect().await;
/// assert_eq!(fragments, vec!["Error: Busy: session is busy".to_string()]);
/// # });
/// ```
pub fn error_stream(err: &Error) -> FragmentStream {
    Box::pin(stream::once(std::future::ready(error_fragment(err))))
}

#[async_trait]
impl ModelGateway for Ollama {
    async fn chat_once(&self, model: &str, history: Vec<ProviderMessage>) -> Result<String> {
        let response = self.send(ChatRequest::new(model, history)).await?;
        Ok(response.message.content)
    }

    async fn chat_stream(&self, model: &str, history: Vec<ProviderMessage>) -> FragmentStream {
        let chunks = match self.stream(ChatRequest::streaming(model, history)).await {
            Ok(chunks) => Box::pin(chunks),
            Err(err) => return error_stream(&err),
        };
        let fragments = stream::unfold(Some(chunks), |chunks| async move {
            let mut chunks = chunks?;
            loop {
                match chunks.next().await {
                    Some(Ok(chunk)) => {
                        if chunk.message.content.is_empty() {
                            continue;
                        }
                        return Some((chunk.message.content, Some(chunks)));
                    }
                    Some(Err(err)) => return Some((error_fragment(&err), None)),
                    None => return None,
                }
            }
        });
        Box::pin(fragments)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ollama::list_models(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_fragment_format() {
        let err = Error::connection("cannot reach model server at http://localhost:11434/", None);
        assert_eq!(
            error_fragment(&err),
            "Error: Connection error: cannot reach model server at http://localhost:11434/"
        );
    }

    #[tokio::test]
    async fn error_stream_yields_once() {
        let fragments: Vec<_> = error_stream(&Error::timeout("stalled", None))
            .collect()
            .await;
        assert_eq!(fragments, vec!["Error: Timeout error: stalled".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_server_becomes_fragment() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let client = Ollama::with_options(
            Some("http://127.0.0.1:9".to_string()),
            Some(std::time::Duration::from_secs(2)),
        )
        .unwrap();
        let fragments: Vec<_> = client
            .chat_stream("gemma3:1b", vec![ProviderMessage::user("Hi")])
            .await
            .collect()
            .await;
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].starts_with("Error: "));
    }
}
