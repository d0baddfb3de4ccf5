//! Echo language model, useful for wiring tests and local runs.

use super::{Llm, LlmResponse, LlmStream, Resource, ResourceCategory};
use async_trait::async_trait;
use serde_json::{json, Value};

/// LLM resource that returns its prompt unchanged.
#[derive(Debug, Clone)]
pub struct EchoLlm {
    name: String,
    prefix: String,
}

impl EchoLlm {
    /// Creates an echo model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
        }
    }

    /// Prepends a fixed prefix to every completion.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

#[async_trait]
impl Llm for EchoLlm {
    async fn generate(
        &self,
        prompt: &str,
        functions: Option<&[Value]>,
    ) -> anyhow::Result<LlmResponse> {
        Ok(LlmResponse::new(format!("{}{prompt}", self.prefix))
            .with_metadata("model", json!("echo"))
            .with_metadata("functions", json!(functions.map_or(0, <[Value]>::len))))
    }

    /// Streams the completion one word at a time, keeping the separating spaces.
    async fn stream(&self, prompt: &str) -> anyhow::Result<LlmStream> {
        let text = format!("{}{prompt}", self.prefix);
        let chunks: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();
        let (tx, stream) = LlmStream::channel(chunks.len());
        for chunk in chunks {
            tx.try_send(Ok(chunk))?;
        }
        Ok(stream)
    }
}

#[async_trait]
impl Resource for EchoLlm {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ResourceCategory {
        ResourceCategory::Api
    }

    fn as_llm(&self) -> Option<&dyn Llm> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_echoes_prompt() {
        let llm = EchoLlm::new("llm").with_prefix("> ");
        let response = llm.generate("hello", None).await.unwrap();
        assert_eq!(response.content, "> hello");
        assert_eq!(response.metadata["model"], "echo");
    }

    #[tokio::test]
    async fn test_stream_yields_words_then_ends() {
        let llm = EchoLlm::new("llm");
        let mut stream = llm.stream("one two three").await.unwrap();

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
            chunks.push(chunk.unwrap());
        }
        assert_eq!(chunks, vec!["one ", "two ", "three"]);
    }

    #[tokio::test]
    async fn test_each_stream_call_restarts() {
        let llm = EchoLlm::new("llm");
        let first = llm.stream("again").await.unwrap().collect_text().await.unwrap();
        let second = llm.stream("again").await.unwrap().collect_text().await.unwrap();
        assert_eq!(first, second);
    }
}
