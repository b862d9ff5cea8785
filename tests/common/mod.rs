#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use knowledge_copilot::generate::{AnswerGenerator, GenerationError};
use knowledge_copilot_core::embedding::Embedder;
use knowledge_copilot_core::Result;

/// Letter-frequency vectors: texts sharing vocabulary land close together.
#[derive(Default)]
pub struct HistogramEmbedder {
    calls: AtomicUsize,
}

impl HistogramEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn histogram(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 27];
    for c in text.chars() {
        match c.to_ascii_lowercase() {
            l @ 'a'..='z' => v[(l as u8 - b'a') as usize] += 1.0,
            _ => v[26] += 0.1,
        }
    }
    v
}

#[async_trait]
impl Embedder for HistogramEmbedder {
    fn model_name(&self) -> &str {
        "histogram"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| histogram(t)).collect())
    }
}

/// Echoes the context back so tests can see what the model was given.
pub struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &str,
    ) -> std::result::Result<String, GenerationError> {
        Ok(format!("Q: {}\nCONTEXT: {}", question, context))
    }
}
