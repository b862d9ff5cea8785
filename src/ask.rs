use anyhow::Result;

use crate::copilot::{ChatRequest, Copilot};

pub async fn run_ask(
    copilot: &Copilot,
    question: &str,
    source_type: Option<String>,
    top_k: Option<usize>,
    sync_mirror: bool,
) -> Result<()> {
    let request = ChatRequest {
        message: question.to_string(),
        source_type,
        top_k,
        enable_mcp: sync_mirror,
    };
    let answer = copilot.answer(&request).await?;

    println!("{}", answer.answer.trim());
    if answer.sources.is_empty() {
        return Ok(());
    }
    println!();
    println!("Sources:");
    for (i, source) in answer.sources.iter().enumerate() {
        println!("  [{}] {} ({})", i + 1, source.name, source.source_type);
    }
    Ok(())
}
