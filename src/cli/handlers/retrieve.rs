//! Retrieval-only handler

use crate::cli::output::print_info;
use crate::cli::output::print_passages;
use crate::cli::output::print_warning;
use crate::rag::ChatService;
use crate::AppConfig;
use crate::Result;

pub async fn handle_retrieve(
    config: &AppConfig,
    query: String,
    report_type: String,
    threshold: Option<f32>,
    preview: usize,
) -> Result<()> {
    print_info(&format!("🔍 Retrieving passages for: \"{query}\""));

    let service = ChatService::new(config)?;
    let outcome = service.retrieve(&query, &report_type, threshold).await?;

    println!("   Reformulated: {}", outcome.reformulation.query);
    println!("   Language: {}", outcome.reformulation.language);
    println!();

    if outcome.passages.is_empty() {
        print_warning("No passage clears the similarity threshold");
        return Ok(());
    }
    print_passages(&outcome.passages, preview);
    Ok(())
}
