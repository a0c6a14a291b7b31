//! CLI output formatting utilities
//!
//! This module provides consistent output formatting for the `loilibre` CLI

use crate::models::Passage;
use crate::AppConfig;

/// Safely truncate a string at character boundary (not byte boundary)
///
/// This prevents panics when truncating strings with multi-byte UTF-8 characters (accents, emojis, etc.)
///
/// # Arguments
/// * `s` - The string to truncate
/// * `max_chars` - Maximum number of characters (not bytes)
///
/// # Returns
/// Truncated string with "..." suffix if truncated, otherwise the original string
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Print selected passages in selection order
pub fn print_passages(passages: &[Passage], preview_chars: usize) {
    println!("📚 {} passages selected:", passages.len());
    for (idx, passage) in passages.iter().enumerate() {
        let meta = &passage.meta;
        println!(
            "  {}. [{:.3}] {} page {} ({}, {})",
            idx + 1,
            passage.score,
            meta.short_name,
            meta.page_label(),
            meta.source,
            meta.report_type
        );
        let preview = truncate_str(&passage.content.replace('\n', " "), preview_chars);
        println!("     {preview}");
    }
}

/// Print the citation list under a streamed answer
pub fn print_sources(passages: &[Passage]) {
    if passages.is_empty() {
        return;
    }
    println!();
    println!("📖 Sources:");
    for (idx, passage) in passages.iter().enumerate() {
        let meta = &passage.meta;
        let page = meta.page_label();
        if meta.url.is_empty() {
            println!("  [doc {}] {} page {page}", idx + 1, meta.short_name);
        } else {
            println!(
                "  [doc {}] {} page {page} - {}#page={page}",
                idx + 1,
                meta.short_name,
                meta.url
            );
        }
    }
}

pub fn print_config(config: &AppConfig) {
    println!("📋 LoiLibre Configuration:");
    println!();

    println!("📝 Logging:");
    println!("  Level: {}", config.logging.level);
    println!("  Backtrace: {}", config.logging.backtrace);
    println!("  Directory: {}", config.logging.directory);
    println!();

    println!("🤖 LLM:");
    println!("  Endpoint: {}", config.llm_endpoint());
    println!("  Model: {}", config.llm_model());
    println!("  Key: {}", mask_secret(config.llm.api_key.as_deref()));
    if let Some(version) = &config.llm.api_version {
        println!("  API version: {version}");
    }
    println!("  Answer max tokens: {}", config.llm.answer_max_tokens);
    println!("  Temperature: {}", config.llm.temperature);
    println!();

    println!("🧠 Embeddings:");
    println!("  Provider: {}", config.embeddings.provider);
    println!("  Endpoint: {}", config.embeddings.endpoint);
    println!("  Model: {}", config.embeddings.model);
    println!("  Key: {}", mask_secret(config.embeddings.api_key.as_deref()));
    println!();

    let retrieval = &config.retrieval;
    println!("🔍 Retrieval:");
    println!("  Backend: {:?}", retrieval.backend);
    match &retrieval.endpoint {
        Some(endpoint) => println!("  Endpoint: {endpoint}"),
        None => println!("  Index: {}", retrieval.index_path),
    }
    println!("  Similarity: {:?}", retrieval.similarity);
    println!("  Threshold: {}", config.threshold());
    println!("  Candidates (max_k): {}", retrieval.max_k);
    println!(
        "  Quotas: {} summaries / {} total",
        retrieval.k_summary, retrieval.k_total
    );
    println!("  Summary types: {:?}", retrieval.summary_report_types);
    let mut sources: Vec<_> = retrieval.sources.iter().collect();
    sources.sort();
    for (selector, tag) in sources {
        println!("  Source \"{selector}\" -> {tag}");
    }
    println!();

    println!("🌐 Server:");
    println!("  Address: {}", config.server_addr());
    println!(
        "  Max concurrent requests: {}",
        config.server.max_concurrent_requests
    );
    println!("  CORS: {}", config.server.enable_cors);
    println!();

    println!("🗂️  Conversation log:");
    println!("  Enabled: {}", config.conversation_log.enabled);
    println!("  Directory: {}", config.conversation_log.directory);
}

/// Show only whether a secret is set
fn mask_secret(secret: Option<&str>) -> &'static str {
    match secret {
        Some(s) if !s.is_empty() => "***set***",
        _ => "(none)",
    }
}

/// Print colored output functions
pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("❌ {msg}");
}
