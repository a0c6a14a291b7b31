//! Retrieval-augmented answering over law texts
//!
//! A chat turn goes through five stages:
//! - Query reformulation into a standalone question plus its language
//! - Vector retrieval of candidate passages
//! - Threshold filtering and summary/full-text quota selection
//! - Prompt assembly with numbered documents and citation cards
//! - Streaming generation, one UI snapshot per received chunk
//!
//! # Examples
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use loilibre::config::AppConfig;
//! use loilibre::rag::ChatRequest;
//! use loilibre::rag::ChatService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = ChatService::new(&config)?;
//!
//!     let mut snapshots = service
//!         .chat(ChatRequest::new("demo", "Quel est le délai de rétractation ?"))
//!         .await?;
//!     while let Some(snapshot) = snapshots.next().await {
//!         println!("{}", snapshot?.answer());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod pipeline;
pub mod prompts;
pub mod ranker;
pub mod reformulator;
pub mod retriever;

pub use context::AssembledPrompt;
pub use context::PromptAssembler;
pub use context::SourcesBlock;
pub use pipeline::ChatRequest;
pub use pipeline::ChatService;
pub use pipeline::ChatSnapshot;
pub use pipeline::ChatStream;
pub use pipeline::RetrievalOutcome;
pub use ranker::PassageRanker;
pub use ranker::SourceFilter;
pub use reformulator::parse_reformulation;
pub use reformulator::QueryReformulator;
pub use reformulator::Reformulation;
pub use retriever::EmbeddingIndexRetriever;
pub use retriever::HttpRetriever;
pub use retriever::VectorRetriever;
