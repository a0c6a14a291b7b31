//! Ask command handler - streams a grounded answer to the terminal

use std::io::Write;
use std::io::{
    self,
};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use crate::cli::output::print_error;
use crate::cli::output::print_info;
use crate::cli::output::print_sources;
use crate::models::create_user_id;
use crate::rag::ChatRequest;
use crate::rag::ChatService;
use crate::AppConfig;
use crate::LoiLibreError;
use crate::Result;

/// Simple spinner for showing progress
struct Spinner {
    message: String,
    running: Arc<AtomicBool>,
}

impl Spinner {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn start(&self) {
        let message = self.message.clone();
        let running = self.running.clone();
        running.store(true, Ordering::Relaxed);

        std::thread::spawn(move || {
            let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            let mut idx = 0;

            while running.load(Ordering::Relaxed) {
                print!("\r   {} {}...", frames[idx], message);
                io::stdout().flush().ok();
                idx = (idx + 1) % frames.len();
                std::thread::sleep(Duration::from_millis(80));
            }

            // Clear the line
            print!("\r{}\r", " ".repeat(80));
            io::stdout().flush().ok();
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(100)); // Give time to clear
    }
}

pub async fn handle_ask(
    config: &AppConfig,
    query: String,
    report_type: String,
    threshold: Option<f32>,
    user_id: Option<String>,
) -> Result<()> {
    let service = ChatService::new(config)?;
    let user_id = user_id.unwrap_or_else(|| create_user_id(10));

    print_info(&format!("❓ {query}"));

    let spinner = Spinner::new("Searching the law codes");
    spinner.start();
    let mut request = ChatRequest::new(user_id, query);
    request.report_type = report_type;
    request.threshold = threshold;
    let result = service.chat_with_sources(request).await;
    spinner.stop();

    let (passages, mut snapshots) = result?;

    println!();
    let mut printed = 0;
    while let Some(item) = snapshots.next().await {
        match item {
            Ok(snapshot) => {
                let answer = snapshot.answer();
                print!("{}", answer.get(printed..).unwrap_or_default());
                io::stdout().flush().ok();
                printed = answer.len();
            }
            Err(LoiLibreError::GenerationStreamInterrupted { reason, .. }) => {
                println!();
                print_error(&format!("Generation interrupted: {reason}"));
                break;
            }
            Err(e) => return Err(e),
        }
    }
    println!();

    print_sources(&passages);
    Ok(())
}
