//! Prompt assembly from the conversation and the selected passages

use crate::llm::to_completion;
use crate::models::Message;
use crate::models::Passage;
use crate::rag::prompts::build_sources_message;
use crate::rag::reformulator::Reformulation;

/// Documents block shown to the model and to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesBlock {
    /// Plain-text documents embedded in the prompt
    pub text: String,
    /// HTML citation cards for the sources panel
    pub html: String,
}

/// Message sequence ready for the generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    /// History + user query (+ sources system message when grounded)
    pub messages: Vec<Message>,
    /// `None` when no passage was selected; generation must then be skipped
    pub sources: Option<SourcesBlock>,
}

impl AssembledPrompt {
    pub fn is_grounded(&self) -> bool {
        self.sources.is_some()
    }

    /// ChatML prompt for the completion endpoint
    pub fn completion_prompt(&self) -> String {
        to_completion(&self.messages)
    }
}

/// Builds grounded prompts and citation cards
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler;

impl PromptAssembler {
    pub const fn new() -> Self {
        Self
    }

    /// Append the user query and, when there are passages, the sources
    /// system message built from them in selection order
    pub fn assemble(
        &self,
        history: &[Message],
        query: &str,
        reformulation: &Reformulation,
        passages: &[Passage],
    ) -> AssembledPrompt {
        let mut messages = history.to_vec();
        messages.push(Message::user(query));

        if passages.is_empty() {
            return AssembledPrompt {
                messages,
                sources: None,
            };
        }

        let header = format!("Query used for retrieval:\n{}", reformulation.query);

        let mut text_parts = vec![header.clone()];
        let mut html_parts = vec![header];
        for (idx, passage) in passages.iter().enumerate() {
            text_parts.push(Self::format_passage_text(idx + 1, passage));
            html_parts.push(Self::format_passage_html(idx + 1, passage));
        }

        let text = text_parts.join("\n\n");
        let html = html_parts.join("\n\n");

        messages.push(Message::system(build_sources_message(
            &text,
            &reformulation.language,
        )));

        AssembledPrompt {
            messages,
            sources: Some(SourcesBlock { text, html }),
        }
    }

    /// Plain-text form of the `index`-th passage (1-based)
    pub fn format_passage_text(index: usize, passage: &Passage) -> String {
        format!(
            "📃 Doc {index}: {} page {}\n{}",
            passage.meta.short_name,
            passage.meta.page_label(),
            passage.content
        )
    }

    /// Citation card of the `index`-th passage (1-based)
    pub fn format_passage_html(index: usize, passage: &Passage) -> String {
        let meta = &passage.meta;
        let page = meta.page_label();
        format!(
            r#"
<div class="card">
    <div class="card-content">
        <h2>Doc {index} - {short_name} - Page {page}</h2>
        <p>{content}</p>
    </div>
    <div class="card-footer">
        <span>{name}</span>
        <a href="{url}#page={page}" target="_blank" class="pdf-link">
            <span role="img" aria-label="Open PDF">🔗</span>
        </a>
    </div>
</div>
"#,
            short_name = escape_html(&meta.short_name),
            content = escape_html(&passage.content),
            name = escape_html(&meta.name),
            url = escape_html(&meta.url),
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
