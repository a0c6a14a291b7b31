//! Prompt texts for legal question answering

use std::collections::HashMap;

use crate::llm::PromptTemplate;

/// System prompt that opens every conversation
pub const SYSTEM_PROMPT: &str = "Vous êtes LoiLibreQA, un assistant AI open source pour l'assistance juridique.
Vous recevez une question et des extraits d'article de loi.
Fournissez une réponse claire et structurée en vous basant sur le contexte fourni.
Lorsque cela est pertinent, utilisez des points et des listes pour structurer vos réponses.";

/// Instructions prepended to the retrieved documents
pub const SOURCES_PROMPT: &str = "Lorsque cela est pertinent, utilisez les documents suivants dans votre réponse.
Chaque fois que vous utilisez des informations provenant d'un document, référencez-le à la fin de la phrase (ex : [doc 2]).
Vous n'êtes pas obligé d'utiliser tous les documents, seulement s'ils ont du sens dans la conversation.
Si aucune information pertinente pour répondre à la question n'est présente dans les documents, indiquez simplement que vous n'avez pas suffisamment d'informations pour répondre.";

/// Answer used when no passage clears the threshold
pub const NO_PASSAGES_ANSWER: &str =
    "**Pas d'élément trouvé dans les textes de loi. Préciser votre réponse**";

/// Sources panel text used when no passage clears the threshold
pub const NO_PASSAGES_SOURCES: &str = "Pas d'élements juridique trouvé dans les codes de loi";

/// Stop sequences for the reformulation call
pub const REFORMULATION_STOP: [&str; 2] = ["\n---\n", crate::llm::END_OF_TURN];

const REFORMULATION_TEMPLATE: &str = "Reformulez le message utilisateur suivant en une question courte et autonome en français, dans le contexte d'une discussion autour de questions juridiques.
---
requête : La justice doit-elle être la même pour tous ?
question autonome : Pensez-vous que la justice devrait être appliquée de manière égale à tous, indépendamment de leur statut social ou de leur origine ?
langue: français
---
requête : Comment protéger ses droits d'auteur ?
question autonome : Quelles sont les mesures à prendre pour protéger ses droits d'auteur en tant qu'auteur ?
langue: français
---
requête : {{query}}
question autonome :";

/// Build the few-shot reformulation prompt for `query`
pub fn build_reformulation_prompt(query: &str) -> String {
    let values = HashMap::from([("query", query)]);
    PromptTemplate::new(REFORMULATION_TEMPLATE).render(&values)
}

/// Build the system message carrying the retrieved documents
pub fn build_sources_message(documents: &str, language: &str) -> String {
    format!("{SOURCES_PROMPT}\n\n{documents}\n\nAnswer in {language}:")
}
