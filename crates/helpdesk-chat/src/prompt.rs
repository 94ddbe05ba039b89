//! Fixed prompt text and the user-turn template.

use helpdesk_vector::index::SimilarityResult;

pub const SYSTEM_PROMPT: &str = "You are an FAQ assistant. Follow these rules strictly:
        1. Only answer based on the provided context and chat history
        2. If the question cannot be fully answered using the context, say you don't have enough information
        3. Keep answers brief and to the point
        4. Never make up information or use external knowledge
        5. Consider the conversation history when providing answers
        6. If the question is completely unrelated to the context, state that you can only answer questions related to the FAQ content
        7. Act as you are an AI assistant and gives the knowledge you have you dont need to mention that you dont have something in your
        knowledge base or so,if you are not able to continue giving the answer you can suggest them to talk to their sales representative for human assistance.";

/// Returned without calling the model when retrieval yields no context.
pub const REFUSAL: &str = "I apologize, but I can only answer questions related to the FAQ content.";

/// Join retrieved chunk texts into the prompt context, best match first.
pub fn build_context(results: &[SimilarityResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_user_prompt(context: &str, chat_history: &str, query: &str) -> String {
    format!("Context:\n{context}\n\nChat History:\n{chat_history}\n\nCurrent Query: {query}")
}

/// Reply text for a failed turn.
pub fn apology(detail: &impl std::fmt::Display) -> String {
    format!("An error occurred: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::types::DocumentChunk;

    #[test]
    fn test_system_prompt_rules() {
        assert!(SYSTEM_PROMPT.starts_with("You are an FAQ assistant."));
        for n in 1..=7 {
            assert!(SYSTEM_PROMPT.contains(&format!("        {}. ", n)));
        }
    }

    #[test]
    fn test_build_context_joins_with_blank_line() {
        let results = vec![
            SimilarityResult {
                chunk: DocumentChunk {
                    id: 3,
                    text: "## Pricing\nFree.".to_string(),
                },
                score: 0.9,
            },
            SimilarityResult {
                chunk: DocumentChunk {
                    id: 1,
                    text: "## Support\nEmail.".to_string(),
                },
                score: 0.5,
            },
        ];
        assert_eq!(
            build_context(&results),
            "## Pricing\nFree.\n\n## Support\nEmail."
        );
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_user_prompt_template() {
        let prompt = build_user_prompt("ctx", "User: hi", "what now?");
        assert_eq!(
            prompt,
            "Context:\nctx\n\nChat History:\nUser: hi\n\nCurrent Query: what now?"
        );
    }

    #[test]
    fn test_apology() {
        assert_eq!(apology(&"boom"), "An error occurred: boom");
    }
}
