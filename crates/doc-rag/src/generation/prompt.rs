//! Prompt templates for grounded answers

use crate::retrieval::SearchHit;
use crate::types::ChunkSource;

/// Answer returned when nothing was retrieved and the model stays silent
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find relevant information in the uploaded documents to answer this question.";

/// Prompt builder for document questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Number the hits in the order given
    pub fn build_context(hits: &[SearchHit]) -> String {
        let mut context = String::new();

        for (i, hit) in hits.iter().enumerate() {
            context.push_str(&format!(
                "[{}] {}\n\nContent:\n{}\n\n---\n\n",
                i + 1,
                Self::format_source_ref(&hit.chunk.source),
                hit.chunk.content
            ));
        }

        context
    }

    fn format_source_ref(source: &ChunkSource) -> String {
        if source.file_type.is_paginated() {
            format!(
                "{}, Page {} of {}",
                source.filename, source.page_number, source.total_pages
            )
        } else {
            source.filename.clone()
        }
    }

    /// Build the full prompt for `question`
    ///
    /// With no hits the prompt still asks the question, but tells the model
    /// that nothing relevant was found.
    pub fn build_grounding_prompt(question: &str, hits: &[SearchHit]) -> String {
        if hits.is_empty() {
            return Self::build_no_context_prompt(question);
        }

        format!(
            r#"You are an assistant that answers questions about the user's uploaded documents.

RULES:
1. Use ONLY the information in the CONTEXT below
2. If the answer is not in the context, say so instead of making up information
3. Mention the source number, e.g. [1], for each fact you use

CONTEXT FROM DOCUMENTS:
{context}
QUESTION: {question}

Answer using only the document content above:"#,
            context = Self::build_context(hits),
            question = question.trim()
        )
    }

    fn build_no_context_prompt(question: &str) -> String {
        format!(
            r#"You are an assistant that answers questions about the user's uploaded documents.

No passages relevant to the question were found in the uploaded documents.
Tell the user that the documents do not contain this information instead of making up an answer.

QUESTION: {question}

Answer:"#,
            question = question.trim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, FileType};

    fn hit(content: &str, filename: &str, file_type: FileType, page: u32) -> SearchHit {
        SearchHit {
            chunk: Chunk::new(
                content.to_string(),
                ChunkSource {
                    filename: filename.into(),
                    file_type,
                    page_number: page,
                    total_pages: 3,
                },
                0,
                0,
                content.len(),
            ),
            similarity: 0.9,
        }
    }

    #[test]
    fn test_context_keeps_hit_order() {
        let hits = vec![
            hit("Revenue grew 12%.", "report.pdf", FileType::Pdf, 2),
            hit("Headcount is stable.", "notes.txt", FileType::Txt, 1),
        ];
        let context = PromptBuilder::build_context(&hits);

        let first = context.find("[1] report.pdf, Page 2 of 3").unwrap();
        let second = context.find("[2] notes.txt\n").unwrap();
        assert!(first < second);
        assert!(context.contains("Content:\nRevenue grew 12%."));
    }

    #[test]
    fn test_grounding_prompt_places_question_after_context() {
        let hits = vec![hit("The launch is in May.", "plan.docx", FileType::Docx, 1)];
        let prompt = PromptBuilder::build_grounding_prompt("  When is the launch? ", &hits);

        assert!(prompt.contains("say so instead of making up information"));
        assert!(prompt.find("The launch is in May.").unwrap() < prompt.find("QUESTION: When is the launch?").unwrap());
    }

    #[test]
    fn test_prompt_without_hits() {
        let prompt = PromptBuilder::build_grounding_prompt("What is the budget?", &[]);
        assert!(prompt.contains("No passages relevant"));
        assert!(prompt.contains("QUESTION: What is the budget?"));
        assert!(!prompt.contains("CONTEXT FROM DOCUMENTS"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let hits = vec![
            hit("a", "a.md", FileType::Markdown, 1),
            hit("b", "b.md", FileType::Markdown, 1),
        ];
        assert_eq!(
            PromptBuilder::build_grounding_prompt("q", &hits),
            PromptBuilder::build_grounding_prompt("q", &hits)
        );
    }
}
