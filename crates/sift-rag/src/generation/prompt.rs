//! Prompt templates for grounded answer generation

use crate::context::ContextBlock;

/// Prompt builder for grounded queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render the context block as numbered passages with provenance
    pub fn build_context(block: &ContextBlock) -> String {
        let mut context = String::new();

        for (i, entry) in block.entries.iter().enumerate() {
            context.push_str(&format!(
                "[{}] {}, chunk {}\n\nContent:\n{}\n\n---\n\n",
                i + 1,
                entry.source_path,
                entry.chunk_index,
                entry.text
            ));
        }

        context
    }

    /// Build the full grounded prompt
    pub fn build_rag_prompt(question: &str, block: &ContextBlock) -> String {
        format!(
            r#"You are a document-grounded assistant that ONLY uses information from provided passages.

RULES:
1. ONLY use information that is explicitly stated in the CONTEXT below
2. If the answer is not in the context, respond with "This information is not available in the provided documents."
3. NEVER use external knowledge or make inferences beyond what is stated
4. Cite passages inline by their number: [1], [2]

CONTEXT:
{context}

AVAILABLE SOURCES:
{sources}

QUESTION: {question}

Provide a grounded answer using ONLY the passages above:"#,
            context = Self::build_context(block),
            sources = Self::format_sources_list(block),
            question = question
        )
    }

    /// Format the numbered sources list for the prompt
    fn format_sources_list(block: &ContextBlock) -> String {
        block
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| format!("[{}] {}, chunk {}", i + 1, entry.source_path, entry.chunk_index))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
