//! Text surrogates for uploads, and the prompt text built around them.

use chrono::{DateTime, Utc};

use super::schema::{ContentType, QueryMatch};

/// Prompt sent with image bytes to a vision model.
pub const IMAGE_PROMPT: &str = "Describe this image in detail. What do you see? \
    What are the key elements and insights? Provide a comprehensive analysis.";

/// System instruction for answer generation.
pub const ANSWER_INSTRUCTIONS: &str = "You answer questions about files the user uploaded. \
    Use the provided file contents and descriptions. Be concise, accurate and direct. \
    If a file could not be analyzed, say so, but still give the best answer the remaining \
    information supports.";

/// Reply used when a question arrives before anything was uploaded.
pub const NO_FILES_ANSWER: &str = "No files have been uploaded yet. Please upload some files first.";

/// Description for media without dedicated analysis (video, PDFs whose text
/// could not be extracted).
pub fn synthetic_description(
    kind: ContentType,
    filename: &str,
    size: usize,
    uploaded_at: DateTime<Utc>,
) -> String {
    format!(
        "[Uploaded {} file: {filename}, size: {size} bytes, uploaded {}]",
        kind.label().to_lowercase(),
        uploaded_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// Prompt asking a text model to describe extracted content.
pub fn analysis_prompt(kind: ContentType, content: &str) -> String {
    format!(
        "Analyze this {} content and provide a detailed description and key insights:\n\n{content}",
        kind.as_str()
    )
}

/// Context block listing the ranked documents handed to the answer generator.
pub fn answer_context(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .map(|m| {
            format!(
                "File: {} ({})\nRelevance: {:.3}\nDescription: {}",
                m.metadata.filename,
                m.metadata.kind.label(),
                m.similarity(),
                m.document
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User message pairing the question with its context.
pub fn answer_prompt(query: &str, context: &str) -> String {
    format!(
        "Here are the files that have been uploaded:\n\n{context}\n\nQuestion: {query}\n\n\
         Answer the question from the files above. If the information is incomplete, \
         explain what you can determine and what is missing."
    )
}
