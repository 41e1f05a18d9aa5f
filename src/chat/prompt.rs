//! Grounding prompt assembly for retrieval-augmented answers.

/// Fixed answer returned when retrieval finds nothing for the requested file.
pub const NO_NOTES_ANSWER: &str = "No related study notes found. Try uploading notes first.";

/// Build the instruction that restricts the model to the retrieved context.
///
/// Chunks are joined with a blank line and wrapped in the study-mentor
/// template; the literal question follows the context block.
pub fn build_grounding_prompt(question: &str, chunks: &[String]) -> String {
    let context = chunks.join("\n\n");
    format!(
        "You are an AI Study Mentor.\n\
         Use ONLY the context provided below to answer.\n\
         \n\
         ------------------------\n\
         CONTEXT:\n\
         {context}\n\
         ------------------------\n\
         \n\
         QUESTION:\n\
         {question}\n\
         \n\
         Explain clearly with examples.\n"
    )
}
