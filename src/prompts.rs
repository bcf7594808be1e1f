use crate::analysis::MediaType;

pub fn analysis_prompt(media_type: MediaType) -> String {
    format!(
        "Analyze this {media_type} and generate content suitable for Instagram:\n\
         1. Write a short, catchy description in 2-4 lines.\n\
         2. Suggest 2-3 relevant hashtags that are trendy and related to the content.\n\
         Ensure the description is engaging and fits Instagram style."
    )
}

pub fn recommend_prompt(word: &str, hashtags: &[String]) -> String {
    format!(
        "You are given a list of hashtags: {}\n\
         Find hashtags that are either:\n\
         1. Exact match for '{}'\n\
         2. Or semantically similar (same or close meaning).\n\
         Return only hashtags as a list (no explanation).",
        quoted_list(hashtags),
        word
    )
}

/// Renders `['a', 'b']`, the list shape the model has been answering to.
pub fn quoted_list(items: &[String]) -> String {
    let inner = items
        .iter()
        .map(|item| format!("'{}'", item))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", inner)
}
