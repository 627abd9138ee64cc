use std::fmt::Write;

use crate::db::ChatTurn;

use super::types::RecommendationFilters;

/// Assemble the full instruction text for one request.
///
/// Pure function of its inputs: `history` is rendered oldest-first as
/// `SENDER: text` lines, absent filters become the literal `any` so the
/// filter line always reads the same way, and the instruction block
/// pins the exact output contract the extractor expects.
pub fn build_prompt(
    history: &[ChatTurn],
    message: &str,
    filters: &RecommendationFilters,
) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are a movie recommendation engine.\n");
    prompt.push_str("Respond ONLY with a JSON ARRAY of movie objects. NO TEXT. NO MARKDOWN.\n\n");
    prompt.push_str("Required fields:\ntitle, year, genre, moodTag, posterUrl, previewUrl, rating\n\n");

    prompt.push_str("User history:\nUser recent taste:\n");
    for turn in history {
        let _ = writeln!(prompt, "{}: {}", turn.sender, turn.content);
    }

    let _ = write!(prompt, "\nUser request:\n{}\n\n", message);

    let _ = writeln!(
        prompt,
        "Filters:\nGenre={}, Year={} to {}, Mood={}",
        filters.genre.as_deref().unwrap_or("any"),
        opt_year(filters.year_from),
        opt_year(filters.year_to),
        filters.mood.as_deref().unwrap_or("any"),
    );

    prompt.push_str("\nGenerate 5-8 real movies.\n");

    prompt
}

fn opt_year(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "any".to_string())
}
