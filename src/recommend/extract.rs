use chrono::Utc;
use serde_json::Value;

use crate::db::MovieRecommendation;

/// Outcome of one extraction pass. Never an error: a reply the model
/// garbled yields an empty list plus a diagnostic, so callers and tests
/// can tell "model said nothing useful" from a healthy empty result.
#[derive(Debug)]
pub struct Extraction {
    pub movies: Vec<MovieRecommendation>,
    pub diagnostic: Option<String>,
}

impl Extraction {
    fn empty(diagnostic: impl Into<String>) -> Self {
        Self {
            movies: Vec::new(),
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Recover movie records from whatever text the model produced.
///
/// Markdown fences and surrounding commentary are stripped, the first
/// top-level JSON array is located with a depth-counting scanner, and
/// each element is mapped with per-field defaults so a record is always
/// constructible. `user_id` and the creation timestamp are supplied
/// here, never taken from the model output.
pub fn extract_movies(raw: &str, user_id: &str) -> Extraction {
    let text = strip_code_fence(raw.trim());

    let value = match find_top_level_array(text) {
        Some(span) => match serde_json::from_str::<Value>(span) {
            Ok(v) => v,
            Err(e) => return Extraction::empty(format!("JSON parse error: {}", e)),
        },
        // No array span. The model sometimes wraps the list in an
        // object, {"movies": [...]}; give the whole text one chance.
        None => match serde_json::from_str::<Value>(text) {
            Ok(v) => v,
            Err(_) => return Extraction::empty("no JSON array found in response"),
        },
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("movies") {
            Some(Value::Array(items)) => items,
            _ => return Extraction::empty("JSON value has no movie array"),
        },
        _ => return Extraction::empty("JSON value has no movie array"),
    };

    let movies = items.iter().map(|v| movie_from_value(v, user_id)).collect();

    Extraction {
        movies,
        diagnostic: None,
    }
}

/// If the text starts with a markdown code fence, drop the fence line
/// and everything from the last fence marker onward, keeping only the
/// interior.
fn strip_code_fence(text: &str) -> &str {
    if !text.starts_with("```") {
        return text;
    }

    let after_fence = match text.find('\n') {
        Some(pos) => &text[pos + 1..],
        None => return text,
    };

    match after_fence.rfind("```") {
        Some(pos) => &after_fence[..pos],
        None => after_fence,
    }
}

/// Locate the first balanced top-level `[...]` span, counting nesting
/// depth and skipping over string literals and their escapes.
fn find_top_level_array(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('[') {
        let start = search_from + offset;
        if let Some(span) = balanced_span(text, start) {
            return Some(span);
        }
        search_from = start + 1;
    }
    None
}

fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

fn movie_from_value(value: &Value, user_id: &str) -> MovieRecommendation {
    MovieRecommendation {
        user_id: user_id.to_string(),
        title: string_field(value, "title"),
        year: string_field(value, "year"),
        genre: string_field(value, "genre"),
        mood_tag: string_field(value, "moodTag"),
        poster_url: string_field(value, "posterUrl"),
        preview_url: string_field(value, "previewUrl"),
        rating: numeric_field(value, "rating"),
        created: Utc::now(),
    }
}

fn string_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn numeric_field(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEVEN: &str = r#"[{"title":"Se7en","year":"1995","genre":"Thriller","moodTag":"dark","posterUrl":"p.jpg","previewUrl":"v.mp4","rating":8.6}]"#;

    #[test]
    fn test_clean_array() {
        let result = extract_movies(SEVEN, "u1");
        assert!(result.diagnostic.is_none());
        assert_eq!(result.movies.len(), 1);
        let movie = &result.movies[0];
        assert_eq!(movie.title, "Se7en");
        assert_eq!(movie.year, "1995");
        assert_eq!(movie.rating, 8.6);
        assert_eq!(movie.user_id, "u1");
    }

    #[test]
    fn test_fenced_equals_bare() {
        let fenced = format!("```json\n{}\n```", SEVEN);
        let bare = extract_movies(SEVEN, "u1");
        let from_fence = extract_movies(&fenced, "u1");
        assert_eq!(bare.movies.len(), from_fence.movies.len());
        assert_eq!(bare.movies[0].title, from_fence.movies[0].title);
        assert_eq!(bare.movies[0].rating, from_fence.movies[0].rating);
    }

    #[test]
    fn test_surrounding_commentary_ignored() {
        let noisy = format!("Sure! Here are some picks:\n{}\nEnjoy!", SEVEN);
        let result = extract_movies(&noisy, "u1");
        assert_eq!(result.movies.len(), 1);
        assert_eq!(result.movies[0].title, "Se7en");
    }

    #[test]
    fn test_all_fields_missing_yields_defaults() {
        let result = extract_movies("[{}]", "u1");
        assert_eq!(result.movies.len(), 1);
        let movie = &result.movies[0];
        assert_eq!(movie.title, "");
        assert_eq!(movie.year, "");
        assert_eq!(movie.genre, "");
        assert_eq!(movie.mood_tag, "");
        assert_eq!(movie.poster_url, "");
        assert_eq!(movie.preview_url, "");
        assert_eq!(movie.rating, 0.0);
    }

    #[test]
    fn test_prose_reply_is_empty_with_diagnostic() {
        let result = extract_movies("Sorry, I can't help with that.", "u1");
        assert!(result.movies.is_empty());
        assert!(result.diagnostic.is_some());
    }

    #[test]
    fn test_malformed_json_is_empty_with_diagnostic() {
        let result = extract_movies(r#"[{"title": "unterminated]"#, "u1");
        assert!(result.movies.is_empty());
        assert!(result.diagnostic.is_some());
    }

    #[test]
    fn test_nested_array_inside_element() {
        // The depth scanner must not stop at the inner bracket pair.
        let raw = r#"[{"title":"Heat","cast":["Pacino","De Niro"],"rating":8.3}]"#;
        let result = extract_movies(raw, "u1");
        assert_eq!(result.movies.len(), 1);
        assert_eq!(result.movies[0].title, "Heat");
        assert_eq!(result.movies[0].rating, 8.3);
    }

    #[test]
    fn test_brackets_inside_strings_skipped() {
        let raw = r#"[{"title":"Movie [Director's Cut]","rating":"7"}]"#;
        let result = extract_movies(raw, "u1");
        assert_eq!(result.movies.len(), 1);
        assert_eq!(result.movies[0].title, "Movie [Director's Cut]");
        assert_eq!(result.movies[0].rating, 7.0);
    }

    #[test]
    fn test_object_with_movies_field() {
        let raw = r#"{"movies": [{"title":"Alien"}], "note": "as requested"}"#;
        let result = extract_movies(raw, "u1");
        assert_eq!(result.movies.len(), 1);
        assert_eq!(result.movies[0].title, "Alien");
    }

    #[test]
    fn test_unclosed_candidate_retries_later_array() {
        let raw = r#"ratings [scale [{"title":"Ran"}]"#;
        let result = extract_movies(raw, "u1");
        assert_eq!(result.movies.len(), 1);
        assert_eq!(result.movies[0].title, "Ran");
    }

    #[test]
    fn test_numeric_coercion() {
        let raw = r#"[{"title":"X","year":1995,"rating":"8.6"},{"title":"Y","rating":"n/a"}]"#;
        let result = extract_movies(raw, "u1");
        assert_eq!(result.movies[0].year, "1995");
        assert_eq!(result.movies[0].rating, 8.6);
        assert_eq!(result.movies[1].rating, 0.0);
    }

    #[test]
    fn test_non_object_elements_map_to_defaults() {
        let result = extract_movies(r#"["just a string", 42]"#, "u1");
        assert_eq!(result.movies.len(), 2);
        assert!(result.movies.iter().all(|m| m.title.is_empty()));
    }

    #[test]
    fn test_empty_input() {
        let result = extract_movies("", "u1");
        assert!(result.movies.is_empty());
        assert!(result.diagnostic.is_some());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]\n");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]\n");
        assert_eq!(strip_code_fence("[1]"), "[1]");
        // Unterminated fence: keep everything after the fence line.
        assert_eq!(strip_code_fence("```json\n[1]"), "[1]");
    }
}
