/// Goal/activity label matching
///
/// A goal counts an activity when the normalized activity label and one of
/// the goal's descriptive fields contain each other, or when they share a
/// keyword (a normalized word of at least four letters that is not a
/// stopword).

use super::normalize::{fold_word, normalize_text};
use crate::models::goal::Goal;

/// Minimum keyword length, in bytes of the normalized word
const MIN_KEYWORD_LEN: usize = 4;

/// Words too common in goal and activity names to tell them apart
const STOPWORDS: &[&str] = &[
    "para", "pelo", "pela", "pelos", "pelas", "com", "como", "sobre", "entre", "mais",
    "menos", "uma", "umas", "uns", "que", "por", "sem", "ate", "apos", "desde", "cada",
    "todo", "toda", "todos", "todas", "esta", "este", "isso", "isto", "meta", "metas",
    "atividade", "atividades", "acao", "acoes", "realizar", "realizada", "realizadas",
    "realizacao", "numero", "total", "quantidade", "anual", "mensal", "geral",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.iter().any(|s| fold_word(s) == word)
}

/// Distinct keywords of `text`, in order of appearance
pub fn keywords(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in normalize_text(text).split(' ') {
        if word.len() < MIN_KEYWORD_LEN || is_stopword(word) {
            continue;
        }
        if !out.iter().any(|w| w == word) {
            out.push(word.to_string());
        }
    }
    out
}

/// Whether any of `fields` matches `label`
pub fn fields_match_label<'a>(fields: impl IntoIterator<Item = &'a str>, label: &str) -> bool {
    let label_norm = normalize_text(label);
    if label_norm.is_empty() {
        return false;
    }

    let label_keywords = keywords(&label_norm);
    let mut field_keywords: Vec<String> = Vec::new();

    for field in fields {
        let field_norm = normalize_text(field);
        if field_norm.is_empty() {
            continue;
        }
        if field_norm.contains(&label_norm) || label_norm.contains(&field_norm) {
            return true;
        }
        field_keywords.extend(keywords(&field_norm));
    }

    label_keywords.iter().any(|k| field_keywords.contains(k))
}

/// Whether `goal` counts activities labeled `label`
pub fn goal_matches_activity(goal: &Goal, label: &str) -> bool {
    fields_match_label(goal.match_fields(), label)
}
