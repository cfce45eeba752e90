/// Text and regional-name normalization
///
/// Goal and activity labels are typed by hand, in Portuguese, by many
/// people. Normalization brings "Oficinas de Capacitação" and
/// "oficina capacitacao" to the same form:
///
/// 1. accents stripped, lowercased
/// 2. every character that is not an ASCII letter or digit becomes a separator
/// 3. whitespace collapsed
/// 4. each word folded from plural to singular until it stops changing
///
/// The result only contains words that are already at their fold fixpoint,
/// so normalizing twice gives the same string as normalizing once.

use std::collections::HashMap;
use std::str::FromStr;

/// Leading words dropped from regional names ("Regional Norte" -> "norte")
const REGIONAL_PREFIXES: &[&str] = &["regional", "regiao", "reg"];

/// Replaces accented Latin letters with their base letter and drops
/// combining marks. Case is preserved.
pub fn strip_accents(input: &str) -> String {
    input
        .chars()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ý' | 'ÿ' => 'y',
            'Ý' => 'Y',
            other => other,
        })
        .collect()
}

/// Normalizes free text for comparison
///
/// # Example
///
/// ```
/// use regionalops_shared::dashboard::normalize_text;
///
/// assert_eq!(normalize_text("Oficinas de Capacitação!"), "oficina de capacitacao");
/// assert_eq!(normalize_text("  AÇÕES   sociais "), "acao social");
/// ```
pub fn normalize_text(input: &str) -> String {
    let cleaned: String = strip_accents(input)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(fold_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Folds a lowercase ASCII word to singular until it stops changing
pub fn fold_word(word: &str) -> String {
    let mut current = word.to_string();
    // Every rule shortens the word, so this terminates
    while let Some(next) = fold_once(&current) {
        current = next;
    }
    current
}

fn fold_once(word: &str) -> Option<String> {
    let len = word.len();
    if word.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    for suffix in ["oes", "aes", "aos"] {
        if len > 3 && word.ends_with(suffix) {
            return Some(format!("{}ao", &word[..len - 3]));
        }
    }
    if len > 3 && word.ends_with("ns") {
        return Some(format!("{}m", &word[..len - 2]));
    }
    for suffix in ["res", "zes", "ses"] {
        if len > 4 && word.ends_with(suffix) {
            return Some(word[..len - 2].to_string());
        }
    }
    if len > 5 && word.ends_with("is") {
        return Some(format!("{}l", &word[..len - 2]));
    }
    if len > 3 && word.ends_with('s') {
        return Some(word[..len - 1].to_string());
    }
    None
}

/// Regional alias table (`alias -> canonical`), keys and values normalized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionalAliases {
    map: HashMap<String, String>,
}

impl RegionalAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an alias; both sides are normalized like regional names
    pub fn insert(&mut self, alias: &str, canonical: &str) {
        let alias = strip_regional_prefix(&normalize_text(alias));
        let canonical = strip_regional_prefix(&normalize_text(canonical));
        if alias.is_empty() || canonical.is_empty() || alias == canonical {
            return;
        }
        self.map.insert(alias, canonical);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        self.map.get(key).map(String::as_str).unwrap_or(key)
    }
}

impl FromStr for RegionalAliases {
    type Err = String;

    /// Parses `"alias:canonical,alias2:canonical2"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut aliases = RegionalAliases::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (alias, canonical) = entry
                .split_once(':')
                .ok_or_else(|| format!("invalid regional alias entry: {}", entry))?;
            if alias.trim().is_empty() || canonical.trim().is_empty() {
                return Err(format!("invalid regional alias entry: {}", entry));
            }
            aliases.insert(alias, canonical);
        }
        Ok(aliases)
    }
}

fn strip_regional_prefix(normalized: &str) -> String {
    let mut words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();
    while words.len() > 1 && REGIONAL_PREFIXES.contains(&words[0]) {
        words.remove(0);
    }
    words.join(" ")
}

/// Normalizes a regional name and resolves aliases
///
/// ```
/// use regionalops_shared::dashboard::{normalize_regional, RegionalAliases};
///
/// let aliases: RegionalAliases = "rmr:metropolitana".parse().unwrap();
/// assert_eq!(normalize_regional("Regional RMR", &aliases), "metropolitana");
/// assert_eq!(normalize_regional("Região Sertão", &aliases), "sertao");
/// ```
pub fn normalize_regional(input: &str, aliases: &RegionalAliases) -> String {
    let key = strip_regional_prefix(&normalize_text(input));
    aliases.resolve(&key).to_string()
}
