//! Slugs and short codes derived from display names.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Letters whose conventional ASCII spelling is not their base letter.
const TRANSLITERATIONS: &[(char, &str)] = &[
    ('đ', "dj"),
    ('Đ', "dj"),
    ('ä', "ae"),
    ('ö', "oe"),
    ('ü', "ue"),
    ('ß', "ss"),
    ('Ä', "ae"),
    ('Ö', "oe"),
    ('Ü', "ue"),
];

/// Spells `value` in ASCII where a spelling is known: explicit
/// transliterations first, then diacritics stripped (`č` -> `c`).
/// Characters with no decomposition are kept as they are.
pub fn transliterate(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match TRANSLITERATIONS.iter().find(|(src, _)| *src == ch) {
            Some((_, dst)) => out.push_str(dst),
            None => out.extend(std::iter::once(ch).nfd().filter(|c| !is_combining_mark(*c))),
        }
    }
    out
}

/// Lowercase ASCII, hyphen-separated. Never empty: names with no usable
/// characters become `unknown`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in transliterate(value).chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "unknown".to_owned()
    } else {
        slug
    }
}

fn ascii_upper(value: &str) -> String {
    transliterate(value)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Short uppercase code: the first four ASCII alphanumerics of `source`,
/// or shorter sources padded to three with their last character.
/// `fallback` goes through the same filter when `source` has none.
pub fn city_code(source: &str, fallback: &str) -> String {
    let mut code = ascii_upper(source);
    if code.is_empty() {
        code = ascii_upper(fallback);
    }
    if code.len() >= 4 {
        code.truncate(4);
    } else if let Some(last) = code.chars().last() {
        while code.len() < 3 {
            code.push(last);
        }
    }
    code
}

/// First `max` characters of `value`.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Last `max` characters of `value`.
pub fn last_chars(value: &str, max: usize) -> String {
    let skip = value.chars().count().saturating_sub(max);
    value.chars().skip(skip).collect()
}

pub fn contains_cyrillic(text: &str) -> bool {
    text.chars().any(|ch| ('\u{0400}'..='\u{04FF}').contains(&ch))
}
