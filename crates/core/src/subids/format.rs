/// Category slug used as the third sub-id.
///
/// Lower-cases, replaces every character outside `[a-z0-9]` with `_`,
/// collapses runs of `_` and trims them from both ends. Accented letters are
/// not transliterated, so `"Decoração"` becomes `"decora_o"`.
pub fn prepare_category_slug(category_name: &str) -> String {
    let mut slug = String::with_capacity(category_name.len());
    for ch in category_name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Up to three upper-cased initials of the words in a category name.
///
/// Not unique: different names may reduce to the same sigla.
pub fn get_category_sigla(category_name: &str) -> String {
    category_name
        .split(|ch: char| ch.is_whitespace() || ch == '-')
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(3)
        .collect()
}

pub fn global_code(prefix: &str, value: u64) -> String {
    format!("{prefix}{value:05}")
}

pub fn category_code(prefix: &str, sigla: &str, value: u64) -> String {
    format!("{prefix}_{sigla}{value:05}")
}

/// Per-batch sub-id used by sequential link generation (`seq001`, `seq002`, ...).
pub fn sequence_sub_id(sequence: u32) -> String {
    format!("seq{sequence:03}")
}
