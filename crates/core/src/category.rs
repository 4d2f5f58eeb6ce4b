/// Label given to transactions that neither carry a category nor match a rule.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Canonical form of a category label: trimmed, lower-cased, first character
/// upper-cased. Blank input maps to [`DEFAULT_CATEGORY`].
///
/// Only the first character is capitalized, so `"eating OUT"` becomes
/// `"Eating out"`.
pub fn normalize_category(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_CATEGORY.to_string();
    }

    let lower = trimmed.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        // A first letter whose capital form is several characters (ß -> SS)
        // is left lower-case so that normalizing twice is a no-op.
        Some(first) if first.to_uppercase().count() == 1 => {
            first.to_uppercase().chain(chars).collect()
        }
        Some(_) => trimmed.to_lowercase(),
        None => DEFAULT_CATEGORY.to_string(),
    }
}
