// Output formatting: terminal display of moderation results.

pub mod terminal;

/// Format a [0, 1] score as a percentage with one decimal, e.g. "42.5%".
pub fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}
