//! Post-generation reply cleanup.
//!
//! Models keep sneaking disclaimers and AI self-references into replies
//! despite prompt instructions, so the banned phrases are stripped again
//! here. Brief-style enforcement caps the line count and length for hosts
//! that want chat-bubble-sized replies.

use std::sync::LazyLock;

use regex::Regex;

static BANNED_PHRASES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)i\s*can(?:not|'t)\s*diagnose",
        r"(?i)i'?m\s*not\s*here\s*to\s*identify",
        r"(?i)as\s*an\s*ai",
        r"(?i)i\s*am\s*an\s*ai",
        r"(?i)i\s*am\s*not\s*a\s*doctor",
        r"(?i)language\s*model",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static EXTRA_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

static REPEATED_PERIODS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\.(\s*\.)+").expect("valid regex"));

/// Strip banned disclaimer phrases and tidy the punctuation gaps they
/// leave behind.
pub fn sanitize_phrases(text: &str) -> String {
    let mut out = text.to_string();
    for pattern in BANNED_PHRASES.iter() {
        out = pattern.replace_all(&out, "").trim().to_string();
    }
    let out = EXTRA_SPACES.replace_all(&out, " ");
    let out = REPEATED_PERIODS.replace_all(&out, ".");
    out.trim().to_string()
}

static TRAILING_JUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w)\]}]*$").expect("valid regex"));

/// Keep the first four non-empty lines and cap at 450 characters,
/// trimming any punctuation left dangling at the cut.
pub fn enforce_brief_style(text: &str) -> String {
    let trimmed = text.trim();

    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut out = if lines.is_empty() {
        trimmed.to_string()
    } else {
        lines[..lines.len().min(4)].join("\n")
    };

    if out.chars().count() > 450 {
        let capped: String = out.chars().take(450).collect();
        out = TRAILING_JUNK.replace(&capped, "").trim().to_string();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnose_disclaimers_are_stripped() {
        assert_eq!(
            sanitize_phrases("I can't diagnose this, but rest may help."),
            "this, but rest may help."
        );
        assert_eq!(
            sanitize_phrases("I cannot diagnose. Drink water."),
            ". Drink water."
        );
    }

    #[test]
    fn ai_self_references_are_stripped() {
        let out = sanitize_phrases("As an AI, I think you should rest.");
        assert!(!out.to_lowercase().contains("as an ai"));
        assert!(out.contains("you should rest"));

        let out = sanitize_phrases("I am a language model and suggest sleep.");
        assert!(!out.to_lowercase().contains("language model"));
    }

    #[test]
    fn stripping_is_case_insensitive_and_space_tolerant() {
        let out = sanitize_phrases("I  CAN'T  DIAGNOSE anything here.");
        assert!(!out.to_lowercase().contains("diagnose"));
    }

    #[test]
    fn leftover_spaces_and_periods_collapse() {
        assert_eq!(sanitize_phrases("Rest  well.  .  . Then walk."), "Rest well. Then walk.");
    }

    #[test]
    fn clean_text_passes_through() {
        let text = "Your BMI looks steady. Keep up the routine.";
        assert_eq!(sanitize_phrases(text), text);
    }

    #[test]
    fn brief_style_keeps_first_four_lines() {
        let text = "one\n\ntwo\nthree\n\nfour\nfive";
        assert_eq!(enforce_brief_style(text), "one\ntwo\nthree\nfour");
    }

    #[test]
    fn brief_style_caps_length_and_trims_dangling_punctuation() {
        let long = format!("{}, and", "word ".repeat(100));
        let out = enforce_brief_style(&long);
        assert!(out.chars().count() <= 450);
        assert!(out.ends_with("and") || out.ends_with("word"));
        assert!(!out.ends_with(','));
    }

    #[test]
    fn brief_style_preserves_short_replies() {
        assert_eq!(enforce_brief_style("  Stay hydrated.  "), "Stay hydrated.");
    }
}
