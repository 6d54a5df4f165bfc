//! System prompt assembly.
//!
//! The persona block is fixed; the per-message policy instructions and the
//! deterministic ground-truth template are appended behind it. The model
//! is told to restate the template, never to recompute or contradict it.

/// The assistant persona. Phrasing the model is told to avoid here is
/// also stripped post-generation by `sanitize`.
pub const PERSONA_PROMPT: &str = "You are CareVibe, a calm and reliable wellness assistant. \
Respond in 2\u{2013}4 short lines. Reference earlier symptoms briefly when relevant \
(e.g., \"With fever and stomach pain...\"). Give only essential wellness steps. \
Do not diagnose. If symptoms sound serious or persist, suggest seeking medical care. \
Use simple, natural language. Avoid marketing tone and disclaimers like \"I can't diagnose\". \
You may add up to 2 very short bullet recommendations at the end only if they clarify \
next steps (use \"- \"). Ask one short follow-up only when truly helpful.";

/// Compose the full system prompt for one reply.
///
/// `ground_truth` is the pre-built template sentence holding the actual
/// numbers from the user's records; `health_context` is any extra
/// free-text background the host wants the model to see.
pub fn build_system_prompt(
    policy_instructions: &str,
    ground_truth: Option<&str>,
    health_context: Option<&str>,
) -> String {
    let mut prompt = String::from(PERSONA_PROMPT);

    prompt.push_str("\n\nStyle for this reply: ");
    prompt.push_str(policy_instructions);

    if let Some(truth) = ground_truth {
        prompt.push_str(
            "\n\nGround truth from the user's health records:\n",
        );
        prompt.push_str(truth);
        prompt.push_str(
            "\nState these facts as given. Do not change, recompute, or contradict the numbers and dates above.",
        );
    }

    if let Some(context) = health_context {
        prompt.push_str("\n\nAdditional health context:\n");
        prompt.push_str(context);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_always_leads() {
        let prompt = build_system_prompt("Be direct and factual.", None, None);
        assert!(prompt.starts_with("You are CareVibe"));
        assert!(prompt.contains("Be direct and factual."));
        assert!(!prompt.contains("Ground truth"));
    }

    #[test]
    fn ground_truth_is_quoted_verbatim() {
        let truth = "On October 3, 2025, your bmi was 22.8.";
        let prompt = build_system_prompt("Be clear and analytical.", Some(truth), None);
        assert!(prompt.contains(truth));
        assert!(prompt.contains("Do not change, recompute, or contradict"));
    }

    #[test]
    fn health_context_trails_ground_truth() {
        let prompt = build_system_prompt(
            "Be friendly and supportive.",
            Some("template"),
            Some("User logged a cold last week."),
        );
        let truth_at = prompt.find("Ground truth").unwrap();
        let context_at = prompt.find("Additional health context").unwrap();
        assert!(truth_at < context_at);
    }
}
