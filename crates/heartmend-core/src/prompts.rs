//! Per-role prompt templates.
//!
//! The narrative is interpolated verbatim; nothing is escaped or trimmed.

use sha2::{Digest as _, Sha256};

use crate::roles::RecoveryRole;

const THERAPIST_TEMPLATE: &str = "\
Analyze the emotional state based on:
User's message: {user_input}

Provide:
1. Validation of feelings
2. Gentle words of comfort
3. Relatable experiences
4. Encouragement
";

const CLOSURE_TEMPLATE: &str = "\
Create emotional closure content based on:
User's feelings: {user_input}

Include:
1. Templates for unsent messages
2. Emotional release exercises
3. Closure rituals
4. Moving forward guidance
";

const ROUTINE_TEMPLATE: &str = "\
Design a 7-day recovery plan based on:
{user_input}

Include:
1. Daily activities
2. Self-care routines
3. Social media detox guidelines
4. Music suggestions
";

const HONESTY_TEMPLATE: &str = "\
Provide honest feedback about:
{user_input}

Include:
1. Objective analysis
2. Growth opportunities
3. Future outlook
4. Concrete action steps
";

const PLACEHOLDER: &str = "{user_input}";

/// Template text for `role`, placeholder included.
pub fn template(role: RecoveryRole) -> &'static str {
    match role {
        RecoveryRole::Therapist => THERAPIST_TEMPLATE,
        RecoveryRole::Closure => CLOSURE_TEMPLATE,
        RecoveryRole::RoutinePlanner => ROUTINE_TEMPLATE,
        RecoveryRole::Honesty => HONESTY_TEMPLATE,
    }
}

/// Build the prompt sent to `role` for `narrative`.
pub fn build_prompt(role: RecoveryRole, narrative: &str) -> String {
    // Single replacement so a narrative containing the placeholder stays verbatim.
    template(role).replacen(PLACEHOLDER, narrative, 1)
}

/// One prompt per role, in display order.
pub fn build_all_prompts(narrative: &str) -> Vec<(RecoveryRole, String)> {
    RecoveryRole::ALL
        .iter()
        .map(|&role| (role, build_prompt(role, narrative)))
        .collect()
}

/// SHA-256 hex over the prompts in order, each followed by a NUL separator.
///
/// Identical narratives always yield identical digests.
pub fn prompt_digest<'a>(prompts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for prompt in prompts {
        hasher.update(prompt.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_has_one_placeholder() {
        for role in RecoveryRole::ALL {
            assert_eq!(template(role).matches(PLACEHOLDER).count(), 1, "{role}");
        }
    }

    #[test]
    fn test_narrative_is_embedded_verbatim() {
        let narrative = "  She left on a Tuesday.\nI still check her stories.  ";
        for role in RecoveryRole::ALL {
            assert!(build_prompt(role, narrative).contains(narrative));
        }
    }

    #[test]
    fn test_narrative_containing_placeholder_is_not_expanded_twice() {
        let prompt = build_prompt(RecoveryRole::Honesty, "{user_input}{user_input}");
        assert!(prompt.contains("about:\n{user_input}{user_input}\n"));
    }

    #[test]
    fn test_role_specific_headers() {
        assert!(build_prompt(RecoveryRole::Therapist, "x").starts_with("Analyze the emotional state"));
        assert!(build_prompt(RecoveryRole::Closure, "x").contains("User's feelings: x"));
        assert!(build_prompt(RecoveryRole::RoutinePlanner, "x").contains("7-day recovery plan"));
        assert!(build_prompt(RecoveryRole::Honesty, "x").contains("Concrete action steps"));
    }

    #[test]
    fn test_prompt_digest_is_stable_and_order_sensitive() {
        let a = build_all_prompts("same input");
        let b = build_all_prompts("same input");
        let digest_a = prompt_digest(a.iter().map(|(_, p)| p.as_str()));
        let digest_b = prompt_digest(b.iter().map(|(_, p)| p.as_str()));
        assert_eq!(digest_a, digest_b);

        let reversed = prompt_digest(a.iter().rev().map(|(_, p)| p.as_str()));
        assert_ne!(digest_a, reversed);
    }
}
