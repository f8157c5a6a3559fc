//! Request fingerprints used as cache keys.

use sha2::{Digest, Sha256};

use crate::types::OutputFormat;

/// Hex characters kept from the digest (64 bits).
const FINGERPRINT_LEN: usize = 16;

/// Prefix of visualization result keys in the cache.
pub const RESULT_KEY_PREFIX: &str = "api_";

/// Deterministic short identifier for a (prompt, model, format) triple.
///
/// SHA-256 over the length-prefixed fields, truncated to 16 hex characters.
/// Stable across processes and platforms, which the persistent backend
/// relies on. Not meant to resist deliberate collisions.
pub fn fingerprint(prompt: &str, model: &str, format: OutputFormat) -> String {
    let mut hasher = Sha256::new();
    for field in [prompt, model, format.as_str()] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}

/// Cache key of a visualization result.
pub fn result_key(prompt: &str, model: &str, format: OutputFormat) -> String {
    format!("{RESULT_KEY_PREFIX}{}", fingerprint(prompt, model, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn deterministic() {
        let a = fingerprint("sales grew 20%", "x-ai/grok-4", OutputFormat::Svg);
        let b = fingerprint("sales grew 20%", "x-ai/grok-4", OutputFormat::Svg);
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn known_value_is_stable() {
        // Persisted keys must not change between releases.
        assert_eq!(fingerprint("", "", OutputFormat::Svg), "88115a5506a488a9");
        assert_eq!(
            fingerprint("sales grew 20%", "x-ai/grok-4", OutputFormat::Svg),
            "b14f83acd5d36258"
        );
    }

    #[test]
    fn each_field_changes_the_output() {
        let base = fingerprint("text", "model", OutputFormat::Svg);
        assert_ne!(base, fingerprint("text!", "model", OutputFormat::Svg));
        assert_ne!(base, fingerprint("text", "model2", OutputFormat::Svg));
        assert_ne!(base, fingerprint("text", "model", OutputFormat::Html));
    }

    #[test]
    fn field_boundaries_cannot_shift() {
        assert_ne!(
            fingerprint("a|b", "c", OutputFormat::Svg),
            fingerprint("a", "b|c", OutputFormat::Svg)
        );
        assert_ne!(
            fingerprint("ab", "c", OutputFormat::Svg),
            fingerprint("a", "bc", OutputFormat::Svg)
        );
    }

    #[test]
    fn distinct_triples_give_distinct_fingerprints() {
        let prompts: Vec<String> = (0..40).map(|i| format!("prompt number {i}")).collect();
        let models = ["x-ai/grok-4", "moonshotai/kimi-k2", "openai/gpt-4o"];
        let mut seen = HashSet::new();
        let mut total = 0;
        for prompt in &prompts {
            for model in models {
                for format in [OutputFormat::Svg, OutputFormat::Html] {
                    seen.insert(fingerprint(prompt, model, format));
                    total += 1;
                }
            }
        }
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn result_key_has_prefix() {
        let key = result_key("t", "m", OutputFormat::Svg);
        assert!(key.starts_with(RESULT_KEY_PREFIX));
        assert_eq!(key.len(), RESULT_KEY_PREFIX.len() + FINGERPRINT_LEN);
    }
}
