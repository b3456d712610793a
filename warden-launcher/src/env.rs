//! Environment-variable mapping for injected credentials.
//!
//! Every reference gets a synthetic name (`WARDEN_` + uppercased id). On
//! top of that, providers the agent's libraries already know get their
//! canonical variable names, so the agent's own HTTP stack finds a working
//! key without any code changes.

use warden_crypto::ReferenceId;

/// Prefix for synthetic per-reference variable names.
pub const ENV_PREFIX: &str = "WARDEN_";

/// `WARDEN_<UPPERCASED_ID>` with non-alphanumerics collapsed to `_`.
pub fn synthetic_env_name(id: &ReferenceId) -> String {
    let mut name = String::with_capacity(ENV_PREFIX.len() + 40);
    name.push_str(ENV_PREFIX);
    for c in id.to_string().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_uppercase());
        } else {
            name.push('_');
        }
    }
    name
}

/// Canonical variable names for a provider tag. Unknown providers get no
/// canonical names; their credential is still exported under the synthetic
/// name.
pub fn provider_env_names(provider: &str) -> &'static [&'static str] {
    match provider.to_ascii_lowercase().as_str() {
        "google" => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
        "openrouter" => &["OPENROUTER_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "cohere" => &["COHERE_API_KEY"],
        "mistral" => &["MISTRAL_API_KEY"],
        "groq" => &["GROQ_API_KEY"],
        "together" => &["TOGETHER_API_KEY"],
        "perplexity" => &["PERPLEXITY_API_KEY"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_crypto::CredentialType;

    #[test]
    fn synthetic_name_is_prefixed_and_uppercased() {
        let id = ReferenceId::generate("openai", CredentialType::ApiKey);
        let name = synthetic_env_name(&id);
        assert!(name.starts_with("WARDEN_CRED_OPENAI_API_KEY_"));
        assert!(name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn google_sets_both_canonical_names() {
        assert_eq!(
            provider_env_names("google"),
            &["GOOGLE_API_KEY", "GEMINI_API_KEY"]
        );
        assert_eq!(provider_env_names("Google"), provider_env_names("google"));
    }

    #[test]
    fn unknown_provider_has_no_canonical_names() {
        assert!(provider_env_names("homegrown").is_empty());
    }
}
