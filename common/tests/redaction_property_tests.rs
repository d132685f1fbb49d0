// Property-based tests for secret redaction.
//
// For any secret value a job references, that value must not survive in
// any text that passes through the redactor.

use common::secrets::{SecretStore, SecretString, REDACTED};
use proptest::prelude::*;

fn secret_value() -> impl Strategy<Value = String> {
    // Realistic credential shapes: tokens, passwords, base64-ish blobs
    "[A-Za-z0-9+/=_-]{4,64}"
}

proptest! {
    #[test]
    fn redacted_output_never_contains_secret(
        secret in secret_value(),
        prefix in "[a-z ]{0,20}",
        suffix in "[a-z ]{0,20}",
    ) {
        let mut store = SecretStore::empty();
        store.insert("TOKEN", SecretString::new(secret.clone()));
        store.mark_sensitive("TOKEN");

        let line = format!("{}{}{}", prefix, secret, suffix);
        let redacted = store.redact(&line);

        prop_assert!(!redacted.contains(&secret));
        prop_assert!(redacted.contains(REDACTED));
    }

    #[test]
    fn redaction_scrubs_repeated_occurrences(
        secret in secret_value(),
        repeats in 1usize..5,
    ) {
        let mut store = SecretStore::empty();
        store.insert("TOKEN", SecretString::new(secret.clone()));
        store.mark_sensitive("TOKEN");

        let line = vec![secret.as_str(); repeats].join(" | ");
        let redacted = store.redact(&line);

        prop_assert!(!redacted.contains(&secret));
    }

    #[test]
    fn text_without_secrets_is_unchanged(
        secret in secret_value(),
        text in "[ -~]{0,60}",
    ) {
        // Only check inputs that genuinely do not contain the secret
        prop_assume!(!text.contains(&secret));

        let mut store = SecretStore::empty();
        store.insert("TOKEN", SecretString::new(secret));
        store.mark_sensitive("TOKEN");

        prop_assert_eq!(store.redact(&text), text);
    }

    #[test]
    fn unreferenced_values_are_left_alone(
        secret in secret_value(),
    ) {
        // A value never marked sensitive is not scrubbed
        let mut store = SecretStore::empty();
        store.insert("TOKEN", SecretString::new(secret.clone()));

        let line = format!("value is {}", secret);
        prop_assert_eq!(store.redact(&line), line);
    }
}
