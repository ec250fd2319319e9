//! # Localization Tests
//!
//! Message retrieval, argument substitution and language fallback.

use autofilter::localization::{t_args_lang, t_lang, LocalizationManager};
use fluent_bundle::FluentArgs;

#[cfg(test)]
mod tests {
    use super::*;

    const USED_KEYS: &[&str] = &[
        "help",
        "anonymous-admin",
        "not-connected",
        "bot-not-in-group",
        "command-incomplete",
        "filter-needs-content",
        "filter-needs-text-or-buttons",
        "filter-added",
        "filter-attach-failed",
        "filters-none",
        "filters-header",
        "del-usage",
        "filter-deleted",
        "filter-not-found",
        "tokens-empty-reply",
        "tokens-empty-alert",
        "select-file",
        "file-not-found",
        "file-sent",
        "file-send-failed",
        "file-caption",
        "alert-missing",
        "connected",
        "connect-use-in-group",
        "disconnected",
        "balance",
        "grant-usage",
        "grant-done",
        "grant-overflow",
    ];

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_every_used_key_is_translated() {
        let manager = setup_localization();
        for key in USED_KEYS {
            let message = manager.get_message_in_language(key, "en", None);
            assert!(
                !message.starts_with("Missing translation"),
                "missing key {key}"
            );
        }
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();
        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_unsupported_language_falls_back_to_english() {
        let manager = setup_localization();
        assert!(manager.is_language_supported("en-US"));
        assert!(!manager.is_language_supported("xx"));

        let english = manager.get_message_in_language("file-not-found", "en", None);
        assert_eq!(
            manager.get_message_in_language("file-not-found", "xx-YY", None),
            english
        );
        assert_eq!(english, "❌ File not found!");
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();
        let mut args = FluentArgs::new();
        args.set("keyword", "avatar");
        args.set("title", "Movies");

        let message = manager.get_message_in_language("filter-added", "en", Some(&args));
        assert_eq!(
            message,
            "✅ Filter for <code>avatar</code> added in <b>Movies</b>"
        );
    }

    #[test]
    fn test_convenience_functions() {
        autofilter::localization::init_localization().expect("Failed to initialize localization");

        assert_eq!(t_lang("select-file", Some("en")), "🔍 Select a file:");
        assert_eq!(t_lang("select-file", None), "🔍 Select a file:");

        let message = t_args_lang("balance", &[("tokens", "7")], Some("en"));
        assert!(message.contains("<b>7</b>"));
    }
}
