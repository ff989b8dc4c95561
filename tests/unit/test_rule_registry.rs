//! Unit tests for the interception and parsing rule registry

use shellgate::rules::{InterceptOutcome, InterceptorRule, ParserRule, RuleRegistry};
use shellgate::Error;

fn pass_through_rule(pattern: &str) -> InterceptorRule {
    InterceptorRule::new(pattern, |_cmd, _session| async move {
        Ok(InterceptOutcome::PassThrough)
    })
    .unwrap()
}

fn noop_parser(pattern: &str) -> ParserRule {
    ParserRule::new(pattern, |_content, _session| Ok(())).unwrap()
}

#[cfg(test)]
mod rule_compilation_tests {
    use super::*;

    #[test]
    fn test_valid_pattern_compiles() {
        let rule = pass_through_rule(r"^rm\s+-rf");
        assert_eq!(rule.pattern_str(), r"^rm\s+-rf");
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = InterceptorRule::new("[unclosed", |_cmd, _session| async move {
            Ok(InterceptOutcome::PassThrough)
        });
        assert!(matches!(result, Err(Error::Regex(_))));

        let result = ParserRule::new("(?P<broken", |_content, _session| Ok(()));
        assert!(matches!(result, Err(Error::Regex(_))));
    }

    #[test]
    fn test_interceptor_matching_is_anchoring_aware() {
        let rule = pass_through_rule(r"^sudo\b");
        assert!(rule.matches("sudo apt update"));
        assert!(!rule.matches("echo sudo"));
    }

    #[test]
    fn test_parser_matches_substring() {
        let rule = noop_parser(r"\d+ packages? upgraded");
        assert!(rule.matches("12 packages upgraded, 0 newly installed"));
        assert!(!rule.matches("nothing to do"));
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    #[tokio::test]
    async fn test_rules_are_kept_in_registration_order() {
        let registry = RuleRegistry::new();
        registry.add_interceptor(pass_through_rule("first")).await;
        registry.add_interceptor(pass_through_rule("second")).await;
        registry.add_interceptor(pass_through_rule("third")).await;

        let patterns: Vec<String> = registry
            .interceptors()
            .await
            .iter()
            .map(|r| r.pattern_str().to_string())
            .collect();
        assert_eq!(patterns, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_remove_takes_every_rule_with_the_pattern() {
        let registry = RuleRegistry::new();
        registry.add_interceptor(pass_through_rule("dup")).await;
        registry.add_interceptor(pass_through_rule("dup")).await;
        registry.add_interceptor(pass_through_rule("keep")).await;

        let removed = registry.remove_interceptor("dup").await;
        assert_eq!(removed, 2);
        assert_eq!(registry.interceptor_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_pattern_removes_nothing() {
        let registry = RuleRegistry::new();
        registry.add_interceptor(pass_through_rule("present")).await;

        assert_eq!(registry.remove_interceptor("absent").await, 0);
        assert_eq!(registry.interceptor_count().await, 1);
    }

    #[tokio::test]
    async fn test_removal_matches_pattern_string_not_regex() {
        let registry = RuleRegistry::new();
        registry.add_interceptor(pass_through_rule(r"^git\s")).await;

        // The removal key is the canonical pattern string, not anything
        // the pattern would match
        assert_eq!(registry.remove_interceptor("git push").await, 0);
        assert_eq!(registry.remove_interceptor(r"^git\s").await, 1);
    }

    #[tokio::test]
    async fn test_parsers_and_interceptors_are_separate_pools() {
        let registry = RuleRegistry::new();
        registry.add_interceptor(pass_through_rule("shared")).await;
        registry.add_parser(noop_parser("shared")).await;

        assert_eq!(registry.remove_parser("shared").await, 1);
        assert_eq!(registry.interceptor_count().await, 1);
        assert_eq!(registry.parser_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_registry_counts() {
        let registry = RuleRegistry::new();
        assert_eq!(registry.interceptor_count().await, 0);
        assert_eq!(registry.parser_count().await, 0);
        assert!(registry.interceptors().await.is_empty());
        assert!(registry.parsers().await.is_empty());
    }
}
