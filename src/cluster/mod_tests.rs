// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cluster/mod.rs`

#[cfg(test)]
mod tests {
    use super::super::{parse_selector, selector_matches, SelectorRequirement};
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_equality_and_existence() {
        let requirements = parse_selector("owner=zenith-sync, svc").unwrap();
        assert_eq!(
            requirements,
            vec![
                SelectorRequirement::Equals("owner".into(), "zenith-sync".into()),
                SelectorRequirement::Exists("svc".into()),
            ]
        );
    }

    #[test]
    fn test_parse_double_equals() {
        let requirements = parse_selector("a==b").unwrap();
        assert_eq!(
            requirements,
            vec![SelectorRequirement::Equals("a".into(), "b".into())]
        );
    }

    #[test]
    fn test_parse_rejects_unsupported_operators() {
        assert!(parse_selector("a!=b").is_err());
        assert!(parse_selector("!a").is_err());
    }

    #[test]
    fn test_wildcard_selector_matches_any_service() {
        let requirements = parse_selector("owner=zenith-sync,svc").unwrap();
        assert!(selector_matches(
            &requirements,
            &labels(&[("owner", "zenith-sync"), ("svc", "a")])
        ));
        assert!(!selector_matches(&requirements, &labels(&[("owner", "zenith-sync")])));
        assert!(!selector_matches(
            &requirements,
            &labels(&[("owner", "someone-else"), ("svc", "a")])
        ));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let requirements = parse_selector("").unwrap();
        assert!(requirements.is_empty());
        assert!(selector_matches(&requirements, &BTreeMap::new()));
    }
}
