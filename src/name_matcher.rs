//! Decides whether free-form text (a tag value, a file name, a folder name)
//! refers to one of a fixed list of target names.
//!
//! Matching is deliberately simple and deterministic: no similarity scores.
//! A candidate matches a target when either
//!
//! 1. the target's compact form (normalized, spaces removed) is a substring of
//!    the candidate's compact form, which catches names glued into
//!    concatenated file names, or
//! 2. the target's tokens appear contiguously and in order among the
//!    candidate's tokens.
//!
//! Candidates are tried in caller priority order and targets in configured
//! order; the first hit wins.

use crate::normalize::{compact, normalize};

/// One configured target name, indexed once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetName {
    pub name: String,
    pub normalized: String,
    pub compact: String,
    pub tokens: Vec<String>,
}

impl TargetName {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let normalized = normalize(&name);
        let compact = compact(&normalized);
        let tokens = normalized.split_whitespace().map(str::to_string).collect();
        Self {
            name,
            normalized,
            compact,
            tokens,
        }
    }

    /// Whether `candidate` references this target.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = normalize(candidate);
        if candidate.is_empty() {
            return false;
        }

        if !self.compact.is_empty() && compact(&candidate).contains(&self.compact) {
            return true;
        }

        if self.tokens.is_empty() {
            return false;
        }
        let candidate_tokens: Vec<&str> = candidate.split_whitespace().collect();
        contains_contiguous(&candidate_tokens, &self.tokens)
    }
}

fn contains_contiguous(haystack: &[&str], needle: &[String]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.iter().zip(needle).all(|(a, b)| *a == b.as_str()))
}

/// The indexed target list, kept in configured order.
#[derive(Debug, Clone, Default)]
pub struct NameMatcher {
    targets: Vec<TargetName>,
}

impl NameMatcher {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: names.into_iter().map(TargetName::new).collect(),
        }
    }

    pub fn targets(&self) -> &[TargetName] {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// First target matched by the first matching candidate.
    ///
    /// Candidates are checked in the order given, each against every target
    /// in configured order, so an earlier candidate always wins over a later
    /// one and an earlier target over a later one.
    pub fn find_match<'a, I, S>(&'a self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates.into_iter().find_map(|candidate| {
            self.targets
                .iter()
                .find(|target| target.matches(candidate.as_ref()))
                .map(|target| target.name.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_name_index() {
        let target = TargetName::new("The Beatles!");
        assert_eq!(target.name, "The Beatles!");
        assert_eq!(target.normalized, "the beatles");
        assert_eq!(target.compact, "thebeatles");
        assert_eq!(target.tokens, vec!["the", "beatles"]);
    }

    #[test]
    fn test_compact_containment() {
        let target = TargetName::new("The Beatles");
        assert!(target.matches("the beatles revolution.mp3"));
        assert!(target.matches("TheBeatles_Revolution"));
        assert!(target.matches("01-thebeatles-help"));
    }

    #[test]
    fn test_token_order_matters() {
        let target = TargetName::new("The Beatles");
        assert!(!target.matches("beatles the white album"));
    }

    #[test]
    fn test_token_subsequence() {
        // Compact containment already covers contiguous tokens, so exercise
        // the token rule directly as well.
        let tokens = vec!["daft".to_string(), "punk".to_string()];
        assert!(contains_contiguous(&["live", "daft", "punk", "1997"], &tokens));
        assert!(!contains_contiguous(&["daft", "live", "punk"], &tokens));
        assert!(!contains_contiguous(&["daft"], &tokens));
    }

    #[test]
    fn test_empty_candidate_never_matches() {
        let target = TargetName::new("Queen");
        assert!(!target.matches(""));
        assert!(!target.matches(" -- "));
    }

    #[test]
    fn test_empty_target_never_matches() {
        let target = TargetName::new("!!!");
        assert!(target.compact.is_empty());
        assert!(!target.matches("anything at all"));
    }

    #[test]
    fn test_non_ascii_names() {
        let target = TargetName::new("Sigur Rós");
        assert!(target.matches("Sigur_Rós - Hoppípolla.flac"));
        assert!(!target.matches("Sigur Ros"));
    }

    #[test]
    fn test_find_match_candidate_priority() {
        let matcher = NameMatcher::new(["Queen", "Muse"]);
        let found = matcher.find_match(["Muse", "Queen - Innuendo"]);
        assert_eq!(found, Some("Muse"));
    }

    #[test]
    fn test_find_match_target_order_breaks_ties() {
        let matcher = NameMatcher::new(["Daft Punk", "Punk"]);
        assert_eq!(matcher.find_match(["daft punk - one more time"]), Some("Daft Punk"));

        let matcher = NameMatcher::new(["Punk", "Daft Punk"]);
        assert_eq!(matcher.find_match(["daft punk - one more time"]), Some("Punk"));
    }

    #[test]
    fn test_find_match_none() {
        let matcher = NameMatcher::new(["Queen"]);
        assert_eq!(matcher.find_match(["Muse", "Albums", "Absolution"]), None);
        assert_eq!(matcher.find_match(Vec::<String>::new()), None);

        let empty = NameMatcher::default();
        assert!(empty.is_empty());
        assert_eq!(empty.find_match(["Queen"]), None);
    }
}
