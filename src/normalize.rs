/// Normalize a string for comparison
///
/// Lowercases and keeps alphanumeric characters (Unicode aware). Whitespace
/// separates words; punctuation is dropped, so `"Ab!c"` becomes `"abc"`.
/// Runs of whitespace collapse into a single space and the result has no
/// leading or trailing whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized text with the spaces removed, used for containment checks
/// that ignore word boundaries.
pub fn compact(normalized: &str) -> String {
    normalized.chars().filter(|c| *c != ' ').collect()
}

/// True when `candidate` names `target`: equal after normalization, or the
/// normalized target appears inside the normalized candidate. An empty target
/// matches everything.
pub fn names_overlap(target: &str, candidate: &str) -> bool {
    let target = normalize(target);
    if target.is_empty() {
        return true;
    }
    let candidate = normalize(candidate);
    !candidate.is_empty() && (candidate == target || candidate.contains(&target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Ab!c  Def"), "abc def");
        assert_eq!(normalize("  Multiple   Spaces  "), "multiple spaces");
        assert_eq!(normalize("AC/DC - Back_In_Black"), "acdc backinblack");
        assert_eq!(normalize("Don't Stop Me Now"), "dont stop me now");
        assert_eq!(normalize("tab\tand\nnewline"), "tab and newline");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  !!! ... "), "");
    }

    #[test]
    fn test_normalize_keeps_non_ascii_letters() {
        assert_eq!(normalize("Björk – Jóga"), "björk jóga");
        assert_eq!(normalize("宇多田ヒカル"), "宇多田ヒカル");
        assert_eq!(normalize("Motörhead!"), "motörhead");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in [
            "Ab!c  Def",
            "The Beatles - Revolution (Remastered 2009).mp3",
            "  Sigur Rós / ( ) ",
            "ÉCOLE   d'été",
            "",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_compact() {
        assert_eq!(compact("the beatles"), "thebeatles");
        assert_eq!(compact(""), "");
    }

    #[test]
    fn test_names_overlap() {
        assert!(names_overlap("Daft Punk", "daft punk"));
        assert!(names_overlap("Punk", "Daft Punk"));
        assert!(names_overlap("", "Anyone"));
        assert!(!names_overlap("Justice", "Daft Punk"));
        assert!(!names_overlap("Justice", ""));
    }
}
