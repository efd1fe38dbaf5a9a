// ABOUTME: Text folding and similarity helpers for slang terms
// ABOUTME: Every comparison between terms goes through normalize_text first

/// Fold a slang expression into its comparison form.
///
/// Lowercases (Unicode-aware), trims, and collapses every internal run of
/// whitespace into a single ASCII space. "  Hella   FRESH " becomes
/// "hella fresh".
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Levenshtein distance between two strings, counted in Unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single rolling row over `b`
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;

        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }

    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Yeet", "yeet")]
    #[case("  yeet  ", "yeet")]
    #[case("Hella   Fresh", "hella fresh")]
    #[case("no\tcap\n", "no cap")]
    #[case("ÜBER", "über")]
    #[case("   ", "")]
    fn test_normalize_text(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_text(input), expected);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_text("  Bet   BET ");
        assert_eq!(normalize_text(&once), once);
    }

    #[rstest]
    #[case("yeet", "yeet", 0)]
    #[case("yeet", "yeat", 1)]
    #[case("yeet", "yeets", 1)]
    #[case("", "rizz", 4)]
    #[case("rizz", "", 4)]
    #[case("kitten", "sitting", 3)]
    #[case("café", "cafe", 1)]
    fn test_edit_distance(#[case] a: &str, #[case] b: &str, #[case] expected: usize) {
        assert_eq!(edit_distance(a, b), expected);
    }

    #[test]
    fn test_edit_distance_is_symmetric() {
        assert_eq!(edit_distance("drip", "dripping"), edit_distance("dripping", "drip"));
    }
}
