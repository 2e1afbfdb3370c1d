//! Fuzzy tool-name suggestions for `use_tool`/`get_tool_help` on unknown names
//! (spec.md §2 "fuzzy matcher").
//!
//! Scoring: substring match +3, prefix match (len ≥ 3) +2, Levenshtein
//! distance ≤ 2 +1. Candidates with a positive score are sorted by score
//! descending, then by name ascending for stability, and truncated to 5.

/// Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

fn score(query: &str, candidate: &str) -> i32 {
    let mut s = 0;
    if candidate.contains(query) {
        s += 3;
    }
    if query.len() >= 3 && candidate.starts_with(query) {
        s += 2;
    }
    if levenshtein(query, candidate) <= 2 {
        s += 1;
    }
    s
}

/// Returns up to 5 suggested tool names for an unknown `query`, scored against
/// `candidates`. Stable: ties break by name ascending.
pub fn suggest_names(query: &str, candidates: &[String]) -> Vec<String> {
    let mut scored: Vec<(i32, &String)> = candidates
        .iter()
        .map(|c| (score(query, c), c))
        .filter(|(s, _)| *s > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(5).map(|(_, name)| name.clone()).collect()
}
