use std::collections::HashMap;

use common::MediaRecord;
use serde::{Deserialize, Serialize};

/// Which fields take part in a record comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPolicy {
    /// Compare title and artist.
    pub match_tags: bool,
    pub match_filename: bool,
}

/// Dice coefficient over character bigrams, in `[0, 1]`.
///
/// Both inputs are reduced to their ASCII letters and digits and upper-cased
/// first. Equal reductions (including two empty ones) score 1; otherwise a
/// reduction shorter than two characters scores 0. Each bigram of `b`
/// consumes at most one matching occurrence from `a`.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let first = normalize(a);
    let second = normalize(b);

    if first == second {
        return 1.0;
    }
    if first.len() < 2 || second.len() < 2 {
        return 0.0;
    }

    let mut first_bigrams: HashMap<[u8; 2], usize> = HashMap::new();
    for pair in first.windows(2) {
        *first_bigrams.entry([pair[0], pair[1]]).or_insert(0) += 1;
    }

    let mut matches = 0usize;
    for pair in second.windows(2) {
        if let Some(count) = first_bigrams.get_mut(&[pair[0], pair[1]]) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }

    (2 * matches) as f64 / (first.len() + second.len() - 2) as f64
}

fn normalize(value: &str) -> Vec<u8> {
    value
        .bytes()
        .filter(u8::is_ascii_alphanumeric)
        .map(|b| b.to_ascii_uppercase())
        .collect()
}

/// Mean of the field similarities the policy selects. A field is compared
/// only when both records carry a non-empty value for it; with nothing to
/// compare the result is 0.
pub fn record_similarity(a: &MediaRecord, b: &MediaRecord, policy: MatchPolicy) -> f64 {
    compared_similarity(a, b, policy).unwrap_or(0.0)
}

/// Like [`record_similarity`], but `None` when no field could be compared.
pub fn compared_similarity(a: &MediaRecord, b: &MediaRecord, policy: MatchPolicy) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    let mut push = |left: &Option<String>, right: &Option<String>| {
        if let (Some(left), Some(right)) = (present(left), present(right)) {
            total += string_similarity(left, right);
            count += 1;
        }
    };

    if policy.match_tags {
        push(&a.title, &b.title);
        push(&a.artist, &b.artist);
    }
    if policy.match_filename {
        push(&a.filename, &b.filename);
    }

    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
