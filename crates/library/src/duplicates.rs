use std::collections::HashSet;

use common::MediaRecord;
use serde::{Deserialize, Serialize};

use crate::similarity::{compared_similarity, MatchPolicy};

/// Records judged to be copies of each other, in catalog order. Always holds
/// at least two records.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DuplicateGroup {
    pub records: Vec<MediaRecord>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|record| record.id.as_str()).collect()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStrategy {
    /// Each ungrouped record, in catalog order, becomes a pivot and takes every
    /// later ungrouped record that matches it. Members are never compared
    /// with each other, so a group is a star around its pivot.
    #[default]
    Star,
    /// Any matching pair ends up in the same group, transitively.
    Connected,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DuplicateOptions {
    /// Minimum record similarity, inclusive.
    pub threshold: f64,
    pub policy: MatchPolicy,
    pub strategy: ClusterStrategy,
}

impl DuplicateOptions {
    pub fn new(threshold: f64, policy: MatchPolicy) -> Self {
        Self {
            threshold,
            policy,
            strategy: ClusterStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: ClusterStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Partitions `records` into duplicate groups. Records matching nothing are
/// left out. Quadratic in the catalog size.
pub fn find_duplicates(records: &[MediaRecord], options: &DuplicateOptions) -> Vec<DuplicateGroup> {
    match options.strategy {
        ClusterStrategy::Star => star_groups(records, options),
        ClusterStrategy::Connected => connected_groups(records, options),
    }
}

fn star_groups(records: &[MediaRecord], options: &DuplicateOptions) -> Vec<DuplicateGroup> {
    let mut grouped: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();

    for (i, pivot) in records.iter().enumerate() {
        if grouped.contains(pivot.id.as_str()) {
            continue;
        }
        grouped.insert(pivot.id.as_str());
        let mut members = vec![pivot.clone()];

        for candidate in &records[i + 1..] {
            if grouped.contains(candidate.id.as_str()) {
                continue;
            }
            if is_match(pivot, candidate, options) {
                grouped.insert(candidate.id.as_str());
                members.push(candidate.clone());
            }
        }

        if members.len() > 1 {
            groups.push(DuplicateGroup { records: members });
        }
    }

    groups
}

fn connected_groups(records: &[MediaRecord], options: &DuplicateOptions) -> Vec<DuplicateGroup> {
    let mut parents: Vec<usize> = (0..records.len()).collect();

    for i in 0..records.len() {
        for j in i + 1..records.len() {
            if find_root(&mut parents, i) == find_root(&mut parents, j) {
                continue;
            }
            if is_match(&records[i], &records[j], options) {
                let (a, b) = (find_root(&mut parents, i), find_root(&mut parents, j));
                // Smaller index wins so a root is always its group's first record.
                parents[a.max(b)] = a.min(b);
            }
        }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    for i in 0..records.len() {
        let root = find_root(&mut parents, i);
        members[root].push(i);
    }

    members
        .into_iter()
        .filter(|indexes| indexes.len() > 1)
        .map(|indexes| DuplicateGroup {
            records: indexes.into_iter().map(|i| records[i].clone()).collect(),
        })
        .collect()
}

/// Pairs with no comparable field never match, whatever the threshold.
fn is_match(a: &MediaRecord, b: &MediaRecord, options: &DuplicateOptions) -> bool {
    compared_similarity(a, b, options.policy)
        .map(|score| score >= options.threshold)
        .unwrap_or(false)
}

fn find_root(parents: &mut [usize], mut node: usize) -> usize {
    while parents[node] != node {
        parents[node] = parents[parents[node]];
        node = parents[node];
    }
    node
}

#[cfg(test)]
mod tests {
    use super::{find_duplicates, ClusterStrategy, DuplicateOptions};
    use crate::similarity::MatchPolicy;
    use common::MediaRecord;

    const TAGS: MatchPolicy = MatchPolicy {
        match_tags: true,
        match_filename: false,
    };

    fn song(id: &str, title: &str, artist: &str) -> MediaRecord {
        let mut record = MediaRecord::bare(id, format!("/lib/{}.mp3", id));
        record.title = Some(title.to_string());
        record.artist = Some(artist.to_string());
        record
    }

    fn titled(id: &str, title: &str) -> MediaRecord {
        let mut record = MediaRecord::bare(id, format!("/lib/{}.mp3", id));
        record.title = Some(title.to_string());
        record
    }

    #[test]
    fn groups_similar_records_and_drops_singletons() {
        let records = vec![
            song("1", "Yesterday", "The Beatles"),
            song("2", "Bohemian Rhapsody", "Queen"),
            song("3", "Yesterday (Remastered)", "Beatles"),
            song("4", "Yesterday", "The Beatles"),
            song("5", "Under Pressure", "Queen"),
        ];
        let groups = find_duplicates(&records, &DuplicateOptions::new(0.6, TAGS));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids(), vec!["1", "3", "4"]);
        assert!(groups.iter().all(|group| group.len() >= 2));
    }

    #[test]
    fn threshold_one_requires_identical_normalized_tags() {
        let records = vec![
            song("1", "Hey Jude", "The Beatles"),
            song("2", "hey-jude", "the beatles!"),
            song("3", "Hey Jude", "Beatles"),
            song("4", "Hey Jud", "The Beatles"),
        ];
        let groups = find_duplicates(&records, &DuplicateOptions::new(1.0, TAGS));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids(), vec!["1", "2"]);
    }

    #[test]
    fn disabled_policy_finds_nothing() {
        let records = vec![song("1", "Same", "Same"), song("2", "Same", "Same")];
        let none = MatchPolicy {
            match_tags: false,
            match_filename: false,
        };
        assert!(find_duplicates(&records, &DuplicateOptions::new(0.0, none)).is_empty());
    }

    #[test]
    fn zero_threshold_still_needs_comparable_fields() {
        let bare = MediaRecord::bare("2", "/lib/2.mp3");
        let records = vec![song("1", "Title", "Artist"), bare, song("3", "Other", "Band")];
        let groups = find_duplicates(&records, &DuplicateOptions::new(0.0, TAGS));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids(), vec!["1", "3"]);
    }

    // AB~ABC and ABC~BC match, AB and BC do not.
    fn chain() -> Vec<MediaRecord> {
        vec![
            titled("bc", "bcde"),
            titled("abc", "abcde"),
            titled("ab", "abcd"),
        ]
    }

    #[test]
    fn star_grouping_is_not_transitive() {
        // bcde~abcde: 3 shared of 7 -> 0.857; bcde~abcd: 2 shared of 6 -> 0.667;
        // abcde~abcd: 3 shared of 7 -> 0.857.
        let options = DuplicateOptions::new(0.8, TAGS);
        let groups = find_duplicates(&chain(), &options);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids(), vec!["bc", "abc"]);
    }

    #[test]
    fn star_members_join_first_matching_pivot() {
        let records = vec![titled("p", "abcd"), titled("q", "abcde"), titled("r", "bcde")];
        // p~q 0.857, p~r 0.667, q~r 0.857: q is taken by p, r is left alone.
        let groups = find_duplicates(&records, &DuplicateOptions::new(0.8, TAGS));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids(), vec!["p", "q"]);
    }

    #[test]
    fn connected_grouping_follows_chains() {
        let options = DuplicateOptions::new(0.8, TAGS).with_strategy(ClusterStrategy::Connected);
        let groups = find_duplicates(&chain(), &options);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids(), vec!["bc", "abc", "ab"]);

        let records = vec![titled("p", "abcd"), titled("q", "abcde"), titled("r", "bcde")];
        let groups = find_duplicates(&records, &options);
        assert_eq!(groups[0].ids(), vec!["p", "q", "r"]);
    }

    #[test]
    fn connected_groups_keep_catalog_order() {
        let records = vec![
            song("1", "Alpha", "X"),
            song("2", "Omega", "Y"),
            song("3", "Alpha", "X"),
            song("4", "Omega", "Y"),
        ];
        let options = DuplicateOptions::new(1.0, TAGS).with_strategy(ClusterStrategy::Connected);
        let groups = find_duplicates(&records, &options);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].ids(), vec!["1", "3"]);
        assert_eq!(groups[1].ids(), vec!["2", "4"]);
    }

    #[test]
    fn empty_catalog_has_no_groups() {
        let options = DuplicateOptions::new(0.5, TAGS);
        assert!(find_duplicates(&[], &options).is_empty());
    }
}
