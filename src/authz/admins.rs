use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::Arc;

/// The set of subjects that bypass every tuple-based check.
///
/// Replaced wholesale on reload; readers always hold one complete snapshot.
#[derive(Debug)]
pub struct AdminRegistry {
    admins: ArcSwap<HashSet<String>>,
}

impl AdminRegistry {
    pub fn new() -> Self {
        Self {
            admins: ArcSwap::from_pointee(HashSet::new()),
        }
    }

    pub fn from_csv(csv: &str) -> Self {
        Self {
            admins: ArcSwap::from_pointee(parse_csv(csv)),
        }
    }

    /// Swap in the admins listed in `csv`. Returns the size of the new set.
    pub fn reload(&self, csv: &str) -> usize {
        let next = parse_csv(csv);
        let count = next.len();
        self.admins.store(Arc::new(next));
        count
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.admins.load().contains(subject)
    }

    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        self.admins.load_full()
    }
}

impl Default for AdminRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Split on commas, trim each entry and drop the empty ones.
pub fn parse_csv(csv: &str) -> HashSet<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_trims_and_drops_empty() {
        let parsed = parse_csv("userA, userB,   ");
        let expected: HashSet<String> = ["userA", "userB"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parsed, expected);

        assert!(parse_csv("").is_empty());
        assert!(parse_csv(" , ,").is_empty());
        assert_eq!(parse_csv("a,a, a").len(), 1);
    }

    #[test]
    fn test_reload_replaces_instead_of_merging() {
        let registry = AdminRegistry::from_csv("root");
        assert!(registry.contains("root"));

        assert_eq!(registry.reload("alice,bob"), 2);
        assert!(!registry.contains("root"));
        assert!(registry.contains("alice"));
        assert!(registry.contains("bob"));
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let registry = AdminRegistry::from_csv("root");
        let before = registry.snapshot();
        registry.reload("alice");

        assert!(before.contains("root"));
        assert!(registry.snapshot().contains("alice"));
    }
}
