//! Ordered id set for membership tests during playlist mutation

use std::collections::BTreeSet;

/// Set of media ids returned by a query
///
/// Built once per operation and dropped with it. Duplicate ids collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedIdSet {
    ids: BTreeSet<u32>,
}

impl MatchedIdSet {
    pub fn build<I: IntoIterator<Item = u32>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<u32> for MatchedIdSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::build(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Duplicates collapse and membership is exact
    #[test]
    fn test_build_and_contains() {
        let set = MatchedIdSet::build([3, 1, 2, 1]);
        let found: Vec<bool> = [1, 2, 3, 4].iter().map(|id| set.contains(*id)).collect();
        assert_eq!(found, vec![true, true, true, false]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_empty() {
        let set = MatchedIdSet::build(Vec::new());
        assert!(set.is_empty());
        assert!(!set.contains(0));
    }

    #[test]
    fn test_iter_is_sorted() {
        let set: MatchedIdSet = vec![9, 4, 7, 4].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![4, 7, 9]);
    }
}
