use crate::feeds::Post;
use std::collections::{HashSet, VecDeque};

/// Ids of recently shown posts. Capacity-bounded: once full, the oldest
/// id is forgotten to make room. Timelines only page a few dozen items
/// back, so an evicted id is not expected to come around again.
#[derive(Debug)]
pub struct SeenIds {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl SeenIds {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns false if the id was already known.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    /// Keep the posts not seen before (and with a non-empty body), mark
    /// them seen and return them oldest first. `candidates` is expected
    /// newest first, as the timeline delivers it.
    pub fn filter_new(&mut self, candidates: Vec<Post>) -> Vec<Post> {
        let mut fresh = Vec::new();
        for post in candidates {
            if post.text.trim().is_empty() || self.contains(&post.id) {
                continue;
            }
            self.insert(&post.id);
            fresh.push(post);
        }
        fresh.reverse();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn post(id: &str, text: &str) -> Post {
        Post {
            id: id.to_string(),
            author: "Alice".to_string(),
            handle: "@alice.test".to_string(),
            text: text.to_string(),
            created_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap(),
            reposted_by: None,
        }
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_new_posts_come_out_oldest_first() {
        let mut seen = SeenIds::new(100);
        let fresh = seen.filter_new(vec![post("p3", "c"), post("p2", "b"), post("p1", "a")]);
        assert_eq!(ids(&fresh), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_same_batch_twice_emits_nothing() {
        let mut seen = SeenIds::new(100);
        let batch = vec![post("p2", "b"), post("p1", "a")];
        assert_eq!(seen.filter_new(batch.clone()).len(), 2);
        assert!(seen.filter_new(batch).is_empty());
    }

    #[test]
    fn test_only_unseen_in_mixed_batch() {
        let mut seen = SeenIds::new(100);
        seen.filter_new(vec![post("p1", "a")]);
        let fresh = seen.filter_new(vec![post("p3", "c"), post("p2", "b"), post("p1", "a")]);
        assert_eq!(ids(&fresh), vec!["p2", "p3"]);
    }

    #[test]
    fn test_empty_body_is_not_marked_seen() {
        let mut seen = SeenIds::new(100);
        assert!(seen.filter_new(vec![post("p1", "   ")]).is_empty());
        assert!(!seen.contains("p1"));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_duplicate_ids_within_batch() {
        let mut seen = SeenIds::new(100);
        let fresh = seen.filter_new(vec![post("p1", "a"), post("p1", "a")]);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut seen = SeenIds::new(2);
        assert!(seen.insert("a"));
        assert!(seen.insert("b"));
        assert!(!seen.insert("b"));
        assert!(seen.insert("c"));
        assert_eq!(seen.len(), 2);
        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("c"));
    }
}
