//! Reference counts keyed by name.

use std::collections::BTreeMap;

/// Outcome of releasing one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The count reached zero and the name was removed.
    Last,
    /// References remain.
    Remaining(usize),
    /// The name was not held. Nothing changed.
    NotHeld,
}

/// Named reference counts. A name with count zero is absent.
///
/// Not synchronized; the owner keeps it behind its own lock so that the
/// count change and the resulting wire message happen together.
#[derive(Debug, Clone, Default)]
pub struct RefCounts {
    counts: BTreeMap<String, usize>,
}

impl RefCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference. Returns true on the 0→1 transition.
    pub fn acquire(&mut self, name: &str) -> bool {
        let count = self.counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Drop a reference.
    pub fn release(&mut self, name: &str) -> Release {
        match self.counts.get_mut(name) {
            None => Release::NotHeld,
            Some(count) if *count <= 1 => {
                self.counts.remove(name);
                Release::Last
            }
            Some(count) => {
                *count -= 1;
                Release::Remaining(*count)
            }
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Names with a nonzero count, sorted.
    pub fn names(&self) -> Vec<String> {
        self.counts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_and_last_transitions() {
        let mut counts = RefCounts::new();
        assert!(counts.acquire("device:42"));
        assert!(!counts.acquire("device:42"));
        assert_eq!(counts.count("device:42"), 2);

        assert_eq!(counts.release("device:42"), Release::Remaining(1));
        assert_eq!(counts.release("device:42"), Release::Last);
        assert_eq!(counts.count("device:42"), 0);
        assert!(counts.is_empty());
    }

    #[test]
    fn test_release_unheld_never_goes_negative() {
        let mut counts = RefCounts::new();
        assert_eq!(counts.release("device:7"), Release::NotHeld);
        assert_eq!(counts.count("device:7"), 0);
        assert!(counts.acquire("device:7"));
    }

    #[test]
    fn test_names_sorted() {
        let mut counts = RefCounts::new();
        counts.acquire("device:9");
        counts.acquire("device:10");
        counts.acquire("device:9");
        assert_eq!(counts.names(), vec!["device:10", "device:9"]);
        assert_eq!(counts.len(), 2);
    }
}
