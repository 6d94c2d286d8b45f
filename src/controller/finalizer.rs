//! # Counting Finalizer
//!
//! Finalizer tags have the form `<prefix><N>`. Each consumer sharing a prefix
//! increments the counter when it registers interest in a secret and
//! decrements it once its cleanup is done. The tag disappears, and with it the
//! deletion block, when the counter reaches zero.
//!
//! All operations work on a copy of the finalizer list; the caller patches the
//! result back to the cluster.

use crate::constants::{
    DEFAULT_FINALIZER_BASE, DEFAULT_FINALIZER_PREFIX, FINALIZER_COUNTER_WIDTH,
    MAX_FINALIZER_LENGTH,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizerCoordinator {
    prefix: String,
}

impl FinalizerCoordinator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Prefix scoped to one instance: `secret-file-provider.io/<instance>-`.
    ///
    /// Long instance names are cut from the front so the tag including its
    /// counter stays within the Kubernetes name limit. Pod names usually end in
    /// their unique suffix, which is the part worth keeping.
    pub fn for_instance(instance: &str) -> Self {
        let instance = instance.trim();
        if instance.is_empty() {
            return Self::new(DEFAULT_FINALIZER_PREFIX);
        }

        let budget = MAX_FINALIZER_LENGTH - FINALIZER_COUNTER_WIDTH - DEFAULT_FINALIZER_BASE.len() - 1;
        let skip = instance.len().saturating_sub(budget);
        let tail = instance
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| i >= skip)
            .map_or("", |i| &instance[i..]);
        Self::new(format!("{DEFAULT_FINALIZER_BASE}{tail}-"))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Current counter, `None` when no tag with this prefix is present.
    /// Tags whose suffix is not a number are ignored.
    pub fn count(&self, finalizers: &[String]) -> Option<u32> {
        finalizers
            .iter()
            .filter_map(|f| f.strip_prefix(&self.prefix))
            .find_map(|n| n.parse().ok())
    }

    pub fn is_registered(&self, finalizers: &[String]) -> bool {
        self.count(finalizers).is_some()
    }

    pub fn increment(&self, finalizers: &[String]) -> Vec<String> {
        let next = self.count(finalizers).map_or(1, |n| n.saturating_add(1));
        let mut out = self.without_tag(finalizers);
        out.push(self.tag(next));
        out
    }

    pub fn decrement(&self, finalizers: &[String]) -> Vec<String> {
        match self.count(finalizers) {
            None => finalizers.to_vec(),
            Some(n) if n <= 1 => self.without_tag(finalizers),
            Some(n) => {
                let mut out = self.without_tag(finalizers);
                out.push(self.tag(n - 1));
                out
            }
        }
    }

    /// Registers once: increments only when no tag with this prefix exists yet,
    /// so repeated reconciles of the same object do not inflate the counter.
    /// Returns `None` when nothing needs to change.
    pub fn ensure(&self, finalizers: &[String]) -> Option<Vec<String>> {
        (!self.is_registered(finalizers)).then(|| self.increment(finalizers))
    }

    fn tag(&self, n: u32) -> String {
        format!("{}{n}", self.prefix)
    }

    fn without_tag(&self, finalizers: &[String]) -> Vec<String> {
        let current = self.count(finalizers).map(|n| self.tag(n));
        finalizers
            .iter()
            .filter(|f| Some(*f) != current.as_ref())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_increment_decrement_sequence() {
        let coordinator = FinalizerCoordinator::new("test");

        let once = coordinator.increment(&[]);
        assert_eq!(once, tags(&["test1"]));
        let twice = coordinator.increment(&once);
        assert_eq!(twice, tags(&["test2"]));
        let back = coordinator.decrement(&twice);
        assert_eq!(back, tags(&["test1"]));
        assert!(coordinator.decrement(&back).is_empty());
    }

    #[test]
    fn test_invalid_suffix_is_ignored() {
        let coordinator = FinalizerCoordinator::new("test");
        assert_eq!(
            coordinator.increment(&tags(&["testfoo"])),
            tags(&["testfoo", "test1"])
        );
    }

    #[test]
    fn test_decrement_missing_is_noop() {
        let coordinator = FinalizerCoordinator::new("test");
        assert!(coordinator.decrement(&[]).is_empty());
        assert_eq!(coordinator.decrement(&tags(&["other/1"])), tags(&["other/1"]));
    }

    #[test]
    fn test_other_finalizers_are_preserved() {
        let coordinator = FinalizerCoordinator::new("a/");
        assert_eq!(
            coordinator.increment(&tags(&["kubernetes", "a/3"])),
            tags(&["kubernetes", "a/4"])
        );
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let coordinator = FinalizerCoordinator::new("a/");
        let registered = coordinator.ensure(&[]).unwrap();
        assert_eq!(registered, tags(&["a/1"]));
        assert_eq!(coordinator.ensure(&registered), None);
    }

    #[test]
    fn test_instance_prefix() {
        assert_eq!(
            FinalizerCoordinator::for_instance("app-7d9f").prefix(),
            "secret-file-provider.io/app-7d9f-"
        );
        assert_eq!(
            FinalizerCoordinator::for_instance("").prefix(),
            DEFAULT_FINALIZER_PREFIX
        );

        let long = format!("{}-tail", "x".repeat(80));
        let coordinator = FinalizerCoordinator::for_instance(&long);
        assert!(coordinator.prefix().ends_with("-tail-"));
        assert_eq!(
            coordinator.prefix().len() + FINALIZER_COUNTER_WIDTH,
            MAX_FINALIZER_LENGTH
        );
    }
}
