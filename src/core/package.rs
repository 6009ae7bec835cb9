//! Package identifiers and the per-awaiter working set
//!
//! A [`PackageIdentifier`] names one published artifact. Platform markers that
//! mean "no platform" (absent, empty, `ruby`) are normalized away when the
//! identifier is built, so equality, hashing and ordering never see them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Platform value that is equivalent to "no platform"
const DEFAULT_PLATFORM: &str = "ruby";

/// (name, version, platform) triple identifying one published artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentifier {
    name: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<String>,
}

impl PackageIdentifier {
    /// Create an identifier, normalizing the platform
    ///
    /// # Examples
    ///
    /// ```
    /// use gem_await::core::PackageIdentifier;
    ///
    /// let a = PackageIdentifier::new("rack", "3.0.0", Some("ruby"));
    /// let b = PackageIdentifier::new("rack", "3.0.0", None);
    /// assert_eq!(a, b);
    /// assert_eq!(a.platform(), None);
    /// ```
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        platform: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            platform: normalize_platform(platform),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// `name-version` or `name-version-platform`
    pub fn full_name(&self) -> String {
        match &self.platform {
            Some(platform) => format!("{}-{}-{}", self.name, self.version, platform),
            None => format!("{}-{}", self.name, self.version),
        }
    }

    /// Heuristic prerelease check: any ASCII letter in the version
    pub fn is_prerelease(&self) -> bool {
        self.version.chars().any(|c| c.is_ascii_alphabetic())
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

fn normalize_platform(platform: Option<&str>) -> Option<String> {
    match platform.map(str::trim) {
        None | Some("") | Some(DEFAULT_PLATFORM) => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Identifiers an awaiter has not confirmed yet, grouped by package name
///
/// Flat awaiters simply ignore the grouping. There is deliberately no way to
/// add entries after construction: a run can only shrink the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingSet {
    groups: BTreeMap<String, BTreeSet<PackageIdentifier>>,
}

impl MissingSet {
    /// Group the given identifiers by name
    pub fn from_identifiers<'a, I>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = &'a PackageIdentifier>,
    {
        let mut groups: BTreeMap<String, BTreeSet<PackageIdentifier>> = BTreeMap::new();
        for id in identifiers {
            groups
                .entry(id.name().to_string())
                .or_default()
                .insert(id.clone());
        }
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of identifiers (not names) still missing
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    /// Missing package names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    /// Remove a confirmed identifier, returning whether it was missing
    pub fn remove(&mut self, id: &PackageIdentifier) -> bool {
        let Some(group) = self.groups.get_mut(id.name()) else {
            return false;
        };
        let removed = group.remove(id);
        if group.is_empty() {
            self.groups.remove(id.name());
        }
        removed
    }

    /// Remove every identifier for a confirmed name
    pub fn remove_name(&mut self, name: &str) -> Option<BTreeSet<PackageIdentifier>> {
        self.groups.remove(name)
    }

    /// Keep only identifiers matching the predicate
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&PackageIdentifier) -> bool,
    {
        self.groups.retain(|_, group| {
            group.retain(|id| keep(id));
            !group.is_empty()
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageIdentifier> {
        self.groups.values().flatten()
    }

    /// Snapshot of the missing identifiers in sorted order
    pub fn to_vec(&self) -> Vec<PackageIdentifier> {
        self.iter().cloned().collect()
    }

    pub fn into_identifiers(self) -> impl Iterator<Item = PackageIdentifier> {
        self.groups.into_values().flatten()
    }
}

impl fmt::Display for MissingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(PackageIdentifier::full_name).collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn id(name: &str, version: &str) -> PackageIdentifier {
        PackageIdentifier::new(name, version, None)
    }

    #[test]
    fn test_platform_normalization() {
        let none = PackageIdentifier::new("foo", "1.0.0", None);
        let empty = PackageIdentifier::new("foo", "1.0.0", Some(""));
        let ruby = PackageIdentifier::new("foo", "1.0.0", Some("ruby"));
        let java = PackageIdentifier::new("foo", "1.0.0", Some("java"));

        assert_eq!(none, empty);
        assert_eq!(none, ruby);
        assert_ne!(none, java);

        let set: HashSet<_> = [none, empty, ruby, java].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_full_name() {
        assert_eq!(id("foo", "1.0.0").full_name(), "foo-1.0.0");
        assert_eq!(
            PackageIdentifier::new("nokogiri", "1.16.0", Some("x86_64-linux")).full_name(),
            "nokogiri-1.16.0-x86_64-linux"
        );
    }

    #[test]
    fn test_is_prerelease() {
        assert!(!id("foo", "1.0.0").is_prerelease());
        assert!(id("foo", "2.0.0.pre.1").is_prerelease());
        assert!(id("foo", "1.0.0.RC1").is_prerelease());
        assert!(id("foo", "1.0.0-beta").is_prerelease());
    }

    #[test]
    fn test_missing_set_groups_by_name() {
        let ids = vec![id("foo", "1.0.0"), id("foo", "1.1.0"), id("bar", "0.1.0")];
        let missing = MissingSet::from_identifiers(&ids);

        assert_eq!(missing.len(), 3);
        assert_eq!(missing.names(), vec!["bar".to_string(), "foo".to_string()]);
        assert_eq!(missing.iter().filter(|id| id.name() == "foo").count(), 2);
    }

    #[test]
    fn test_missing_set_removal_drops_empty_groups() {
        let ids = vec![id("foo", "1.0.0"), id("bar", "0.1.0")];
        let mut missing = MissingSet::from_identifiers(&ids);

        assert!(missing.remove(&id("foo", "1.0.0")));
        assert!(!missing.remove(&id("foo", "1.0.0")));
        assert!(!missing.names().contains(&"foo".to_string()));
        assert_eq!(missing.names(), vec!["bar".to_string()]);

        assert!(missing.remove_name("bar").is_some());
        assert!(missing.is_empty());
    }

    #[test]
    fn test_missing_set_remove_matches_normalized_platform() {
        let ids = vec![PackageIdentifier::new("foo", "1.0.0", Some("ruby"))];
        let mut missing = MissingSet::from_identifiers(&ids);

        assert!(missing.remove(&PackageIdentifier::new("foo", "1.0.0", Some(""))));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_missing_set_retain() {
        let ids = vec![id("foo", "1.0.0"), id("foo", "2.0.0.pre.1")];
        let mut missing = MissingSet::from_identifiers(&ids);

        missing.retain(|id| !id.is_prerelease());

        assert_eq!(missing.to_vec(), vec![id("foo", "1.0.0")]);
    }

    #[test]
    fn test_missing_set_display() {
        let ids = vec![id("foo", "1.0.0"), id("bar", "0.1.0")];
        let missing = MissingSet::from_identifiers(&ids);

        assert_eq!(missing.to_string(), "bar-0.1.0, foo-1.0.0");
    }
}
