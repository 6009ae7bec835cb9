//! Awaiter selection - which awaiters run for an invocation
//!
//! Starts from a default skip list, then applies `--skip`, `--include` and
//! `--only` in that order.
//!
//! # Example
//!
//! ```
//! use gem_await::awaiters::{AwaiterKind, AwaiterSelection};
//!
//! let mut selection = AwaiterSelection::default();
//! selection.only(AwaiterKind::Gems).only(AwaiterKind::Versions);
//!
//! assert_eq!(
//!     selection.resolve(),
//!     vec![AwaiterKind::Versions, AwaiterKind::Gems]
//! );
//! ```

use super::AwaiterKind;
use crate::core::error::AwaitError;
use std::collections::BTreeSet;

/// Awaiters skipped unless explicitly included
///
/// The legacy indexes are Marshal encoded and the dependency API is being
/// retired on rubygems.org, so none of them run by default.
pub const DEFAULT_SKIP: [AwaiterKind; 3] = [
    AwaiterKind::FullIndex,
    AwaiterKind::PrereleaseIndex,
    AwaiterKind::DependencyApi,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwaiterSelection {
    skip: BTreeSet<AwaiterKind>,
    only: Option<BTreeSet<AwaiterKind>>,
}

impl Default for AwaiterSelection {
    fn default() -> Self {
        Self {
            skip: DEFAULT_SKIP.into_iter().collect(),
            only: None,
        }
    }
}

impl AwaiterSelection {
    /// Selection whose skip list replaces the default one
    pub fn with_skip_list<I>(skip: I) -> Self
    where
        I: IntoIterator<Item = AwaiterKind>,
    {
        Self {
            skip: skip.into_iter().collect(),
            only: None,
        }
    }

    /// Build a selection from awaiter names as given on the command line
    ///
    /// `base_skip` replaces [`DEFAULT_SKIP`] when present.
    pub fn from_names(
        base_skip: Option<&[String]>,
        skip: &[String],
        include: &[String],
        only: &[String],
    ) -> Result<Self, AwaitError> {
        let mut selection = match base_skip {
            Some(names) => Self::with_skip_list(parse_all(names)?),
            None => Self::default(),
        };

        for kind in parse_all(skip)? {
            selection.skip(kind);
        }
        for kind in parse_all(include)? {
            selection.include(kind);
        }
        for kind in parse_all(only)? {
            selection.only(kind);
        }

        Ok(selection)
    }

    pub fn skip(&mut self, kind: AwaiterKind) -> &mut Self {
        self.skip.insert(kind);
        self
    }

    /// Do not skip the given awaiter
    pub fn include(&mut self, kind: AwaiterKind) -> &mut Self {
        self.skip.remove(&kind);
        self
    }

    /// Run only the given awaiters (cumulative); also un-skips it
    pub fn only(&mut self, kind: AwaiterKind) -> &mut Self {
        self.only.get_or_insert_with(BTreeSet::new).insert(kind);
        self.skip.remove(&kind);
        self
    }

    /// Selected awaiters in launch order
    pub fn resolve(&self) -> Vec<AwaiterKind> {
        AwaiterKind::ALL
            .into_iter()
            .filter(|kind| self.only.as_ref().is_none_or(|only| only.contains(kind)))
            .filter(|kind| !self.skip.contains(kind))
            .collect()
    }
}

fn parse_all(names: &[String]) -> Result<Vec<AwaiterKind>, AwaitError> {
    names.iter().map(|name| name.parse()).collect()
}
