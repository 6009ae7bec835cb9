//! Parsers for the compact index text formats
//!
//! ```text
//! /names           /versions                          /info/rack
//! ---              created_at: 2024-01-01T00:00:00Z   ---
//! rack             ---                                3.0.0 |checksum:abc
//! rails            rack 3.0.0,3.0.1 0123abcd          3.0.1-java |checksum:def
//! ```

use crate::core::package::PackageIdentifier;

/// Lines after the `---` separator, or every line if there is none
fn body_lines(body: &str) -> impl Iterator<Item = &str> {
    let content = match body.split_once("---\n") {
        Some((_, rest)) => rest,
        None => body.strip_prefix("---").unwrap_or(body),
    };
    content.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Split `1.0.0-x86_64-linux` into version and platform
pub fn split_version_platform(entry: &str) -> (&str, Option<&str>) {
    match entry.split_once('-') {
        Some((version, platform)) => (version, Some(platform)),
        None => (entry, None),
    }
}

pub fn parse_names(body: &str) -> Vec<String> {
    body_lines(body).map(str::to_string).collect()
}

/// Versions of `name` in the versions file, with yanked entries removed
///
/// A name may appear on several lines; later lines append versions, and
/// entries prefixed with `-` yank a previously listed version.
pub fn parse_versions(body: &str, name: &str) -> Vec<PackageIdentifier> {
    let mut listed: Vec<PackageIdentifier> = Vec::new();

    for line in body_lines(body) {
        let mut fields = line.split_whitespace();
        if fields.next() != Some(name) {
            continue;
        }
        let Some(versions) = fields.next() else {
            continue;
        };

        for entry in versions.split(',').filter(|e| !e.is_empty()) {
            let (yanked, entry) = match entry.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, entry),
            };
            let (version, platform) = split_version_platform(entry);
            let id = PackageIdentifier::new(name, version, platform);
            if yanked {
                listed.retain(|existing| existing != &id);
            } else if !listed.contains(&id) {
                listed.push(id);
            }
        }
    }

    listed
}

/// Versions listed in `/info/<name>`
pub fn parse_info(body: &str, name: &str) -> Vec<PackageIdentifier> {
    body_lines(body)
        .filter_map(|line| line.split_whitespace().next())
        .map(|entry| {
            let (version, platform) = split_version_platform(entry);
            PackageIdentifier::new(name, version, platform)
        })
        .collect()
}
