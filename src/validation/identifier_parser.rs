//! Identifier Parser - Parses `NAME:VERSION[:PLATFORM]` arguments
//!
//! Versions are checked against the RubyGems version grammar rather than
//! SemVer, so `2.0.0.pre.1` and `1.0` are valid.
//!
//! # Example
//!
//! ```
//! use gem_await::validation::identifier_parser::IdentifierParser;
//!
//! let parser = IdentifierParser::new();
//! let id = parser.parse("nokogiri:1.16.0:x86_64-linux").unwrap();
//!
//! assert_eq!(id.name(), "nokogiri");
//! assert_eq!(id.version(), "1.16.0");
//! assert_eq!(id.platform(), Some("x86_64-linux"));
//! ```

use crate::core::error::AwaitError;
use crate::core::package::PackageIdentifier;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VERSION_PATTERN: Regex =
        Regex::new(r"^\s*([0-9]+(\.[0-9a-zA-Z]+)*(-[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?)?\s*$")
            .expect("version pattern is valid");
}

/// Parser for package identifiers given on the command line
pub struct IdentifierParser;

impl Default for IdentifierParser {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierParser {
    pub fn new() -> Self {
        Self
    }

    /// Check a version string against the RubyGems version grammar
    ///
    /// # Examples
    ///
    /// ```
    /// use gem_await::validation::IdentifierParser;
    ///
    /// let parser = IdentifierParser::new();
    /// assert!(parser.is_valid_version("2.0.0.pre.1"));
    /// assert!(!parser.is_valid_version("one"));
    /// ```
    pub fn is_valid_version(&self, version: &str) -> bool {
        VERSION_PATTERN.is_match(version)
    }

    /// Parse one `NAME:VERSION[:PLATFORM]` argument
    ///
    /// Everything after the second `:` is the platform.
    pub fn parse(&self, input: &str) -> Result<PackageIdentifier, AwaitError> {
        let parts: Vec<&str> = input.splitn(3, ':').collect();
        let (name, version) = match parts.as_slice() {
            [name, version, ..] if !name.trim().is_empty() && !version.trim().is_empty() => {
                (name.trim(), version.trim())
            }
            _ => {
                return Err(AwaitError::InvalidIdentifier {
                    input: input.to_string(),
                });
            }
        };

        if !self.is_valid_version(version) {
            return Err(AwaitError::InvalidVersion {
                input: input.to_string(),
            });
        }

        Ok(PackageIdentifier::new(name, version, parts.get(2).copied()))
    }

    /// Parse every argument, failing on the first invalid one
    ///
    /// An empty argument list is an error as well; nothing is awaited unless
    /// all input is valid.
    pub fn parse_all<S: AsRef<str>>(&self, inputs: &[S]) -> Result<Vec<PackageIdentifier>, AwaitError> {
        let identifiers = inputs
            .iter()
            .map(|input| self.parse(input.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        if identifiers.is_empty() {
            return Err(AwaitError::NoIdentifiers);
        }

        Ok(identifiers)
    }
}
