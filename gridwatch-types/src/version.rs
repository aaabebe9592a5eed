//! Configuration schema versioning.

use crate::SCHEMA_VERSION;

/// Schema version declared at the top of a dashboard file.
///
/// Dashboards carry their version as a string (`"v1"`). Only the major
/// component is meaningful; loaders reject anything that is not compatible
/// with the version this library understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaVersion {
    /// Major version - breaking changes increment this.
    pub major: u32,
}

impl SchemaVersion {
    /// Create a new schema version.
    pub const fn new(major: u32) -> Self {
        Self { major }
    }

    /// The current schema version used by this library.
    pub const fn current() -> Self {
        Self {
            major: SCHEMA_VERSION,
        }
    }

    /// Parse a version string such as `"v1"` or `"V1"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let digits = s.strip_prefix('v').or_else(|| s.strip_prefix('V'))?;
        digits.parse().ok().map(Self::new)
    }

    /// Check if this version is compatible with the current library version.
    pub fn is_compatible(&self) -> bool {
        self.major == SCHEMA_VERSION
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.major)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(SchemaVersion::parse("v1"), Some(SchemaVersion::new(1)));
        assert_eq!(SchemaVersion::parse("V1"), Some(SchemaVersion::new(1)));
        assert_eq!(SchemaVersion::parse("1"), None);
        assert_eq!(SchemaVersion::parse("vx"), None);
    }

    #[test]
    fn test_compatibility() {
        assert!(SchemaVersion::current().is_compatible());
        assert!(!SchemaVersion::new(2).is_compatible());
        assert_eq!(SchemaVersion::current().to_string(), "v1");
    }
}
