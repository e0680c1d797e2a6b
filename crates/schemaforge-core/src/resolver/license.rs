//! Licensing gate for built-in supertypes and contracts.

use std::collections::HashSet;

/// Decides whether a built-in type may be used as a supertype or contract.
pub trait LicenseOracle: Send + Sync {
    /// Check if `type_name` is covered by the active license.
    fn is_licensed(&self, type_name: &str) -> bool;
}

/// License covering every type.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl LicenseOracle for AllowAll {
    fn is_licensed(&self, _type_name: &str) -> bool {
        true
    }
}

/// License covering a fixed set of type names.
#[derive(Debug, Clone, Default)]
pub struct StaticLicense {
    licensed: HashSet<String>,
}

impl StaticLicense {
    /// Create a license for the given names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            licensed: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl LicenseOracle for StaticLicense {
    fn is_licensed(&self, type_name: &str) -> bool {
        self.licensed.contains(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_license() {
        let license = StaticLicense::new(["Principal", "File"]);
        assert!(license.is_licensed("File"));
        assert!(!license.is_licensed("Image"));
        assert!(AllowAll.is_licensed("Image"));
    }
}
