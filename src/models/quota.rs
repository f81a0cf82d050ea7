//! Per-type admission quotas, selectable by named profile.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::UrlType;

/// Names accepted by [`QuotaTable::for_profile`].
pub const PROFILES: [&str; 4] = ["balanced", "content", "ecommerce", "documentation"];

/// Cap on how many URLs of each type may ever be admitted.
///
/// `None` means the type is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaTable {
    limits: BTreeMap<UrlType, Option<usize>>,
}

impl QuotaTable {
    /// A table with no caps at all.
    pub fn unbounded() -> Self {
        Self {
            limits: UrlType::ALL.iter().map(|t| (*t, None)).collect(),
        }
    }

    /// Build the table for a named profile.
    pub fn for_profile(name: &str) -> Result<Self> {
        use UrlType::*;

        let caps: &[(UrlType, Option<usize>)] = match name {
            "balanced" => &[
                (Homepage, None),
                (Content, None),
                (Product, Some(500)),
                (Category, Some(100)),
                (Tag, Some(50)),
                (Archive, Some(50)),
                (Pagination, Some(50)),
                (Search, Some(10)),
                (Documentation, None),
                (Institutional, Some(50)),
                (Api, Some(5)),
                (Admin, Some(1)),
                (Unknown, Some(100)),
            ],
            "content" => &[
                (Homepage, None),
                (Content, None),
                (Product, Some(100)),
                (Category, Some(200)),
                (Tag, Some(200)),
                (Archive, Some(100)),
                (Pagination, Some(100)),
                (Search, Some(10)),
                (Documentation, None),
                (Institutional, Some(30)),
                (Api, Some(5)),
                (Admin, Some(1)),
                (Unknown, Some(100)),
            ],
            "ecommerce" => &[
                (Homepage, None),
                (Content, Some(300)),
                (Product, None),
                (Category, None),
                (Tag, Some(100)),
                (Archive, Some(20)),
                (Pagination, Some(200)),
                (Search, Some(20)),
                (Documentation, Some(100)),
                (Institutional, Some(30)),
                (Api, Some(5)),
                (Admin, Some(1)),
                (Unknown, Some(100)),
            ],
            "documentation" => &[
                (Homepage, None),
                (Content, Some(300)),
                (Product, Some(50)),
                (Category, Some(50)),
                (Tag, Some(50)),
                (Archive, Some(20)),
                (Pagination, Some(50)),
                (Search, Some(5)),
                (Documentation, None),
                (Institutional, Some(30)),
                (Api, Some(20)),
                (Admin, Some(1)),
                (Unknown, Some(100)),
            ],
            other => {
                return Err(AppError::config(format!(
                    "Unknown quota profile '{other}' (expected one of: {})",
                    PROFILES.join(", ")
                )));
            }
        };

        let mut table = Self::unbounded();
        for (url_type, cap) in caps {
            table.limits.insert(*url_type, *cap);
        }
        Ok(table)
    }

    /// Apply `type name -> cap` overrides on top of the table.
    pub fn with_overrides(mut self, overrides: &HashMap<String, usize>) -> Result<Self> {
        for (name, cap) in overrides {
            let url_type: UrlType = name.parse()?;
            self.limits.insert(url_type, Some(*cap));
        }
        Ok(self)
    }

    /// Set or clear the cap for one type.
    pub fn set(&mut self, url_type: UrlType, cap: Option<usize>) {
        self.limits.insert(url_type, cap);
    }

    /// Cap for a type, `None` when unbounded.
    pub fn limit(&self, url_type: UrlType) -> Option<usize> {
        self.limits.get(&url_type).copied().flatten()
    }

    /// Whether one more URL of this type may be admitted given `admitted` so far.
    pub fn allows(&self, url_type: UrlType, admitted: usize) -> bool {
        match self.limit(url_type) {
            Some(cap) => admitted < cap,
            None => true,
        }
    }
}

impl Default for QuotaTable {
    fn default() -> Self {
        Self::for_profile("balanced").unwrap_or_else(|_| Self::unbounded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_profiles_build() {
        for name in PROFILES {
            let table = QuotaTable::for_profile(name).unwrap();
            assert_eq!(table.limit(UrlType::Homepage), None);
        }
    }

    #[test]
    fn test_unknown_profile_is_config_error() {
        assert!(matches!(
            QuotaTable::for_profile("aggressive"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_overrides_replace_caps() {
        let mut overrides = HashMap::new();
        overrides.insert("product".to_string(), 3);
        let table = QuotaTable::for_profile("ecommerce")
            .unwrap()
            .with_overrides(&overrides)
            .unwrap();
        assert_eq!(table.limit(UrlType::Product), Some(3));
        assert!(table.allows(UrlType::Product, 2));
        assert!(!table.allows(UrlType::Product, 3));
    }

    #[test]
    fn test_unbounded_always_allows() {
        let table = QuotaTable::unbounded();
        assert!(table.allows(UrlType::Admin, usize::MAX - 1));
    }
}
