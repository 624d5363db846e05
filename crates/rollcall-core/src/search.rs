//! Field-predicate search over enrolled records.

use crate::types::{Role, UserRecord};

/// Conjunction of optional field predicates over enrolled records.
///
/// Text filters are case-insensitive substring matches; `role` is exact.
/// A record lacking a filtered field (a student has no department) never
/// matches that filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub name: Option<String>,
    pub usn: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub role: Option<Role>,
}

impl SearchFilter {
    /// Drop empty text filters so they behave as if omitted.
    pub fn normalized(self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.is_empty())
        }
        Self {
            name: keep(self.name),
            usn: keep(self.usn),
            department: keep(self.department),
            designation: keep(self.designation),
            role: self.role,
        }
    }

    pub fn matches(&self, record: &UserRecord) -> bool {
        if let Some(role) = self.role {
            if record.role() != role {
                return false;
            }
        }
        contains_ci(Some(&record.name), self.name.as_deref())
            && contains_ci(record.fields.usn(), self.usn.as_deref())
            && contains_ci(record.fields.department(), self.department.as_deref())
            && contains_ci(record.fields.designation(), self.designation.as_deref())
    }
}

fn contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    match (haystack, needle) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(h), Some(n)) => h.to_lowercase().contains(&n.to_lowercase()),
    }
}
