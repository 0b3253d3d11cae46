/// Departments accepted by the default policy.
pub const DEFAULT_DEPARTMENTS: [&str; 5] = ["HR", "Engineering", "Sales", "Marketing", "Finance"];

/// Immutable allow-list of departments accepted at ingest.
///
/// The list is fixed at construction time; there is no runtime mutation.
/// Matching is case-sensitive.
#[derive(Debug, Clone)]
pub struct DepartmentPolicy {
    allowed: Vec<String>,
}

impl DepartmentPolicy {
    /// Builds a policy from an explicit allow-list.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` when the department is a member of the allow-list.
    ///
    /// Blank and empty input never match.
    pub fn is_allowed(&self, department: &str) -> bool {
        if department.trim().is_empty() {
            return false;
        }
        self.allowed.iter().any(|value| value == department)
    }
}

impl Default for DepartmentPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DEPARTMENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_members_are_allowed() {
        let policy = DepartmentPolicy::default();
        for department in DEFAULT_DEPARTMENTS {
            assert!(policy.is_allowed(department), "{department} should pass");
        }
    }

    #[test]
    fn blank_input_is_rejected() {
        let policy = DepartmentPolicy::default();
        assert!(!policy.is_allowed(""));
        assert!(!policy.is_allowed("   "));
    }

    #[test]
    fn unknown_departments_are_rejected() {
        let policy = DepartmentPolicy::default();
        assert!(!policy.is_allowed("Legal"));
        assert!(!policy.is_allowed("engineering"));
        assert!(!policy.is_allowed("HR "));
    }

    #[test]
    fn custom_allow_list_is_honoured() {
        let policy = DepartmentPolicy::new(["Research"]);
        assert!(policy.is_allowed("Research"));
        assert!(!policy.is_allowed("HR"));
    }
}
