use tracing::{error, warn};

/// How serious a load-time finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged; loading continues
    Warning,
    /// Loading fails
    Error,
}

/// A problem found in the interface document or route table while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            severity: Severity::Warning,
            ..Self::new(location, kind, message)
        }
    }
}

/// Log every issue at a level matching its severity.
pub fn report_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        match issue.severity {
            Severity::Warning => warn!(
                kind = %issue.kind,
                location = %issue.location,
                "{}", issue.message
            ),
            Severity::Error => error!(
                kind = %issue.kind,
                location = %issue.location,
                "{}", issue.message
            ),
        }
    }
}

/// Report `issues` and fail when any of them is an error.
pub fn fail_if_issues(issues: &[ValidationIssue]) -> anyhow::Result<()> {
    report_issues(issues);
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .map(|i| format!("[{}] {}: {}", i.kind, i.location, i.message))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} issue(s) found while loading the router:\n{}",
            errors.len(),
            errors.join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_fail() {
        let issues = vec![ValidationIssue::warning("/pets", "UnreachableRoute", "never matched")];
        assert!(fail_if_issues(&issues).is_ok());
    }

    #[test]
    fn test_errors_fail_with_all_messages() {
        let issues = vec![
            ValidationIssue::new("/pets.get", "MissingHandler", "no handler pets.list"),
            ValidationIssue::warning("/x", "Note", "ignored"),
            ValidationIssue::new("/pets.post", "MissingHandler", "no handler pets.add"),
        ];
        let err = fail_if_issues(&issues).unwrap_err().to_string();
        assert!(err.starts_with("2 issue(s)"));
        assert!(err.contains("pets.list"));
        assert!(err.contains("pets.add"));
        assert!(!err.contains("ignored"));
    }
}
