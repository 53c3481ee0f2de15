//! Router core: resolves a request path to a declared path template.

use indexmap::IndexSet;
use tracing::debug;

/// Result of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// The declared template that matched (e.g. `/users/{id}`)
    pub template: String,
    /// Path parameter values, left to right
    pub params: Vec<String>,
    /// `true` when the request path equals the template exactly
    pub literal: bool,
}

/// Declared path templates in declaration order.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    templates: IndexSet<String>,
}

impl PathResolver {
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            templates: templates.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Resolve `request_path` (context path already stripped, no query).
    ///
    /// A literal template always wins. Otherwise trailing segments are peeled
    /// off one at a time and the remaining prefix, followed by one `{param}`
    /// per peeled segment, is matched against the templates in declaration
    /// order; the first hit wins.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> Option<PathMatch> {
        if self.templates.contains(request_path) {
            return Some(PathMatch {
                template: request_path.to_string(),
                params: Vec::new(),
                literal: true,
            });
        }

        let mut prefix = request_path;
        let mut peeled: Vec<&str> = Vec::new();
        loop {
            let idx = prefix.rfind('/')?;
            let (head, segment) = (&prefix[..idx], &prefix[idx + 1..]);
            if head.is_empty() || head.trim_matches('/').is_empty() {
                return None;
            }
            peeled.push(segment);
            prefix = head;

            let count = peeled.len();
            if let Some(template) = self
                .templates
                .iter()
                .find(|t| matches_peeled(t, prefix, count))
            {
                let params = peeled.iter().rev().map(|s| (*s).to_string()).collect();
                debug!(
                    path = %request_path,
                    template = %template,
                    "Resolved parametric path"
                );
                return Some(PathMatch {
                    template: template.clone(),
                    params,
                    literal: false,
                });
            }
        }
    }
}

/// Whether `template` is exactly `prefix` followed by `count` placeholder
/// segments (`/{name}`, name non-empty and free of `/` and `}`).
fn matches_peeled(template: &str, prefix: &str, count: usize) -> bool {
    let Some(rest) = template.strip_prefix(prefix) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix('/') else {
        return false;
    };
    let mut seen = 0usize;
    for segment in rest.split('/') {
        let is_placeholder = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .is_some_and(|name| !name.is_empty() && !name.contains('}'));
        if !is_placeholder {
            return false;
        }
        seen += 1;
    }
    seen == count
}

/// Resolve against an ad-hoc template list. See [`PathResolver::resolve`].
#[must_use]
pub fn resolve<'a, I>(request_path: &str, declared: I) -> Option<PathMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    PathResolver::new(declared).resolve(request_path)
}
