use std::fmt::Display;

const NAMESPACE: &str = "analytics";

/// Cache key namespaced by subject and computation kind.
///
/// Subject ids are opaque, so `%` and `:` are escaped before they are embedded
/// in the key; otherwise subject `a:b` could shadow entries of subject `a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    subject_id: String,
    kind: String,
}

impl CacheKey {
    pub fn new(subject_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            kind: kind.into(),
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Prefix shared by every key of one subject
    pub fn subject_prefix(subject_id: &str) -> String {
        format!("{}:{}:", NAMESPACE, escape(subject_id))
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            Self::subject_prefix(&self.subject_id),
            escape(&self.kind)
        )
    }
}

fn escape(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}
