use std::collections::BTreeSet;

/// The member names still to be located in one archive.
///
/// Built once from a metadata file, then consumed by the extractor: every
/// match removes its name, so a name can be written at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    names: BTreeSet<String>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name, returning `false` if it was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Remove a name that was just matched. Returns `false` if the name was
    /// not (or no longer) targeted.
    pub fn take(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TargetSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
