use std::collections::HashSet;

/// Minimal add/remove change between two collections, with set semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// `to_add = new - old`, `to_remove = old - new`. Duplicates collapse and the
/// output order is unspecified.
pub fn diff<S: AsRef<str>>(old: &[S], new: &[S]) -> Delta {
    let old_set: HashSet<&str> = old.iter().map(AsRef::as_ref).collect();
    let new_set: HashSet<&str> = new.iter().map(AsRef::as_ref).collect();

    Delta {
        to_add: new_set
            .difference(&old_set)
            .map(|item| (*item).to_string())
            .collect(),
        to_remove: old_set
            .difference(&new_set)
            .map(|item| (*item).to_string())
            .collect(),
    }
}
