//! Packed class link arrays

use super::ClassId;

/// Where [`PackedLinks::add_link`] inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPosition {
    /// Insert before the given index
    At(usize),
    /// Append at the end
    Append,
}

/// Owned contiguous array of class references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedLinks {
    classes: Vec<ClassId>,
}

impl PackedLinks {
    /// Empty link array
    pub fn new() -> Self {
        Self::default()
    }

    /// Link array holding `classes`
    pub fn from_vec(classes: Vec<ClassId>) -> Self {
        Self { classes }
    }

    /// Insert a class; positions past the end append
    pub fn add_link(&mut self, class: ClassId, position: LinkPosition) {
        match position {
            LinkPosition::At(i) if i < self.classes.len() => self.classes.insert(i, class),
            _ => self.classes.push(class),
        }
        tracing::trace!(class = class.raw(), count = self.classes.len(), "link added");
    }

    /// Remove an exact reference; returns `false` if it was absent
    pub fn delete_link(&mut self, class: ClassId) -> bool {
        match self.classes.iter().position(|&c| c == class) {
            Some(i) => {
                self.classes.remove(i);
                tracing::trace!(class = class.raw(), count = self.classes.len(), "link deleted");
                true
            }
            None => false,
        }
    }

    /// True if `class` is linked
    pub fn contains(&self, class: ClassId) -> bool {
        self.classes.contains(&class)
    }

    /// Index of `class`
    pub fn position(&self, class: ClassId) -> Option<usize> {
        self.classes.iter().position(|&c| c == class)
    }

    /// Linked classes
    pub fn as_slice(&self) -> &[ClassId] {
        &self.classes
    }

    /// Number of linked classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if nothing is linked
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate linked classes
    pub fn iter(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.classes.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_link_positions() {
        let mut links = PackedLinks::new();
        links.add_link(ClassId(1), LinkPosition::Append);
        links.add_link(ClassId(2), LinkPosition::Append);
        links.add_link(ClassId(0), LinkPosition::At(0));
        links.add_link(ClassId(9), LinkPosition::At(99));
        assert_eq!(links.as_slice(), &[ClassId(0), ClassId(1), ClassId(2), ClassId(9)]);
    }

    #[test]
    fn test_delete_link_absent_is_noop() {
        let mut links = PackedLinks::from_vec(vec![ClassId(3), ClassId(4)]);
        assert!(!links.delete_link(ClassId(5)));
        assert!(links.delete_link(ClassId(3)));
        assert_eq!(links.as_slice(), &[ClassId(4)]);
    }
}
