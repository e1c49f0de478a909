//! Class precedence linearization (C3)

use super::ClassId;

/// Linearize a new class's ancestors
///
/// `parents` are the direct superclasses in declaration order and
/// `parent_lists` their own precedence lists (each starting with the parent
/// itself). Returns the ancestors most-specific-first, without the new
/// class, or `None` when no consistent order exists.
pub(crate) fn linearize(
    parents: &[ClassId],
    parent_lists: &[&[ClassId]],
) -> Option<Vec<ClassId>> {
    let mut sequences: Vec<Vec<ClassId>> = parent_lists.iter().map(|l| l.to_vec()).collect();
    sequences.push(parents.to_vec());

    let mut result = Vec::new();
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Some(result);
        }

        let candidate = sequences
            .iter()
            .map(|s| s[0])
            .find(|&head| !sequences.iter().any(|s| s[1..].contains(&head)))?;

        result.push(candidate);
        for seq in &mut sequences {
            if seq[0] == candidate {
                seq.remove(0);
            }
        }
    }
}
