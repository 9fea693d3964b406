//! Set difference between a desired and a persisted collection.
//!
//! Both sides are joined on a natural key. The desired side must not repeat
//! a key; the persisted side may, in which case the extra rows are removed.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

use domain::ValidationError;

/// Changes needed to turn the persisted collection into the desired one.
///
/// `to_add` and `to_update` follow desired order; `to_remove` follows
/// persisted order.
#[derive(Debug, PartialEq, Eq)]
pub struct Diff<'a, D, C> {
    pub to_add: Vec<&'a D>,
    pub to_update: Vec<(&'a D, &'a C)>,
    pub to_remove: Vec<&'a C>,
}

impl<D, C> Diff<'_, D, C> {
    /// Returns true if nothing needs to be added or removed.
    pub fn is_balanced(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the difference between `desired` and `current`.
///
/// Returns [`ValidationError::DuplicateKey`] if a key appears twice in `desired`.
pub fn diff<'a, D, C, K, FD, FC>(
    entity: &'static str,
    desired: &'a [D],
    current: &'a [C],
    desired_key: FD,
    current_key: FC,
) -> Result<Diff<'a, D, C>, ValidationError>
where
    K: Eq + Hash + Display,
    FD: Fn(&D) -> K,
    FC: Fn(&C) -> K,
{
    let mut wanted: HashSet<K> = HashSet::with_capacity(desired.len());
    for d in desired {
        let key = desired_key(d);
        if wanted.contains(&key) {
            return Err(ValidationError::DuplicateKey {
                entity,
                key: key.to_string(),
            });
        }
        wanted.insert(key);
    }

    let mut existing: HashMap<K, &'a C> = HashMap::with_capacity(current.len());
    let mut to_remove = Vec::new();
    for c in current {
        let key = current_key(c);
        if !wanted.contains(&key) || existing.contains_key(&key) {
            to_remove.push(c);
        } else {
            existing.insert(key, c);
        }
    }

    let mut to_add = Vec::new();
    let mut to_update = Vec::new();
    for d in desired {
        match existing.get(&desired_key(d)) {
            Some(c) => to_update.push((d, *c)),
            None => to_add.push(d),
        }
    }

    Ok(Diff {
        to_add,
        to_update,
        to_remove,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row {
        key: String,
        value: u32,
    }

    fn row(key: &str, value: u32) -> Row {
        Row {
            key: key.to_string(),
            value,
        }
    }

    fn run<'a>(desired: &'a [Row], current: &'a [Row]) -> Diff<'a, Row, Row> {
        diff("row", desired, current, |r| r.key.clone(), |r| r.key.clone()).unwrap()
    }

    /// Applies a diff the way the engine does: drop removals, overwrite
    /// matches, append additions.
    fn apply(d: &Diff<'_, Row, Row>, current: &[Row]) -> Vec<Row> {
        let mut next: Vec<Row> = current
            .iter()
            .filter(|c| !d.to_remove.iter().any(|r| std::ptr::eq(*r, *c)))
            .cloned()
            .collect();
        for (desired, matched) in &d.to_update {
            if let Some(slot) = next.iter_mut().find(|r| r.key == matched.key) {
                *slot = (*desired).clone();
            }
        }
        next.extend(d.to_add.iter().map(|r| (*r).clone()));
        next
    }

    #[test]
    fn test_partitions_by_key() {
        let desired = vec![row("a", 1), row("b", 2), row("d", 4)];
        let current = vec![row("b", 20), row("c", 3), row("a", 1)];

        let d = run(&desired, &current);

        assert_eq!(d.to_add, vec![&row("d", 4)]);
        assert_eq!(
            d.to_update,
            vec![(&row("a", 1), &row("a", 1)), (&row("b", 2), &row("b", 20))]
        );
        assert_eq!(d.to_remove, vec![&row("c", 3)]);
    }

    #[test]
    fn test_completeness() {
        let desired = vec![row("a", 1), row("x", 9), row("b", 2)];
        let current = vec![row("b", 1), row("y", 1)];

        let d = run(&desired, &current);

        let mut desired_keys: Vec<&str> = d
            .to_add
            .iter()
            .map(|r| r.key.as_str())
            .chain(d.to_update.iter().map(|(r, _)| r.key.as_str()))
            .collect();
        desired_keys.sort();
        assert_eq!(desired_keys, vec!["a", "b", "x"]);

        let mut current_keys: Vec<&str> = d
            .to_remove
            .iter()
            .map(|r| r.key.as_str())
            .chain(d.to_update.iter().map(|(_, r)| r.key.as_str()))
            .collect();
        current_keys.sort();
        assert_eq!(current_keys, vec!["b", "y"]);
    }

    #[test]
    fn test_idempotent_after_apply() {
        let desired = vec![row("a", 1), row("b", 2), row("c", 3)];
        let current = vec![row("c", 30), row("z", 0)];

        let first = run(&desired, &current);
        let applied = apply(&first, &current);

        let second = run(&desired, &applied);
        assert!(second.is_balanced());
        assert!(second.to_update.iter().all(|(d, c)| d == c));
    }

    #[test]
    fn test_duplicate_desired_key_is_rejected() {
        let desired = vec![row("a", 1), row("a", 2)];
        let err = diff("variant", &desired, &[] as &[Row], |r| r.key.clone(), |r: &Row| {
            r.key.clone()
        })
        .unwrap_err();

        assert_eq!(
            err,
            ValidationError::DuplicateKey {
                entity: "variant",
                key: "a".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_current_rows_are_removed() {
        let desired = vec![row("a", 1)];
        let current = vec![row("a", 1), row("a", 1)];

        let d = run(&desired, &current);

        assert_eq!(d.to_update.len(), 1);
        assert_eq!(d.to_remove.len(), 1);
        assert!(std::ptr::eq(d.to_update[0].1, &current[0]));
        assert!(std::ptr::eq(d.to_remove[0], &current[1]));
    }

    #[test]
    fn test_different_shapes_on_each_side() {
        let desired = vec![10u32, 20, 30];
        let current = vec![row("20", 0), row("40", 0)];

        let d = diff(
            "number",
            &desired,
            &current,
            |n| n.to_string(),
            |r| r.key.clone(),
        )
        .unwrap();

        assert_eq!(d.to_add, vec![&10, &30]);
        assert_eq!(d.to_update.len(), 1);
        assert_eq!(d.to_remove, vec![&row("40", 0)]);
    }
}
