//! Union merge of two stores
//!
//! Tag definitions are unioned by id and the authoritative side wins a
//! collision. Assignment lists are unioned per slide: the authoritative order
//! first, then ids only the secondary side has. Nothing is ever removed, so a
//! tag deleted on one side survives if the other side still has it.

use crate::model::{Store, STORE_VERSION};

pub fn merge(authoritative: &Store, secondary: &Store) -> Store {
    let mut tags = secondary.tags.clone();
    for (id, tag) in &authoritative.tags {
        tags.insert(id.clone(), tag.clone());
    }

    let mut assignments = authoritative.assignments.clone();
    for (slide, ids) in &secondary.assignments {
        let merged = assignments.entry(slide.clone()).or_default();
        for id in ids {
            if !merged.contains(id) {
                merged.push(id.clone());
            }
        }
    }
    for ids in assignments.values_mut() {
        dedup_in_order(ids);
    }

    let last_updated = match (authoritative.last_updated_at(), secondary.last_updated_at()) {
        (Some(a), Some(b)) if b > a => secondary.last_updated.clone(),
        (Some(_), _) => authoritative.last_updated.clone(),
        (None, _) => secondary
            .last_updated
            .clone()
            .or_else(|| authoritative.last_updated.clone()),
    };

    let mut merged = Store {
        tags,
        assignments,
        last_updated,
        version: STORE_VERSION.to_string(),
    };
    merged.normalize();
    merged
}

/// Drop repeated ids, keeping the first occurrence
fn dedup_in_order(ids: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Tag, TagColor};

    fn tag(id: &str, name: &str, color: TagColor) -> Tag {
        Tag {
            id: id.to_string(),
            name: name.to_string(),
            color,
            created_at: "2025-07-20T00:00:00.000Z".to_string(),
        }
    }

    fn store(tags: &[Tag], assignments: &[(&str, &[&str])]) -> Store {
        let mut s = Store::default();
        for t in tags {
            s.tags.insert(t.id.clone(), t.clone());
        }
        for (slide, ids) in assignments {
            s.assignments
                .insert(slide.to_string(), ids.iter().map(|i| i.to_string()).collect());
        }
        s
    }

    #[test]
    fn test_tag_maps_are_unioned() {
        let local = store(&[tag("a", "A", TagColor::Red)], &[]);
        let remote = store(&[tag("b", "B", TagColor::Green)], &[]);

        let merged = merge(&remote, &local);
        assert!(merged.tags.contains_key("a"));
        assert!(merged.tags.contains_key("b"));
    }

    #[test]
    fn test_authoritative_wins_collision() {
        let local = store(&[tag("sre", "sre", TagColor::Red)], &[]);
        let remote = store(&[tag("sre", "SRE", TagColor::Green)], &[]);

        let merged = merge(&remote, &local);
        assert_eq!(merged.tags["sre"].name, "SRE");
        assert_eq!(merged.tags["sre"].color, TagColor::Green);
    }

    #[test]
    fn test_assignments_unioned_without_duplicates() {
        let remote = store(&[], &[("deck", &["x", "y"]), ("only-remote", &["z"])]);
        let local = store(&[], &[("deck", &["y", "w", "w"]), ("only-local", &["q"])]);

        let merged = merge(&remote, &local);
        assert_eq!(merged.assignments["deck"], vec!["x", "y", "w"]);
        assert_eq!(merged.assignments["only-remote"], vec!["z"]);
        assert_eq!(merged.assignments["only-local"], vec!["q"]);
    }

    #[test]
    fn test_later_timestamp_kept() {
        let mut a = Store::default();
        a.last_updated = Some("2025-07-20T00:00:00.000Z".to_string());
        let mut b = Store::default();
        b.last_updated = Some("2025-07-21T00:00:00.000Z".to_string());

        assert_eq!(merge(&a, &b).last_updated, b.last_updated);
        assert_eq!(merge(&b, &a).last_updated, b.last_updated);
        assert_eq!(merge(&Store::default(), &a).last_updated, a.last_updated);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let s = store(&[tag("a", "A", TagColor::Blue)], &[("deck", &["a"])]);
        assert_eq!(merge(&s, &Store::default()), s);
        assert_eq!(merge(&Store::default(), &s), s);
    }
}
