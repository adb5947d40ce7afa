//! Read-only tree view of a realm for outliners and printing.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thicket_ecs::guid::SimpleGuid;

use crate::archetypes::EntityArchetype;

/// One entity in the hierarchy view.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldTreeNode {
    pub entity_id: SimpleGuid,
    pub name: String,
    pub children: Vec<WorldTreeNode>,
}

impl WorldTreeNode {
    /// Build the forest view: roots in realm order, children in `child_ids`
    /// order. An entity whose parent is missing is shown as a root. Each
    /// entity appears at most once.
    pub fn build_forest(realm: &[EntityArchetype]) -> Vec<WorldTreeNode> {
        let by_id: HashMap<SimpleGuid, &EntityArchetype> = realm.iter().map(|e| (e.id, e)).collect();
        let mut placed = HashSet::new();

        let mut roots: Vec<WorldTreeNode> = realm
            .iter()
            .filter(|e| e.parent_id.is_invalid() || !by_id.contains_key(&e.parent_id))
            .filter_map(|e| Self::build(e, &by_id, &mut placed))
            .collect();

        // Entities stuck in a parent cycle have no root to hang from.
        for e in realm {
            if !placed.contains(&e.id) {
                if let Some(node) = Self::build(e, &by_id, &mut placed) {
                    roots.push(node);
                }
            }
        }
        roots
    }

    fn build(
        entity: &EntityArchetype,
        by_id: &HashMap<SimpleGuid, &EntityArchetype>,
        placed: &mut HashSet<SimpleGuid>,
    ) -> Option<WorldTreeNode> {
        if !placed.insert(entity.id) {
            return None;
        }
        let children = entity
            .child_ids
            .iter()
            .filter_map(|id| by_id.get(id))
            .filter(|child| child.parent_id == entity.id)
            .filter_map(|child| Self::build(child, by_id, placed))
            .collect();
        Some(WorldTreeNode {
            entity_id: entity.id,
            name: entity.name.clone(),
            children,
        })
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(WorldTreeNode::node_count).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn find(&self, entity_id: SimpleGuid) -> Option<&WorldTreeNode> {
        if self.entity_id == entity_id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(entity_id))
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{} [{}]", "", self.name, self.entity_id, indent = depth * 2)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for WorldTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

// ---------------------------------------------------------------------------
// Consistency check
// ---------------------------------------------------------------------------

/// One violation of the forest's link invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyIssue {
    /// `parent_id` names an entity that is not in the realm.
    DanglingParent { entity_id: SimpleGuid, parent_id: SimpleGuid },
    /// `child_ids` names an entity that is not in the realm.
    DanglingChild { entity_id: SimpleGuid, child_id: SimpleGuid },
    /// `child_ids` is not exactly the set of entities whose parent is this one.
    ChildListMismatch { entity_id: SimpleGuid },
    /// Two archetypes (entities or elements) share an id.
    DuplicateId { id: SimpleGuid },
    /// Following parents from this entity never reaches a root.
    Cycle { entity_id: SimpleGuid },
}

impl fmt::Display for HierarchyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingParent { entity_id, parent_id } => {
                write!(f, "entity {entity_id} has missing parent {parent_id}")
            }
            Self::DanglingChild { entity_id, child_id } => {
                write!(f, "entity {entity_id} lists missing child {child_id}")
            }
            Self::ChildListMismatch { entity_id } => {
                write!(f, "entity {entity_id} child list disagrees with parent links")
            }
            Self::DuplicateId { id } => write!(f, "id {id} is used more than once"),
            Self::Cycle { entity_id } => write!(f, "entity {entity_id} is its own ancestor"),
        }
    }
}

/// Check every link invariant of `realm`. An empty result means the forest
/// is consistent.
pub fn find_issues(realm: &[EntityArchetype]) -> Vec<HierarchyIssue> {
    let mut issues = Vec::new();

    let mut ids = HashSet::new();
    for id in realm
        .iter()
        .flat_map(|e| std::iter::once(e.id).chain(e.elements.iter().map(|el| el.id)))
    {
        if !ids.insert(id) {
            issues.push(HierarchyIssue::DuplicateId { id });
        }
    }

    let by_id: HashMap<SimpleGuid, &EntityArchetype> = realm.iter().map(|e| (e.id, e)).collect();
    for e in realm {
        if e.parent_id.is_valid() && !by_id.contains_key(&e.parent_id) {
            issues.push(HierarchyIssue::DanglingParent {
                entity_id: e.id,
                parent_id: e.parent_id,
            });
        }
        for child in &e.child_ids {
            if !by_id.contains_key(child) {
                issues.push(HierarchyIssue::DanglingChild {
                    entity_id: e.id,
                    child_id: *child,
                });
            }
        }

        let listed: HashSet<SimpleGuid> = e.child_ids.iter().copied().collect();
        let actual: HashSet<SimpleGuid> = realm.iter().filter(|c| c.parent_id == e.id).map(|c| c.id).collect();
        if listed != actual || listed.len() != e.child_ids.len() {
            issues.push(HierarchyIssue::ChildListMismatch { entity_id: e.id });
        }

        let mut current = e.parent_id;
        let mut steps = 0;
        while current.is_valid() {
            if current == e.id || steps > realm.len() {
                issues.push(HierarchyIssue::Cycle { entity_id: e.id });
                break;
            }
            current = by_id.get(&current).map_or(SimpleGuid::INVALID, |p| p.parent_id);
            steps += 1;
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_indented() {
        let mut root = EntityArchetype::new("World");
        let mut child = EntityArchetype::new("Lamp");
        child.parent_id = root.id;
        root.child_ids.push(child.id);
        let loose = EntityArchetype::new("Loose");

        let forest = WorldTreeNode::build_forest(&[root.clone(), child.clone(), loose]);
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].node_count(), 2);
        assert!(forest[0].find(child.id).is_some());
        assert_eq!(
            forest[0].to_string(),
            format!("World [{}]\n  Lamp [{}]\n", root.id, child.id)
        );
    }

    #[test]
    fn consistent_forest_has_no_issues() {
        let mut root = EntityArchetype::new("Root");
        let mut child = EntityArchetype::new("Child");
        child.parent_id = root.id;
        root.child_ids.push(child.id);
        assert!(find_issues(&[root.clone(), child.clone()]).is_empty());

        root.child_ids.clear();
        assert_eq!(
            find_issues(&[root.clone(), child]),
            [HierarchyIssue::ChildListMismatch { entity_id: root.id }]
        );
    }

    #[test]
    fn every_kind_of_issue_is_reported() {
        let mut a = EntityArchetype::new("A");
        let mut b = EntityArchetype::new("B");
        let ghost = SimpleGuid::generate();
        a.parent_id = b.id;
        b.parent_id = a.id;
        a.child_ids = vec![b.id, ghost];
        b.child_ids = vec![a.id];
        let mut orphan = EntityArchetype::new("Orphan");
        orphan.parent_id = ghost;
        let twin = orphan.clone();

        let issues = find_issues(&[a.clone(), b.clone(), orphan.clone(), twin]);
        assert!(issues.contains(&HierarchyIssue::Cycle { entity_id: a.id }));
        assert!(issues.contains(&HierarchyIssue::Cycle { entity_id: b.id }));
        assert!(issues.contains(&HierarchyIssue::DanglingChild { entity_id: a.id, child_id: ghost }));
        assert!(issues.contains(&HierarchyIssue::DanglingParent { entity_id: orphan.id, parent_id: ghost }));
        assert!(issues.contains(&HierarchyIssue::DuplicateId { id: orphan.id }));
        assert!(!issues[0].to_string().is_empty());
    }

    #[test]
    fn cycles_still_show_every_entity_once() {
        let mut a = EntityArchetype::new("A");
        let mut b = EntityArchetype::new("B");
        a.parent_id = b.id;
        b.parent_id = a.id;
        a.child_ids.push(b.id);
        b.child_ids.push(a.id);
        let forest = WorldTreeNode::build_forest(&[a, b]);
        assert_eq!(forest.iter().map(WorldTreeNode::node_count).sum::<usize>(), 2);
    }
}
