//! Property tests for realm edits.
//!
//! Random sequences of hierarchy edits must leave the forest consistent:
//! every `child_ids` list mirrors the `parent_id` links, no parent chain
//! loops, ids are unique, and the tree view covers every entity exactly once.

use proptest::prelude::*;
use thicket_editor::prelude::*;

/// Families stop being duplicated past this size.
const MAX_ENTITIES: usize = 200;

#[derive(Debug, Clone)]
enum RealmOp {
    Create,
    Reparent(usize, usize),
    Release(usize),
    Purge(usize),
    PurgeFamily(usize),
    PurgeDescendants(usize),
    Duplicate(usize),
    DuplicateSibling(usize),
    DuplicateWithChildren(usize),
    DuplicateFamilySibling(usize),
    Snapshot,
}

fn realm_op_strategy() -> impl Strategy<Value = RealmOp> {
    prop_oneof![
        3 => Just(RealmOp::Create),
        4 => (0..64usize, 0..64usize).prop_map(|(a, b)| RealmOp::Reparent(a, b)),
        1 => (0..64usize).prop_map(RealmOp::Release),
        1 => (0..64usize).prop_map(RealmOp::Purge),
        1 => (0..64usize).prop_map(RealmOp::PurgeFamily),
        1 => (0..64usize).prop_map(RealmOp::PurgeDescendants),
        1 => (0..64usize).prop_map(RealmOp::Duplicate),
        1 => (0..64usize).prop_map(RealmOp::DuplicateSibling),
        1 => (0..64usize).prop_map(RealmOp::DuplicateWithChildren),
        1 => (0..64usize).prop_map(RealmOp::DuplicateFamilySibling),
        1 => Just(RealmOp::Snapshot),
    ]
}

fn pick(realm: &EditorRealmManager<'_>, i: usize) -> Option<SimpleGuid> {
    let entities = realm.get_realm();
    if entities.is_empty() {
        None
    } else {
        Some(entities[i % entities.len()].id)
    }
}

fn apply(realm: &mut EditorRealmManager<'_>, op: &RealmOp) {
    let room = realm.entity_count() < MAX_ENTITIES;
    match *op {
        RealmOp::Create => {
            let n = realm.entity_count();
            realm.create_entity(&format!("Entity {n}")).unwrap();
        }
        RealmOp::Reparent(a, b) => {
            if let (Some(child), Some(parent)) = (pick(realm, a), pick(realm, b)) {
                let loops = child == parent || realm.is_descendant_of(parent, child);
                let result = realm.reparent_entity(child, parent);
                assert_eq!(result.is_err(), loops);
            }
        }
        RealmOp::Release(i) => {
            if let Some(id) = pick(realm, i) {
                realm.release_from_parent(id).unwrap();
            }
        }
        RealmOp::Purge(i) => {
            if let Some(id) = pick(realm, i) {
                realm.purge_entity(id).unwrap();
            }
        }
        RealmOp::PurgeFamily(i) => {
            if let Some(id) = pick(realm, i) {
                let expected = 1 + realm.get_descendants(id).len();
                assert_eq!(realm.purge_entity_and_family(id).unwrap().len(), expected);
            }
        }
        RealmOp::PurgeDescendants(i) => {
            if let Some(id) = pick(realm, i) {
                realm.purge_entity_descendants(id).unwrap();
                assert!(realm.get_archetype(id).unwrap().child_ids.is_empty());
            }
        }
        RealmOp::Duplicate(i) => {
            if let (Some(id), true) = (pick(realm, i), room) {
                realm.duplicate_entity(id).unwrap();
            }
        }
        RealmOp::DuplicateSibling(i) => {
            if let (Some(id), true) = (pick(realm, i), room) {
                let copy = realm.duplicate_entity_as_sibling(id).unwrap();
                let parent = realm.get_archetype(id).unwrap().parent_id;
                assert_eq!(realm.get_archetype(copy).unwrap().parent_id, parent);
            }
        }
        RealmOp::DuplicateWithChildren(i) => {
            if let (Some(id), true) = (pick(realm, i), room) {
                let expected = 1 + realm.get_descendants(id).len();
                assert_eq!(realm.duplicate_entity_with_children(id).unwrap().len(), expected);
            }
        }
        RealmOp::DuplicateFamilySibling(i) => {
            if let (Some(id), true) = (pick(realm, i), room) {
                let expected = 1 + realm.get_descendants(id).len();
                assert_eq!(realm.duplicate_family_as_sibling(id).unwrap().len(), expected);
            }
        }
        RealmOp::Snapshot => {
            realm.take_snapshot();
            assert!(!realm.is_dirty());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn random_edits_keep_the_hierarchy_consistent(ops in prop::collection::vec(realm_op_strategy(), 1..60)) {
        let mut realm = EditorRealmManager::new(ByteMirror::global(), EditorConfig::default());
        realm.new_realm();

        for op in &ops {
            apply(&mut realm, op);

            let issues = realm.validate();
            prop_assert!(issues.is_empty(), "after {:?}: {:?}", op, issues);

            let covered: usize = realm.get_hierarchy().iter().map(|n| n.node_count()).sum();
            prop_assert_eq!(covered, realm.entity_count());
        }
    }

    /// Whatever the edit sequence, a realm written to text and loaded back is
    /// equal to the original and needs no repairs.
    #[test]
    fn written_realms_load_back_unchanged(ops in prop::collection::vec(realm_op_strategy(), 1..30)) {
        let mut realm = EditorRealmManager::new(ByteMirror::global(), EditorConfig::default());
        realm.new_realm();
        for op in &ops {
            apply(&mut realm, op);
        }

        let text = write_realm(realm.get_realm(), realm.settings(), false).unwrap();
        let loaded = load_realm_from_str(&text).unwrap();
        prop_assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
        prop_assert_eq!(loaded.entities.as_slice(), realm.get_realm());
    }
}
