//! Realm file reading and writing.
//!
//! The on-disk format is one JSON object:
//!
//! ```json
//! {
//!   "version": 1,
//!   "settings": { "use_realm_bounds": true, "realm_size": 1000.0 },
//!   "entities": [ { "name": "Player", "id": 4, "child_ids": [], "elements": [] } ]
//! }
//! ```
//!
//! Loading is lenient. Malformed entity or element records are skipped,
//! duplicate ids are skipped, and the hierarchy is repaired (dangling
//! parents, child lists that disagree with parent ids, parent cycles). Each
//! repair adds a warning to [`LoadedRealm::warnings`]; only a file that is
//! not a realm at all is an error.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thicket_ecs::guid::SimpleGuid;
use thicket_reflect::convert::{default_value, value_to_document};
use thicket_reflect::registry::{ByteMirror, TypeKind};

use crate::archetypes::{ArchetypeState, ElementArchetype, EntityArchetype};
use crate::config::RealmSettings;
use crate::RealmError;

/// Format version written by [`write_realm`].
pub const REALM_FILE_VERSION: u64 = 1;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Result of a successful load.
#[derive(Debug, Clone, Default)]
pub struct LoadedRealm {
    pub entities: Vec<EntityArchetype>,
    pub settings: RealmSettings,
    /// One line per skipped record or repaired link.
    pub warnings: Vec<String>,
    pub source_path: Option<PathBuf>,
}

/// Read and parse a realm file.
pub fn load_realm_from_file(path: impl AsRef<Path>) -> Result<LoadedRealm, RealmError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| RealmError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut loaded = load_realm_from_str(&text)?;
    loaded.source_path = Some(path.to_path_buf());
    tracing::debug!(
        path = %path.display(),
        entities = loaded.entities.len(),
        warnings = loaded.warnings.len(),
        "loaded realm file"
    );
    Ok(loaded)
}

/// Parse realm JSON text.
///
/// # Errors
///
/// [`RealmError::Parse`] if the text is not JSON, is not an object, or has
/// no `entities` array.
pub fn load_realm_from_str(text: &str) -> Result<LoadedRealm, RealmError> {
    let root: Value = serde_json::from_str(text).map_err(|e| RealmError::Parse {
        message: e.to_string(),
    })?;
    let Value::Object(root) = root else {
        return Err(RealmError::Parse {
            message: "realm file must be a JSON object".to_owned(),
        });
    };
    let Some(Value::Array(records)) = root.get("entities") else {
        return Err(RealmError::Parse {
            message: "realm file has no 'entities' array".to_owned(),
        });
    };

    let mut loaded = LoadedRealm::default();
    if let Some(version) = root.get("version").and_then(Value::as_u64) {
        if version > REALM_FILE_VERSION {
            loaded
                .warnings
                .push(format!("file version {version} is newer than {REALM_FILE_VERSION}"));
        }
    }
    loaded.settings = match root.get("settings") {
        None | Some(Value::Null) => RealmSettings::default(),
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            loaded.warnings.push(format!("settings ignored: {e}"));
            RealmSettings::default()
        }),
    };
    if loaded.settings.realm_size.is_nan() || loaded.settings.realm_size < RealmSettings::MIN_REALM_SIZE {
        loaded.warnings.push(format!(
            "realm_size {} clamped to {}",
            loaded.settings.realm_size,
            RealmSettings::MIN_REALM_SIZE
        ));
        loaded.settings.validate();
    }

    let mut seen_ids = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        match parse_entity(record, &mut seen_ids, &mut loaded.warnings) {
            Ok(entity) => loaded.entities.push(entity),
            Err(reason) => {
                tracing::warn!(index, %reason, "skipping entity record");
                loaded.warnings.push(format!("entity #{index} skipped: {reason}"));
            }
        }
    }

    repair_hierarchy(&mut loaded.entities, &mut loaded.warnings);
    Ok(loaded)
}

fn parse_id(value: Option<&Value>) -> Option<SimpleGuid> {
    value
        .and_then(Value::as_u64)
        .map(SimpleGuid::from_raw)
        .filter(|id| id.is_valid())
}

fn parse_entity(
    record: &Value,
    seen_ids: &mut HashSet<SimpleGuid>,
    warnings: &mut Vec<String>,
) -> Result<EntityArchetype, String> {
    let obj = record.as_object().ok_or("not an object")?;
    let name = obj.get("name").and_then(Value::as_str).ok_or("missing 'name'")?;
    let id = parse_id(obj.get("id")).ok_or("missing or invalid 'id'")?;
    if !seen_ids.insert(id) {
        return Err(format!("duplicate id {id}"));
    }
    SimpleGuid::observe(id);

    let parent_id = match obj.get("parent_id") {
        None | Some(Value::Null) => SimpleGuid::INVALID,
        Some(v) => parse_id(Some(v)).unwrap_or_else(|| {
            warnings.push(format!("entity {id}: unreadable parent_id {v}, made root"));
            SimpleGuid::INVALID
        }),
    };
    let child_ids = obj
        .get("child_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(|v| parse_id(Some(v))).collect())
        .unwrap_or_default();

    let mut elements = Vec::new();
    if let Some(records) = obj.get("elements").and_then(Value::as_array) {
        for (index, record) in records.iter().enumerate() {
            match parse_element(record, seen_ids) {
                Ok(element) => elements.push(element),
                Err(reason) => {
                    tracing::warn!(entity_id = %id, index, %reason, "skipping element record");
                    warnings.push(format!("entity {id}: element #{index} skipped: {reason}"));
                }
            }
        }
    }

    Ok(EntityArchetype {
        name: name.to_owned(),
        id,
        parent_id,
        child_ids,
        elements,
        state: ArchetypeState::UnModified,
    })
}

fn parse_element(record: &Value, seen_ids: &mut HashSet<SimpleGuid>) -> Result<ElementArchetype, String> {
    let obj = record.as_object().ok_or("not an object")?;
    let type_name = obj
        .get("type_name")
        .and_then(Value::as_str)
        .ok_or("missing 'type_name'")?;
    let id = parse_id(obj.get("id")).ok_or("missing or invalid 'id'")?;
    let mut data = match obj.get("data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err("'data' is not an object".to_owned()),
    };
    if !seen_ids.insert(id) {
        return Err(format!("duplicate id {id}"));
    }
    SimpleGuid::observe(id);

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| data.get("name").and_then(Value::as_str))
        .unwrap_or(type_name)
        .to_owned();
    data.entry("name").or_insert_with(|| Value::String(name.clone()));

    Ok(ElementArchetype {
        type_name: type_name.to_owned(),
        name,
        id,
        allows_duplication: obj.get("allows_duplication").and_then(Value::as_bool).unwrap_or(true),
        data,
        state: ArchetypeState::UnModified,
    })
}

/// Make `parent_id` and `child_ids` agree and remove parent cycles.
fn repair_hierarchy(entities: &mut [EntityArchetype], warnings: &mut Vec<String>) {
    let index: HashMap<SimpleGuid, usize> = entities.iter().enumerate().map(|(i, e)| (e.id, i)).collect();

    for e in entities.iter_mut() {
        if e.parent_id.is_valid() && (e.parent_id == e.id || !index.contains_key(&e.parent_id)) {
            warnings.push(format!("entity {}: parent {} not found, made root", e.id, e.parent_id));
            e.parent_id = SimpleGuid::INVALID;
        }
    }

    // Release the first member of every parent cycle to root.
    for i in 0..entities.len() {
        let start = entities[i].id;
        let mut on_path = HashSet::from([start]);
        let mut current = entities[i].parent_id;
        while current.is_valid() {
            if current == start {
                warnings.push(format!("entity {start}: parent cycle broken, made root"));
                entities[i].parent_id = SimpleGuid::INVALID;
                break;
            }
            if !on_path.insert(current) {
                break;
            }
            current = entities[index[&current]].parent_id;
        }
    }

    let mut actual: HashMap<SimpleGuid, Vec<SimpleGuid>> = HashMap::new();
    for e in entities.iter() {
        if e.parent_id.is_valid() {
            actual.entry(e.parent_id).or_default().push(e.id);
        }
    }
    for e in entities.iter_mut() {
        let children = actual.remove(&e.id).unwrap_or_default();
        let rebuilt = order_like(&e.child_ids, children);
        if rebuilt != e.child_ids {
            warnings.push(format!("entity {}: child list rebuilt from parent links", e.id));
            e.child_ids = rebuilt;
        }
    }
}

/// `children` ordered by their position in `saved`, unknown ones last in
/// their current order.
fn order_like(saved: &[SimpleGuid], mut children: Vec<SimpleGuid>) -> Vec<SimpleGuid> {
    children.sort_by_key(|c| saved.iter().position(|s| s == c).unwrap_or(usize::MAX));
    children
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RealmFileOut<'a> {
    version: u64,
    settings: &'a RealmSettings,
    entities: &'a [EntityArchetype],
}

/// Serialize a realm to JSON text.
pub fn write_realm(entities: &[EntityArchetype], settings: &RealmSettings, pretty: bool) -> Result<String, RealmError> {
    let out = RealmFileOut {
        version: REALM_FILE_VERSION,
        settings,
        entities,
    };
    let text = if pretty {
        serde_json::to_string_pretty(&out)
    } else {
        serde_json::to_string(&out)
    };
    text.map_err(|e| RealmError::Parse {
        message: e.to_string(),
    })
}

/// Serialize and write a realm file.
pub fn save_realm_to_file(
    path: impl AsRef<Path>,
    entities: &[EntityArchetype],
    settings: &RealmSettings,
    pretty: bool,
) -> Result<(), RealmError> {
    let path = path.as_ref();
    let text = write_realm(entities, settings, pretty)?;
    std::fs::write(path, text).map_err(|e| RealmError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), entities = entities.len(), "saved realm file");
    Ok(())
}

/// Reshape a known element's document to its reflected key set, in
/// reflection order: writable properties only, missing ones at their type
/// default, `name` following the element's display name. Unknown element
/// types are left alone.
pub fn normalize_element_data(mirror: &ByteMirror, element: &mut ElementArchetype) -> Result<(), RealmError> {
    match mirror.get_type_info_by_name(&element.type_name) {
        Some(info) if info.kind() == TypeKind::Element => {}
        _ => return Ok(()),
    }

    let mut old = std::mem::take(&mut element.data);
    let mut data = Map::new();
    for prop in mirror.get_all_properties(&element.type_name) {
        if prop.is_read_only() {
            continue;
        }
        let entry = match old.remove(prop.name()) {
            Some(v) => v,
            None => {
                let v = default_value(mirror, prop.property_type(), prop.contained_type())?;
                value_to_document(mirror, prop.property_type(), prop.contained_type(), &v)?
            }
        };
        data.insert(prop.name().to_owned(), entry);
    }
    data.insert("name".to_owned(), Value::String(element.name.clone()));
    element.data = data;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_entities_array_is_an_error() {
        assert!(matches!(load_realm_from_str("{}"), Err(RealmError::Parse { .. })));
        assert!(matches!(load_realm_from_str("[]"), Err(RealmError::Parse { .. })));
        assert!(matches!(load_realm_from_str("not json"), Err(RealmError::Parse { .. })));
    }

    #[test]
    fn bad_records_are_skipped_with_warnings() {
        let text = json!({
            "entities": [
                { "name": "Ok", "id": 9001,
                  "elements": [
                    { "type_name": "Transform", "id": 9002 },
                    { "type_name": "Transform" },
                    { "id": 9003 }
                  ] },
                { "name": "NoId" },
                "junk",
                { "name": "Dup", "id": 9001 }
            ]
        })
        .to_string();
        let loaded = load_realm_from_str(&text).unwrap();
        assert_eq!(loaded.entities.len(), 1);
        let e = &loaded.entities[0];
        assert_eq!(e.elements.len(), 1);
        assert_eq!(e.elements[0].name, "Transform");
        assert_eq!(e.elements[0].data["name"], json!("Transform"));
        assert!(e.elements[0].allows_duplication);
        assert_eq!(loaded.warnings.len(), 5);
        assert!(SimpleGuid::generate().value() > 9002);
    }

    #[test]
    fn hierarchy_is_repaired() {
        let text = json!({
            "settings": { "use_realm_bounds": false, "realm_size": 0.0 },
            "entities": [
                { "name": "P", "id": 9101, "child_ids": [9103, 9102] },
                { "name": "A", "id": 9102, "parent_id": 9101 },
                { "name": "B", "id": 9103, "parent_id": 9101 },
                { "name": "C", "id": 9104, "parent_id": 9100 },
                { "name": "X", "id": 9105, "parent_id": 9106, "child_ids": [9106] },
                { "name": "Y", "id": 9106, "parent_id": 9105, "child_ids": [9105] }
            ]
        })
        .to_string();
        let loaded = load_realm_from_str(&text).unwrap();
        let by_name = |n: &str| loaded.entities.iter().find(|e| e.name == n).unwrap();

        assert_eq!(
            by_name("P").child_ids,
            [SimpleGuid::from_raw(9103), SimpleGuid::from_raw(9102)]
        );
        assert!(by_name("C").is_root());
        assert!(by_name("X").is_root());
        assert_eq!(by_name("Y").parent_id, SimpleGuid::from_raw(9105));
        assert_eq!(by_name("X").child_ids, [SimpleGuid::from_raw(9106)]);
        assert!(by_name("Y").child_ids.is_empty());
        assert_eq!(loaded.settings.realm_size, 1.0);
        assert!(!loaded.settings.use_realm_bounds);
    }

    #[test]
    fn written_text_loads_back_equal() {
        let mut parent = EntityArchetype::new("Parent");
        let mut child = EntityArchetype::new("Child");
        child.parent_id = parent.id;
        parent.child_ids.push(child.id);
        let mut el = ElementArchetype::new("Sprite2D");
        el.data.insert("name".to_owned(), json!("Sprite2D"));
        el.data.insert("Flip H".to_owned(), json!(true));
        child.elements.push(el);
        let realm = vec![parent, child];
        let settings = RealmSettings::new(true, 250.0);

        let text = write_realm(&realm, &settings, false).unwrap();
        let loaded = load_realm_from_str(&text).unwrap();
        assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
        assert_eq!(loaded.entities, realm);
        assert_eq!(loaded.settings, settings);
    }

    #[test]
    fn normalize_fills_and_prunes() {
        let mirror = ByteMirror::with_builtin_types();
        let mut el = ElementArchetype::new("BoxCollider");
        el.name = "Hitbox".to_owned();
        el.data.insert("Stale".to_owned(), json!(1));
        el.data.insert("Anchor".to_owned(), json!({ "x": 3, "y": 4 }));
        normalize_element_data(&mirror, &mut el).unwrap();

        let keys: Vec<_> = el.data.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "visible", "Size", "Anchor"]);
        assert_eq!(el.data["name"], json!("Hitbox"));
        assert_eq!(el.data["Anchor"], json!({ "x": 3, "y": 4 }));

        let mut unknown = ElementArchetype::new("Teleporter");
        unknown.data.insert("Range".to_owned(), json!(5));
        normalize_element_data(&mirror, &mut unknown).unwrap();
        assert_eq!(unknown.data["Range"], json!(5));
    }
}
