//! The reflection registry.
//!
//! [`ByteMirror`] maps type names to [`TypeInfo`] records. Each record lists
//! its own [`Property`] descriptors and optionally names an ancestor, giving a
//! single-inheritance chain that [`ByteMirror::get_all_properties_for_type`]
//! walks from the base down.
//!
//! Property accessors are type-erased closures over `&dyn Element`. The typed
//! helpers on [`TypeBuilder`] generate them from ordinary getter/setter
//! functions and downcast through `Any`, so an accessor called on an element
//! of the wrong kind reports [`ReflectError::WrongElement`] instead of
//! touching unrelated memory.
//!
//! Registration happens once, before any lookup. Misconfiguration (unknown
//! ancestor, compound property without a registered contained type,
//! duplicate names) panics at the point of registration.
//!
//! # Example
//!
//! ```
//! use thicket_ecs::prelude::*;
//! use thicket_reflect::prelude::*;
//!
//! let mut mirror = ByteMirror::new();
//! mirror.register_abstract("Element", None, |_| {});
//! mirror.register_element::<BoxCollider>("BoxCollider", Some("Element"), |t| {
//!     t.property("Size", BoxCollider::size, BoxCollider::set_size);
//! });
//!
//! let info = mirror.get_type_info_by_name("BoxCollider").unwrap();
//! assert_eq!(mirror.get_all_properties_for_type(info).len(), 1);
//! assert!(mirror.create_element_by_name("BoxCollider").is_some());
//! assert!(mirror.get_type_info_by_name("Nope").is_none());
//! ```

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use thicket_ecs::element::Element;

use crate::value::{PropertyType, PropertyValue, ReflectValue};
use crate::ReflectError;

/// Reads one property from a live element.
pub type Getter = Arc<dyn Fn(&dyn Element) -> Result<PropertyValue, ReflectError> + Send + Sync>;

/// Writes one property on a live element. The value's variant has already
/// been checked against the property type.
pub type Setter = Arc<dyn Fn(&mut dyn Element, PropertyValue) -> Result<(), ReflectError> + Send + Sync>;

type Constructor = Box<dyn Fn() -> Box<dyn Element> + Send + Sync>;

// ---------------------------------------------------------------------------
// UiHint
// ---------------------------------------------------------------------------

/// Editing hint for UI collaborators. Carries no semantics here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UiHint {
    #[default]
    None,
    FilePath,
    ImageFile,
    MultilineText,
    ColorEdit,
    AudioFile,
    TextFile,
    SourceFile,
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// One reflected property of a type.
///
/// Struct field descriptors have neither getter nor setter; element
/// properties always have a getter and are read-only without a setter.
#[derive(Clone)]
pub struct Property {
    name: String,
    property_type: PropertyType,
    owner: String,
    contained_type: Option<String>,
    hint: UiHint,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// Name of the type that declared this property.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Name of the struct or enum type describing compound values.
    pub fn contained_type(&self) -> Option<&str> {
        self.contained_type.as_deref()
    }

    pub fn hint(&self) -> UiHint {
        self.hint
    }

    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }

    /// Read the current value from a live element.
    pub fn get(&self, element: &dyn Element) -> Result<PropertyValue, ReflectError> {
        match &self.getter {
            Some(getter) => getter(element),
            None => Err(ReflectError::NotAccessible {
                property: self.name.clone(),
            }),
        }
    }

    /// Write a value to a live element.
    ///
    /// # Errors
    ///
    /// [`ReflectError::ReadOnly`] without a setter,
    /// [`ReflectError::TypeMismatch`] if the value's variant does not match
    /// the property type, or whatever the setter reports.
    pub fn set(&self, element: &mut dyn Element, value: PropertyValue) -> Result<(), ReflectError> {
        let setter = self.setter.as_ref().ok_or_else(|| ReflectError::ReadOnly {
            property: self.name.clone(),
        })?;
        if !value.matches(self.property_type) {
            return Err(ReflectError::TypeMismatch {
                property: self.name.clone(),
                expected: self.property_type,
                found: value.kind_name(),
            });
        }
        setter(element, value)
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("property_type", &self.property_type)
            .field("owner", &self.owner)
            .field("contained_type", &self.contained_type)
            .field("hint", &self.hint)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TypeInfo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// A constructible element kind.
    Element,
    /// An element ancestor that only contributes properties.
    Abstract,
    /// A field layout for Class/Struct properties.
    Struct,
    /// A variant table for Enum/EnumClass properties.
    Enum,
}

/// Reflection metadata for one type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    name: String,
    kind: TypeKind,
    ancestor: Option<String>,
    properties: Vec<Property>,
    type_id: Option<TypeId>,
    variants: Vec<(i32, String)>,
}

impl TypeInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn ancestor(&self) -> Option<&str> {
        self.ancestor.as_deref()
    }

    /// Properties declared directly on this type, in registration order.
    pub fn own_properties(&self) -> &[Property] {
        &self.properties
    }

    /// Native type token, for element kinds.
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// `(value, name)` pairs for enum types, in declaration order.
    pub fn variants(&self) -> &[(i32, String)] {
        &self.variants
    }
}

// ---------------------------------------------------------------------------
// TypeBuilder
// ---------------------------------------------------------------------------

/// Collects the properties of one type during registration.
///
/// `T` is the concrete element type for element registrations and `()` for
/// abstract and struct types, which only get untyped helpers.
pub struct TypeBuilder<'m, T> {
    mirror: &'m ByteMirror,
    owner: String,
    properties: Vec<Property>,
    _marker: PhantomData<fn(&T)>,
}

impl<'m, T> TypeBuilder<'m, T> {
    fn new(mirror: &'m ByteMirror, owner: &str) -> Self {
        Self {
            mirror,
            owner: owner.to_owned(),
            properties: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn push(&mut self, property: Property) -> &mut Self {
        if self.properties.iter().any(|p| p.name == property.name) {
            panic!(
                "reflection: property '{}' declared twice on '{}'",
                property.name, self.owner
            );
        }
        if property.property_type.is_compound() {
            self.check_contained(&property);
        }
        self.properties.push(property);
        self
    }

    fn check_contained(&self, property: &Property) {
        let Some(contained) = property.contained_type.as_deref() else {
            panic!(
                "reflection: compound property '{}.{}' ({}) has no contained type",
                self.owner, property.name, property.property_type
            );
        };
        let expected = if property.property_type.is_enum() {
            TypeKind::Enum
        } else {
            TypeKind::Struct
        };
        match self.mirror.get_type_info_by_name(contained) {
            Some(info) if info.kind == expected => {}
            Some(info) => panic!(
                "reflection: property '{}.{}' expects a {:?} type but '{}' is {:?}",
                self.owner, property.name, expected, contained, info.kind
            ),
            None => panic!(
                "reflection: property '{}.{}' references unregistered type '{}'",
                self.owner, property.name, contained
            ),
        }
    }

    /// Attach a UI hint to the most recently added property.
    pub fn hint(&mut self, hint: UiHint) -> &mut Self {
        if let Some(last) = self.properties.last_mut() {
            last.hint = hint;
        }
        self
    }

    /// Add a property with hand-written accessors.
    pub fn raw_property(
        &mut self,
        name: &str,
        property_type: PropertyType,
        contained_type: Option<&str>,
        getter: Getter,
        setter: Option<Setter>,
    ) -> &mut Self {
        let property = Property {
            name: name.to_owned(),
            property_type,
            owner: self.owner.clone(),
            contained_type: contained_type.map(str::to_owned),
            hint: UiHint::None,
            getter: Some(getter),
            setter,
        };
        self.push(property)
    }

    /// Add an accessor-less field descriptor (struct layouts).
    pub fn field(&mut self, name: &str, property_type: PropertyType) -> &mut Self {
        self.compound_field(name, property_type, None)
    }

    /// Add a field whose values are described by another registered type.
    pub fn compound_field(
        &mut self,
        name: &str,
        property_type: PropertyType,
        contained_type: Option<&str>,
    ) -> &mut Self {
        let property = Property {
            name: name.to_owned(),
            property_type,
            owner: self.owner.clone(),
            contained_type: contained_type.map(str::to_owned),
            hint: UiHint::None,
            getter: None,
            setter: None,
        };
        self.push(property)
    }

    fn finish(self) -> Vec<Property> {
        self.properties
    }
}

impl<'m, T: Element> TypeBuilder<'m, T> {
    fn wrong_element(&self, name: &str) -> impl Fn(&dyn Element) -> ReflectError + Send + Sync + 'static {
        let property = name.to_owned();
        let owner = self.owner.clone();
        move |element: &dyn Element| ReflectError::WrongElement {
            property: property.clone(),
            owner: owner.clone(),
            element_class: element.class_name().to_owned(),
        }
    }

    fn typed_getter<V, G>(&self, name: &str, get: G) -> Getter
    where
        V: ReflectValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let wrong = self.wrong_element(name);
        Arc::new(move |element: &dyn Element| {
            element
                .as_any()
                .downcast_ref::<T>()
                .map(|t| get(t).into_value())
                .ok_or_else(|| wrong(element))
        })
    }

    /// Add a read/write property from a typed getter and setter.
    pub fn property<V, G, S>(&mut self, name: &str, get: G, set: S) -> &mut Self
    where
        V: ReflectValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let getter = self.typed_getter(name, get);
        let wrong = self.wrong_element(name);
        let property = name.to_owned();
        let setter: Setter = Arc::new(move |element: &mut dyn Element, value: PropertyValue| {
            let found = value.kind_name();
            let v = V::from_value(value).ok_or_else(|| ReflectError::TypeMismatch {
                property: property.clone(),
                expected: V::PROPERTY_TYPE,
                found,
            })?;
            if element.as_any().downcast_ref::<T>().is_none() {
                return Err(wrong(&*element));
            }
            if let Some(t) = element.as_any_mut().downcast_mut::<T>() {
                set(t, v);
            }
            Ok(())
        });
        self.raw_property(name, V::PROPERTY_TYPE, None, getter, Some(setter))
    }

    /// Add a property that can be read but never written.
    pub fn read_only<V, G>(&mut self, name: &str, get: G) -> &mut Self
    where
        V: ReflectValue,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let getter = self.typed_getter(name, get);
        self.raw_property(name, V::PROPERTY_TYPE, None, getter, None)
    }

    /// Add an `EnumClass` property backed by a registered enum table.
    pub fn enum_class_property<G, S>(&mut self, name: &str, enum_type: &str, get: G, set: S) -> &mut Self
    where
        G: Fn(&T) -> i32 + Send + Sync + 'static,
        S: Fn(&mut T, i32) + Send + Sync + 'static,
    {
        self.enum_like(name, PropertyType::EnumClass, enum_type, get, set)
    }

    /// Add a plain `Enum` property backed by a registered enum table.
    pub fn enum_property<G, S>(&mut self, name: &str, enum_type: &str, get: G, set: S) -> &mut Self
    where
        G: Fn(&T) -> i32 + Send + Sync + 'static,
        S: Fn(&mut T, i32) + Send + Sync + 'static,
    {
        self.enum_like(name, PropertyType::Enum, enum_type, get, set)
    }

    fn enum_like<G, S>(
        &mut self,
        name: &str,
        property_type: PropertyType,
        enum_type: &str,
        get: G,
        set: S,
    ) -> &mut Self
    where
        G: Fn(&T) -> i32 + Send + Sync + 'static,
        S: Fn(&mut T, i32) + Send + Sync + 'static,
    {
        let known: Vec<i32> = self
            .mirror
            .get_type_info_by_name(enum_type)
            .map(|info| info.variants.iter().map(|(v, _)| *v).collect())
            .unwrap_or_default();

        let wrong = self.wrong_element(name);
        let getter: Getter = Arc::new(move |element: &dyn Element| {
            element
                .as_any()
                .downcast_ref::<T>()
                .map(|t| PropertyValue::Enum(get(t)))
                .ok_or_else(|| wrong(element))
        });

        let wrong = self.wrong_element(name);
        let enum_name = enum_type.to_owned();
        let setter: Setter = Arc::new(move |element: &mut dyn Element, value: PropertyValue| {
            let PropertyValue::Enum(v) = value else {
                return Err(ReflectError::ShapeMismatch {
                    expected: property_type,
                    found: value.kind_name().to_owned(),
                });
            };
            if !known.contains(&v) {
                return Err(ReflectError::UnknownEnumValue {
                    enum_type: enum_name.clone(),
                    value: v.to_string(),
                });
            }
            if element.as_any().downcast_ref::<T>().is_none() {
                return Err(wrong(&*element));
            }
            if let Some(t) = element.as_any_mut().downcast_mut::<T>() {
                set(t, v);
            }
            Ok(())
        });
        self.raw_property(name, property_type, Some(enum_type), getter, Some(setter))
    }

    /// Add a `Class`/`Struct` property whose value is a nested object.
    pub fn compound_property<G, S>(
        &mut self,
        name: &str,
        property_type: PropertyType,
        struct_type: &str,
        get: G,
        set: S,
    ) -> &mut Self
    where
        G: Fn(&T) -> PropertyValue + Send + Sync + 'static,
        S: Fn(&mut T, PropertyValue) -> Result<(), ReflectError> + Send + Sync + 'static,
    {
        let wrong = self.wrong_element(name);
        let getter: Getter = Arc::new(move |element: &dyn Element| {
            element
                .as_any()
                .downcast_ref::<T>()
                .map(|t| get(t))
                .ok_or_else(|| wrong(element))
        });
        let wrong = self.wrong_element(name);
        let setter: Setter = Arc::new(move |element: &mut dyn Element, value: PropertyValue| {
            if element.as_any().downcast_ref::<T>().is_none() {
                return Err(wrong(&*element));
            }
            match element.as_any_mut().downcast_mut::<T>() {
                Some(t) => set(t, value),
                None => Ok(()),
            }
        });
        self.raw_property(name, property_type, Some(struct_type), getter, Some(setter))
    }
}

// ---------------------------------------------------------------------------
// ByteMirror
// ---------------------------------------------------------------------------

/// Process-wide reflection registry.
#[derive(Default)]
pub struct ByteMirror {
    types: BTreeMap<String, TypeInfo>,
    by_type_id: HashMap<TypeId, String>,
    constructors: HashMap<String, Constructor>,
}

impl ByteMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry populated with every built-in element kind.
    pub fn with_builtin_types() -> Self {
        let mut mirror = Self::new();
        crate::builtin::register_builtin_types(&mut mirror);
        mirror
    }

    /// The lazily built process-wide registry of built-in types.
    pub fn global() -> &'static ByteMirror {
        static GLOBAL: OnceLock<ByteMirror> = OnceLock::new();
        GLOBAL.get_or_init(ByteMirror::with_builtin_types)
    }

    fn check_new_type(&self, name: &str, ancestor: Option<&str>) {
        if self.types.contains_key(name) {
            panic!("reflection: type '{name}' registered twice");
        }
        if let Some(ancestor) = ancestor {
            match self.types.get(ancestor) {
                Some(info) if matches!(info.kind, TypeKind::Element | TypeKind::Abstract) => {}
                Some(_) => panic!("reflection: '{name}' cannot derive from non-element type '{ancestor}'"),
                None => panic!("reflection: ancestor '{ancestor}' of '{name}' is not registered"),
            }
        }
    }

    fn insert(&mut self, info: TypeInfo) {
        tracing::debug!(
            type_name = %info.name,
            kind = ?info.kind,
            properties = info.properties.len(),
            "registered reflected type"
        );
        if let Some(type_id) = info.type_id {
            self.by_type_id.insert(type_id, info.name.clone());
        }
        self.types.insert(info.name.clone(), info);
    }

    /// Register an ancestor-only type (e.g. `"Element"`).
    pub fn register_abstract<F>(&mut self, name: &str, ancestor: Option<&str>, build: F)
    where
        F: FnOnce(&mut TypeBuilder<'_, ()>),
    {
        self.check_new_type(name, ancestor);
        let properties = {
            let mut builder = TypeBuilder::new(self, name);
            build(&mut builder);
            builder.finish()
        };
        self.insert(TypeInfo {
            name: name.to_owned(),
            kind: TypeKind::Abstract,
            ancestor: ancestor.map(str::to_owned),
            properties,
            type_id: None,
            variants: Vec::new(),
        });
    }

    /// Register a constructible element kind.
    pub fn register_element<T>(&mut self, name: &str, ancestor: Option<&str>, build: impl FnOnce(&mut TypeBuilder<'_, T>))
    where
        T: Element + Default,
    {
        self.check_new_type(name, ancestor);
        let properties = {
            let mut builder = TypeBuilder::<T>::new(self, name);
            build(&mut builder);
            builder.finish()
        };
        self.insert(TypeInfo {
            name: name.to_owned(),
            kind: TypeKind::Element,
            ancestor: ancestor.map(str::to_owned),
            properties,
            type_id: Some(TypeId::of::<T>()),
            variants: Vec::new(),
        });
        self.constructors
            .insert(name.to_owned(), Box::new(|| Box::new(T::default()) as Box<dyn Element>));
    }

    /// Register a field layout for `Class`/`Struct` properties.
    pub fn register_struct<F>(&mut self, name: &str, build: F)
    where
        F: FnOnce(&mut TypeBuilder<'_, ()>),
    {
        self.check_new_type(name, None);
        let properties = {
            let mut builder = TypeBuilder::new(self, name);
            build(&mut builder);
            builder.finish()
        };
        self.insert(TypeInfo {
            name: name.to_owned(),
            kind: TypeKind::Struct,
            ancestor: None,
            properties,
            type_id: None,
            variants: Vec::new(),
        });
    }

    /// Register an enum's `(value, name)` table.
    pub fn register_enum(&mut self, name: &str, variants: &[(i32, &str)]) {
        self.check_new_type(name, None);
        if variants.is_empty() {
            panic!("reflection: enum '{name}' has no variants");
        }
        self.insert(TypeInfo {
            name: name.to_owned(),
            kind: TypeKind::Enum,
            ancestor: None,
            properties: Vec::new(),
            type_id: None,
            variants: variants.iter().map(|(v, n)| (*v, (*n).to_owned())).collect(),
        });
    }

    // -- lookups --------------------------------------------------------------

    /// `None` for unknown names; callers skip rather than fail.
    pub fn get_type_info_by_name(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    /// Lookup by native element type.
    pub fn get_type_info<T: 'static>(&self) -> Option<&TypeInfo> {
        self.by_type_id
            .get(&TypeId::of::<T>())
            .and_then(|name| self.types.get(name))
    }

    /// Every property visible on `info`, base-most first.
    ///
    /// When a name is declared at several levels the most-derived
    /// declaration wins and takes the slot of the base-most one.
    pub fn get_all_properties_for_type<'a>(&'a self, info: &'a TypeInfo) -> Vec<&'a Property> {
        let mut chain = vec![info];
        let mut current = info;
        while let Some(ancestor) = current.ancestor.as_deref().and_then(|a| self.types.get(a)) {
            if chain.iter().any(|t| t.name == ancestor.name) {
                break;
            }
            chain.push(ancestor);
            current = ancestor;
        }

        let mut out: Vec<&Property> = Vec::new();
        for level in chain.iter().rev() {
            for property in &level.properties {
                match out.iter_mut().find(|p| p.name == property.name) {
                    Some(slot) => *slot = property,
                    None => out.push(property),
                }
            }
        }
        out
    }

    /// Convenience over [`get_all_properties_for_type`](Self::get_all_properties_for_type).
    pub fn get_all_properties(&self, type_name: &str) -> Vec<&Property> {
        match self.types.get(type_name) {
            Some(info) => self.get_all_properties_for_type(info),
            None => Vec::new(),
        }
    }

    /// Find a visible property by name, honouring shadowing.
    pub fn find_property(&self, type_name: &str, property_name: &str) -> Option<&Property> {
        self.get_all_properties(type_name)
            .into_iter()
            .find(|p| p.name == property_name)
    }

    /// Construct a default live element of the named kind.
    pub fn create_element_by_name(&self, name: &str) -> Option<Box<dyn Element>> {
        self.constructors.get(name).map(|ctor| ctor())
    }

    /// Whether `type_name` is `ancestor` or derives from it.
    pub fn is_a(&self, type_name: &str, ancestor: &str) -> bool {
        let mut current = self.types.get(type_name);
        let mut steps = 0;
        while let Some(info) = current {
            if info.name == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.types.len() {
                return false;
            }
            current = info.ancestor.as_deref().and_then(|a| self.types.get(a));
        }
        false
    }

    /// Variant name for an enum value.
    pub fn enum_name_of(&self, enum_type: &str, value: i32) -> Option<&str> {
        self.types
            .get(enum_type)?
            .variants
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, n)| n.as_str())
    }

    /// Enum value for a variant name.
    pub fn enum_value_of(&self, enum_type: &str, name: &str) -> Option<i32> {
        self.types
            .get(enum_type)?
            .variants
            .iter()
            .find(|(_, n)| n == name)
            .map(|(v, _)| *v)
    }

    /// Registered names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Names of constructible element kinds, sorted.
    pub fn element_type_names(&self) -> Vec<&str> {
        self.types
            .values()
            .filter(|t| t.kind == TypeKind::Element)
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for ByteMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteMirror")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
