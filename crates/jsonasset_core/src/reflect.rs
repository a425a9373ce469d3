// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type registry: classes, structs and enums described by explicit field
//! tables.
//!
//! Every codec walks these tables instead of inspecting live memory. A
//! registry is built once at startup and shared read-only afterwards.

use crate::text::Text;
use crate::value::{ScriptMap, ScriptSet, SoftObjectPath, StructValue, Value};
use std::collections::HashMap;
use std::ops::BitOr;

/// Package that holds the core object model types
pub const CORE_PACKAGE: &str = "/Script/CoreUObject";

/// Package that holds engine types
pub const ENGINE_PACKAGE: &str = "/Script/Engine";

/// Identifier of a registered class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Identifier of a registered struct type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub u32);

/// Identifier of a registered enum type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub u32);

/// Property metadata flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertyFlags(u32);

impl PropertyFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Never persisted
    pub const TRANSIENT: Self = Self(1 << 0);
    /// Only present in editor builds
    pub const EDITOR_ONLY: Self = Self(1 << 1);
    /// Kept for loading old data only
    pub const DEPRECATED: Self = Self(1 << 2);

    /// Whether all bits of `other` are set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PropertyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The closed set of property kinds the codec dispatches on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Boolean
    Bool,
    /// Signed or unsigned integer of any width
    Int,
    /// Single or double precision float
    Float,
    /// Byte, optionally backed by an enum
    Byte(Option<EnumId>),
    /// Enum with an integer underlying type
    Enum(EnumId),
    /// String
    Str,
    /// Name
    Name,
    /// Localizable text
    Text,
    /// Hard object reference
    Object,
    /// Interface reference
    Interface,
    /// Soft object path, never resolved
    SoftObject,
    /// Struct of a registered type
    Struct(StructId),
    /// Ordered array
    Array(Box<PropertyKind>),
    /// Hashed set
    Set(Box<PropertyKind>),
    /// Hashed map
    Map(Box<PropertyKind>, Box<PropertyKind>),
    /// Single-cast delegate
    Delegate,
    /// Multicast delegate
    MulticastDelegate,
}

impl PropertyKind {
    /// Array of the given element kind
    pub fn array(inner: PropertyKind) -> Self {
        Self::Array(Box::new(inner))
    }

    /// Set of the given element kind
    pub fn set(inner: PropertyKind) -> Self {
        Self::Set(Box::new(inner))
    }

    /// Map of the given key and value kinds
    pub fn map(key: PropertyKind, value: PropertyKind) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// Short name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Byte(_) => "Byte",
            Self::Enum(_) => "Enum",
            Self::Str => "Str",
            Self::Name => "Name",
            Self::Text => "Text",
            Self::Object => "Object",
            Self::Interface => "Interface",
            Self::SoftObject => "SoftObject",
            Self::Struct(_) => "Struct",
            Self::Array(_) => "Array",
            Self::Set(_) => "Set",
            Self::Map(..) => "Map",
            Self::Delegate => "Delegate",
            Self::MulticastDelegate => "MulticastDelegate",
        }
    }
}

/// One field of a class or struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name as it appears in JSON
    pub name: String,
    /// Property kind
    pub kind: PropertyKind,
    /// Metadata flags
    pub flags: PropertyFlags,
    /// Static array dimension (1 for plain fields)
    pub array_dim: usize,
    /// Name of the type that declares the field
    pub owner: String,
}

impl FieldDescriptor {
    /// Create a plain field
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: PropertyFlags::NONE,
            array_dim: 1,
            owner: String::new(),
        }
    }

    /// Make this a static array of `dim` elements
    pub fn fixed(mut self, dim: usize) -> Self {
        self.array_dim = dim.max(1);
        self
    }

    /// Mark as transient
    pub fn transient(mut self) -> Self {
        self.flags = self.flags | PropertyFlags::TRANSIENT;
        self
    }

    /// Mark as editor-only
    pub fn editor_only(mut self) -> Self {
        self.flags = self.flags | PropertyFlags::EDITOR_ONLY;
        self
    }

    /// Mark as deprecated
    pub fn deprecated(mut self) -> Self {
        self.flags = self.flags | PropertyFlags::DEPRECATED;
        self
    }

    /// Whether the field has the given flags
    pub fn has_flags(&self, flags: PropertyFlags) -> bool {
        self.flags.contains(flags)
    }
}

/// Field table lookups shared by classes and structs
pub trait FieldTable {
    /// Flattened fields, parent fields first
    fn fields(&self) -> &[FieldDescriptor];

    /// Index of a field by name
    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    /// Field by name
    fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields().iter().find(|f| f.name == name)
    }
}

/// A registered class
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Class name without prefix, e.g. `CurveFloat`
    pub name: String,
    /// Script package, e.g. `/Script/Engine`
    pub package: String,
    /// Parent class
    pub parent: Option<ClassId>,
    fields: Vec<FieldDescriptor>,
}

impl ClassDescriptor {
    /// Start describing a class in the engine package
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: ENGINE_PACKAGE.to_string(),
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Set the script package
    pub fn in_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Set the parent class
    pub fn with_parent(mut self, parent: ClassId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

impl FieldTable for ClassDescriptor {
    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// A registered struct type
#[derive(Debug, Clone)]
pub struct StructDescriptor {
    /// Struct name without prefix, e.g. `RichCurveKey`
    pub name: String,
    /// Script package
    pub package: String,
    /// Parent struct
    pub parent: Option<StructId>,
    fields: Vec<FieldDescriptor>,
}

impl StructDescriptor {
    /// Start describing a struct in the engine package
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: ENGINE_PACKAGE.to_string(),
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Set the script package
    pub fn in_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Set the parent struct
    pub fn with_parent(mut self, parent: StructId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

impl FieldTable for StructDescriptor {
    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// A registered enum type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    /// Enum name, e.g. `ERichCurveInterpMode`
    pub name: String,
    entries: Vec<(String, i64)>,
}

impl EnumDescriptor {
    /// Enum with explicit entry names and values
    pub fn new(name: impl Into<String>, entries: Vec<(String, i64)>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Namespaced enum: entries are stored as `Enum::Entry`, valued in order
    pub fn namespaced(name: &str, entries: &[&str]) -> Self {
        let entries = entries
            .iter()
            .zip(0i64..)
            .map(|(entry, value)| (format!("{name}::{entry}"), value))
            .collect();
        Self::new(name, entries)
    }

    /// Look up a value by full (`Enum::Entry`) or short (`Entry`) name
    pub fn value_of(&self, name: &str) -> Option<i64> {
        let short = |full: &str| full.rsplit("::").next().map(str::to_string);
        let wanted = short(name)?;
        self.entries
            .iter()
            .find(|(entry, _)| entry == name || short(entry).as_deref() == Some(wanted.as_str()))
            .map(|(_, value)| *value)
    }

    /// Stored name of a value
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name.as_str())
    }

    /// All entries
    pub fn entries(&self) -> &[(String, i64)] {
        &self.entries
    }
}

/// Registry of every type the codec can construct
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    classes: Vec<ClassDescriptor>,
    structs: Vec<StructDescriptor>,
    enums: Vec<EnumDescriptor>,
    class_names: HashMap<String, ClassId>,
    struct_names: HashMap<String, StructId>,
    enum_names: HashMap<String, EnumId>,
    object_class: ClassId,
    package_class: ClassId,
    class_class: ClassId,
}

impl TypeRegistry {
    /// Create a registry holding only the core object model classes
    pub fn new() -> Self {
        let mut registry = Self {
            classes: Vec::new(),
            structs: Vec::new(),
            enums: Vec::new(),
            class_names: HashMap::new(),
            struct_names: HashMap::new(),
            enum_names: HashMap::new(),
            object_class: ClassId(0),
            package_class: ClassId(0),
            class_class: ClassId(0),
        };

        let object =
            registry.register_class(ClassDescriptor::new("Object").in_package(CORE_PACKAGE));
        registry.object_class = object;
        registry.package_class = registry.register_class(
            ClassDescriptor::new("Package")
                .in_package(CORE_PACKAGE)
                .with_parent(object),
        );
        registry.class_class = registry.register_class(
            ClassDescriptor::new("Class")
                .in_package(CORE_PACKAGE)
                .with_parent(object),
        );
        registry
    }

    /// Register a class; its field table is flattened with the parent's
    pub fn register_class(&mut self, mut class: ClassDescriptor) -> ClassId {
        let own = std::mem::take(&mut class.fields);
        if let Some(parent) = class.parent {
            class.fields = self.class(parent).fields.clone();
        }
        class.fields.extend(own.into_iter().map(|mut field| {
            field.owner = class.name.clone();
            field
        }));

        let id = ClassId(self.classes.len() as u32);
        self.class_names.insert(class.name.clone(), id);
        self.classes.push(class);
        id
    }

    /// Register a struct type; its field table is flattened with the parent's
    pub fn register_struct(&mut self, mut def: StructDescriptor) -> StructId {
        let own = std::mem::take(&mut def.fields);
        if let Some(parent) = def.parent {
            def.fields = self.struct_type(parent).fields.clone();
        }
        def.fields.extend(own.into_iter().map(|mut field| {
            field.owner = def.name.clone();
            field
        }));

        let id = StructId(self.structs.len() as u32);
        self.struct_names.insert(def.name.clone(), id);
        self.structs.push(def);
        id
    }

    /// Register an enum type
    pub fn register_enum(&mut self, def: EnumDescriptor) -> EnumId {
        let id = EnumId(self.enums.len() as u32);
        self.enum_names.insert(def.name.clone(), id);
        self.enums.push(def);
        id
    }

    /// Class by id. Ids are only minted by this registry.
    pub fn class(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.0 as usize]
    }

    /// Struct by id
    pub fn struct_type(&self, id: StructId) -> &StructDescriptor {
        &self.structs[id.0 as usize]
    }

    /// Enum by id
    pub fn enum_type(&self, id: EnumId) -> &EnumDescriptor {
        &self.enums[id.0 as usize]
    }

    /// Find a class by name
    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    /// Find a class by package and name
    pub fn find_class_in(&self, package: &str, name: &str) -> Option<ClassId> {
        self.find_class(name)
            .filter(|id| self.class(*id).package == package)
    }

    /// Find a struct type by name
    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        self.struct_names.get(name).copied()
    }

    /// Find an enum type by name
    pub fn find_enum(&self, name: &str) -> Option<EnumId> {
        self.enum_names.get(name).copied()
    }

    /// All registered classes
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassDescriptor)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (ClassId(i as u32), c))
    }

    /// The root `Object` class
    pub fn object_class(&self) -> ClassId {
        self.object_class
    }

    /// The `Package` class
    pub fn package_class(&self) -> ClassId {
        self.package_class
    }

    /// The `Class` class
    pub fn class_class(&self) -> ClassId {
        self.class_class
    }

    /// Whether `class` is `parent` or derives from it
    pub fn is_child_of(&self, class: ClassId, parent: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == parent {
                return true;
            }
            current = self.class(id).parent;
        }
        false
    }

    /// Whether struct `def` is `parent` or derives from it
    pub fn struct_is_child_of(&self, def: StructId, parent: StructId) -> bool {
        let mut current = Some(def);
        while let Some(id) = current {
            if id == parent {
                return true;
            }
            current = self.struct_type(id).parent;
        }
        false
    }

    /// Default value for a single element of a kind
    pub fn default_value(&self, kind: &PropertyKind) -> Value {
        match kind {
            PropertyKind::Bool => Value::Bool(false),
            PropertyKind::Int | PropertyKind::Byte(_) | PropertyKind::Enum(_) => Value::Int(0),
            PropertyKind::Float => Value::Float(0.0),
            PropertyKind::Str => Value::Str(String::new()),
            PropertyKind::Name => Value::Name(String::new()),
            PropertyKind::Text => Value::Text(Text::default()),
            PropertyKind::Object => Value::Object(None),
            PropertyKind::Interface => Value::Interface(None),
            PropertyKind::SoftObject => Value::SoftObject(SoftObjectPath::default()),
            PropertyKind::Struct(id) => Value::Struct(self.default_struct(*id)),
            PropertyKind::Array(_) => Value::Array(Vec::new()),
            PropertyKind::Set(_) => Value::Set(ScriptSet::new()),
            PropertyKind::Map(..) => Value::Map(ScriptMap::new()),
            PropertyKind::Delegate => Value::Delegate,
            PropertyKind::MulticastDelegate => Value::MulticastDelegate,
        }
    }

    /// Default value of a field, honoring its static array dimension
    pub fn default_field(&self, field: &FieldDescriptor) -> Value {
        if field.array_dim > 1 {
            Value::Fixed((0..field.array_dim).map(|_| self.default_value(&field.kind)).collect())
        } else {
            self.default_value(&field.kind)
        }
    }

    /// Default-initialized struct value
    pub fn default_struct(&self, id: StructId) -> StructValue {
        let fields = self
            .struct_type(id)
            .fields()
            .iter()
            .map(|f| self.default_field(f))
            .collect();
        StructValue::new(id, fields)
    }

    /// Default property slots for a class
    pub fn default_properties(&self, class: ClassId) -> Vec<Value> {
        self.class(class)
            .fields()
            .iter()
            .map(|f| self.default_field(f))
            .collect()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_classes() {
        let registry = TypeRegistry::new();
        let package = registry.find_class("Package").unwrap();
        assert_eq!(package, registry.package_class());
        assert!(registry.is_child_of(package, registry.object_class()));
        assert_eq!(registry.find_class_in(CORE_PACKAGE, "Class"), Some(registry.class_class()));
        assert_eq!(registry.find_class_in(ENGINE_PACKAGE, "Class"), None);
    }

    #[test]
    fn test_field_flattening() {
        let mut registry = TypeRegistry::new();
        let base = registry.register_class(
            ClassDescriptor::new("Base")
                .with_parent(registry.object_class())
                .field(FieldDescriptor::new("A", PropertyKind::Int)),
        );
        let derived = registry.register_class(
            ClassDescriptor::new("Derived")
                .with_parent(base)
                .field(FieldDescriptor::new("B", PropertyKind::Float).fixed(3)),
        );

        let class = registry.class(derived);
        let names: Vec<_> = class.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(class.fields()[0].owner, "Base");
        assert_eq!(class.fields()[1].owner, "Derived");
        assert_eq!(class.field_index("B"), Some(1));

        let defaults = registry.default_properties(derived);
        assert_eq!(defaults[1], Value::Fixed(vec![Value::Float(0.0); 3]));
    }

    #[test]
    fn test_enum_lookup() {
        let def =
            EnumDescriptor::namespaced("ERichCurveInterpMode", &["RCIM_Linear", "RCIM_Constant"]);
        assert_eq!(def.value_of("ERichCurveInterpMode::RCIM_Constant"), Some(1));
        assert_eq!(def.value_of("RCIM_Linear"), Some(0));
        assert_eq!(def.value_of("RCIM_Cubic"), None);
        assert_eq!(def.name_of(0), Some("ERichCurveInterpMode::RCIM_Linear"));
    }

    #[test]
    fn test_flags() {
        let field = FieldDescriptor::new("X", PropertyKind::Bool).transient().editor_only();
        assert!(field.has_flags(PropertyFlags::TRANSIENT));
        assert!(field.has_flags(PropertyFlags::EDITOR_ONLY));
        assert!(!field.has_flags(PropertyFlags::DEPRECATED));
    }
}
