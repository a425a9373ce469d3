// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object arena.
//!
//! Live objects are stored in one arena and addressed by [`ObjectHandle`].
//! Classes and packages are objects too, so references to them go through
//! the same handles as references to assets.

use crate::reflect::{ClassId, FieldTable, TypeRegistry};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

/// Handle of an object in an [`ObjectArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u32);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Object creation flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectFlags(pub u32);

impl ObjectFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Visible outside its package
    pub const PUBLIC: Self = Self(0x0000_0001);
    /// Kept alive without references
    pub const STANDALONE: Self = Self(0x0000_0002);
    /// Participates in undo
    pub const TRANSACTIONAL: Self = Self(0x0000_0008);
    /// Class default object
    pub const CLASS_DEFAULT_OBJECT: Self = Self(0x0000_0010);
    /// Template for other objects
    pub const ARCHETYPE_OBJECT: Self = Self(0x0000_0020);
    /// Never saved
    pub const TRANSIENT: Self = Self(0x0000_0040);
    /// Subobject created by its outer's constructor
    pub const DEFAULT_SUB_OBJECT: Self = Self(0x0004_0000);

    /// The subset persisted in descriptors and restored on load
    pub const LOADABLE: Self = Self(
        Self::PUBLIC.0
            | Self::STANDALONE.0
            | Self::TRANSACTIONAL.0
            | Self::CLASS_DEFAULT_OBJECT.0
            | Self::ARCHETYPE_OBJECT.0
            | Self::DEFAULT_SUB_OBJECT.0,
    );

    /// Whether all bits of `other` are set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Keep only the loadable bits
    pub fn loadable(self) -> Self {
        Self(self.0 & Self::LOADABLE.0)
    }
}

impl BitOr for ObjectFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A live object
#[derive(Debug, Clone)]
pub struct ObjectData {
    /// Object name, unique under its outer
    pub name: String,
    /// Concrete class
    pub class: ClassId,
    /// Owning container; `None` only for packages
    pub outer: Option<ObjectHandle>,
    /// Creation flags
    pub flags: ObjectFlags,
    /// Template the object was created from
    pub archetype: Option<ObjectHandle>,
    /// Property slots, aligned with the class field table
    pub properties: Vec<Value>,
    defines: Option<ClassId>,
}

/// Arena owning every live object
pub struct ObjectArena {
    registry: Rc<TypeRegistry>,
    objects: Vec<ObjectData>,
    packages: IndexMap<String, ObjectHandle>,
    children: HashMap<ObjectHandle, Vec<ObjectHandle>>,
    class_objects: Vec<ObjectHandle>,
}

impl ObjectArena {
    /// Create an arena with a class object for every registered class
    pub fn new(registry: Rc<TypeRegistry>) -> Self {
        let mut arena = Self {
            registry: Rc::clone(&registry),
            objects: Vec::new(),
            packages: IndexMap::new(),
            children: HashMap::new(),
            class_objects: Vec::new(),
        };

        for (id, class) in registry.classes() {
            let package = arena.create_package(&class.package);
            let handle = arena.push(ObjectData {
                name: class.name.clone(),
                class: registry.class_class(),
                outer: Some(package),
                flags: ObjectFlags::PUBLIC | ObjectFlags::STANDALONE,
                archetype: None,
                properties: Vec::new(),
                defines: Some(id),
            });
            arena.class_objects.push(handle);
        }
        arena
    }

    /// The registry objects are typed against
    pub fn registry(&self) -> &Rc<TypeRegistry> {
        &self.registry
    }

    fn push(&mut self, data: ObjectData) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len() as u32);
        if let Some(outer) = data.outer {
            self.children.entry(outer).or_default().push(handle);
        }
        self.objects.push(data);
        handle
    }

    /// Find or create a package by name
    pub fn create_package(&mut self, name: &str) -> ObjectHandle {
        if let Some(handle) = self.packages.get(name) {
            return *handle;
        }
        let handle = self.push(ObjectData {
            name: name.to_string(),
            class: self.registry.package_class(),
            outer: None,
            flags: ObjectFlags::PUBLIC,
            archetype: None,
            properties: Vec::new(),
            defines: None,
        });
        self.packages.insert(name.to_string(), handle);
        handle
    }

    /// Find a loaded package by name
    pub fn find_package(&self, name: &str) -> Option<ObjectHandle> {
        self.packages.get(name).copied()
    }

    /// Construct a new object. Property slots are copied from `template`
    /// when it has the same class, otherwise default-initialized.
    pub fn construct(
        &mut self,
        class: ClassId,
        outer: ObjectHandle,
        name: &str,
        flags: ObjectFlags,
        template: Option<ObjectHandle>,
    ) -> ObjectHandle {
        let template = template.filter(|t| self.object(*t).class == class);
        let properties = match template {
            Some(t) => self.object(t).properties.clone(),
            None => self.registry.default_properties(class),
        };
        self.push(ObjectData {
            name: name.to_string(),
            class,
            outer: Some(outer),
            flags,
            archetype: template,
            properties,
            defines: None,
        })
    }

    /// Object data. Handles are only minted by this arena.
    pub fn object(&self, handle: ObjectHandle) -> &ObjectData {
        &self.objects[handle.0 as usize]
    }

    /// Mutable object data
    pub fn object_mut(&mut self, handle: ObjectHandle) -> &mut ObjectData {
        &mut self.objects[handle.0 as usize]
    }

    /// Object name
    pub fn name(&self, handle: ObjectHandle) -> &str {
        &self.object(handle).name
    }

    /// Object outer
    pub fn outer(&self, handle: ObjectHandle) -> Option<ObjectHandle> {
        self.object(handle).outer
    }

    /// Class of an object
    pub fn class(&self, handle: ObjectHandle) -> ClassId {
        self.object(handle).class
    }

    /// Direct children of an object
    pub fn children(&self, handle: ObjectHandle) -> &[ObjectHandle] {
        self.children.get(&handle).map_or(&[], Vec::as_slice)
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether the object is a package
    pub fn is_package(&self, handle: ObjectHandle) -> bool {
        self.class(handle) == self.registry.package_class()
    }

    /// The class object standing for a registered class
    pub fn class_object(&self, class: ClassId) -> ObjectHandle {
        self.class_objects[class.0 as usize]
    }

    /// The class an object stands for, if it is a class object
    pub fn class_of(&self, handle: ObjectHandle) -> Option<ClassId> {
        self.object(handle).defines
    }

    /// Walk the outer chain up to the package
    pub fn outermost(&self, handle: ObjectHandle) -> ObjectHandle {
        let mut current = handle;
        while let Some(outer) = self.outer(current) {
            current = outer;
        }
        current
    }

    /// Find a direct child of `outer` by name whose class is `class` or a
    /// subclass of it
    pub fn find_object(
        &self,
        class: Option<ClassId>,
        outer: ObjectHandle,
        name: &str,
    ) -> Option<ObjectHandle> {
        self.children(outer).iter().copied().find(|child| {
            let data = self.object(*child);
            data.name == name
                && class.map_or(true, |c| self.registry.is_child_of(data.class, c))
        })
    }

    /// Best-effort archetype: the same-named subobject of the outer's own
    /// archetype
    pub fn find_archetype(
        &self,
        class: ClassId,
        outer: ObjectHandle,
        name: &str,
    ) -> Option<ObjectHandle> {
        let outer_archetype = self.object(outer).archetype?;
        self.find_object(Some(class), outer_archetype, name)
    }

    /// Full path: `/Game/Pkg.Asset:Sub`
    pub fn path_name(&self, handle: ObjectHandle) -> String {
        let mut chain = vec![handle];
        let mut current = handle;
        while let Some(outer) = self.outer(current) {
            chain.push(outer);
            current = outer;
        }
        chain.reverse();

        let mut path = String::new();
        for (depth, object) in chain.iter().enumerate() {
            match depth {
                0 => {}
                1 => path.push('.'),
                _ => path.push(':'),
            }
            path.push_str(self.name(*object));
        }
        path
    }

    /// Resolve a path produced by [`ObjectArena::path_name`]
    pub fn find_by_path(&self, path: &str) -> Option<ObjectHandle> {
        let (package, rest) = match path.split_once('.') {
            Some((package, rest)) => (package, Some(rest)),
            None => (path, None),
        };
        let mut current = self.find_package(package)?;
        if let Some(rest) = rest {
            for part in rest.split(':') {
                current = self.find_object(None, current, part)?;
            }
        }
        Some(current)
    }

    /// Rename and optionally move an object
    pub fn rename(&mut self, handle: ObjectHandle, name: &str, new_outer: Option<ObjectHandle>) {
        if let Some(new_outer) = new_outer {
            if let Some(old_outer) = self.outer(handle) {
                if let Some(siblings) = self.children.get_mut(&old_outer) {
                    siblings.retain(|h| *h != handle);
                }
            }
            self.children.entry(new_outer).or_default().push(handle);
            self.object_mut(handle).outer = Some(new_outer);
        }
        self.object_mut(handle).name = name.to_string();
    }

    /// Property slot by index
    pub fn property(&self, handle: ObjectHandle, slot: usize) -> Option<&Value> {
        self.object(handle).properties.get(slot)
    }

    /// Overwrite a property slot
    pub fn set_property(&mut self, handle: ObjectHandle, slot: usize, value: Value) {
        if let Some(target) = self.object_mut(handle).properties.get_mut(slot) {
            *target = value;
        }
    }

    /// Property by field name
    pub fn property_by_name(&self, handle: ObjectHandle, name: &str) -> Option<&Value> {
        let slot = self.registry.class(self.class(handle)).field_index(name)?;
        self.property(handle, slot)
    }

    /// Overwrite a property by field name; false if the class has no such field
    pub fn set_property_by_name(&mut self, handle: ObjectHandle, name: &str, value: Value) -> bool {
        match self.registry.class(self.class(handle)).field_index(name) {
            Some(slot) => {
                self.set_property(handle, slot, value);
                true
            }
            None => false,
        }
    }

    /// Every object whose class is `class` or a subclass
    pub fn objects_of_class(&self, class: ClassId) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(move |(_, o)| self.registry.is_child_of(o.class, class))
            .map(|(i, _)| ObjectHandle(i as u32))
    }
}

impl fmt::Debug for ObjectArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectArena")
            .field("objects", &self.objects.len())
            .field("packages", &self.packages.len())
            .finish()
    }
}
