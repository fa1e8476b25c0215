//! Object storage used by the compiler
//!
//! The compiler never owns object memory directly: it asks an `ObjectStore`
//! for ids, locks an object while writing its properties, and unlocks it on
//! every exit path. `MemoryObjectStore` keeps everything in memory and is
//! what `TadsCompiler` uses unless given another store.

use indexmap::IndexMap;

use crate::tads_compiler::error::CompilerError;
use crate::tads_compiler::opcodes::limits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u16);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectFlags {
    pub class: bool,
    /// Replaced by a `modify`; kept only as a superclass of the new version
    pub superseded: bool,
    pub function: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub data_type: u8,
    pub bytes: Vec<u8>,
    /// Soft-deleted: still occupies space but no longer visible
    pub deleted: bool,
}

/// Interface the compiler uses to build objects
pub trait ObjectStore {
    /// Create a new, empty object and return its id
    fn allocate(&mut self) -> ObjectId;

    /// Pin an object in memory for writing
    fn lock(&mut self, id: ObjectId) -> Result<(), CompilerError>;

    fn unlock(&mut self, id: ObjectId);

    /// Outstanding locks on an object
    fn lock_count(&self, id: ObjectId) -> usize;

    /// Grow (or shrink) the object's allocation to `new_size` bytes
    fn extend(&mut self, id: ObjectId, new_size: usize) -> Result<(), CompilerError>;

    fn mark_dirty(&mut self, id: ObjectId);

    /// Modified since it was created or last written out
    fn is_dirty(&self, id: ObjectId) -> bool;

    /// Reset an object to an empty property list with the given superclasses
    fn init_object(
        &mut self,
        id: ObjectId,
        superclasses: &[ObjectId],
        is_class: bool,
    ) -> Result<(), CompilerError>;

    /// Store a property value; the object must be locked
    fn set_property(
        &mut self,
        id: ObjectId,
        prop: u16,
        data_type: u8,
        bytes: &[u8],
    ) -> Result<(), CompilerError>;

    fn get_property(&self, id: ObjectId, prop: u16) -> Option<&PropertyValue>;

    /// Remove a property. A soft delete leaves the storage in place.
    /// Returns whether the property existed.
    fn delete_property(&mut self, id: ObjectId, prop: u16, soft: bool) -> bool;

    fn flags(&self, id: ObjectId) -> ObjectFlags;

    fn set_flags(&mut self, id: ObjectId, flags: ObjectFlags);

    fn superclasses(&self, id: ObjectId) -> Vec<ObjectId>;

    fn set_superclasses(&mut self, id: ObjectId, superclasses: &[ObjectId]);

    /// Copy an object under a new id
    fn duplicate(&mut self, id: ObjectId) -> Result<ObjectId, CompilerError>;

    /// Store compiled code as a function object
    fn write_function(&mut self, id: ObjectId, code: Vec<u8>) -> Result<(), CompilerError>;

    fn function_code(&self, id: ObjectId) -> Option<&[u8]>;

    /// Bytes the object currently needs
    fn size(&self, id: ObjectId) -> usize;

    /// Bytes allocated to the object
    fn allocated(&self, id: ObjectId) -> usize;

    /// Visible properties in definition order
    fn properties(&self, id: ObjectId) -> Vec<(u16, PropertyValue)>;

    fn object_count(&self) -> usize;
}

#[derive(Debug, Clone, Default)]
struct StoredObject {
    superclasses: Vec<ObjectId>,
    flags: ObjectFlags,
    properties: IndexMap<u16, PropertyValue>,
    code: Option<Vec<u8>>,
    locks: usize,
    dirty: bool,
    capacity: usize,
}

impl StoredObject {
    fn size(&self) -> usize {
        let code = self.code.as_ref().map_or(0, |c| c.len());
        let props: usize = self
            .properties
            .values()
            .map(|p| 6 + p.bytes.len())
            .sum();
        limits::OBJ_HEADER_SIZE + 2 * self.superclasses.len() + props + code
    }
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Vec<StoredObject>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn object(&self, id: ObjectId) -> Option<&StoredObject> {
        self.objects.get(id.0 as usize)
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut StoredObject, CompilerError> {
        self.objects
            .get_mut(id.0 as usize)
            .ok_or_else(|| CompilerError::InternalError(format!("no such object {}", id.0)))
    }

    fn locked_mut(&mut self, id: ObjectId) -> Result<&mut StoredObject, CompilerError> {
        let object = self.object_mut(id)?;
        if object.locks == 0 {
            return Err(CompilerError::InternalError(format!(
                "object {} written without a lock",
                id.0
            )));
        }
        Ok(object)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.objects.len() as u16);
        self.objects.push(StoredObject {
            capacity: limits::OBJ_HEADER_SIZE,
            ..StoredObject::default()
        });
        id
    }

    fn lock(&mut self, id: ObjectId) -> Result<(), CompilerError> {
        self.object_mut(id)?.locks += 1;
        Ok(())
    }

    fn unlock(&mut self, id: ObjectId) {
        if let Ok(object) = self.object_mut(id) {
            object.locks = object.locks.saturating_sub(1);
        }
    }

    fn lock_count(&self, id: ObjectId) -> usize {
        self.object(id).map_or(0, |o| o.locks)
    }

    fn extend(&mut self, id: ObjectId, new_size: usize) -> Result<(), CompilerError> {
        let object = self.locked_mut(id)?;
        if new_size < object.size() {
            return Err(CompilerError::InternalError(format!(
                "object {} cannot shrink below {} bytes",
                id.0,
                object.size()
            )));
        }
        object.capacity = new_size;
        object.dirty = true;
        Ok(())
    }

    fn mark_dirty(&mut self, id: ObjectId) {
        if let Ok(object) = self.object_mut(id) {
            object.dirty = true;
        }
    }

    fn is_dirty(&self, id: ObjectId) -> bool {
        self.object(id).is_some_and(|o| o.dirty)
    }

    fn init_object(
        &mut self,
        id: ObjectId,
        superclasses: &[ObjectId],
        is_class: bool,
    ) -> Result<(), CompilerError> {
        let object = self.locked_mut(id)?;
        object.superclasses = superclasses.to_vec();
        object.properties.clear();
        object.code = None;
        object.flags = ObjectFlags {
            class: is_class,
            ..ObjectFlags::default()
        };
        object.capacity = object.capacity.max(object.size());
        object.dirty = true;
        Ok(())
    }

    fn set_property(
        &mut self,
        id: ObjectId,
        prop: u16,
        data_type: u8,
        bytes: &[u8],
    ) -> Result<(), CompilerError> {
        let object = self.locked_mut(id)?;
        object.properties.insert(
            prop,
            PropertyValue {
                data_type,
                bytes: bytes.to_vec(),
                deleted: false,
            },
        );
        let size = object.size();
        if size > object.capacity {
            object.capacity = size;
        }
        object.dirty = true;
        Ok(())
    }

    fn get_property(&self, id: ObjectId, prop: u16) -> Option<&PropertyValue> {
        self.object(id)
            .and_then(|o| o.properties.get(&prop))
            .filter(|p| !p.deleted)
    }

    fn delete_property(&mut self, id: ObjectId, prop: u16, soft: bool) -> bool {
        let object = match self.object_mut(id) {
            Ok(object) => object,
            Err(_) => return false,
        };
        let existed = if soft {
            match object.properties.get_mut(&prop) {
                Some(value) if !value.deleted => {
                    value.deleted = true;
                    true
                }
                _ => false,
            }
        } else {
            object.properties.shift_remove(&prop).is_some()
        };
        if existed {
            object.dirty = true;
        }
        existed
    }

    fn flags(&self, id: ObjectId) -> ObjectFlags {
        self.object(id).map(|o| o.flags).unwrap_or_default()
    }

    fn set_flags(&mut self, id: ObjectId, flags: ObjectFlags) {
        if let Ok(object) = self.object_mut(id) {
            object.flags = flags;
            object.dirty = true;
        }
    }

    fn superclasses(&self, id: ObjectId) -> Vec<ObjectId> {
        self.object(id)
            .map(|o| o.superclasses.clone())
            .unwrap_or_default()
    }

    fn set_superclasses(&mut self, id: ObjectId, superclasses: &[ObjectId]) {
        if let Ok(object) = self.object_mut(id) {
            object.superclasses = superclasses.to_vec();
            object.dirty = true;
        }
    }

    fn duplicate(&mut self, id: ObjectId) -> Result<ObjectId, CompilerError> {
        let mut copy = self
            .object(id)
            .cloned()
            .ok_or_else(|| CompilerError::InternalError(format!("no such object {}", id.0)))?;
        copy.locks = 0;
        copy.dirty = true;
        let new_id = ObjectId(self.objects.len() as u16);
        self.objects.push(copy);
        Ok(new_id)
    }

    fn write_function(&mut self, id: ObjectId, code: Vec<u8>) -> Result<(), CompilerError> {
        let object = self.object_mut(id)?;
        object.capacity = object.capacity.max(limits::OBJ_HEADER_SIZE + code.len());
        object.code = Some(code);
        object.flags.function = true;
        object.dirty = true;
        Ok(())
    }

    fn function_code(&self, id: ObjectId) -> Option<&[u8]> {
        self.object(id).and_then(|o| o.code.as_deref())
    }

    fn size(&self, id: ObjectId) -> usize {
        self.object(id).map_or(0, |o| o.size())
    }

    fn allocated(&self, id: ObjectId) -> usize {
        self.object(id).map_or(0, |o| o.capacity)
    }

    fn properties(&self, id: ObjectId) -> Vec<(u16, PropertyValue)> {
        self.object(id)
            .map(|o| {
                o.properties
                    .iter()
                    .filter(|(_, value)| !value.deleted)
                    .map(|(prop, value)| (*prop, value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn object_count(&self) -> usize {
        self.objects.len()
    }
}
