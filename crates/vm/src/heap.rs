//! Heap of structs and arrays, shared by one id space.

use std::collections::HashMap;

use crate::value::{FaultKind, ObjectId, Value};

/// A heap-allocated object: either a struct (named fields) or an array
/// (indexed elements). Keeping both in one tagged store means a struct
/// opcode applied to an array id is detected instead of silently reading
/// the wrong table.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapObject {
    Struct(HashMap<String, Value>),
    Array(Vec<Value>),
}

#[derive(Debug, Default)]
pub struct Heap {
    objects: HashMap<ObjectId, HeapObject>,
    next_id: ObjectId,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_struct(&mut self) -> ObjectId {
        self.alloc(HeapObject::Struct(HashMap::new()))
    }

    pub fn alloc_array(&mut self, len: usize, fill: Value) -> ObjectId {
        self.alloc(HeapObject::Array(vec![fill; len]))
    }

    fn alloc(&mut self, object: HeapObject) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn struct_fields(&self, id: ObjectId) -> Result<&HashMap<String, Value>, FaultKind> {
        match self.objects.get(&id) {
            Some(HeapObject::Struct(fields)) => Ok(fields),
            Some(HeapObject::Array(_)) => Err(FaultKind::NotAStruct(id)),
            None => Err(FaultKind::InvalidObject(id)),
        }
    }

    pub fn struct_fields_mut(
        &mut self,
        id: ObjectId,
    ) -> Result<&mut HashMap<String, Value>, FaultKind> {
        match self.objects.get_mut(&id) {
            Some(HeapObject::Struct(fields)) => Ok(fields),
            Some(HeapObject::Array(_)) => Err(FaultKind::NotAStruct(id)),
            None => Err(FaultKind::InvalidObject(id)),
        }
    }

    pub fn array(&self, id: ObjectId) -> Result<&Vec<Value>, FaultKind> {
        match self.objects.get(&id) {
            Some(HeapObject::Array(elems)) => Ok(elems),
            Some(HeapObject::Struct(_)) => Err(FaultKind::NotAnArray(id)),
            None => Err(FaultKind::InvalidObject(id)),
        }
    }

    pub fn array_mut(&mut self, id: ObjectId) -> Result<&mut Vec<Value>, FaultKind> {
        match self.objects.get_mut(&id) {
            Some(HeapObject::Array(elems)) => Ok(elems),
            Some(HeapObject::Struct(_)) => Err(FaultKind::NotAnArray(id)),
            None => Err(FaultKind::InvalidObject(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut heap = Heap::new();
        let a = heap.alloc_struct();
        let b = heap.alloc_array(3, Value::Null);
        let c = heap.alloc_struct();
        assert!(a < b && b < c);
        assert_eq!(heap.len(), 3);
    }

    #[test]
    fn array_fill() {
        let mut heap = Heap::new();
        let id = heap.alloc_array(2, Value::Null);
        assert_eq!(heap.array(id).unwrap().as_slice(), &[Value::Null, Value::Null]);
    }

    #[test]
    fn kind_mismatch_is_detected() {
        let mut heap = Heap::new();
        let s = heap.alloc_struct();
        let a = heap.alloc_array(1, Value::Null);
        assert_eq!(heap.array(s), Err(FaultKind::NotAnArray(s)));
        assert_eq!(heap.struct_fields(a), Err(FaultKind::NotAStruct(a)));
        assert_eq!(heap.array(99), Err(FaultKind::InvalidObject(99)));
    }
}
