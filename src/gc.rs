use std::sync::atomic::{AtomicU32, Ordering};
use indexmap::IndexMap;
use crate::{
    error::{Error, ErrorKind, Result},
    function::Function,
    value::Value,
};

/// A reference to an object on the heap.
///
/// Handles carry the id of the heap that issued them and the generation of their slot. A
/// handle that outlives its object, or that is passed to another environment, is caught as
/// `StaleHandle` instead of aliasing whatever occupies the slot.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Handle {
    heap: u32,
    index: u32,
    generation: u32,
}

impl Handle {
    fn new(heap: u32, index: usize, generation: u32) -> Self {
        Self {
            heap,
            index: index as u32,
            generation,
        }
    }

    fn index(&self) -> usize {
        self.index as usize
    }
}

#[derive(Debug)]
pub enum Object {
    Str(String),
    Array(Vec<Value>),
    Dict(IndexMap<String, Value>),
    Func(Function),
}

impl Object {
    /// Values held directly by this object.
    pub fn values(&self) -> Vec<Value> {
        match self {
            Object::Array(items) => items.clone(),
            Object::Dict(fields) => fields.values().copied().collect(),
            Object::Str(_) | Object::Func(_) => Vec::new(),
        }
    }
}

pub trait Trace {
    fn trace(&self, tracer: &mut Tracer);
}

pub struct Tracer<'a> {
    heap: u32,
    new_sweep: usize,
    sweeps: &'a mut [usize],
    generations: &'a [u32],
    pending: Vec<Handle>,
}

impl<'a> Tracer<'a> {
    pub fn mark(&mut self, handle: Handle) {
        if handle.heap != self.heap {
            return;
        }
        let idx = handle.index();
        match self.generations.get(idx) {
            Some(generation) if *generation == handle.generation => {},
            // Stale roots keep nothing alive
            _ => return,
        }
        if self.sweeps[idx] != self.new_sweep {
            self.sweeps[idx] = self.new_sweep;
            self.pending.push(handle);
        }
    }
}

impl Trace for Value {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(handle) = self.handle() {
            tracer.mark(handle);
        }
    }
}

impl Trace for Object {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            Object::Array(items) => items
                .iter()
                .for_each(|item| item.trace(tracer)),
            Object::Dict(fields) => fields
                .values()
                .for_each(|field| field.trace(tracer)),
            Object::Str(_) | Object::Func(_) => {},
        }
    }
}

static NEXT_HEAP_ID: AtomicU32 = AtomicU32::new(0);

pub struct Heap {
    id: u32,
    objects: Vec<Option<Object>>,
    generations: Vec<u32>,
    sweeps: Vec<usize>,
    free: Vec<usize>,
    live: usize,
    last_sweep: usize,
    since_collect: usize,
    threshold: usize,
    limit: Option<usize>,
    cycles: usize,
}

impl Heap {
    pub fn new(threshold: usize, limit: Option<usize>) -> Self {
        Self {
            id: NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed),
            objects: Vec::new(),
            generations: Vec::new(),
            sweeps: Vec::new(),
            free: Vec::new(),
            live: 0,
            last_sweep: 0,
            since_collect: 0,
            threshold: threshold.max(1),
            limit,
            cycles: 0,
        }
    }

    pub fn insert(&mut self, object: Object) -> Result<Handle> {
        if self.limit.map_or(false, |limit| self.live >= limit) {
            return Err(Error::out_of_memory());
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.objects[idx] = Some(object);
                self.sweeps[idx] = self.last_sweep;
                idx
            },
            None => {
                self.objects.push(Some(object));
                self.generations.push(0);
                self.sweeps.push(self.last_sweep);
                self.objects.len() - 1
            },
        };

        self.live += 1;
        self.since_collect += 1;
        Ok(Handle::new(self.id, idx, self.generations[idx]))
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    pub fn get(&self, handle: Handle) -> Result<&Object> {
        self.check_owner(handle)?;
        let idx = handle.index();
        match (self.generations.get(idx), self.objects.get(idx)) {
            (Some(generation), Some(Some(object))) if *generation == handle.generation => Ok(object),
            _ => Err(stale(handle)),
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut Object> {
        self.check_owner(handle)?;
        let idx = handle.index();
        match (self.generations.get(idx), self.objects.get_mut(idx)) {
            (Some(generation), Some(Some(object))) if *generation == handle.generation => Ok(object),
            _ => Err(stale(handle)),
        }
    }

    fn check_owner(&self, handle: Handle) -> Result<()> {
        if handle.heap == self.id {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::StaleHandle,
                format!("Handle #{} belongs to another environment.", handle.index),
            ))
        }
    }

    pub fn wants_collection(&self) -> bool {
        self.since_collect >= self.threshold
    }

    pub fn is_full(&self) -> bool {
        self.limit.map_or(false, |limit| self.live >= limit)
    }

    /// Mark everything reachable from `roots` and free the rest. Returns the number of objects freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item=Value>) -> usize {
        let new_sweep = self.last_sweep.wrapping_add(1);
        let mut tracer = Tracer {
            heap: self.id,
            new_sweep,
            sweeps: &mut self.sweeps,
            generations: &self.generations,
            pending: Vec::new(),
        };

        // Mark
        for root in roots {
            root.trace(&mut tracer);
        }
        while let Some(handle) = tracer.pending.pop() {
            if let Some(object) = &self.objects[handle.index()] {
                object.trace(&mut tracer);
            }
        }

        // Sweep
        let mut freed = 0;
        for idx in 0..self.objects.len() {
            if self.objects[idx].is_some() && self.sweeps[idx] != new_sweep {
                self.objects[idx] = None;
                self.generations[idx] = self.generations[idx].wrapping_add(1);
                self.free.push(idx);
                freed += 1;
            }
        }

        self.live -= freed;
        self.last_sweep = new_sweep;
        self.since_collect = 0;
        self.cycles += 1;
        freed
    }

    pub fn stats(&self) -> Stats {
        Stats {
            live_objects: self.live,
            capacity: self.objects.len(),
            free_slots: self.free.len(),
            cycles: self.cycles,
        }
    }
}

fn stale(handle: Handle) -> Error {
    Error::new(
        ErrorKind::StaleHandle,
        format!("Handle #{} (generation {}) refers to a collected object.", handle.index, handle.generation),
    )
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stats {
    pub live_objects: usize,
    pub capacity: usize,
    pub free_slots: usize,
    pub cycles: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(heap: &mut Heap, s: &str) -> Value {
        Value::Str(heap.insert(Object::Str(s.to_owned())).unwrap())
    }

    #[test]
    fn unreachable_objects_are_freed() {
        let mut heap = Heap::new(16, None);
        let kept = string(&mut heap, "kept");
        let lost = string(&mut heap, "lost");

        assert_eq!(heap.collect(vec![kept]), 1);
        assert!(heap.contains(kept.handle().unwrap()));
        assert_eq!(
            heap.get(lost.handle().unwrap()).unwrap_err().kind(),
            ErrorKind::StaleHandle,
        );
    }

    #[test]
    fn children_are_traced() {
        let mut heap = Heap::new(16, None);
        let inner = string(&mut heap, "inner");
        let array = heap.insert(Object::Array(vec![inner, Value::Int(1)])).unwrap();
        let mut fields = IndexMap::new();
        fields.insert("a".to_owned(), Value::Array(array));
        let dict = Value::Dict(heap.insert(Object::Dict(fields)).unwrap());

        assert_eq!(heap.collect(vec![dict]), 0);
        assert_eq!(heap.len(), 3);
    }

    #[test]
    fn cycles_terminate() {
        let mut heap = Heap::new(16, None);
        let array = heap.insert(Object::Array(Vec::new())).unwrap();
        if let Object::Array(items) = heap.get_mut(array).unwrap() {
            items.push(Value::Array(array));
        }
        assert_eq!(heap.collect(vec![Value::Array(array)]), 0);
        assert_eq!(heap.collect(Vec::new()), 1);
    }

    #[test]
    fn reused_slot_rejects_old_handle() {
        let mut heap = Heap::new(16, None);
        let old = string(&mut heap, "old");
        heap.collect(Vec::new());
        let new = string(&mut heap, "new");

        assert_eq!(heap.stats().capacity, 1);
        assert!(heap.get(old.handle().unwrap()).is_err());
        assert!(heap.get(new.handle().unwrap()).is_ok());
    }

    #[test]
    fn foreign_handles_rejected() {
        let mut a = Heap::new(16, None);
        let mut b = Heap::new(16, None);
        let from_a = string(&mut a, "a");
        let from_b = string(&mut b, "b");

        assert_eq!(
            b.get(from_a.handle().unwrap()).unwrap_err().kind(),
            ErrorKind::StaleHandle,
        );
        // A foreign root keeps nothing alive in this heap.
        assert_eq!(b.collect(vec![from_a]), 1);
        assert!(!b.contains(from_b.handle().unwrap()));
        assert!(a.contains(from_a.handle().unwrap()));
    }

    #[test]
    fn limit_reports_out_of_memory() {
        let mut heap = Heap::new(16, Some(1));
        string(&mut heap, "a");
        let err = heap.insert(Object::Str("b".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    }

    #[test]
    fn threshold_requests_collection() {
        let mut heap = Heap::new(2, None);
        string(&mut heap, "a");
        assert!(!heap.wants_collection());
        string(&mut heap, "b");
        assert!(heap.wants_collection());
        heap.collect(Vec::new());
        assert!(!heap.wants_collection());
        assert_eq!(heap.stats().cycles, 1);
    }
}
