pub mod call;
pub mod roots;

use std::{
    fmt,
    io::{self, Write},
    rc::Rc,
};
use indexmap::IndexMap;
use internment::Intern;
use tracing::{debug, error};
use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    function::{Function, Interpreter, NativeFunction, NativeId, SourceCompiler},
    gc::{Handle, Heap, Object, Stats},
    value::{Tag, Value},
    Ident,
};
use self::call::Frame;

/// One isolated interpreter instance.
///
/// Owns the heap, the global namespace, the call stack, the pin stack and the error channel.
/// Nothing is shared between environments; run one per thread for parallelism.
pub struct Environment {
    heap: Heap,
    globals: IndexMap<Ident, Value>,
    natives: Vec<NativeFunction>,
    frames: Vec<Frame>,
    pins: Vec<Value>,
    rooted: Vec<(Rc<()>, Value)>,
    error: Option<Error>,
    fatal: Option<Error>,
    rng: fastrand::Rng,
    config: Config,
    compiler: Option<Rc<dyn SourceCompiler>>,
    interpreter: Option<Rc<dyn Interpreter>>,
    output: Box<dyn Write>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Environment")
            .field("globals", &self.globals.len())
            .field("frames", &self.frames.len())
            .field("pins", &self.pins.len())
            .field("heap", &self.heap.stats())
            .field("error", &self.error)
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            heap: Heap::new(config.gc_threshold, config.heap_limit),
            globals: IndexMap::new(),
            natives: Vec::new(),
            frames: Vec::new(),
            pins: Vec::new(),
            rooted: Vec::new(),
            error: None,
            fatal: None,
            rng,
            config,
            compiler: None,
            interpreter: None,
            output: Box::new(io::stdout()),
        }
    }

    pub fn with_compiler(mut self, compiler: impl SourceCompiler + 'static) -> Self {
        self.compiler = Some(Rc::new(compiler));
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Interpreter + 'static) -> Self {
        self.interpreter = Some(Rc::new(interpreter));
        self
    }

    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn with_global(mut self, name: &str, value: Value) -> Self {
        self.set_global(name, value);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    /// Next number from this environment's generator, in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.rng.f64()
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng.seed(seed);
    }

    pub(crate) fn compiler(&self) -> Option<Rc<dyn SourceCompiler>> {
        self.compiler.clone()
    }

    pub(crate) fn interpreter(&self) -> Option<Rc<dyn Interpreter>> {
        self.interpreter.clone()
    }

    // Error channel

    /// The most recent failure. Inspect it right after a failed call; the next failure replaces it.
    pub fn last_error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Record a failure in the error channel and hand it back for returning.
    pub fn raise(&mut self, kind: ErrorKind, message: fmt::Arguments) -> Error {
        self.record(Error::new(kind, message.to_string()))
    }

    pub fn raise_error(&mut self, message: fmt::Arguments) -> Error {
        self.raise(ErrorKind::Runtime, message)
    }

    pub fn raise_out_of_memory(&mut self) -> Error {
        self.record(Error::out_of_memory())
    }

    /// The error that poisoned this environment, if any.
    pub fn fatal_error(&self) -> Option<&Error> {
        self.fatal.as_ref()
    }

    pub(crate) fn record(&mut self, err: Error) -> Error {
        if err.is_fatal() && self.fatal.is_none() {
            error!(kind = ?err.kind(), "environment poisoned: {}", err);
            self.fatal = Some(err.clone());
        }
        self.error = Some(err.clone());
        err
    }

    pub(crate) fn check_usable(&self) -> Result<()> {
        match &self.fatal {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // Heap

    /// Allocation is the only point where a collection can start. The contents of the object
    /// being allocated count as roots for that cycle.
    pub(crate) fn alloc(&mut self, object: Object) -> Result<Handle> {
        self.alloc_into(None, object)
    }

    /// Allocate an object that is about to be stored in `container`, keeping the container
    /// alive if this allocation collects.
    fn alloc_into(&mut self, container: Option<Value>, object: Object) -> Result<Handle> {
        if self.heap.wants_collection() || self.heap.is_full() {
            let mut roots = object.values();
            roots.extend(container);
            self.collect_with(roots);
        }
        self.heap
            .insert(object)
            .map_err(|err| self.record(err))
    }

    /// Run a full collection now. Returns the number of objects freed.
    pub fn collect_garbage(&mut self) -> usize {
        self.collect_with(Vec::new())
    }

    fn collect_with(&mut self, extra: Vec<Value>) -> usize {
        self.rooted.retain(|(rc, _)| Rc::strong_count(rc) > 1);

        let roots = self.globals
            .values()
            .copied()
            .chain(self.frames.iter().flat_map(|frame| frame.roots()))
            .chain(self.pins.iter().copied())
            .chain(self.rooted.iter().map(|(_, value)| *value))
            .chain(extra);
        let freed = self.heap.collect(roots);

        debug!(freed, live = self.heap.len(), "collected garbage");
        freed
    }

    pub fn heap_stats(&self) -> Stats {
        self.heap.stats()
    }

    // Values

    pub fn type_of(&self, value: Value) -> Tag {
        value.tag()
    }

    pub fn make_int(&self, x: i64) -> Value {
        Value::Int(x)
    }

    pub fn make_float(&self, x: f64) -> Value {
        Value::Float(x)
    }

    pub fn make_string(&mut self, s: impl Into<String>) -> Result<Value> {
        Ok(Value::Str(self.alloc(Object::Str(s.into()))?))
    }

    pub fn make_empty_array(&mut self) -> Result<Value> {
        Ok(Value::Array(self.alloc(Object::Array(Vec::new()))?))
    }

    pub fn make_empty_dict(&mut self) -> Result<Value> {
        Ok(Value::Dict(self.alloc(Object::Dict(IndexMap::new()))?))
    }

    pub fn make_array(&mut self, items: &[Value]) -> Result<Value> {
        Ok(Value::Array(self.alloc(Object::Array(items.to_vec()))?))
    }

    /// Shallow copy.
    pub fn make_array_copy(&mut self, array: Value) -> Result<Value> {
        let items = self.array(array)?.clone();
        Ok(Value::Array(self.alloc(Object::Array(items))?))
    }

    /// Shallow copy, preserving key order.
    pub fn make_dict_copy(&mut self, dict: Value) -> Result<Value> {
        let fields = self.dict(dict)?.clone();
        Ok(Value::Dict(self.alloc(Object::Dict(fields))?))
    }

    pub fn as_int(&self, value: Value) -> Result<i64> {
        value.as_int()
    }

    pub fn as_float(&self, value: Value) -> Result<f64> {
        value.as_float()
    }

    pub fn as_str(&self, value: Value) -> Result<&str> {
        match value {
            Value::Str(handle) => match self.heap.get(handle)? {
                Object::Str(s) => Ok(s),
                _ => Err(corrupt(value)),
            },
            _ => Err(Error::type_mismatch(format!("Value not a string (found {}).", value.tag()))),
        }
    }

    pub fn string_len(&self, value: Value) -> Result<usize> {
        self.as_str(value).map(str::len)
    }

    fn array(&self, value: Value) -> Result<&Vec<Value>> {
        match value {
            Value::Array(handle) => match self.heap.get(handle)? {
                Object::Array(items) => Ok(items),
                _ => Err(corrupt(value)),
            },
            _ => Err(Error::type_mismatch(format!("Value not an array (found {}).", value.tag()))),
        }
    }

    fn array_mut(&mut self, value: Value) -> Result<&mut Vec<Value>> {
        match value {
            Value::Array(handle) => match self.heap.get_mut(handle)? {
                Object::Array(items) => Ok(items),
                _ => Err(corrupt(value)),
            },
            _ => Err(Error::type_mismatch(format!("Value not an array (found {}).", value.tag()))),
        }
    }

    fn dict(&self, value: Value) -> Result<&IndexMap<String, Value>> {
        match value {
            Value::Dict(handle) => match self.heap.get(handle)? {
                Object::Dict(fields) => Ok(fields),
                _ => Err(corrupt(value)),
            },
            _ => Err(Error::type_mismatch(format!("Value not a dictionary (found {}).", value.tag()))),
        }
    }

    fn dict_mut(&mut self, value: Value) -> Result<&mut IndexMap<String, Value>> {
        match value {
            Value::Dict(handle) => match self.heap.get_mut(handle)? {
                Object::Dict(fields) => Ok(fields),
                _ => Err(corrupt(value)),
            },
            _ => Err(Error::type_mismatch(format!("Value not a dictionary (found {}).", value.tag()))),
        }
    }

    pub fn array_len(&self, array: Value) -> Result<usize> {
        self.array(array).map(Vec::len)
    }

    pub fn array_get(&self, array: Value, index: usize) -> Result<Value> {
        let items = self.array(array)?;
        items
            .get(index)
            .copied()
            .ok_or_else(|| Error::index(index, items.len()))
    }

    /// Setting past the end grows the array, filling the gap with nil.
    pub fn array_set(&mut self, array: Value, index: usize, value: Value) -> Result<()> {
        let items = self.array_mut(array)?;
        if index >= items.len() {
            items.resize(index + 1, Value::Nil);
        }
        items[index] = value;
        Ok(())
    }

    pub fn array_push(&mut self, array: Value, value: Value) -> Result<()> {
        self.array_mut(array)?.push(value);
        Ok(())
    }

    pub fn resize_array(&mut self, array: Value, len: usize) -> Result<()> {
        self.array_mut(array)?.resize(len, Value::Nil);
        Ok(())
    }

    pub fn dict_len(&self, dict: Value) -> Result<usize> {
        self.dict(dict).map(IndexMap::len)
    }

    /// Keys are reported in insertion order.
    pub fn dict_key_at(&self, dict: Value, index: usize) -> Result<String> {
        let fields = self.dict(dict)?;
        fields
            .get_index(index)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| Error::index(index, fields.len()))
    }

    pub fn dict_value_at(&self, dict: Value, index: usize) -> Result<Value> {
        let fields = self.dict(dict)?;
        fields
            .get_index(index)
            .map(|(_, value)| *value)
            .ok_or_else(|| Error::index(index, fields.len()))
    }

    pub fn dict_get(&self, dict: Value, key: &str) -> Result<Value> {
        self.dict(dict)?
            .get(key)
            .copied()
            .ok_or_else(|| Error::key(key))
    }

    pub fn dict_contains(&self, dict: Value, key: &str) -> Result<bool> {
        Ok(self.dict(dict)?.contains_key(key))
    }

    /// Overwriting a key keeps its original position.
    pub fn dict_set(&mut self, dict: Value, key: &str, value: Value) -> Result<()> {
        self.dict_mut(dict)?.insert(key.to_owned(), value);
        Ok(())
    }

    pub fn dict_remove(&mut self, dict: Value, key: &str) -> Result<Value> {
        self.dict_mut(dict)?
            .shift_remove(key)
            .ok_or_else(|| Error::key(key))
    }

    // Checked element access

    /// Fetch an array element, failing with `TypeMismatch` unless it carries `tag`.
    pub fn array_get_checked(&self, array: Value, index: usize, tag: Tag) -> Result<Value> {
        let value = self.array_get(array, index)?;
        if value.tag() == tag {
            Ok(value)
        } else {
            Err(Error::type_mismatch(format!(
                "Element {} not {} (found {}).",
                index,
                tag.noun(),
                value.tag(),
            )))
        }
    }

    pub fn array_get_int(&self, array: Value, index: usize) -> Result<i64> {
        self.array_get_checked(array, index, Tag::Int)?.as_int()
    }

    pub fn array_get_float(&self, array: Value, index: usize) -> Result<f64> {
        self.array_get_checked(array, index, Tag::Float)?.as_float()
    }

    pub fn array_get_string(&self, array: Value, index: usize) -> Result<String> {
        let value = self.array_get_checked(array, index, Tag::String)?;
        self.as_str(value).map(str::to_owned)
    }

    /// Fetch a dictionary field, failing with `TypeMismatch` unless it carries `tag`.
    pub fn dict_get_checked(&self, dict: Value, key: &str, tag: Tag) -> Result<Value> {
        let value = self.dict_get(dict, key)?;
        if value.tag() == tag {
            Ok(value)
        } else {
            Err(Error::type_mismatch(format!(
                "Field \"{}\" not {} (found {}).",
                key,
                tag.noun(),
                value.tag(),
            )))
        }
    }

    pub fn dict_get_int(&self, dict: Value, key: &str) -> Result<i64> {
        self.dict_get_checked(dict, key, Tag::Int)?.as_int()
    }

    pub fn dict_get_float(&self, dict: Value, key: &str) -> Result<f64> {
        self.dict_get_checked(dict, key, Tag::Float)?.as_float()
    }

    pub fn dict_get_string(&self, dict: Value, key: &str) -> Result<String> {
        let value = self.dict_get_checked(dict, key, Tag::String)?;
        self.as_str(value).map(str::to_owned)
    }

    // Allocating element setters. Each returns the value it stored.

    pub fn array_set_string(&mut self, array: Value, index: usize, s: impl Into<String>) -> Result<Value> {
        self.array(array)?;
        let value = Value::Str(self.alloc_into(Some(array), Object::Str(s.into()))?);
        self.array_set(array, index, value)?;
        Ok(value)
    }

    pub fn array_set_new_array(&mut self, array: Value, index: usize) -> Result<Value> {
        self.array(array)?;
        let value = Value::Array(self.alloc_into(Some(array), Object::Array(Vec::new()))?);
        self.array_set(array, index, value)?;
        Ok(value)
    }

    pub fn array_set_new_dict(&mut self, array: Value, index: usize) -> Result<Value> {
        self.array(array)?;
        let value = Value::Dict(self.alloc_into(Some(array), Object::Dict(IndexMap::new()))?);
        self.array_set(array, index, value)?;
        Ok(value)
    }

    pub fn dict_set_string(&mut self, dict: Value, key: &str, s: impl Into<String>) -> Result<Value> {
        self.dict(dict)?;
        let value = Value::Str(self.alloc_into(Some(dict), Object::Str(s.into()))?);
        self.dict_set(dict, key, value)?;
        Ok(value)
    }

    pub fn dict_set_new_array(&mut self, dict: Value, key: &str) -> Result<Value> {
        self.dict(dict)?;
        let value = Value::Array(self.alloc_into(Some(dict), Object::Array(Vec::new()))?);
        self.dict_set(dict, key, value)?;
        Ok(value)
    }

    pub fn dict_set_new_dict(&mut self, dict: Value, key: &str) -> Result<Value> {
        self.dict(dict)?;
        let value = Value::Dict(self.alloc_into(Some(dict), Object::Dict(IndexMap::new()))?);
        self.dict_set(dict, key, value)?;
        Ok(value)
    }

    // Globals

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(Intern::new(name.to_owned()), value);
    }

    pub fn get_global(&self, name: &str) -> Result<Value> {
        self.globals
            .get(&Intern::new(name.to_owned()))
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::Undefined, format!("Global \"{}\" is not defined.", name)))
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.globals.contains_key(&Intern::new(name.to_owned()))
    }

    pub fn global_names(&self) -> impl Iterator<Item=&str> + '_ {
        self.globals.keys().map(|name| name.as_str())
    }

    // Functions

    pub(crate) fn push_native(&mut self, native: NativeFunction) -> NativeId {
        self.natives.push(native);
        NativeId(self.natives.len() - 1)
    }

    pub(crate) fn native(&self, id: NativeId) -> &NativeFunction {
        &self.natives[id.0]
    }

    pub(crate) fn function(&self, callee: Value) -> Result<Function> {
        match callee {
            Value::Func(handle) | Value::Native(handle) => match self.heap.get(handle)? {
                Object::Func(function) => Ok(function.clone()),
                _ => Err(corrupt(callee)),
            },
            _ => Err(Error::type_mismatch(format!("Value not callable (found {}).", callee.tag()))),
        }
    }

    /// Name and parameter names of a callable value.
    pub fn signature(&self, callee: Value) -> Result<(String, Vec<String>)> {
        Ok(match self.function(callee)? {
            Function::Script(func) => (func.name.clone(), func.params.clone()),
            Function::Native(id) => {
                let native = self.native(id);
                (
                    native.name.as_str().to_owned(),
                    native.params.iter().map(|p| p.as_str().to_owned()).collect(),
                )
            },
        })
    }
}

fn corrupt(value: Value) -> Error {
    Error::type_mismatch(format!("Heap object does not match its {} tag.", value.tag()))
}
