//! Bytecode interpreter for the instruction subset the generator emits

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use log::trace;

use super::class::{ClassLookup, Code, MethodBody, RuntimeClass, RuntimeField, RuntimeMethod};
use super::error::{RuntimeError, RuntimeResult};
use super::reader::PoolEntry;
use super::value::{lock, Object, ObjectRef, Value};
use crate::codegen::defs::{array_types, CONSTRUCTOR_METHOD_NAME, STATIC_INITIALIZER_METHOD_NAME};
use crate::codegen::opcodes::*;
use crate::consts::RESOLVER_MAX_HIERARCHY_STEPS;
use crate::descriptor::{parse_method_descriptor, Descriptor};

pub struct Interpreter {
    lookup: Arc<dyn ClassLookup>,
    depth: usize,
    max_depth: usize,
}

impl Interpreter {
    /// `lookup` resolves the classes of strings and arrays
    pub fn new(lookup: Arc<dyn ClassLookup>, max_depth: usize) -> Self {
        Self { lookup, depth: 0, max_depth }
    }

    pub fn lookup(&self) -> &Arc<dyn ClassLookup> {
        &self.lookup
    }

    /// Run `method` with `args` (receiver first for instance methods), all in stack form
    ///
    /// Bytecode calls made by `method` run on a heap frame stack, so the
    /// native stack does not grow with the interpreted call depth.
    pub fn invoke(
        &mut self,
        class: &Arc<RuntimeClass>,
        method: &Arc<RuntimeMethod>,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        if let MethodBody::Bytecode(_) = &method.body {
            return self.execute(Frame::new(class.clone(), method.clone(), args)?);
        }
        self.enter()?;
        let result = match &method.body {
            MethodBody::Native(f) => f(self, &args).map(Value::to_stack),
            _ => Err(RuntimeError::exception(
                "java.lang.AbstractMethodError",
                format!("{}.{}{}", class.name, method.name, method.descriptor),
            )),
        };
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> RuntimeResult<()> {
        if self.depth >= self.max_depth {
            return Err(RuntimeError::StackOverflow { depth: self.max_depth });
        }
        self.depth += 1;
        Ok(())
    }

    /// Initialize `class` and find the static method to call
    fn resolve_static(
        &mut self,
        class: &Arc<RuntimeClass>,
        name: &str,
        descriptor: &str,
    ) -> RuntimeResult<(Arc<RuntimeClass>, Arc<RuntimeMethod>)> {
        self.ensure_initialized(class)?;
        let (owner, method) = self.resolve_method(class, name, descriptor)?;
        if !method.is_static() {
            return Err(RuntimeError::no_such_method(&class.name, name, descriptor));
        }
        Ok((owner, method))
    }

    pub fn invoke_static(
        &mut self,
        class: &Arc<RuntimeClass>,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let (owner, method) = self.resolve_static(class, name, descriptor)?;
        self.invoke(&owner, &method, args)
    }

    /// Dispatch on the runtime class of `receiver`
    pub fn invoke_virtual(
        &mut self,
        receiver: &ObjectRef,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        let class = self.class_of(receiver)?;
        let (owner, method) = self.resolve_method(&class, name, descriptor)?;
        self.invoke(&owner, &method, with_receiver(receiver.clone(), args))
    }

    /// `new` followed by the constructor with `descriptor`
    pub fn construct(
        &mut self,
        class: &Arc<RuntimeClass>,
        descriptor: &str,
        args: Vec<Value>,
    ) -> RuntimeResult<ObjectRef> {
        if class.is_interface() || class.is_abstract() {
            return Err(RuntimeError::exception("java.lang.InstantiationError", class.name.clone()));
        }
        self.ensure_initialized(class)?;
        let object = self.new_object(class)?;
        let constructor = class
            .find_method(CONSTRUCTOR_METHOD_NAME, descriptor)
            .ok_or_else(|| RuntimeError::no_such_method(&class.name, CONSTRUCTOR_METHOD_NAME, descriptor))?;
        self.invoke(class, &constructor, with_receiver(object.clone(), args))?;
        Ok(object)
    }

    /// Allocate an instance with every field of the hierarchy at its default
    pub fn new_object(&self, class: &Arc<RuntimeClass>) -> RuntimeResult<ObjectRef> {
        let mut fields = HashMap::new();
        for c in self.hierarchy(class)? {
            for field in c.fields.iter().filter(|f| !f.is_static()) {
                fields.insert((c.name.clone(), field.name.clone()), Value::default_for(&field.descriptor));
            }
        }
        Ok(Arc::new(Object::Instance { class: class.clone(), fields: Mutex::new(fields) }))
    }

    /// Run `<clinit>` once, superclasses first; a class whose initialization
    /// is already under way is treated as initialized
    pub fn ensure_initialized(&mut self, class: &Arc<RuntimeClass>) -> RuntimeResult<()> {
        if !class.begin_initialization() {
            return Ok(());
        }
        let result = self.run_initializers(class);
        class.finish_initialization();
        result
    }

    fn run_initializers(&mut self, class: &Arc<RuntimeClass>) -> RuntimeResult<()> {
        if let Some(super_class) = self.super_class(class)? {
            self.ensure_initialized(&super_class)?;
        }
        if let Some(clinit) = class.find_method(STATIC_INITIALIZER_METHOD_NAME, "()V") {
            trace!("Initializing {}", class.name);
            self.invoke(class, &clinit, Vec::new())?;
        }
        Ok(())
    }

    pub fn super_class(&self, class: &RuntimeClass) -> RuntimeResult<Option<Arc<RuntimeClass>>> {
        match &class.super_name {
            Some(name) => Ok(Some(class.loader()?.load_class(name)?)),
            None => Ok(None),
        }
    }

    /// `class` followed by its superclasses
    fn hierarchy(&self, class: &Arc<RuntimeClass>) -> RuntimeResult<Vec<Arc<RuntimeClass>>> {
        let mut chain = vec![class.clone()];
        while let Some(next) = self.super_class(chain[chain.len() - 1].as_ref())? {
            if chain.len() > RESOLVER_MAX_HIERARCHY_STEPS {
                return Err(RuntimeError::invalid_bytecode(&class.name, "cyclic class hierarchy"));
            }
            chain.push(next);
        }
        Ok(chain)
    }

    /// Every superinterface reachable from `class`, breadth first
    fn all_interfaces(&self, class: &Arc<RuntimeClass>) -> RuntimeResult<Vec<Arc<RuntimeClass>>> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<Arc<RuntimeClass>> = VecDeque::new();
        let mut out = Vec::new();
        for c in self.hierarchy(class)? {
            if c.is_interface() && seen.insert(c.name.clone()) {
                out.push(c.clone());
            }
            queue.push_back(c);
        }
        while let Some(c) = queue.pop_front() {
            let loader = c.loader()?;
            for name in &c.interfaces {
                if seen.insert(name.clone()) {
                    let iface = loader.load_class(name)?;
                    out.push(iface.clone());
                    queue.push_back(iface);
                }
            }
            if seen.len() > RESOLVER_MAX_HIERARCHY_STEPS {
                return Err(RuntimeError::invalid_bytecode(&class.name, "cyclic interface hierarchy"));
            }
        }
        Ok(out)
    }

    /// Find a method by walking superclasses, then superinterfaces;
    /// concrete implementations win over abstract declarations
    pub fn resolve_method(
        &self,
        class: &Arc<RuntimeClass>,
        name: &str,
        descriptor: &str,
    ) -> RuntimeResult<(Arc<RuntimeClass>, Arc<RuntimeMethod>)> {
        let mut declared = None;
        for c in self.hierarchy(class)? {
            if let Some(m) = c.find_method(name, descriptor) {
                if !m.is_abstract() {
                    return Ok((c, m));
                }
                declared.get_or_insert((c, m));
            }
        }
        if let Some(found) = declared {
            return Ok(found);
        }
        for iface in self.all_interfaces(class)? {
            if let Some(m) = iface.find_method(name, descriptor) {
                return Ok((iface, m));
            }
        }
        Err(RuntimeError::no_such_method(&class.name, name, descriptor))
    }

    /// Declaring class and metadata of a field visible from `class`
    pub fn resolve_field(&self, class: &Arc<RuntimeClass>, name: &str) -> RuntimeResult<(Arc<RuntimeClass>, RuntimeField)> {
        for c in self.hierarchy(class)? {
            if let Some(f) = c.find_field(name) {
                return Ok((c.clone(), f.clone()));
            }
        }
        for iface in self.all_interfaces(class)? {
            if let Some(f) = iface.find_field(name) {
                return Ok((iface.clone(), f.clone()));
            }
        }
        Err(RuntimeError::no_such_field(&class.name, name))
    }

    /// Abstract methods reachable from `class` that nothing in its superclass
    /// chain implements, as `name` + descriptor
    pub fn missing_implementations(&self, class: &Arc<RuntimeClass>) -> RuntimeResult<Vec<String>> {
        let mut declaring = self.hierarchy(class)?;
        declaring.extend(self.all_interfaces(class)?);
        let mut seen = HashSet::new();
        let mut missing = Vec::new();
        for c in declaring {
            for m in c.methods.iter().filter(|m| m.is_abstract()) {
                if !seen.insert((m.name.clone(), m.descriptor.clone())) {
                    continue;
                }
                let (_, resolved) = self.resolve_method(class, &m.name, &m.descriptor)?;
                if resolved.is_abstract() {
                    missing.push(format!("{}{}", m.name, m.descriptor));
                }
            }
        }
        Ok(missing)
    }

    pub fn class_of(&self, object: &Object) -> RuntimeResult<Arc<RuntimeClass>> {
        match object {
            Object::Instance { class, .. } => Ok(class.clone()),
            Object::Str(_) => self.lookup.load_class("java.lang.String"),
            Object::Array { .. } => self.lookup.load_class("java.lang.Object"),
        }
    }

    /// Subclass or implementation test on dotted names
    pub fn is_subclass(&self, class: &Arc<RuntimeClass>, target: &str) -> RuntimeResult<bool> {
        if class.name == target || target == "java.lang.Object" {
            return Ok(true);
        }
        for c in self.hierarchy(class)? {
            if c.name == target {
                return Ok(true);
            }
        }
        Ok(self.all_interfaces(class)?.iter().any(|i| i.name == target))
    }

    /// `target` is a dotted class name or a dotted array name such as `[I`
    pub fn is_instance_of(&self, object: &Object, target: &str) -> RuntimeResult<bool> {
        match object {
            Object::Array { component, .. } => {
                if !target.starts_with('[') {
                    return Ok(matches!(target, "java.lang.Object" | "java.lang.Cloneable" | "java.io.Serializable"));
                }
                let target = Descriptor::from_class_name(target)
                    .map_err(|e| RuntimeError::invalid_bytecode(target, e.to_string()))?;
                self.is_assignable_descriptor(component, &target.component().unwrap_or_else(Descriptor::object))
            }
            other => {
                if target.starts_with('[') {
                    return Ok(false);
                }
                let class = self.class_of(other)?;
                self.is_subclass(&class, target)
            }
        }
    }

    fn is_assignable_descriptor(&self, from: &Descriptor, to: &Descriptor) -> RuntimeResult<bool> {
        if from == to {
            return Ok(true);
        }
        if from.is_primitive() || to.is_primitive() {
            return Ok(false);
        }
        match (from.component(), to.component()) {
            (Some(f), Some(t)) => self.is_assignable_descriptor(&f, &t),
            (Some(_), None) => Ok(matches!(
                to.class_name().as_str(),
                "java.lang.Object" | "java.lang.Cloneable" | "java.io.Serializable"
            )),
            (None, Some(_)) => Ok(false),
            (None, None) => {
                let class = self.lookup.load_class(&from.class_name())?;
                self.is_subclass(&class, &to.class_name())
            }
        }
    }

    /// `String.valueOf(Object)` semantics
    pub fn to_java_string(&mut self, value: &Value) -> RuntimeResult<String> {
        match value {
            Value::Ref(object) => match object.as_ref() {
                Object::Str(s) => Ok(s.clone()),
                _ => {
                    let result = self.invoke_virtual(object, "toString", "()Ljava/lang/String;", Vec::new())?;
                    Ok(result.as_str().unwrap_or("null").to_string())
                }
            },
            other => Ok(other.to_string()),
        }
    }

    /// Run `root` and every bytecode method it calls until `root` returns
    fn execute(&mut self, root: Frame) -> RuntimeResult<Value> {
        self.enter()?;
        let base = self.depth - 1;
        let mut frames = vec![root];
        let result = self.run_frames(&mut frames);
        if let (Err(RuntimeError::Exception { class_name, .. }), Some(frame)) = (&result, frames.last()) {
            trace!(
                "{} escaped {}.{}{} at line {:?}",
                class_name,
                frame.class.name,
                frame.method.name,
                frame.method.descriptor,
                frame.code().and_then(|code| code.line_at(frame.op_pc))
            );
        }
        self.depth = base;
        result
    }

    fn run_frames(&mut self, frames: &mut Vec<Frame>) -> RuntimeResult<Value> {
        loop {
            let Some(frame) = frames.last_mut() else {
                return Ok(Value::Void);
            };
            match frame.run(self)? {
                Exit::Call(callee) => {
                    self.enter()?;
                    frames.push(callee);
                }
                Exit::Return(value) => {
                    frames.pop();
                    match frames.last_mut() {
                        Some(caller) => {
                            self.depth -= 1;
                            if !matches!(value, Value::Void) {
                                caller.push(value);
                            }
                        }
                        None => return Ok(value),
                    }
                }
            }
        }
    }
}

fn with_receiver(receiver: ObjectRef, args: Vec<Value>) -> Vec<Value> {
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(Value::Ref(receiver));
    full.extend(args);
    full
}

/// Why [`Frame::run`] stopped
enum Exit {
    Return(Value),
    /// A bytecode method to run before this frame resumes
    Call(Frame),
}

struct Frame {
    class: Arc<RuntimeClass>,
    method: Arc<RuntimeMethod>,
    locals: Vec<Value>,
    stack: Vec<Value>,
    pc: usize,
    op_pc: usize,
}

impl Frame {
    fn new(class: Arc<RuntimeClass>, method: Arc<RuntimeMethod>, args: Vec<Value>) -> RuntimeResult<Self> {
        let MethodBody::Bytecode(code) = &method.body else {
            return Err(RuntimeError::invalid_bytecode(
                &class.name,
                format!("{}{} has no code", method.name, method.descriptor),
            ));
        };
        let arg_slots: usize = args.iter().map(|a| if a.is_wide() { 2 } else { 1 }).sum();
        let mut locals = vec![Value::Void; (code.max_locals as usize).max(arg_slots)];
        let stack = Vec::with_capacity(code.max_stack as usize);
        let mut slot = 0;
        for arg in args {
            let wide = arg.is_wide();
            locals[slot] = arg;
            slot += if wide { 2 } else { 1 };
        }
        Ok(Self { class, method, locals, stack, pc: 0, op_pc: 0 })
    }

    fn code(&self) -> Option<&Code> {
        match &self.method.body {
            MethodBody::Bytecode(code) => Some(code),
            _ => None,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self.code() {
            Some(code) => &code.bytes,
            None => &[],
        }
    }

    fn invalid(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::invalid_bytecode(&self.class.name, format!("pc {}: {}", self.op_pc, message.into()))
    }

    fn u8(&mut self) -> RuntimeResult<u8> {
        let b = *self.bytes().get(self.pc).ok_or_else(|| self.invalid("code ends mid-instruction"))?;
        self.pc += 1;
        Ok(b)
    }

    fn u16(&mut self) -> RuntimeResult<u16> {
        Ok(((self.u8()? as u16) << 8) | self.u8()? as u16)
    }

    fn i16(&mut self) -> RuntimeResult<i16> {
        Ok(self.u16()? as i16)
    }

    fn i32(&mut self) -> RuntimeResult<i32> {
        Ok(((self.u16()? as u32) << 16 | self.u16()? as u32) as i32)
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> RuntimeResult<Value> {
        match self.stack.pop() {
            Some(v) => Ok(v),
            None => Err(self.invalid("operand stack underflow")),
        }
    }

    fn pop_int(&mut self) -> RuntimeResult<i32> {
        match self.pop()? {
            Value::Int(v) => Ok(v),
            other => Err(self.invalid(format!("expected int, found {:?}", other))),
        }
    }

    fn pop_long(&mut self) -> RuntimeResult<i64> {
        match self.pop()? {
            Value::Long(v) => Ok(v),
            other => Err(self.invalid(format!("expected long, found {:?}", other))),
        }
    }

    fn pop_float(&mut self) -> RuntimeResult<f32> {
        match self.pop()? {
            Value::Float(v) => Ok(v),
            other => Err(self.invalid(format!("expected float, found {:?}", other))),
        }
    }

    fn pop_double(&mut self) -> RuntimeResult<f64> {
        match self.pop()? {
            Value::Double(v) => Ok(v),
            other => Err(self.invalid(format!("expected double, found {:?}", other))),
        }
    }

    /// `None` for `null`
    fn pop_ref(&mut self) -> RuntimeResult<Option<ObjectRef>> {
        match self.pop()? {
            Value::Ref(r) => Ok(Some(r)),
            Value::Null => Ok(None),
            other => Err(self.invalid(format!("expected reference, found {:?}", other))),
        }
    }

    fn pop_non_null(&mut self) -> RuntimeResult<ObjectRef> {
        self.pop_ref()?.ok_or_else(RuntimeError::null_pointer)
    }

    /// Pop values covering exactly `slots` stack slots, deepest first
    fn pop_slots(&mut self, slots: usize) -> RuntimeResult<Vec<Value>> {
        let mut taken = 0;
        let mut out = Vec::new();
        while taken < slots {
            let v = self.pop()?;
            taken += if v.is_wide() { 2 } else { 1 };
            out.push(v);
        }
        if taken != slots {
            return Err(self.invalid("stack manipulation splits a two-slot value"));
        }
        out.reverse();
        Ok(out)
    }

    /// The `dup*` family: copy `top` slots beneath `skip` further slots
    fn dup_slots(&mut self, top: usize, skip: usize) -> RuntimeResult<()> {
        let copied = self.pop_slots(top)?;
        let skipped = self.pop_slots(skip)?;
        self.stack.extend(copied.iter().cloned());
        self.stack.extend(skipped);
        self.stack.extend(copied);
        Ok(())
    }

    fn load(&mut self, index: usize) -> RuntimeResult<()> {
        let v = self.locals.get(index).cloned().ok_or_else(|| self.invalid(format!("bad local {}", index)))?;
        self.push(v);
        Ok(())
    }

    fn store(&mut self, index: usize) -> RuntimeResult<()> {
        let v = self.pop()?;
        let wide = v.is_wide();
        let needed = index + if wide { 2 } else { 1 };
        if needed > self.locals.len() {
            return Err(self.invalid(format!("bad local {}", index)));
        }
        self.locals[index] = v;
        if wide {
            self.locals[index + 1] = Value::Void;
        }
        Ok(())
    }

    fn branch(&mut self, taken: bool) -> RuntimeResult<()> {
        let offset = self.i16()?;
        if taken {
            self.jump(offset as i64)?;
        }
        Ok(())
    }

    fn jump(&mut self, offset: i64) -> RuntimeResult<()> {
        let target = self.op_pc as i64 + offset;
        if target < 0 || target as usize >= self.bytes().len() {
            return Err(self.invalid(format!("branch target {} out of range", target)));
        }
        self.pc = target as usize;
        Ok(())
    }

    fn constant(&self, index: u16) -> RuntimeResult<Value> {
        Ok(match self.class.pool_entry(index)? {
            PoolEntry::Integer(v) => Value::Int(*v),
            PoolEntry::Float(v) => Value::Float(*v),
            PoolEntry::Long(v) => Value::Long(*v),
            PoolEntry::Double(v) => Value::Double(*v),
            PoolEntry::String(utf8) => {
                let text = self.class.pool_utf8(*utf8)?;
                Value::Ref(self.class.string_constant(index, text))
            }
            other => return Err(self.invalid(format!("cannot load constant {:?}", other))),
        })
    }

    fn array_index(&mut self) -> RuntimeResult<(ObjectRef, usize)> {
        let index = self.pop_int()?;
        let array = self.pop_non_null()?;
        let length = array.array_length().ok_or_else(|| self.invalid("not an array"))?;
        if index < 0 || index as usize >= length {
            return Err(RuntimeError::index_out_of_bounds(index, length));
        }
        Ok((array, index as usize))
    }

    fn array_load(&mut self) -> RuntimeResult<()> {
        let (array, index) = self.array_index()?;
        let value = match array.as_ref() {
            Object::Array { elements, .. } => lock(elements)[index].clone(),
            _ => return Err(self.invalid("not an array")),
        };
        self.push(value);
        Ok(())
    }

    fn array_store(&mut self, op: u8) -> RuntimeResult<()> {
        let value = self.pop()?;
        let value = match (op, value) {
            (BASTORE, Value::Int(v)) => Value::Int(v as i8 as i32),
            (CASTORE, Value::Int(v)) => Value::Int(v as u16 as i32),
            (SASTORE, Value::Int(v)) => Value::Int(v as i16 as i32),
            (_, v) => v,
        };
        let (array, index) = self.array_index()?;
        match array.as_ref() {
            Object::Array { elements, .. } => {
                lock(elements)[index] = value;
                Ok(())
            }
            _ => Err(self.invalid("not an array")),
        }
    }

    fn pop_arguments(&mut self, descriptor: &str) -> RuntimeResult<(Vec<Value>, Descriptor)> {
        let (params, ret) = parse_method_descriptor(descriptor).map_err(|e| self.invalid(e.to_string()))?;
        if self.stack.len() < params.len() {
            return Err(self.invalid("operand stack underflow"));
        }
        let args = self.stack.split_off(self.stack.len() - params.len());
        Ok((args, ret))
    }

    fn push_result(&mut self, value: Value, ret: &Descriptor) {
        if !ret.is_void() {
            self.push(value.to_stack());
        }
    }

    fn referenced_class(&self, name: &str) -> RuntimeResult<Arc<RuntimeClass>> {
        if name == self.class.name {
            return Ok(self.class.clone());
        }
        self.class.loader()?.load_class(name)
    }

    /// Bytecode targets come back as a frame for the caller to run; host
    /// methods run right away
    fn invoke(&mut self, interp: &mut Interpreter, op: u8) -> RuntimeResult<Option<Frame>> {
        let index = self.u16()?;
        if op == INVOKEINTERFACE {
            self.u16()?;
        }
        let (owner, name, descriptor) = self.class.pool_member_ref(index)?;
        let (args, ret) = self.pop_arguments(&descriptor)?;
        let owner_class = self.referenced_class(&owner)?;
        let (declaring, method, args) = match op {
            INVOKESTATIC => {
                let (declaring, method) = interp.resolve_static(&owner_class, &name, &descriptor)?;
                (declaring, method, args)
            }
            INVOKESPECIAL => {
                let receiver = self.pop_non_null()?;
                let (declaring, method) = interp.resolve_method(&owner_class, &name, &descriptor)?;
                (declaring, method, with_receiver(receiver, args))
            }
            _ => {
                let receiver = self.pop_non_null()?;
                let class = interp.class_of(&receiver)?;
                let (declaring, method) = interp.resolve_method(&class, &name, &descriptor)?;
                (declaring, method, with_receiver(receiver, args))
            }
        };
        if let MethodBody::Bytecode(_) = &method.body {
            return Frame::new(declaring, method, args).map(Some);
        }
        let result = interp.invoke(&declaring, &method, args)?;
        self.push_result(result, &ret);
        Ok(None)
    }

    fn field_access(&mut self, interp: &mut Interpreter, op: u8) -> RuntimeResult<()> {
        let index = self.u16()?;
        let (owner, name, _) = self.class.pool_member_ref(index)?;
        let owner_class = self.referenced_class(&owner)?;
        let (declaring, _) = interp.resolve_field(&owner_class, &name)?;
        match op {
            GETSTATIC => {
                interp.ensure_initialized(&declaring)?;
                let v = declaring.get_static(&name)?;
                self.push(v);
            }
            PUTSTATIC => {
                interp.ensure_initialized(&declaring)?;
                let v = self.pop()?;
                declaring.set_static(&name, v);
            }
            GETFIELD => {
                let object = self.pop_non_null()?;
                let v = object.get_field(&declaring.name, &name)?;
                self.push(v);
            }
            _ => {
                let v = self.pop()?;
                let object = self.pop_non_null()?;
                object.set_field(&declaring.name, &name, v)?;
            }
        }
        Ok(())
    }

    fn type_test(&mut self, interp: &Interpreter, op: u8) -> RuntimeResult<()> {
        let index = self.u16()?;
        let target = self.class.pool_class_name(index)?;
        let object = self.pop_ref()?;
        match op {
            CHECKCAST => {
                if let Some(object) = &object {
                    if !interp.is_instance_of(object, &target)? {
                        return Err(RuntimeError::class_cast(&object.class_name(), &target));
                    }
                }
                self.push(object.map(Value::Ref).unwrap_or(Value::Null));
            }
            _ => {
                let result = match &object {
                    Some(object) => interp.is_instance_of(object, &target)?,
                    None => false,
                };
                self.push(Value::Int(result as i32));
            }
        }
        Ok(())
    }

    fn new_array(&mut self, component: Descriptor) -> RuntimeResult<()> {
        let length = self.pop_int()?;
        if length < 0 {
            return Err(RuntimeError::exception("java.lang.NegativeArraySizeException", length.to_string()));
        }
        self.push(Value::Ref(Arc::new(Object::new_array(component, length as usize))));
        Ok(())
    }

    /// The exception `athrow` raises, or the fault hit while building it
    fn throw(&mut self, interp: &mut Interpreter) -> RuntimeError {
        let object = match self.pop_non_null() {
            Ok(object) => object,
            Err(e) => return e,
        };
        let message = match object.get_field("java.lang.Throwable", "message") {
            Ok(Value::Null) | Err(_) => None,
            Ok(value) => match interp.to_java_string(&value) {
                Ok(text) => Some(text),
                Err(e) => return e,
            },
        };
        RuntimeError::Exception { class_name: object.class_name(), message }
    }

    fn run(&mut self, interp: &mut Interpreter) -> RuntimeResult<Exit> {
        loop {
            self.op_pc = self.pc;
            let op = self.u8()?;
            match op {
                NOP => {}
                ACONST_NULL => self.push(Value::Null),
                ICONST_M1..=ICONST_5 => self.push(Value::Int(op as i32 - ICONST_0 as i32)),
                LCONST_0 | LCONST_1 => self.push(Value::Long((op - LCONST_0) as i64)),
                FCONST_0..=FCONST_2 => self.push(Value::Float((op - FCONST_0) as f32)),
                DCONST_0 | DCONST_1 => self.push(Value::Double((op - DCONST_0) as f64)),
                BIPUSH => {
                    let v = self.u8()? as i8;
                    self.push(Value::Int(v as i32));
                }
                SIPUSH => {
                    let v = self.i16()?;
                    self.push(Value::Int(v as i32));
                }
                LDC => {
                    let index = self.u8()? as u16;
                    let v = self.constant(index)?;
                    self.push(v);
                }
                LDC_W | LDC2_W => {
                    let index = self.u16()?;
                    let v = self.constant(index)?;
                    self.push(v);
                }

                ILOAD..=ALOAD => {
                    let index = self.u8()? as usize;
                    self.load(index)?;
                }
                0x1a..=0x2d => self.load(((op - ILOAD_0) % 4) as usize)?,
                IALOAD..=SALOAD => self.array_load()?,
                ISTORE..=ASTORE => {
                    let index = self.u8()? as usize;
                    self.store(index)?;
                }
                0x3b..=0x4e => self.store(((op - ISTORE_0) % 4) as usize)?,
                IASTORE..=SASTORE => self.array_store(op)?,

                POP => {
                    self.pop_slots(1)?;
                }
                POP2 => {
                    self.pop_slots(2)?;
                }
                DUP => self.dup_slots(1, 0)?,
                DUP_X1 => self.dup_slots(1, 1)?,
                DUP_X2 => self.dup_slots(1, 2)?,
                DUP2 => self.dup_slots(2, 0)?,
                DUP2_X1 => self.dup_slots(2, 1)?,
                DUP2_X2 => self.dup_slots(2, 2)?,
                SWAP => {
                    let a = self.pop()?;
                    let b = self.pop()?;
                    self.push(a);
                    self.push(b);
                }

                IADD | ISUB | IMUL | IDIV | IREM | ISHL | ISHR | IUSHR | IAND | IOR | IXOR => {
                    let b = self.pop_int()?;
                    let a = self.pop_int()?;
                    self.push(Value::Int(int_op(op, a, b)?));
                }
                LADD | LSUB | LMUL | LDIV | LREM | LAND | LOR | LXOR => {
                    let b = self.pop_long()?;
                    let a = self.pop_long()?;
                    self.push(Value::Long(long_op(op, a, b)?));
                }
                LSHL | LSHR | LUSHR => {
                    let shift = (self.pop_int()? & 0x3f) as u32;
                    let a = self.pop_long()?;
                    self.push(Value::Long(match op {
                        LSHL => a.wrapping_shl(shift),
                        LSHR => a >> shift,
                        _ => ((a as u64) >> shift) as i64,
                    }));
                }
                FADD | FSUB | FMUL | FDIV | FREM => {
                    let b = self.pop_float()?;
                    let a = self.pop_float()?;
                    self.push(Value::Float(match op {
                        FADD => a + b,
                        FSUB => a - b,
                        FMUL => a * b,
                        FDIV => a / b,
                        _ => a % b,
                    }));
                }
                DADD | DSUB | DMUL | DDIV | DREM => {
                    let b = self.pop_double()?;
                    let a = self.pop_double()?;
                    self.push(Value::Double(match op {
                        DADD => a + b,
                        DSUB => a - b,
                        DMUL => a * b,
                        DDIV => a / b,
                        _ => a % b,
                    }));
                }
                INEG => {
                    let a = self.pop_int()?;
                    self.push(Value::Int(a.wrapping_neg()));
                }
                LNEG => {
                    let a = self.pop_long()?;
                    self.push(Value::Long(a.wrapping_neg()));
                }
                FNEG => {
                    let a = self.pop_float()?;
                    self.push(Value::Float(-a));
                }
                DNEG => {
                    let a = self.pop_double()?;
                    self.push(Value::Double(-a));
                }
                IINC => {
                    let index = self.u8()? as usize;
                    let delta = self.u8()? as i8 as i32;
                    self.increment(index, delta)?;
                }

                I2L => {
                    let v = self.pop_int()?;
                    self.push(Value::Long(v as i64));
                }
                I2F => {
                    let v = self.pop_int()?;
                    self.push(Value::Float(v as f32));
                }
                I2D => {
                    let v = self.pop_int()?;
                    self.push(Value::Double(v as f64));
                }
                L2I => {
                    let v = self.pop_long()?;
                    self.push(Value::Int(v as i32));
                }
                L2F => {
                    let v = self.pop_long()?;
                    self.push(Value::Float(v as f32));
                }
                L2D => {
                    let v = self.pop_long()?;
                    self.push(Value::Double(v as f64));
                }
                // `as` saturates and maps NaN to zero, as the JVM does
                F2I => {
                    let v = self.pop_float()?;
                    self.push(Value::Int(v as i32));
                }
                F2L => {
                    let v = self.pop_float()?;
                    self.push(Value::Long(v as i64));
                }
                F2D => {
                    let v = self.pop_float()?;
                    self.push(Value::Double(v as f64));
                }
                D2I => {
                    let v = self.pop_double()?;
                    self.push(Value::Int(v as i32));
                }
                D2L => {
                    let v = self.pop_double()?;
                    self.push(Value::Long(v as i64));
                }
                D2F => {
                    let v = self.pop_double()?;
                    self.push(Value::Float(v as f32));
                }
                I2B => {
                    let v = self.pop_int()?;
                    self.push(Value::Int(v as i8 as i32));
                }
                I2C => {
                    let v = self.pop_int()?;
                    self.push(Value::Int(v as u16 as i32));
                }
                I2S => {
                    let v = self.pop_int()?;
                    self.push(Value::Int(v as i16 as i32));
                }

                LCMP => {
                    let b = self.pop_long()?;
                    let a = self.pop_long()?;
                    self.push(Value::Int(ordering_value(a.cmp(&b))));
                }
                FCMPL | FCMPG => {
                    let b = self.pop_float()?;
                    let a = self.pop_float()?;
                    let nan = if op == FCMPG { 1 } else { -1 };
                    self.push(Value::Int(a.partial_cmp(&b).map(ordering_value).unwrap_or(nan)));
                }
                DCMPL | DCMPG => {
                    let b = self.pop_double()?;
                    let a = self.pop_double()?;
                    let nan = if op == DCMPG { 1 } else { -1 };
                    self.push(Value::Int(a.partial_cmp(&b).map(ordering_value).unwrap_or(nan)));
                }
                IFEQ..=IFLE => {
                    let v = self.pop_int()?;
                    self.branch(compare_zero(op, v))?;
                }
                IF_ICMPEQ..=IF_ICMPLE => {
                    let b = self.pop_int()?;
                    let a = self.pop_int()?;
                    self.branch(compare_zero(op - IF_ICMPEQ + IFEQ, a.cmp(&b) as i32))?;
                }
                IF_ACMPEQ | IF_ACMPNE => {
                    let b = self.pop_ref()?;
                    let a = self.pop_ref()?;
                    let same = match (&a, &b) {
                        (None, None) => true,
                        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
                        _ => false,
                    };
                    self.branch(same == (op == IF_ACMPEQ))?;
                }
                IFNULL | IFNONNULL => {
                    let v = self.pop_ref()?;
                    self.branch(v.is_none() == (op == IFNULL))?;
                }
                GOTO => self.branch(true)?,
                GOTO_W => {
                    let offset = self.i32()?;
                    self.jump(offset as i64)?;
                }

                IRETURN..=ARETURN => return self.pop().map(Exit::Return),
                RETURN => return Ok(Exit::Return(Value::Void)),

                GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD => self.field_access(interp, op)?,
                INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
                    if let Some(callee) = self.invoke(interp, op)? {
                        return Ok(Exit::Call(callee));
                    }
                }

                NEW => {
                    let index = self.u16()?;
                    let name = self.class.pool_class_name(index)?;
                    let class = self.referenced_class(&name)?;
                    if class.is_interface() || class.is_abstract() {
                        return Err(RuntimeError::exception("java.lang.InstantiationError", name));
                    }
                    interp.ensure_initialized(&class)?;
                    let object = interp.new_object(&class)?;
                    self.push(Value::Ref(object));
                }
                NEWARRAY => {
                    let atype = self.u8()?;
                    let component = array_types::descriptor(atype)
                        .ok_or_else(|| self.invalid(format!("bad array type {}", atype)))?;
                    self.new_array(Descriptor::known(component))?;
                }
                ANEWARRAY => {
                    let index = self.u16()?;
                    let name = self.class.pool_class_name(index)?;
                    let component = Descriptor::from_class_name(&name).map_err(|e| self.invalid(e.to_string()))?;
                    self.new_array(component)?;
                }
                ARRAYLENGTH => {
                    let array = self.pop_non_null()?;
                    let length = array.array_length().ok_or_else(|| self.invalid("not an array"))?;
                    self.push(Value::Int(length as i32));
                }
                ATHROW => return Err(self.throw(interp)),
                CHECKCAST | INSTANCEOF => self.type_test(interp, op)?,
                WIDE => {
                    let inner = self.u8()?;
                    let index = self.u16()? as usize;
                    match inner {
                        ILOAD..=ALOAD => self.load(index)?,
                        ISTORE..=ASTORE => self.store(index)?,
                        IINC => {
                            let delta = self.i16()? as i32;
                            self.increment(index, delta)?;
                        }
                        other => return Err(self.invalid(format!("cannot widen {}", mnemonic(other)))),
                    }
                }
                other => return Err(self.invalid(format!("unsupported opcode 0x{:02x} ({})", other, mnemonic(other)))),
            }
        }
    }

    fn increment(&mut self, index: usize, delta: i32) -> RuntimeResult<()> {
        match self.locals.get_mut(index) {
            Some(Value::Int(v)) => {
                *v = v.wrapping_add(delta);
                Ok(())
            }
            _ => Err(self.invalid(format!("iinc on non-int local {}", index))),
        }
    }
}

fn ordering_value(ordering: Ordering) -> i32 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Evaluate an `if<cond>` against zero
fn compare_zero(op: u8, v: i32) -> bool {
    match op {
        IFEQ => v == 0,
        IFNE => v != 0,
        IFLT => v < 0,
        IFGE => v >= 0,
        IFGT => v > 0,
        _ => v <= 0,
    }
}

fn int_op(op: u8, a: i32, b: i32) -> RuntimeResult<i32> {
    Ok(match op {
        IADD => a.wrapping_add(b),
        ISUB => a.wrapping_sub(b),
        IMUL => a.wrapping_mul(b),
        IDIV | IREM if b == 0 => return Err(RuntimeError::arithmetic("/ by zero")),
        IDIV => a.wrapping_div(b),
        IREM => a.wrapping_rem(b),
        ISHL => a.wrapping_shl(b as u32 & 0x1f),
        ISHR => a >> (b & 0x1f),
        IUSHR => ((a as u32) >> (b & 0x1f)) as i32,
        IAND => a & b,
        IOR => a | b,
        _ => a ^ b,
    })
}

fn long_op(op: u8, a: i64, b: i64) -> RuntimeResult<i64> {
    Ok(match op {
        LADD => a.wrapping_add(b),
        LSUB => a.wrapping_sub(b),
        LMUL => a.wrapping_mul(b),
        LDIV | LREM if b == 0 => return Err(RuntimeError::arithmetic("/ by zero")),
        LDIV => a.wrapping_div(b),
        LREM => a.wrapping_rem(b),
        LAND => a & b,
        LOR => a | b,
        _ => a ^ b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_follows_java() {
        assert_eq!(int_op(IADD, i32::MAX, 1).unwrap(), i32::MIN);
        assert_eq!(int_op(IDIV, i32::MIN, -1).unwrap(), i32::MIN);
        assert_eq!(int_op(IREM, -7, 2).unwrap(), -1);
        assert_eq!(int_op(ISHL, 1, 33).unwrap(), 2);
        assert_eq!(int_op(IUSHR, -1, 28).unwrap(), 15);
        assert_eq!(
            int_op(IDIV, 1, 0).unwrap_err(),
            RuntimeError::arithmetic("/ by zero")
        );
        assert!(long_op(LREM, 1, 0).is_err());
    }

    #[test]
    fn test_branch_conditions() {
        assert!(compare_zero(IFEQ, 0));
        assert!(compare_zero(IFLT, -3));
        assert!(!compare_zero(IFGT, 0));
        assert!(compare_zero(IFLE, 0));
    }
}
