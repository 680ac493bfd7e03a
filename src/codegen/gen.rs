//! Gen phase - class file generation
//!
//! Walks one class declaration of the attributed unit and produces its class
//! file: fields, methods with their `Code`, synthesized constructors and the
//! static initializer. Expressions live in `gen_expr`, conditions in
//! `gen_cond`, typing in `attr`.

use log::trace;

use super::attr::{int_constant, is_null_type};
use super::attribute::{exceptions_attribute, source_file_attribute, CodeAttribute, LineNumberTable};
use super::class::{ClassFile, FieldInfo, MethodInfo};
use super::code::{Code, Label, SlotKind};
use super::constpool::ConstantPool;
use super::defs::access_flags::*;
use super::defs::{CONSTRUCTOR_METHOD_NAME, STATIC_INITIALIZER_METHOD_NAME};
use super::enter::{default_constructor, display, type_ref_location, Symbols};
use super::error::CodegenError;
use super::opcodes::*;
use super::writer::ClassfileWritable;
use super::ClassImage;
use crate::ast::*;
use crate::common::import::ImportResolver;
use crate::common::type_resolver::{MethodSignature, TypeResolver};
use crate::config::Config;
use crate::descriptor::{Descriptor, THROWABLE};
use crate::error::Diagnostic;
use crate::parser::Location;

pub(super) type GenResult<T> = Result<T, Diagnostic>;

/// A local variable or parameter in scope
#[derive(Debug, Clone)]
pub(super) struct Local {
    pub name: String,
    pub descriptor: Descriptor,
    pub slot: u16,
    pub is_final: bool,
}

#[derive(Debug, Clone, Copy)]
struct LoopLabels {
    exit: Label,
    next: Label,
}

/// Generator state for one class; method state is reset per method
pub(super) struct Gen<'a> {
    pub(super) unit: &'a CompilationUnit,
    pub(super) resolver: &'a mut TypeResolver,
    pub(super) imports: &'a mut ImportResolver,
    pub(super) symbols: &'a Symbols,
    pub(super) config: &'a Config,
    pub(super) class_id: ClassId,
    pub(super) this_type: Descriptor,
    pub(super) pool: ConstantPool,
    pub(super) code: Code,
    /// Static method, static initializer or static field initializer
    pub(super) is_static: bool,
    /// Constructor or initializer of the current class: its final fields are assignable
    pub(super) in_initializer: bool,
    pub(super) return_type: Descriptor,
    pub(super) locals: Vec<Local>,
    loops: Vec<LoopLabels>,
    pub(super) location: Location,
    diagnostics: Vec<Diagnostic>,
}

pub(super) fn codegen_error(location: Location) -> impl Fn(CodegenError) -> Diagnostic {
    move |e| Diagnostic::new(location, e.to_string())
}

impl<'a> Gen<'a> {
    pub(super) fn new(
        unit: &'a CompilationUnit,
        resolver: &'a mut TypeResolver,
        imports: &'a mut ImportResolver,
        symbols: &'a Symbols,
        config: &'a Config,
        class_id: ClassId,
    ) -> Self {
        let this_type = symbols.class(class_id).descriptor.clone();
        Self {
            unit,
            resolver,
            imports,
            symbols,
            config,
            class_id,
            this_type,
            pool: ConstantPool::new(),
            code: Code::new(0, false),
            is_static: false,
            in_initializer: false,
            return_type: Descriptor::void(),
            locals: Vec::new(),
            loops: Vec::new(),
            location: Location::start(),
            diagnostics: Vec::new(),
        }
    }

    pub(super) fn this_internal_name(&self) -> String {
        self.symbols.class(self.class_id).internal_name()
    }

    // Constant pool access with diagnostics at the current location

    pub(super) fn add_class(&mut self, internal_name: &str) -> GenResult<u16> {
        self.pool.add_class(internal_name).map_err(codegen_error(self.location))
    }

    pub(super) fn add_utf8(&mut self, value: &str) -> GenResult<u16> {
        self.pool.add_utf8(value).map_err(codegen_error(self.location))
    }

    pub(super) fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> GenResult<u16> {
        self.pool.add_field_ref(owner, name, descriptor).map_err(codegen_error(self.location))
    }

    pub(super) fn add_method_ref(&mut self, owner: &str, name: &str, descriptor: &str, interface: bool) -> GenResult<u16> {
        let location = self.location;
        if interface {
            self.pool.add_interface_method_ref(owner, name, descriptor).map_err(codegen_error(location))
        } else {
            self.pool.add_method_ref(owner, name, descriptor).map_err(codegen_error(location))
        }
    }

    /// Generate the class file of `self.class_id`
    pub(super) fn gen_class(mut self) -> Result<ClassImage, Vec<Diagnostic>> {
        let unit = self.unit;
        let decl = unit.class(self.class_id);
        let symbol = self.symbols.class(self.class_id).clone();
        self.location = decl.location;
        trace!("Generating class {}", symbol.binary_name);

        let mut class_file = ClassFile::new();
        class_file.major_version = self.config.class_file_version;
        class_file.access_flags = symbol.access_flags;
        let header = (|| -> GenResult<()> {
            class_file.this_class = self.add_class(&symbol.internal_name())?;
            let super_name = symbol
                .super_type
                .as_ref()
                .and_then(Descriptor::internal_name)
                .unwrap_or_else(|| "java/lang/Object".to_string());
            class_file.super_class = self.add_class(&super_name)?;
            for interface in &symbol.interfaces {
                let name = interface.internal_name().unwrap_or_default();
                class_file.interfaces.push(self.add_class(&name)?);
            }
            for field in &decl.fields {
                let signature = self.symbols.field(*field).clone();
                let name = self.add_utf8(&signature.name)?;
                let descriptor = self.add_utf8(signature.descriptor.as_str())?;
                class_file.fields.push(FieldInfo::new(signature.access_flags, name, descriptor));
            }
            Ok(())
        })();
        if let Err(d) = header {
            self.diagnostics.push(d);
        }

        for method in &decl.methods {
            self.collect(|gen| gen.gen_method(*method), &mut class_file.methods);
        }
        for constructor in &decl.constructors {
            self.collect(|gen| gen.gen_constructor(*constructor), &mut class_file.methods);
        }
        if symbol.default_constructor {
            self.collect(|gen| gen.gen_default_constructor(), &mut class_file.methods);
        }
        if has_static_initialization(unit, decl) {
            self.collect(|gen| gen.gen_static_initializer(), &mut class_file.methods);
        }

        if self.config.debug {
            let source_name = self
                .config
                .source_name
                .clone()
                .or_else(|| unit.file_name.clone())
                .unwrap_or_else(|| format!("{}.java", outermost_name(&symbol.binary_name)));
            match source_file_attribute(&mut self.pool, &source_name) {
                Ok(attribute) => class_file.attributes.push(attribute),
                Err(e) => self.diagnostics.push(Diagnostic::new(decl.location, e.to_string())),
            }
        }

        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        class_file.constant_pool = std::mem::replace(&mut self.pool, ConstantPool::new());
        Ok(ClassImage { name: symbol.binary_name, bytes: class_file.to_classfile_bytes() })
    }

    fn collect(&mut self, f: impl FnOnce(&mut Self) -> GenResult<MethodInfo>, methods: &mut Vec<MethodInfo>) {
        match f(self) {
            Ok(method) => methods.push(method),
            Err(d) => self.diagnostics.push(d),
        }
    }

    /// Reset method state and enter the parameters into scope
    fn begin_method(&mut self, is_static: bool, return_type: Descriptor, parameters: &[(String, Descriptor, bool)]) -> GenResult<()> {
        self.code = Code::new(0, self.config.debug);
        self.is_static = is_static;
        self.return_type = return_type;
        self.locals.clear();
        self.loops.clear();
        if !is_static {
            self.code.new_local(&self.this_type).map_err(codegen_error(self.location))?;
        }
        for (name, descriptor, is_final) in parameters {
            if self.find_local(name).is_some() {
                return self.error(self.location, format!("variable {} is already defined in method", name));
            }
            self.declare_local(name, descriptor.clone(), *is_final)?;
        }
        Ok(())
    }

    fn method_parameters(&self, decl: &MethodDecl, signature: &MethodSignature) -> Vec<(String, Descriptor, bool)> {
        decl.parameters
            .iter()
            .zip(&signature.parameters)
            .map(|(p, d)| (p.name.clone(), d.clone(), p.modifiers.has(Modifier::Final)))
            .collect()
    }

    /// Package the current `Code` as a method
    fn finish_method(&mut self, access_flags: u16, name: &str, descriptor: &str, throws: &[String]) -> GenResult<MethodInfo> {
        let code = std::mem::replace(&mut self.code, Code::new(0, false));
        let finished = code.finish().map_err(codegen_error(self.location))?;
        let mut attribute = CodeAttribute::new(finished.max_stack, finished.max_locals, finished.bytes);
        if self.config.debug && !finished.line_numbers.is_empty() {
            let table = LineNumberTable { entries: finished.line_numbers };
            attribute.attributes.push(table.to_attribute(&mut self.pool).map_err(codegen_error(self.location))?);
        }
        let mut method = self.method_info(access_flags, name, descriptor, throws)?;
        method.attributes.insert(0, attribute.to_attribute(&mut self.pool).map_err(codegen_error(self.location))?);
        Ok(method)
    }

    fn method_info(&mut self, access_flags: u16, name: &str, descriptor: &str, throws: &[String]) -> GenResult<MethodInfo> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        let mut method = MethodInfo::new(access_flags, name_index, descriptor_index);
        if !throws.is_empty() {
            method
                .attributes
                .push(exceptions_attribute(&mut self.pool, throws).map_err(codegen_error(self.location))?);
        }
        Ok(method)
    }

    fn thrown_types(&mut self, decl: &MethodDecl) -> GenResult<Vec<String>> {
        let mut names = Vec::with_capacity(decl.throws.len());
        for thrown in &decl.throws {
            let d = self.resolve_type(thrown, type_ref_location(thrown, decl.location))?;
            names.extend(d.internal_name());
        }
        Ok(names)
    }

    fn gen_method(&mut self, id: MethodId) -> GenResult<MethodInfo> {
        let unit = self.unit;
        let decl = unit.method(id);
        let signature = self.symbols.method(id).clone();
        self.location = decl.location;
        self.in_initializer = false;
        let throws = self.thrown_types(decl)?;
        let Some(body) = &decl.body else {
            return self.method_info(signature.access_flags, &signature.name, &signature.descriptor(), &throws);
        };
        if signature.is_abstract() {
            return self.error(decl.location, "abstract methods cannot have a body");
        }
        let parameters = self.method_parameters(decl, &signature);
        self.begin_method(signature.is_static(), signature.return_type.clone(), &parameters)?;
        let reported = self.diagnostics.len();
        self.gen_block(body);
        if self.code.is_alive() {
            if self.return_type.is_void() {
                self.code.emit_op(RETURN, 0);
            } else if self.diagnostics.len() == reported {
                self.diagnostics.push(Diagnostic::new(decl.location, "missing return statement"));
            }
        }
        self.finish_method(signature.access_flags, &signature.name, &signature.descriptor(), &throws)
    }

    fn gen_constructor(&mut self, id: MethodId) -> GenResult<MethodInfo> {
        let unit = self.unit;
        let decl = unit.method(id);
        let signature = self.symbols.method(id).clone();
        self.location = decl.location;
        let throws = self.thrown_types(decl)?;
        let parameters = self.method_parameters(decl, &signature);
        self.begin_method(false, Descriptor::void(), &parameters)?;
        self.in_initializer = true;
        match &decl.explicit_invocation {
            Some(invocation) if !invocation.is_super => {
                self.location = invocation.location;
                let this_type = self.this_type.clone();
                self.gen_constructor_call(&this_type, &invocation.arguments, invocation.location)?;
            }
            other => {
                let (arguments, location) = match other {
                    Some(invocation) => (invocation.arguments.as_slice(), invocation.location),
                    None => (&[][..], decl.location),
                };
                self.gen_super_constructor_call(arguments, location)?;
                self.gen_instance_initializers();
            }
        }
        if let Some(body) = &decl.body {
            self.gen_block(body);
        }
        if self.code.is_alive() {
            self.code.emit_op(RETURN, 0);
        }
        self.finish_method(signature.access_flags, CONSTRUCTOR_METHOD_NAME, &signature.descriptor(), &throws)
    }

    fn gen_default_constructor(&mut self) -> GenResult<MethodInfo> {
        let location = self.unit.class(self.class_id).location;
        self.location = location;
        self.begin_method(false, Descriptor::void(), &[])?;
        self.in_initializer = true;
        self.gen_super_constructor_call(&[], location)?;
        self.gen_instance_initializers();
        self.code.emit_op(RETURN, 0);
        let signature = default_constructor();
        self.finish_method(signature.access_flags, CONSTRUCTOR_METHOD_NAME, &signature.descriptor(), &[])
    }

    fn gen_super_constructor_call(&mut self, arguments: &[Expr], location: Location) -> GenResult<()> {
        let Some(super_type) = self.super_type() else {
            return Ok(());
        };
        self.gen_constructor_call(&super_type, arguments, location)
    }

    /// `this(...)` or `super(...)`: invoke a constructor of `owner` on `this`
    fn gen_constructor_call(&mut self, owner: &Descriptor, arguments: &[Expr], location: Location) -> GenResult<()> {
        let argument_types = self.attrib_arguments(arguments)?;
        let constructor = self.resolve_constructor(owner, &argument_types, location)?;
        self.code.emit_op(ALOAD_0, 1);
        self.gen_arguments(arguments, &constructor.parameters)?;
        let owner_name = owner.internal_name().unwrap_or_default();
        self.emit_invoke(INVOKESPECIAL, &owner_name, &constructor)
    }

    /// Field initializers and initializer blocks of one kind, in textual order
    fn gen_initializers(&mut self, is_static: bool) {
        let unit = self.unit;
        let decl = unit.class(self.class_id);
        for item in &decl.init_order {
            match item {
                InitItem::Field(id) => {
                    let field = unit.field(*id);
                    if field.modifiers.is_static() != is_static {
                        continue;
                    }
                    let Some(initializer) = &field.initializer else {
                        continue;
                    };
                    self.location = field.location;
                    self.code.mark_line(field.location.line);
                    let signature = self.symbols.field(*id).clone();
                    let result = (|| -> GenResult<()> {
                        if !is_static {
                            self.code.emit_op(ALOAD_0, 1);
                        }
                        self.gen_initializer(initializer, &signature.descriptor)?;
                        let owner = self.this_internal_name();
                        let index = self.add_field_ref(&owner, &signature.name, signature.descriptor.as_str())?;
                        let size = signature.descriptor.size() as i32;
                        if is_static {
                            self.code.emit_op_u16(PUTSTATIC, index, -size);
                        } else {
                            self.code.emit_op_u16(PUTFIELD, index, -1 - size);
                        }
                        Ok(())
                    })();
                    if let Err(d) = result {
                        self.diagnostics.push(d);
                    }
                }
                InitItem::Block(index) => {
                    let initializer = &decl.initializers[*index];
                    if initializer.is_static == is_static {
                        self.gen_block(&initializer.body);
                    }
                }
            }
        }
    }

    fn gen_instance_initializers(&mut self) {
        self.gen_initializers(false);
    }

    fn gen_static_initializer(&mut self) -> GenResult<MethodInfo> {
        self.location = self.unit.class(self.class_id).location;
        self.begin_method(true, Descriptor::void(), &[])?;
        self.in_initializer = true;
        self.gen_initializers(true);
        if self.code.is_alive() {
            self.code.emit_op(RETURN, 0);
        }
        self.finish_method(ACC_STATIC, STATIC_INITIALIZER_METHOD_NAME, "()V", &[])
    }

    /// Static type of the expression returned by an inferred-type method
    pub(super) fn infer_return_type(&mut self, id: MethodId) -> GenResult<Descriptor> {
        let unit = self.unit;
        let decl = unit.method(id);
        let signature = self.symbols.method(id).clone();
        self.location = decl.location;
        let parameters = self.method_parameters(decl, &signature);
        self.begin_method(signature.is_static(), Descriptor::object(), &parameters)?;
        let returned = decl.body.as_ref().and_then(|body| {
            body.statements.iter().find_map(|s| match s {
                Stmt::Return(r) => r.value.as_ref(),
                _ => None,
            })
        });
        let Some(expr) = returned else {
            return Ok(Descriptor::void());
        };
        let t = self.attrib(expr)?;
        Ok(if is_null_type(&t) { Descriptor::object() } else { t })
    }

    // Locals and scopes

    pub(super) fn declare_local(&mut self, name: &str, descriptor: Descriptor, is_final: bool) -> GenResult<u16> {
        let slot = self.code.new_local(&descriptor).map_err(codegen_error(self.location))?;
        self.locals.push(Local { name: name.to_string(), descriptor, slot, is_final });
        Ok(slot)
    }

    fn scope_mark(&self) -> (usize, u16) {
        (self.locals.len(), self.code.local_mark())
    }

    fn end_scope(&mut self, mark: (usize, u16)) {
        self.locals.truncate(mark.0);
        self.code.release_locals(mark.1);
    }

    // Statements

    pub(super) fn gen_block(&mut self, block: &Block) {
        let mark = self.scope_mark();
        self.gen_statements(&block.statements);
        self.end_scope(mark);
    }

    fn gen_statements(&mut self, statements: &[Stmt]) {
        let mut reachable = true;
        for stmt in statements {
            if !reachable {
                self.diagnostics.push(Diagnostic::new(stmt.location(), "unreachable statement"));
                return;
            }
            let was_alive = self.code.is_alive();
            if let Err(d) = self.gen_stmt(stmt) {
                self.diagnostics.push(d);
            }
            reachable = !was_alive || self.code.is_alive();
        }
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> GenResult<()> {
        self.location = stmt.location();
        if !matches!(stmt, Stmt::Block(_) | Stmt::Empty(_)) {
            self.code.mark_line(self.location.line);
        }
        match stmt {
            Stmt::Expression(s) => self.gen_expr_stmt(&s.expr),
            Stmt::Declaration(d) => self.gen_local_declaration(d),
            Stmt::If(s) => {
                let else_label = self.code.new_label();
                self.gen_cond(&s.condition, false, else_label)?;
                self.gen_nested(&s.then_branch);
                match &s.else_branch {
                    Some(else_branch) => {
                        let end = self.code.new_label();
                        if self.code.is_alive() {
                            self.code.branch(GOTO, end, 0);
                        }
                        self.code.place_label(else_label);
                        self.gen_nested(else_branch);
                        self.code.place_label(end);
                    }
                    None => self.code.place_label(else_label),
                }
                Ok(())
            }
            Stmt::While(s) => {
                let start = self.code.new_label();
                let exit = self.code.new_label();
                self.code.place_label(start);
                self.gen_cond(&s.condition, false, exit)?;
                self.gen_loop_body(&s.body, LoopLabels { exit, next: start });
                if self.code.is_alive() {
                    self.code.branch(GOTO, start, 0);
                }
                self.code.place_label(exit);
                Ok(())
            }
            Stmt::DoWhile(s) => {
                let start = self.code.new_label();
                let next = self.code.new_label();
                let exit = self.code.new_label();
                self.code.place_label(start);
                self.gen_loop_body(&s.body, LoopLabels { exit, next });
                self.code.place_label(next);
                self.location = s.condition.location();
                if self.code.is_alive() {
                    self.gen_cond(&s.condition, true, start)?;
                } else {
                    self.attrib_condition(&s.condition)?;
                }
                self.code.place_label(exit);
                Ok(())
            }
            Stmt::For(s) => {
                let mark = self.scope_mark();
                let result = self.gen_for(s);
                self.end_scope(mark);
                result
            }
            Stmt::Return(r) => self.gen_return(r),
            Stmt::Break(b) => match self.loops.last() {
                Some(labels) => {
                    let exit = labels.exit;
                    self.code.branch(GOTO, exit, 0);
                    Ok(())
                }
                None => self.error(b.location, "break outside switch or loop"),
            },
            Stmt::Continue(c) => match self.loops.last() {
                Some(labels) => {
                    let next = labels.next;
                    self.code.branch(GOTO, next, 0);
                    Ok(())
                }
                None => self.error(c.location, "continue outside of loop"),
            },
            Stmt::Throw(t) => {
                let thrown = self.attrib(&t.expr)?;
                let throwable = Descriptor::known(THROWABLE);
                if !self.is_assignable(&thrown, &throwable, None, t.location)? {
                    return self.error(
                        t.expr.location(),
                        format!("incompatible types: {} cannot be converted to java.lang.Throwable", display(&thrown)),
                    );
                }
                self.gen_expr(&t.expr)?;
                self.code.emit_op(ATHROW, -1);
                Ok(())
            }
            Stmt::Block(b) => {
                self.gen_block(b);
                Ok(())
            }
            Stmt::Empty(_) => Ok(()),
        }
    }

    /// The body of `if`/`else` as its own scope
    fn gen_nested(&mut self, stmt: &Stmt) {
        let mark = self.scope_mark();
        if let Err(d) = self.gen_stmt(stmt) {
            self.diagnostics.push(d);
        }
        self.end_scope(mark);
    }

    fn gen_loop_body(&mut self, body: &Stmt, labels: LoopLabels) {
        self.loops.push(labels);
        self.gen_nested(body);
        self.loops.pop();
    }

    fn attrib_condition(&mut self, condition: &Expr) -> GenResult<()> {
        let t = self.attrib(condition)?;
        if !t.is_boolean() {
            return self.error(
                condition.location(),
                format!("incompatible types: {} cannot be converted to boolean", display(&t)),
            );
        }
        Ok(())
    }

    fn gen_for(&mut self, s: &ForStmt) -> GenResult<()> {
        for init in &s.init {
            self.gen_stmt(init)?;
        }
        let start = self.code.new_label();
        let next = self.code.new_label();
        let exit = self.code.new_label();
        self.code.place_label(start);
        if let Some(condition) = &s.condition {
            self.gen_cond(condition, false, exit)?;
        }
        self.gen_loop_body(&s.body, LoopLabels { exit, next });
        self.code.place_label(next);
        for update in &s.update {
            self.gen_expr_stmt(update)?;
        }
        if self.code.is_alive() {
            self.code.branch(GOTO, start, 0);
        }
        self.code.place_label(exit);
        Ok(())
    }

    fn gen_local_declaration(&mut self, decl: &VarDeclStmt) -> GenResult<()> {
        let is_final = decl.modifiers.has(Modifier::Final);
        for variable in &decl.variables {
            self.location = variable.location;
            let type_ref = decl.type_ref.clone().with_extra_dims(variable.array_dims);
            let descriptor = self.resolve_type(&type_ref, variable.location)?;
            if descriptor.is_void() {
                return self.error(variable.location, format!("'void' type not allowed here: {}", variable.name));
            }
            if self.find_local(&variable.name).is_some() {
                return self.error(variable.location, format!("variable {} is already defined in method", variable.name));
            }
            // The variable is in scope inside its own initializer
            match &variable.initializer {
                Some(initializer) => {
                    self.gen_initializer(initializer, &descriptor)?;
                    let slot = self.declare_local(&variable.name, descriptor.clone(), is_final)?;
                    self.code.emit_store(slot, SlotKind::of(&descriptor));
                }
                None => {
                    // Blank finals start out default-initialized and stay assignable
                    let slot = self.declare_local(&variable.name, descriptor.clone(), false)?;
                    self.gen_default_value(&descriptor)?;
                    self.code.emit_store(slot, SlotKind::of(&descriptor));
                }
            }
        }
        Ok(())
    }

    /// Initializer of a variable or field: a value, or `{ ... }` for arrays
    pub(super) fn gen_initializer(&mut self, expr: &Expr, target: &Descriptor) -> GenResult<()> {
        if let Expr::ArrayInitializer(init) = expr {
            if !target.is_array() {
                return self.error(init.location, format!("illegal initializer for {}", display(target)));
            }
            return self.gen_array_initializer(init, target);
        }
        let t = self.attrib(expr)?;
        self.check_assignable(&t, target, int_constant(expr), expr.location())?;
        let t = self.gen_expr(expr)?;
        self.coerce(&t, target);
        Ok(())
    }

    fn gen_default_value(&mut self, d: &Descriptor) -> GenResult<()> {
        match SlotKind::of(d) {
            SlotKind::Int => self.code.emit_op(ICONST_0, 1),
            SlotKind::Long => self.code.emit_op(LCONST_0, 2),
            SlotKind::Float => self.code.emit_op(FCONST_0, 1),
            SlotKind::Double => self.code.emit_op(DCONST_0, 2),
            SlotKind::Reference => self.code.emit_op(ACONST_NULL, 1),
        }
        Ok(())
    }

    fn gen_return(&mut self, r: &ReturnStmt) -> GenResult<()> {
        let return_type = self.return_type.clone();
        match &r.value {
            None => {
                if !return_type.is_void() {
                    return self.error(r.location, "missing return value");
                }
                self.code.emit_op(RETURN, 0);
            }
            Some(value) if return_type.is_void() => {
                // A void expression wrapped as `return expr;` runs for its effect
                let t = self.attrib(value)?;
                if !t.is_void() || self.in_initializer {
                    return self.error(value.location(), "incompatible types: unexpected return value");
                }
                self.gen_expr_stmt(value)?;
                self.code.emit_op(RETURN, 0);
            }
            Some(value) => {
                let t = self.attrib(value)?;
                self.check_assignable(&t, &return_type, int_constant(value), value.location())?;
                let t = self.gen_expr(value)?;
                self.coerce(&t, &return_type);
                let kind = SlotKind::of(&return_type);
                self.code.emit_op(IRETURN + kind.offset(), -(kind.width() as i32));
            }
        }
        Ok(())
    }

    /// An expression evaluated for its side effects
    pub(super) fn gen_expr_stmt(&mut self, expr: &Expr) -> GenResult<()> {
        match expr {
            Expr::Assignment(a) => {
                self.gen_assignment(a, false)?;
            }
            Expr::Unary(u) if u.operator.is_increment() => {
                self.gen_increment(u, false)?;
            }
            Expr::MethodCall(call) => {
                let t = self.gen_method_call(call)?;
                self.pop_value(&t);
            }
            Expr::New(n) => {
                let t = self.gen_new(n)?;
                self.pop_value(&t);
            }
            other => return self.error(other.location(), "not a statement"),
        }
        Ok(())
    }

    pub(super) fn pop_value(&mut self, t: &Descriptor) {
        match t.size() {
            0 => {}
            2 => self.code.emit_op(POP2, -2),
            _ => self.code.emit_op(POP, -1),
        }
    }
}

fn has_static_initialization(unit: &CompilationUnit, decl: &ClassDecl) -> bool {
    decl.fields.iter().any(|f| {
        let field = unit.field(*f);
        field.modifiers.is_static() && field.initializer.is_some()
    }) || decl.initializers.iter().any(|i| i.is_static)
}

fn outermost_name(binary_name: &str) -> &str {
    let top = binary_name.split('$').next().unwrap_or(binary_name);
    top.rsplit('.').next().unwrap_or(top)
}

/// Replace each inferred return type with the static type of the returned expression
pub(super) fn infer_return_types(
    unit: &CompilationUnit,
    resolver: &mut TypeResolver,
    imports: &mut ImportResolver,
    symbols: &mut Symbols,
    config: &Config,
) -> Result<(), Vec<Diagnostic>> {
    let mut inferred = Vec::new();
    let mut diagnostics = Vec::new();
    for (index, method) in unit.methods.iter().enumerate() {
        if method.return_type != TypeRef::Inferred {
            continue;
        }
        let mut gen = Gen::new(unit, resolver, imports, symbols, config, method.declaring_class);
        match gen.infer_return_type(MethodId(index)) {
            Ok(d) => inferred.push((index, d)),
            Err(d) => diagnostics.push(d),
        }
    }
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    for (index, d) in inferred {
        trace!("Inferred return type {} for {}", d, unit.methods[index].name);
        symbols.methods[index].return_type = d;
    }
    Ok(())
}
