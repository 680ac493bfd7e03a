//! Attr phase - type checking and name resolution
//!
//! Computes the static type of expressions, classifies names as locals,
//! fields, types or packages, and selects method overloads. Nothing here
//! emits code; the generator asks before it writes.

use std::sync::Arc;

use super::enter::{display, display_list, resolve_type_ref};
use super::gen::{Gen, GenResult, Local};
use crate::ast::*;
use crate::common::type_resolver::{FieldSignature, MethodSignature, ResolvedType};
use crate::descriptor::{Descriptor, BYTE, CHAR, DOUBLE, FLOAT, INT, LONG, SHORT, STRING};
use crate::error::Diagnostic;
use crate::parser::Location;

use super::opcodes::{INVOKEINTERFACE, INVOKESPECIAL, INVOKESTATIC, INVOKEVIRTUAL};

/// Type of the `null` literal
pub const NULL_TYPE: &str = "Lnull;";

pub(super) fn null_type() -> Descriptor {
    Descriptor::known(NULL_TYPE)
}

/// Turn a resolver failure into a diagnostic at `location`
pub(super) fn lookup_error(location: Location) -> impl Fn(crate::error::Error) -> Diagnostic {
    move |e| Diagnostic::new(location, e.to_string())
}

pub(super) fn is_null_type(d: &Descriptor) -> bool {
    d.as_str() == NULL_TYPE
}

pub(super) fn is_numeric(d: &Descriptor) -> bool {
    d.is_primitive_numeric()
}

pub(super) fn is_integral(d: &Descriptor) -> bool {
    matches!(d.as_str(), BYTE | SHORT | CHAR | INT | LONG)
}

pub(super) fn is_string(d: &Descriptor) -> bool {
    d.as_str() == STRING
}

/// Unary numeric promotion
pub(super) fn unary_promotion(d: &Descriptor) -> Descriptor {
    match d.as_str() {
        BYTE | SHORT | CHAR => Descriptor::int(),
        _ => d.clone(),
    }
}

/// Binary numeric promotion
pub(super) fn binary_promotion(a: &Descriptor, b: &Descriptor) -> Descriptor {
    let pick = |d: &'static str| a.as_str() == d || b.as_str() == d;
    if pick(DOUBLE) {
        Descriptor::double()
    } else if pick(FLOAT) {
        Descriptor::known(FLOAT)
    } else if pick(LONG) {
        Descriptor::long()
    } else {
        Descriptor::int()
    }
}

/// Widening primitive conversion (identity included)
pub(super) fn is_widening(from: &Descriptor, to: &Descriptor) -> bool {
    if from == to {
        return true;
    }
    match from.as_str() {
        BYTE => matches!(to.as_str(), SHORT | INT | LONG | FLOAT | DOUBLE),
        SHORT | CHAR => matches!(to.as_str(), INT | LONG | FLOAT | DOUBLE),
        INT => matches!(to.as_str(), LONG | FLOAT | DOUBLE),
        LONG => matches!(to.as_str(), FLOAT | DOUBLE),
        FLOAT => to.as_str() == DOUBLE,
        _ => false,
    }
}

fn constant_fits(value: i32, to: &Descriptor) -> bool {
    match to.as_str() {
        BYTE => i8::try_from(value).is_ok(),
        SHORT => i16::try_from(value).is_ok(),
        CHAR => u16::try_from(value).is_ok(),
        _ => false,
    }
}

/// Compile-time `int` value of a constant expression over literals
pub(super) fn int_constant(expr: &Expr) -> Option<i32> {
    match expr {
        Expr::Literal(LiteralExpr { value: Literal::Int(v), .. }) => Some(*v),
        Expr::Literal(LiteralExpr { value: Literal::Char(c), .. }) => Some(*c as i32),
        Expr::Parenthesized(inner) => int_constant(inner),
        Expr::Unary(u) => {
            let v = int_constant(&u.operand)?;
            match u.operator {
                UnaryOp::Plus => Some(v),
                UnaryOp::Minus => Some(v.wrapping_neg()),
                UnaryOp::BitNot => Some(!v),
                _ => None,
            }
        }
        Expr::Binary(b) => {
            let l = int_constant(&b.left)?;
            let r = int_constant(&b.right)?;
            match b.operator {
                BinaryOp::Add => Some(l.wrapping_add(r)),
                BinaryOp::Sub => Some(l.wrapping_sub(r)),
                BinaryOp::Mul => Some(l.wrapping_mul(r)),
                BinaryOp::And => Some(l & r),
                BinaryOp::Or => Some(l | r),
                BinaryOp::Xor => Some(l ^ r),
                BinaryOp::LShift => Some(l.wrapping_shl(r as u32)),
                BinaryOp::RShift => Some(l.wrapping_shr(r as u32)),
                BinaryOp::URShift => Some((l as u32).wrapping_shr(r as u32) as i32),
                _ => None,
            }
        }
        _ => None,
    }
}

/// What a simple or qualified name denotes
#[derive(Debug, Clone)]
pub(super) enum Name {
    Local(Local),
    /// `owner` is the internal name of the declaring type
    Field { owner: String, field: FieldSignature },
    ArrayLength,
    Value(Descriptor),
    Type(Descriptor),
    Package(String),
}

impl Name {
    fn value_type(&self) -> Option<Descriptor> {
        match self {
            Name::Local(local) => Some(local.descriptor.clone()),
            Name::Field { field, .. } => Some(field.descriptor.clone()),
            Name::ArrayLength => Some(Descriptor::int()),
            Name::Value(d) => Some(d.clone()),
            Name::Type(_) | Name::Package(_) => None,
        }
    }
}

/// How the receiver of a call reaches the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Receiver {
    /// Static call, nothing to push
    None,
    This,
    /// Evaluate the call's target expression
    Target,
    /// Static method named through an instance: evaluate the target, then drop it
    TargetDiscarded,
}

#[derive(Debug, Clone)]
pub(super) struct ResolvedCall {
    /// Internal name of the class in the method reference
    pub owner: String,
    pub method: MethodSignature,
    pub opcode: u8,
    pub receiver: Receiver,
}

impl Gen<'_> {
    pub(super) fn error<T>(&self, location: Location, message: impl Into<String>) -> GenResult<T> {
        Err(Diagnostic::new(location, message))
    }

    pub(super) fn super_type(&self) -> Option<Descriptor> {
        self.symbols.class(self.class_id).super_type.clone()
    }

    pub(super) fn resolve_type(&mut self, type_ref: &TypeRef, location: Location) -> GenResult<Descriptor> {
        let symbols = self.symbols;
        let enclosing = &symbols.class(self.class_id).enclosing;
        resolve_type_ref(type_ref, location, enclosing, self.imports, self.resolver)
    }

    pub(super) fn resolved(&mut self, d: &Descriptor, location: Location) -> GenResult<Arc<ResolvedType>> {
        self.resolver.resolve(d).map_err(lookup_error(location))
    }

    pub(super) fn is_subtype(&mut self, sub: &Descriptor, sup: &Descriptor, location: Location) -> GenResult<bool> {
        self.resolver.is_subtype(sub, sup).map_err(lookup_error(location))
    }

    pub(super) fn find_local(&self, name: &str) -> Option<&Local> {
        self.locals.iter().rev().find(|l| l.name == name)
    }

    /// Assignment conversion; `constant` allows narrowing of fitting `int` constants
    pub(super) fn is_assignable(
        &mut self,
        from: &Descriptor,
        to: &Descriptor,
        constant: Option<i32>,
        location: Location,
    ) -> GenResult<bool> {
        if from == to {
            return Ok(!from.is_void());
        }
        if from.is_void() || to.is_void() {
            return Ok(false);
        }
        if is_null_type(from) {
            return Ok(to.is_reference());
        }
        match (from.is_primitive(), to.is_primitive()) {
            (true, true) => Ok(is_widening(from, to)
                || (constant.is_some_and(|v| constant_fits(v, to)) && from.is_int_like() && !from.is_boolean())),
            (false, false) => self.is_subtype(from, to, location),
            _ => Ok(false),
        }
    }

    pub(super) fn check_assignable(
        &mut self,
        from: &Descriptor,
        to: &Descriptor,
        constant: Option<i32>,
        location: Location,
    ) -> GenResult<()> {
        if self.is_assignable(from, to, constant, location)? {
            return Ok(());
        }
        if is_numeric(from) && is_numeric(to) {
            return self.error(
                location,
                format!("incompatible types: possible lossy conversion from {} to {}", display(from), display(to)),
            );
        }
        self.error(location, format!("incompatible types: {} cannot be converted to {}", display(from), display(to)))
    }

    pub(super) fn is_castable(&mut self, from: &Descriptor, to: &Descriptor, location: Location) -> GenResult<bool> {
        if from == to {
            return Ok(true);
        }
        if from.is_void() || to.is_void() {
            return Ok(false);
        }
        if is_null_type(from) {
            return Ok(to.is_reference());
        }
        if is_null_type(to) {
            return Ok(from.is_reference());
        }
        match (from.is_primitive(), to.is_primitive()) {
            (true, true) => Ok((is_numeric(from) && is_numeric(to)) || (from.is_boolean() && to.is_boolean())),
            (false, false) => {
                if let (Some(a), Some(b)) = (from.component(), to.component()) {
                    return if a.is_primitive() || b.is_primitive() {
                        Ok(a == b)
                    } else {
                        self.is_castable(&a, &b, location)
                    };
                }
                if self.is_subtype(from, to, location)? || self.is_subtype(to, from, location)? {
                    return Ok(true);
                }
                if from.is_array() || to.is_array() {
                    return Ok(false);
                }
                // Some subclass of a non-final class may implement the interface
                let a = self.resolved(from, location)?;
                let b = self.resolved(to, location)?;
                let final_class = |t: &ResolvedType| !t.is_interface() && t.access_flags & super::defs::access_flags::ACC_FINAL != 0;
                Ok((a.is_interface() && !final_class(&b)) || (b.is_interface() && !final_class(&a)))
            }
            _ => Ok(false),
        }
    }

    /// Static type of `expr`
    pub(super) fn attrib(&mut self, expr: &Expr) -> GenResult<Descriptor> {
        match expr {
            Expr::Literal(l) => Ok(literal_type(&l.value)),
            Expr::Identifier(_) | Expr::FieldAccess(_) => {
                let name = self.classify(expr)?;
                self.name_value(name, expr)
            }
            Expr::Binary(b) => {
                let lt = self.attrib(&b.left)?;
                let rt = self.attrib(&b.right)?;
                self.binary_type(b.operator, &lt, &rt, b.location)
            }
            Expr::Unary(u) => {
                let t = self.attrib(&u.operand)?;
                self.unary_type(u, &t)
            }
            Expr::Assignment(a) => {
                let t = self.attrib(&a.target)?;
                Ok(t)
            }
            Expr::MethodCall(call) => Ok(self.resolve_method_call(call)?.method.return_type),
            Expr::ArrayAccess(a) => {
                let array = self.attrib(&a.array)?;
                let index = self.attrib(&a.index)?;
                self.array_access_type(&array, &index, a.location)
            }
            Expr::Cast(c) => {
                let from = self.attrib(&c.expr)?;
                let to = self.resolve_type(&c.target_type, c.location)?;
                if !self.is_castable(&from, &to, c.location)? {
                    return self.error(
                        c.location,
                        format!("incompatible types: {} cannot be converted to {}", display(&from), display(&to)),
                    );
                }
                Ok(to)
            }
            Expr::InstanceOf(i) => {
                let from = self.attrib(&i.expr)?;
                let to = self.resolve_type(&i.target_type, i.location)?;
                if from.is_primitive() || to.is_primitive() {
                    return self.error(i.location, format!("unexpected type: {}", display(if from.is_primitive() { &from } else { &to })));
                }
                if !self.is_castable(&from, &to, i.location)? {
                    return self.error(
                        i.location,
                        format!("incompatible types: {} cannot be converted to {}", display(&from), display(&to)),
                    );
                }
                Ok(Descriptor::boolean())
            }
            Expr::Conditional(c) => {
                let condition = self.attrib(&c.condition)?;
                if !condition.is_boolean() {
                    return self.error(
                        c.condition.location(),
                        format!("incompatible types: {} cannot be converted to boolean", display(&condition)),
                    );
                }
                let a = self.attrib(&c.then_expr)?;
                let b = self.attrib(&c.else_expr)?;
                self.conditional_type(&a, &b, c.location)
            }
            Expr::New(n) => self.new_type(n),
            Expr::NewArray(n) => {
                let t = self.resolve_type(&n.array_type, n.location)?;
                if !t.is_array() {
                    return self.error(n.location, "array type expected");
                }
                Ok(t)
            }
            Expr::ArrayInitializer(a) => self.error(a.location, "illegal initializer: array initializer needs an array type"),
            Expr::This(location) => {
                if self.is_static {
                    return self.error(*location, "non-static variable this cannot be referenced from a static context");
                }
                Ok(self.this_type.clone())
            }
            Expr::Super(location) => {
                if self.is_static {
                    return self.error(*location, "non-static variable super cannot be referenced from a static context");
                }
                match self.super_type() {
                    Some(d) => Ok(d),
                    None => self.error(*location, "interfaces have no superclass"),
                }
            }
            Expr::Parenthesized(inner) => self.attrib(inner),
        }
    }

    fn name_value(&self, name: Name, expr: &Expr) -> GenResult<Descriptor> {
        match name.value_type() {
            Some(d) => Ok(d),
            None => {
                let shown = match expr {
                    Expr::Identifier(id) => id.name.clone(),
                    Expr::FieldAccess(fa) => fa.name.clone(),
                    _ => String::new(),
                };
                self.error(expr.location(), format!("cannot find symbol: variable {}", shown))
            }
        }
    }

    pub(super) fn new_type(&mut self, n: &NewExpr) -> GenResult<Descriptor> {
        let d = self.resolve_type(&n.target_type, n.location)?;
        if !d.is_class_reference() {
            return self.error(n.location, format!("unexpected type: {}", display(&d)));
        }
        let resolved = self.resolved(&d, n.location)?;
        if resolved.is_interface() || resolved.is_abstract() {
            return self.error(n.location, format!("{} is abstract; cannot be instantiated", resolved.name));
        }
        Ok(d)
    }

    pub(super) fn array_access_type(&self, array: &Descriptor, index: &Descriptor, location: Location) -> GenResult<Descriptor> {
        let Some(component) = array.component() else {
            return self.error(location, format!("array required, but {} found", display(array)));
        };
        if !is_integral(index) || index.as_str() == LONG {
            return self.error(location, format!("incompatible types: {} cannot be converted to int", display(index)));
        }
        Ok(component)
    }

    pub(super) fn unary_type(&mut self, u: &UnaryExpr, t: &Descriptor) -> GenResult<Descriptor> {
        let ok = match u.operator {
            UnaryOp::Plus | UnaryOp::Minus => is_numeric(t),
            UnaryOp::BitNot => is_integral(t),
            UnaryOp::Not => t.is_boolean(),
            _ => is_numeric(t),
        };
        if !ok {
            let symbol = match u.operator {
                UnaryOp::Plus => "+",
                UnaryOp::Minus => "-",
                UnaryOp::Not => "!",
                UnaryOp::BitNot => "~",
                UnaryOp::PreInc | UnaryOp::PostInc => "++",
                UnaryOp::PreDec | UnaryOp::PostDec => "--",
            };
            return self.error(u.location, format!("bad operand type {} for unary operator '{}'", display(t), symbol));
        }
        Ok(match u.operator {
            UnaryOp::Not => Descriptor::boolean(),
            UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot => unary_promotion(t),
            _ => t.clone(),
        })
    }

    pub(super) fn binary_type(
        &mut self,
        op: BinaryOp,
        lt: &Descriptor,
        rt: &Descriptor,
        location: Location,
    ) -> GenResult<Descriptor> {
        let both = |f: fn(&Descriptor) -> bool| f(lt) && f(rt);
        let result = match op {
            BinaryOp::Add if (is_string(lt) || is_string(rt)) && !lt.is_void() && !rt.is_void() => {
                Some(Descriptor::string())
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                both(is_numeric).then(|| binary_promotion(lt, rt))
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                if both(Descriptor::is_boolean) {
                    Some(Descriptor::boolean())
                } else {
                    both(is_integral).then(|| binary_promotion(lt, rt))
                }
            }
            BinaryOp::LShift | BinaryOp::RShift | BinaryOp::URShift => both(is_integral).then(|| unary_promotion(lt)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => both(is_numeric).then(Descriptor::boolean),
            BinaryOp::Eq | BinaryOp::Ne => {
                let ok = both(is_numeric)
                    || both(Descriptor::is_boolean)
                    || (both(Descriptor::is_reference) && self.is_castable(lt, rt, location)?);
                ok.then(Descriptor::boolean)
            }
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => both(Descriptor::is_boolean).then(Descriptor::boolean),
        };
        match result {
            Some(d) => Ok(d),
            None => self.error(
                location,
                format!(
                    "bad operand types for binary operator '{}': first type {}, second type {}",
                    op.symbol(),
                    display(lt),
                    display(rt)
                ),
            ),
        }
    }

    fn conditional_type(&mut self, a: &Descriptor, b: &Descriptor, location: Location) -> GenResult<Descriptor> {
        if a == b {
            return Ok(a.clone());
        }
        if is_numeric(a) && is_numeric(b) {
            return Ok(binary_promotion(a, b));
        }
        if is_null_type(a) && b.is_reference() {
            return Ok(b.clone());
        }
        if is_null_type(b) && a.is_reference() {
            return Ok(a.clone());
        }
        if a.is_reference() && b.is_reference() {
            if self.is_subtype(a, b, location)? {
                return Ok(b.clone());
            }
            if self.is_subtype(b, a, location)? {
                return Ok(a.clone());
            }
            return Ok(Descriptor::object());
        }
        self.error(
            location,
            format!("incompatible types in conditional expression: {} and {}", display(a), display(b)),
        )
    }

    /// Classify a name-like expression; anything else is a value
    pub(super) fn classify(&mut self, expr: &Expr) -> GenResult<Name> {
        match expr {
            Expr::Identifier(id) => self.classify_identifier(&id.name, id.location),
            Expr::FieldAccess(fa) => {
                let target = self.classify(&fa.target)?;
                self.classify_member(&target, &fa.name, fa.location)
            }
            other => Ok(Name::Value(self.attrib(other)?)),
        }
    }

    pub(super) fn classify_identifier(&mut self, name: &str, location: Location) -> GenResult<Name> {
        if let Some(local) = self.find_local(name) {
            return Ok(Name::Local(local.clone()));
        }
        let symbols = self.symbols;
        for (depth, class_name) in symbols.class(self.class_id).enclosing.iter().enumerate() {
            let owner = Descriptor::from_class_name(class_name).map_err(lookup_error(location))?;
            if let Some((declaring, field)) = self.resolver.find_field(&owner, name).map_err(lookup_error(location))? {
                if !field.is_static() && (depth > 0 || self.is_static) {
                    return self.error(
                        location,
                        format!("non-static variable {} cannot be referenced from a static context", name),
                    );
                }
                return Ok(Name::Field { owner: declaring.internal_name(), field });
            }
        }
        for owner in self.imports.static_member_owners(name, self.resolver) {
            let owner = Descriptor::from_class_name(&owner).map_err(lookup_error(location))?;
            if let Some((declaring, field)) = self.resolver.find_field(&owner, name).map_err(lookup_error(location))? {
                if field.is_static() {
                    return Ok(Name::Field { owner: declaring.internal_name(), field });
                }
            }
        }
        let enclosing = &symbols.class(self.class_id).enclosing;
        if let Some(binary) = self.imports.resolve_type_name(name, enclosing, self.resolver) {
            let d = Descriptor::from_class_name(&binary).map_err(lookup_error(location))?;
            return Ok(Name::Type(d));
        }
        Ok(Name::Package(name.to_string()))
    }

    pub(super) fn classify_member(&mut self, target: &Name, name: &str, location: Location) -> GenResult<Name> {
        match target {
            Name::Package(package) => {
                let qualified = format!("{}.{}", package, name);
                match self.imports.resolve_type_name(&qualified, &[], self.resolver) {
                    Some(binary) => {
                        let d = Descriptor::from_class_name(&binary).map_err(lookup_error(location))?;
                        Ok(Name::Type(d))
                    }
                    None => Ok(Name::Package(qualified)),
                }
            }
            Name::Type(owner) => {
                if let Some((declaring, field)) = self.resolver.find_field(owner, name).map_err(lookup_error(location))? {
                    if !field.is_static() {
                        return self.error(
                            location,
                            format!("non-static variable {} cannot be referenced from a static context", name),
                        );
                    }
                    return Ok(Name::Field { owner: declaring.internal_name(), field });
                }
                let member = format!("{}${}", owner.class_name(), name);
                if self.resolver.class_exists(&member) {
                    let d = Descriptor::from_class_name(&member).map_err(lookup_error(location))?;
                    return Ok(Name::Type(d));
                }
                self.error(location, format!("cannot find symbol: variable {} in {}", name, owner.class_name()))
            }
            value => {
                let Some(t) = value.value_type() else {
                    return self.error(location, format!("cannot find symbol: variable {}", name));
                };
                if t.is_primitive() || is_null_type(&t) {
                    return self.error(location, format!("{} cannot be dereferenced", display(&t)));
                }
                if t.is_array() && name == "length" {
                    return Ok(Name::ArrayLength);
                }
                match self.resolver.find_field(&t, name).map_err(lookup_error(location))? {
                    Some((declaring, field)) => Ok(Name::Field { owner: declaring.internal_name(), field }),
                    None => self.error(location, format!("cannot find symbol: variable {} in {}", name, display(&t))),
                }
            }
        }
    }

    /// Pick the most specific applicable method among `candidates`
    pub(super) fn select_method(
        &mut self,
        candidates: Vec<(Arc<ResolvedType>, MethodSignature)>,
        name: &str,
        arguments: &[Descriptor],
        location: Location,
    ) -> GenResult<(Arc<ResolvedType>, MethodSignature)> {
        let mut applicable = Vec::new();
        for (owner, method) in &candidates {
            if method.parameters.len() != arguments.len() {
                continue;
            }
            let mut ok = true;
            for (arg, param) in arguments.iter().zip(&method.parameters) {
                if !self.is_assignable(arg, param, None, location)? {
                    ok = false;
                    break;
                }
            }
            if ok {
                applicable.push((owner.clone(), method.clone()));
            }
        }
        let shown = if name == super::defs::CONSTRUCTOR_METHOD_NAME { "constructor" } else { name };
        if applicable.is_empty() {
            let message = if candidates.is_empty() {
                format!("cannot find symbol: method {}({})", shown, display_list(arguments))
            } else {
                format!("no suitable method found for {}({})", shown, display_list(arguments))
            };
            return self.error(location, message);
        }
        let mut best: Option<usize> = None;
        for i in 0..applicable.len() {
            let mut most_specific = true;
            for j in 0..applicable.len() {
                if i != j && !self.more_specific(&applicable[i].1, &applicable[j].1, location)? {
                    most_specific = false;
                    break;
                }
            }
            if most_specific {
                best = Some(i);
                break;
            }
        }
        match best {
            Some(i) => Ok(applicable.swap_remove(i)),
            None => self.error(location, format!("reference to {} is ambiguous", shown)),
        }
    }

    fn more_specific(&mut self, a: &MethodSignature, b: &MethodSignature, location: Location) -> GenResult<bool> {
        for (x, y) in a.parameters.iter().zip(&b.parameters) {
            if !self.is_assignable(x, y, None, location)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Constructor of `class` applicable to `arguments`
    pub(super) fn resolve_constructor(
        &mut self,
        class: &Descriptor,
        arguments: &[Descriptor],
        location: Location,
    ) -> GenResult<MethodSignature> {
        let resolved = self.resolved(class, location)?;
        let candidates = resolved
            .methods_named(super::defs::CONSTRUCTOR_METHOD_NAME)
            .map(|m| (resolved.clone(), m.clone()))
            .collect();
        Ok(self.select_method(candidates, super::defs::CONSTRUCTOR_METHOD_NAME, arguments, location)?.1)
    }

    pub(super) fn attrib_arguments(&mut self, arguments: &[Expr]) -> GenResult<Vec<Descriptor>> {
        let mut types = Vec::with_capacity(arguments.len());
        for arg in arguments {
            let t = self.attrib(arg)?;
            if t.is_void() {
                return self.error(arg.location(), "'void' type not allowed here");
            }
            types.push(t);
        }
        Ok(types)
    }

    pub(super) fn resolve_method_call(&mut self, call: &MethodCallExpr) -> GenResult<ResolvedCall> {
        let arguments = self.attrib_arguments(&call.arguments)?;
        let location = call.location;
        let Some(target) = &call.target else {
            return self.resolve_unqualified_call(&call.name, &arguments, location);
        };
        if let Expr::Super(super_location) = target.as_ref() {
            let super_type = self.attrib(target)?;
            let candidates = self.resolver.find_methods(&super_type, &call.name).map_err(lookup_error(location))?;
            let (declaring, method) = self.select_method(candidates, &call.name, &arguments, location)?;
            if method.is_abstract() {
                return self.error(
                    *super_location,
                    format!("abstract method {}({}) in {} cannot be accessed directly", call.name, display_list(&method.parameters), declaring.name),
                );
            }
            if method.is_static() {
                return Ok(ResolvedCall { owner: declaring.internal_name(), method, opcode: INVOKESTATIC, receiver: Receiver::None });
            }
            let owner = super_type.internal_name().unwrap_or_else(|| declaring.internal_name());
            return Ok(ResolvedCall { owner, method, opcode: INVOKESPECIAL, receiver: Receiver::This });
        }
        match self.classify(target)? {
            Name::Type(owner) => {
                let candidates = self.resolver.find_methods(&owner, &call.name).map_err(lookup_error(location))?;
                let (declaring, method) = self.select_method(candidates, &call.name, &arguments, location)?;
                if !method.is_static() {
                    return self.error(
                        location,
                        format!(
                            "non-static method {}({}) cannot be referenced from a static context",
                            call.name,
                            display_list(&method.parameters)
                        ),
                    );
                }
                Ok(ResolvedCall { owner: declaring.internal_name(), method, opcode: INVOKESTATIC, receiver: Receiver::None })
            }
            Name::Package(package) => {
                if package.contains('.') {
                    self.error(target.location(), format!("package {} does not exist", package))
                } else {
                    self.error(target.location(), format!("cannot find symbol: variable {}", package))
                }
            }
            value => {
                let t = value.value_type().unwrap_or_else(Descriptor::object);
                if t.is_primitive() || is_null_type(&t) {
                    return self.error(target.location(), format!("{} cannot be dereferenced", display(&t)));
                }
                let candidates = self.resolver.find_methods(&t, &call.name).map_err(lookup_error(location))?;
                let (declaring, method) = self.select_method(candidates, &call.name, &arguments, location)?;
                if method.is_static() {
                    return Ok(ResolvedCall {
                        owner: declaring.internal_name(),
                        method,
                        opcode: INVOKESTATIC,
                        receiver: Receiver::TargetDiscarded,
                    });
                }
                let receiver_type = self.resolved(&t, location)?;
                let (owner, opcode) = if t.is_array() {
                    (declaring.internal_name(), INVOKEVIRTUAL)
                } else if receiver_type.is_interface() {
                    (receiver_type.internal_name(), INVOKEINTERFACE)
                } else {
                    (receiver_type.internal_name(), INVOKEVIRTUAL)
                };
                Ok(ResolvedCall { owner, method, opcode, receiver: Receiver::Target })
            }
        }
    }

    fn resolve_unqualified_call(&mut self, name: &str, arguments: &[Descriptor], location: Location) -> GenResult<ResolvedCall> {
        let symbols = self.symbols;
        for (depth, class_name) in symbols.class(self.class_id).enclosing.iter().enumerate() {
            let owner = Descriptor::from_class_name(class_name).map_err(lookup_error(location))?;
            let candidates = self.resolver.find_methods(&owner, name).map_err(lookup_error(location))?;
            if candidates.is_empty() {
                continue;
            }
            let (declaring, method) = self.select_method(candidates, name, arguments, location)?;
            if method.is_static() {
                return Ok(ResolvedCall { owner: declaring.internal_name(), method, opcode: INVOKESTATIC, receiver: Receiver::None });
            }
            if depth > 0 || self.is_static {
                return self.error(
                    location,
                    format!(
                        "non-static method {}({}) cannot be referenced from a static context",
                        name,
                        display_list(&method.parameters)
                    ),
                );
            }
            let this_class = self.resolved(&owner, location)?;
            let opcode = if method.access_flags & super::defs::access_flags::ACC_PRIVATE != 0 {
                INVOKESPECIAL
            } else if this_class.is_interface() {
                INVOKEINTERFACE
            } else {
                INVOKEVIRTUAL
            };
            return Ok(ResolvedCall { owner: this_class.internal_name(), method, opcode, receiver: Receiver::This });
        }
        let mut candidates = Vec::new();
        for owner in self.imports.static_member_owners(name, self.resolver) {
            let owner = Descriptor::from_class_name(&owner).map_err(lookup_error(location))?;
            let found = self.resolver.find_methods(&owner, name).map_err(lookup_error(location))?;
            candidates.extend(found.into_iter().filter(|(_, m)| m.is_static()));
        }
        let (declaring, method) = self.select_method(candidates, name, arguments, location)?;
        Ok(ResolvedCall { owner: declaring.internal_name(), method, opcode: INVOKESTATIC, receiver: Receiver::None })
    }
}

pub(super) fn literal_type(literal: &Literal) -> Descriptor {
    match literal {
        Literal::Int(_) => Descriptor::int(),
        Literal::Long(_) => Descriptor::long(),
        Literal::Float(_) => Descriptor::known(FLOAT),
        Literal::Double(_) => Descriptor::double(),
        Literal::Boolean(_) => Descriptor::boolean(),
        Literal::Char(_) => Descriptor::known(CHAR),
        Literal::String(_) => Descriptor::string(),
        Literal::Null => null_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_promotion() {
        let byte = Descriptor::known(BYTE);
        let float = Descriptor::known(FLOAT);
        assert_eq!(unary_promotion(&byte), Descriptor::int());
        assert_eq!(binary_promotion(&byte, &Descriptor::long()), Descriptor::long());
        assert_eq!(binary_promotion(&float, &Descriptor::long()), float);
        assert_eq!(binary_promotion(&Descriptor::int(), &Descriptor::double()), Descriptor::double());
    }

    #[test]
    fn test_widening() {
        let char_ = Descriptor::known(CHAR);
        let short = Descriptor::known(SHORT);
        assert!(is_widening(&char_, &Descriptor::int()));
        assert!(!is_widening(&char_, &short));
        assert!(!is_widening(&short, &char_));
        assert!(is_widening(&Descriptor::long(), &Descriptor::known(FLOAT)));
        assert!(!is_widening(&Descriptor::double(), &Descriptor::long()));
    }

    #[test]
    fn test_int_constants() {
        let expr = crate::parser::parse_expression("-(3 + 4) * 2").unwrap();
        assert_eq!(int_constant(&expr), Some(-14));
        let expr = crate::parser::parse_expression("'a' + 1").unwrap();
        assert_eq!(int_constant(&expr), Some(98));
        let expr = crate::parser::parse_expression("x + 1").unwrap();
        assert_eq!(int_constant(&expr), None);
        assert!(constant_fits(127, &Descriptor::known(BYTE)));
        assert!(!constant_fits(128, &Descriptor::known(BYTE)));
        assert!(constant_fits(65535, &Descriptor::known(CHAR)));
    }
}
