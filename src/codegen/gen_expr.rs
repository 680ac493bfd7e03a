//! Expression code generation
//!
//! Every `gen_*` method leaves the value of its expression on the operand
//! stack and returns its static type. Typing questions go to `attr` first,
//! so a method only emits code once the expression is known to be valid.

use super::attr::{binary_promotion, int_constant, is_integral, is_null_type, is_string, literal_type, Name, Receiver};
use super::code::SlotKind;
use super::defs::access_flags::ACC_FINAL;
use super::defs::array_types;
use super::enter::display;
use super::gen::{codegen_error, Gen, GenResult, Local};
use super::opcodes::*;
use crate::ast::*;
use crate::common::type_resolver::{FieldSignature, MethodSignature};
use crate::descriptor::{Descriptor, BYTE, CHAR, LONG, SHORT};

/// An assignable place, before anything is evaluated
#[derive(Debug, Clone)]
pub(super) enum LValue<'e> {
    Local(Local),
    Static { owner: String, field: FieldSignature },
    /// `target` is `None` for an implicit `this`
    Field { owner: String, field: FieldSignature, target: Option<&'e Expr> },
    Array { array: &'e Expr, index: &'e Expr, component: Descriptor },
}

impl LValue<'_> {
    fn value_type(&self) -> Descriptor {
        match self {
            LValue::Local(local) => local.descriptor.clone(),
            LValue::Static { field, .. } | LValue::Field { field, .. } => field.descriptor.clone(),
            LValue::Array { component, .. } => component.clone(),
        }
    }
}

/// `xALOAD`/`xASTORE` for an element type, given the `int` variant
fn array_opcode(int_op: u8, component: &Descriptor) -> u8 {
    match component.as_str() {
        BYTE | "Z" => int_op + 5,
        CHAR => int_op + 6,
        SHORT => int_op + 7,
        _ => int_op + SlotKind::of(component).offset(),
    }
}

fn arithmetic_opcode(op: BinaryOp) -> Option<u8> {
    Some(match op {
        BinaryOp::Add => IADD,
        BinaryOp::Sub => ISUB,
        BinaryOp::Mul => IMUL,
        BinaryOp::Div => IDIV,
        BinaryOp::Mod => IREM,
        BinaryOp::LShift => ISHL,
        BinaryOp::RShift => ISHR,
        BinaryOp::URShift => IUSHR,
        BinaryOp::And => IAND,
        BinaryOp::Or => IOR,
        BinaryOp::Xor => IXOR,
        _ => return None,
    })
}

impl<'a> Gen<'a> {
    pub(super) fn gen_expr(&mut self, expr: &Expr) -> GenResult<Descriptor> {
        match expr {
            Expr::Literal(l) => self.gen_literal(&l.value),
            Expr::Identifier(_) | Expr::FieldAccess(_) => self.gen_name(expr),
            Expr::Binary(b) => self.gen_binary(expr, b),
            Expr::Unary(u) => self.gen_unary(expr, u),
            Expr::Assignment(a) => self.gen_assignment(a, true),
            Expr::MethodCall(call) => self.gen_method_call(call),
            Expr::ArrayAccess(a) => {
                let array = self.attrib(&a.array)?;
                let index = self.attrib(&a.index)?;
                let component = self.array_access_type(&array, &index, a.location)?;
                self.gen_expr(&a.array)?;
                let index = self.gen_expr(&a.index)?;
                self.coerce(&index, &Descriptor::int());
                self.code.emit_op(array_opcode(IALOAD, &component), component.size() as i32 - 2);
                Ok(component)
            }
            Expr::Cast(c) => self.gen_cast(c),
            Expr::InstanceOf(i) => {
                self.attrib(expr)?;
                let to = self.resolve_type(&i.target_type, i.location)?;
                self.gen_expr(&i.expr)?;
                let index = self.class_index(&to)?;
                self.code.emit_op_u16(INSTANCEOF, index, 0);
                Ok(Descriptor::boolean())
            }
            Expr::Conditional(c) => {
                let t = self.attrib(expr)?;
                let else_label = self.code.new_label();
                let end = self.code.new_label();
                self.gen_cond(&c.condition, false, else_label)?;
                let then_type = self.gen_expr(&c.then_expr)?;
                self.coerce(&then_type, &t);
                self.code.branch(GOTO, end, 0);
                self.code.place_label(else_label);
                let else_type = self.gen_expr(&c.else_expr)?;
                self.coerce(&else_type, &t);
                self.code.place_label(end);
                Ok(t)
            }
            Expr::New(n) => self.gen_new(n),
            Expr::NewArray(n) => self.gen_new_array(n),
            Expr::ArrayInitializer(_) => self.attrib(expr),
            Expr::This(_) | Expr::Super(_) => {
                let t = self.attrib(expr)?;
                self.code.emit_op(ALOAD_0, 1);
                Ok(t)
            }
            Expr::Parenthesized(inner) => self.gen_expr(inner),
        }
    }

    fn gen_literal(&mut self, literal: &Literal) -> GenResult<Descriptor> {
        let location = self.location;
        match literal {
            Literal::Int(v) => self.gen_int(*v)?,
            Literal::Char(c) => self.gen_int(*c as i32)?,
            Literal::Boolean(b) => self.code.emit_op(if *b { ICONST_1 } else { ICONST_0 }, 1),
            Literal::Long(v) => match v {
                0 => self.code.emit_op(LCONST_0, 2),
                1 => self.code.emit_op(LCONST_1, 2),
                _ => {
                    let index = self.pool.add_long(*v).map_err(codegen_error(location))?;
                    self.code.emit_op_u16(LDC2_W, index, 2);
                }
            },
            Literal::Float(v) => {
                if v.to_bits() == 0.0f32.to_bits() || *v == 1.0 || *v == 2.0 {
                    self.code.emit_op(FCONST_0 + *v as u8, 1);
                } else {
                    let index = self.pool.add_float(*v).map_err(codegen_error(location))?;
                    self.code.emit_ldc(index);
                }
            }
            Literal::Double(v) => {
                if v.to_bits() == 0.0f64.to_bits() || *v == 1.0 {
                    self.code.emit_op(DCONST_0 + *v as u8, 2);
                } else {
                    let index = self.pool.add_double(*v).map_err(codegen_error(location))?;
                    self.code.emit_op_u16(LDC2_W, index, 2);
                }
            }
            Literal::String(s) => {
                let index = self.pool.add_string(s).map_err(codegen_error(location))?;
                self.code.emit_ldc(index);
            }
            Literal::Null => self.code.emit_op(ACONST_NULL, 1),
        }
        Ok(literal_type(literal))
    }

    pub(super) fn gen_int(&mut self, value: i32) -> GenResult<()> {
        let location = self.location;
        let pool = &mut self.pool;
        self.code.emit_int(value, |v| pool.add_integer(v)).map_err(codegen_error(location))
    }

    /// Class constant for `CHECKCAST`, `INSTANCEOF` and `ANEWARRAY`
    fn class_index(&mut self, d: &Descriptor) -> GenResult<u16> {
        let name = d.internal_name().unwrap_or_else(|| d.as_str().to_string());
        self.add_class(&name)
    }

    fn gen_name(&mut self, expr: &Expr) -> GenResult<Descriptor> {
        match expr {
            Expr::Identifier(id) => match self.classify_identifier(&id.name, id.location)? {
                Name::Local(local) => {
                    self.code.emit_load(local.slot, SlotKind::of(&local.descriptor));
                    Ok(local.descriptor)
                }
                Name::Field { owner, field } => {
                    if field.is_static() {
                        self.emit_field(GETSTATIC, &owner, &field)?;
                    } else {
                        self.code.emit_op(ALOAD_0, 1);
                        self.emit_field(GETFIELD, &owner, &field)?;
                    }
                    Ok(field.descriptor)
                }
                _ => self.error(id.location, format!("cannot find symbol: variable {}", id.name)),
            },
            Expr::FieldAccess(fa) => {
                let target = self.classify(&fa.target)?;
                let through_value = !matches!(target, Name::Type(_) | Name::Package(_));
                match self.classify_member(&target, &fa.name, fa.location)? {
                    Name::ArrayLength => {
                        self.gen_expr(&fa.target)?;
                        self.code.emit_op(ARRAYLENGTH, 0);
                        Ok(Descriptor::int())
                    }
                    Name::Field { owner, field } if field.is_static() => {
                        if through_value {
                            let t = self.gen_expr(&fa.target)?;
                            self.pop_value(&t);
                        }
                        self.emit_field(GETSTATIC, &owner, &field)?;
                        Ok(field.descriptor)
                    }
                    Name::Field { owner, field } => {
                        self.gen_expr(&fa.target)?;
                        self.emit_field(GETFIELD, &owner, &field)?;
                        Ok(field.descriptor)
                    }
                    _ => self.error(fa.location, format!("cannot find symbol: variable {}", fa.name)),
                }
            }
            other => self.gen_expr(other),
        }
    }

    fn emit_field(&mut self, op: u8, owner: &str, field: &FieldSignature) -> GenResult<()> {
        let index = self.add_field_ref(owner, &field.name, field.descriptor.as_str())?;
        let size = field.descriptor.size() as i32;
        let delta = match op {
            GETSTATIC => size,
            PUTSTATIC => -size,
            GETFIELD => size - 1,
            _ => -size - 1,
        };
        self.code.emit_op_u16(op, index, delta);
        Ok(())
    }

    fn gen_binary(&mut self, expr: &Expr, b: &BinaryExpr) -> GenResult<Descriptor> {
        let lt = self.attrib(&b.left)?;
        let rt = self.attrib(&b.right)?;
        let t = self.binary_type(b.operator, &lt, &rt, b.location)?;
        if t.is_boolean() && !matches!(b.operator, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor) {
            return self.gen_materialized(expr);
        }
        if is_string(&t) && b.operator == BinaryOp::Add {
            return self.gen_concat(b);
        }
        if t.as_str() == "I" {
            if let Some(v) = int_constant(expr) {
                self.gen_int(v)?;
                return Ok(t);
            }
        }
        let left = self.gen_expr(&b.left)?;
        self.coerce(&left, &t);
        let right = self.gen_expr(&b.right)?;
        // Shift distances are always int
        let right_type = if b.operator.is_shift() { Descriptor::int() } else { t.clone() };
        self.coerce(&right, &right_type);
        self.emit_binary_op(b.operator, &t);
        Ok(t)
    }

    /// Arithmetic, bitwise or shift instruction on operands of type `t`
    fn emit_binary_op(&mut self, op: BinaryOp, t: &Descriptor) {
        let Some(base) = arithmetic_opcode(op) else {
            return;
        };
        let kind = SlotKind::of(t);
        let delta = if op.is_shift() { -1 } else { -(kind.width() as i32) };
        self.code.emit_op(base + kind.offset(), delta);
    }

    /// Push 1 for a true condition and 0 otherwise
    fn gen_materialized(&mut self, expr: &Expr) -> GenResult<Descriptor> {
        let false_label = self.code.new_label();
        let end = self.code.new_label();
        self.gen_cond(expr, false, false_label)?;
        self.code.emit_op(ICONST_1, 1);
        self.code.branch(GOTO, end, 0);
        self.code.place_label(false_label);
        self.code.emit_op(ICONST_0, 1);
        self.code.place_label(end);
        Ok(Descriptor::boolean())
    }

    fn gen_concat(&mut self, b: &BinaryExpr) -> GenResult<Descriptor> {
        let left = self.gen_expr(&b.left)?;
        self.gen_string_of(&left)?;
        let right = self.gen_expr(&b.right)?;
        self.gen_string_of(&right)?;
        self.emit_string_concat()?;
        Ok(Descriptor::string())
    }

    /// Replace the value on the stack by its string form
    fn gen_string_of(&mut self, t: &Descriptor) -> GenResult<()> {
        let parameter = match t.as_str() {
            BYTE | SHORT | "I" => "I",
            CHAR => "C",
            "Z" => "Z",
            LONG => "J",
            "F" => "F",
            "D" => "D",
            _ => "Ljava/lang/Object;",
        };
        let descriptor = format!("({})Ljava/lang/String;", parameter);
        let index = self.add_method_ref("java/lang/String", "valueOf", &descriptor, false)?;
        self.code.emit_op_u16(INVOKESTATIC, index, 1 - t.size() as i32);
        Ok(())
    }

    fn emit_string_concat(&mut self) -> GenResult<()> {
        let index = self.add_method_ref("java/lang/String", "concat", "(Ljava/lang/String;)Ljava/lang/String;", false)?;
        self.code.emit_op_u16(INVOKEVIRTUAL, index, -1);
        Ok(())
    }

    fn gen_unary(&mut self, expr: &Expr, u: &UnaryExpr) -> GenResult<Descriptor> {
        let operand = self.attrib(&u.operand)?;
        let t = self.unary_type(u, &operand)?;
        match u.operator {
            UnaryOp::Not => self.gen_materialized(expr),
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => self.gen_increment(u, true),
            UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot => {
                if t.as_str() == "I" {
                    if let Some(v) = int_constant(expr) {
                        self.gen_int(v)?;
                        return Ok(t);
                    }
                }
                let operand = self.gen_expr(&u.operand)?;
                self.coerce(&operand, &t);
                let kind = SlotKind::of(&t);
                match u.operator {
                    UnaryOp::Minus => self.code.emit_op(INEG + kind.offset(), 0),
                    UnaryOp::BitNot if kind == SlotKind::Long => {
                        let location = self.location;
                        let index = self.pool.add_long(-1).map_err(codegen_error(location))?;
                        self.code.emit_op_u16(LDC2_W, index, 2);
                        self.code.emit_op(LXOR, -2);
                    }
                    UnaryOp::BitNot => {
                        self.code.emit_op(ICONST_M1, 1);
                        self.code.emit_op(IXOR, -1);
                    }
                    _ => {}
                }
                Ok(t)
            }
        }
    }

    /// Primitive conversion of the value on the stack; references are left alone
    pub(super) fn coerce(&mut self, from: &Descriptor, to: &Descriptor) {
        if from == to || !from.is_primitive() || !to.is_primitive() || from.is_boolean() || to.is_boolean() {
            return;
        }
        let (from_kind, to_kind) = (SlotKind::of(from), SlotKind::of(to));
        if from_kind != to_kind {
            use SlotKind::*;
            let op = match (from_kind, to_kind) {
                (Int, Long) => I2L,
                (Int, Float) => I2F,
                (Int, Double) => I2D,
                (Long, Int) => L2I,
                (Long, Float) => L2F,
                (Long, Double) => L2D,
                (Float, Int) => F2I,
                (Float, Long) => F2L,
                (Float, Double) => F2D,
                (Double, Int) => D2I,
                (Double, Long) => D2L,
                (Double, Float) => D2F,
                _ => return,
            };
            self.code.emit_op(op, to_kind.width() as i32 - from_kind.width() as i32);
        }
        let narrow = match to.as_str() {
            BYTE if from.as_str() != BYTE => Some(I2B),
            CHAR if from.as_str() != CHAR => Some(I2C),
            SHORT if !matches!(from.as_str(), SHORT | BYTE) => Some(I2S),
            _ => None,
        };
        if let Some(op) = narrow {
            self.code.emit_op(op, 0);
        }
    }

    fn gen_cast(&mut self, c: &CastExpr) -> GenResult<Descriptor> {
        let from = self.attrib(&c.expr)?;
        let to = self.resolve_type(&c.target_type, c.location)?;
        if !self.is_castable(&from, &to, c.location)? {
            return self.error(
                c.location,
                format!("incompatible types: {} cannot be converted to {}", display(&from), display(&to)),
            );
        }
        self.gen_expr(&c.expr)?;
        if to.is_primitive() {
            self.coerce(&from, &to);
        } else if !is_null_type(&from) && !self.is_subtype(&from, &to, c.location)? {
            let index = self.class_index(&to)?;
            self.code.emit_op_u16(CHECKCAST, index, 0);
        }
        Ok(to)
    }

    pub(super) fn gen_method_call(&mut self, call: &MethodCallExpr) -> GenResult<Descriptor> {
        let resolved = self.resolve_method_call(call)?;
        match (resolved.receiver, &call.target) {
            (Receiver::This, _) => self.code.emit_op(ALOAD_0, 1),
            (Receiver::Target, Some(target)) => {
                self.gen_expr(target)?;
            }
            (Receiver::TargetDiscarded, Some(target)) => {
                let t = self.gen_expr(target)?;
                self.pop_value(&t);
            }
            _ => {}
        }
        self.gen_arguments(&call.arguments, &resolved.method.parameters)?;
        self.emit_invoke(resolved.opcode, &resolved.owner, &resolved.method)?;
        Ok(resolved.method.return_type)
    }

    pub(super) fn gen_arguments(&mut self, arguments: &[Expr], parameters: &[Descriptor]) -> GenResult<()> {
        for (argument, parameter) in arguments.iter().zip(parameters) {
            let t = self.gen_expr(argument)?;
            self.coerce(&t, parameter);
        }
        Ok(())
    }

    pub(super) fn emit_invoke(&mut self, opcode: u8, owner: &str, method: &MethodSignature) -> GenResult<()> {
        let interface = opcode == INVOKEINTERFACE;
        let index = self.add_method_ref(owner, &method.name, &method.descriptor(), interface)?;
        let arguments: i32 = method.parameters.iter().map(|p| p.size() as i32).sum();
        let receiver = if opcode == INVOKESTATIC { 0 } else { 1 };
        self.code.emit_op_u16(opcode, index, method.return_type.size() as i32 - arguments - receiver);
        if interface {
            self.code.emit_u8((arguments + 1) as u8);
            self.code.emit_u8(0);
        }
        Ok(())
    }

    pub(super) fn gen_new(&mut self, n: &NewExpr) -> GenResult<Descriptor> {
        let d = self.new_type(n)?;
        let argument_types = self.attrib_arguments(&n.arguments)?;
        let constructor = self.resolve_constructor(&d, &argument_types, n.location)?;
        let internal = d.internal_name().unwrap_or_default();
        let index = self.add_class(&internal)?;
        self.code.emit_op_u16(NEW, index, 1);
        self.code.emit_op(DUP, 1);
        self.gen_arguments(&n.arguments, &constructor.parameters)?;
        self.emit_invoke(INVOKESPECIAL, &internal, &constructor)?;
        Ok(d)
    }

    fn gen_new_array(&mut self, n: &NewArrayExpr) -> GenResult<Descriptor> {
        let t = self.resolve_type(&n.array_type, n.location)?;
        if !t.is_array() {
            return self.error(n.location, "array type expected");
        }
        match (&n.dimension, &n.initializer) {
            (Some(dimension), None) => {
                let dt = self.attrib(dimension)?;
                if !is_integral(&dt) || dt.as_str() == LONG {
                    return self.error(
                        dimension.location(),
                        format!("incompatible types: {} cannot be converted to int", display(&dt)),
                    );
                }
                let dt = self.gen_expr(dimension)?;
                self.coerce(&dt, &Descriptor::int());
                self.emit_new_array(&t)?;
            }
            (None, Some(initializer)) => self.gen_array_initializer(initializer, &t)?,
            (Some(_), Some(initializer)) => {
                return self.error(initializer.location, "array creation with both dimension expression and initialization is illegal");
            }
            (None, None) => return self.error(n.location, "array dimension missing"),
        }
        Ok(t)
    }

    /// `NEWARRAY` or `ANEWARRAY` for the length on the stack
    fn emit_new_array(&mut self, array: &Descriptor) -> GenResult<()> {
        let Some(component) = array.component() else {
            return self.error(self.location, format!("array required, but {} found", display(array)));
        };
        match array_types::for_descriptor(component.as_str()) {
            Some(code) => self.code.emit_op_u8(NEWARRAY, code, 0),
            None => {
                let index = self.class_index(&component)?;
                self.code.emit_op_u16(ANEWARRAY, index, 0);
            }
        }
        Ok(())
    }

    pub(super) fn gen_array_initializer(&mut self, init: &ArrayInitializerExpr, array: &Descriptor) -> GenResult<()> {
        let Some(component) = array.component() else {
            return self.error(init.location, format!("illegal initializer for {}", display(array)));
        };
        let length = i32::try_from(init.elements.len()).unwrap_or(i32::MAX);
        self.gen_int(length)?;
        self.emit_new_array(array)?;
        let store = array_opcode(IASTORE, &component);
        for (index, element) in init.elements.iter().enumerate() {
            self.location = element.location();
            self.code.emit_op(DUP, 1);
            self.gen_int(index as i32)?;
            self.gen_initializer(element, &component)?;
            self.code.emit_op(store, -2 - component.size() as i32);
        }
        Ok(())
    }

    // Assignment

    fn lvalue<'e>(&mut self, target: &'e Expr) -> GenResult<LValue<'e>> {
        match target {
            Expr::Parenthesized(inner) => self.lvalue(inner),
            Expr::Identifier(id) => match self.classify_identifier(&id.name, id.location)? {
                Name::Local(local) => Ok(LValue::Local(local)),
                Name::Field { owner, field } if field.is_static() => Ok(LValue::Static { owner, field }),
                Name::Field { owner, field } => Ok(LValue::Field { owner, field, target: None }),
                _ => self.error(id.location, format!("cannot find symbol: variable {}", id.name)),
            },
            Expr::FieldAccess(fa) => {
                let name = self.classify(&fa.target)?;
                match self.classify_member(&name, &fa.name, fa.location)? {
                    Name::ArrayLength => {
                        self.error(fa.location, "cannot assign a value to final variable length")
                    }
                    Name::Field { owner, field } if field.is_static() => Ok(LValue::Static { owner, field }),
                    Name::Field { owner, field } => Ok(LValue::Field { owner, field, target: Some(&fa.target) }),
                    _ => self.error(fa.location, format!("cannot find symbol: variable {}", fa.name)),
                }
            }
            Expr::ArrayAccess(a) => {
                let array = self.attrib(&a.array)?;
                let index = self.attrib(&a.index)?;
                let component = self.array_access_type(&array, &index, a.location)?;
                Ok(LValue::Array { array: &a.array, index: &a.index, component })
            }
            other => self.error(other.location(), "unexpected type: required variable, found value"),
        }
    }

    fn check_final(&self, lvalue: &LValue<'_>, location: crate::parser::Location) -> GenResult<()> {
        let (name, allowed) = match lvalue {
            LValue::Local(local) => (&local.name, !local.is_final),
            LValue::Static { owner, field } | LValue::Field { owner, field, .. } => {
                let is_final = field.access_flags & ACC_FINAL != 0;
                let own = *owner == self.this_internal_name()
                    && self.in_initializer
                    && field.is_static() == self.is_static
                    && matches!(lvalue, LValue::Static { .. } | LValue::Field { target: None | Some(Expr::This(_)), .. });
                (&field.name, !is_final || own)
            }
            LValue::Array { .. } => return Ok(()),
        };
        if allowed {
            Ok(())
        } else {
            self.error(location, format!("cannot assign a value to final variable {}", name))
        }
    }

    /// Push what the store needs below the value; returns the slot count
    fn load_receiver(&mut self, lvalue: &LValue<'_>) -> GenResult<u8> {
        match lvalue {
            LValue::Local(_) | LValue::Static { .. } => Ok(0),
            LValue::Field { target: None, .. } => {
                self.code.emit_op(ALOAD_0, 1);
                Ok(1)
            }
            LValue::Field { target: Some(target), .. } => {
                self.gen_expr(target)?;
                Ok(1)
            }
            LValue::Array { array, index, .. } => {
                self.gen_expr(array)?;
                let t = self.gen_expr(index)?;
                self.coerce(&t, &Descriptor::int());
                Ok(2)
            }
        }
    }

    fn dup_receiver(&mut self, slots: u8) {
        match slots {
            1 => self.code.emit_op(DUP, 1),
            2 => self.code.emit_op(DUP2, 2),
            _ => {}
        }
    }

    /// Copy the value on top below the receiver slots
    fn dup_under(&mut self, value_size: u8, receiver_slots: u8) {
        let op = match (value_size, receiver_slots) {
            (2, 0) => DUP2,
            (2, 1) => DUP2_X1,
            (2, _) => DUP2_X2,
            (_, 0) => DUP,
            (_, 1) => DUP_X1,
            _ => DUP_X2,
        };
        self.code.emit_op(op, value_size as i32);
    }

    /// Read the current value, consuming the receiver slots
    fn load_through(&mut self, lvalue: &LValue<'_>) -> GenResult<()> {
        match lvalue {
            LValue::Local(local) => self.code.emit_load(local.slot, SlotKind::of(&local.descriptor)),
            LValue::Static { owner, field } => self.emit_field(GETSTATIC, owner, field)?,
            LValue::Field { owner, field, .. } => self.emit_field(GETFIELD, owner, field)?,
            LValue::Array { component, .. } => {
                self.code.emit_op(array_opcode(IALOAD, component), component.size() as i32 - 2)
            }
        }
        Ok(())
    }

    fn store_through(&mut self, lvalue: &LValue<'_>) -> GenResult<()> {
        match lvalue {
            LValue::Local(local) => self.code.emit_store(local.slot, SlotKind::of(&local.descriptor)),
            LValue::Static { owner, field } => self.emit_field(PUTSTATIC, owner, field)?,
            LValue::Field { owner, field, .. } => self.emit_field(PUTFIELD, owner, field)?,
            LValue::Array { component, .. } => {
                self.code.emit_op(array_opcode(IASTORE, component), -2 - component.size() as i32)
            }
        }
        Ok(())
    }

    /// `want_value` leaves the assigned value on the stack
    pub(super) fn gen_assignment(&mut self, a: &AssignmentExpr, want_value: bool) -> GenResult<Descriptor> {
        let lvalue = self.lvalue(&a.target)?;
        let lt = lvalue.value_type();
        self.check_final(&lvalue, a.location)?;
        let vt = self.attrib(&a.value)?;
        let Some(op) = a.operator.binary_op() else {
            self.check_assignable(&vt, &lt, int_constant(&a.value), a.value.location())?;
            let slots = self.load_receiver(&lvalue)?;
            let vt = self.gen_expr(&a.value)?;
            self.coerce(&vt, &lt);
            if want_value {
                self.dup_under(lt.size(), slots);
            }
            self.store_through(&lvalue)?;
            return Ok(lt);
        };

        let result = self.binary_type(op, &lt, &vt, a.location)?;
        if is_string(&result) && !is_string(&lt) {
            return self.error(
                a.location,
                format!("incompatible types: java.lang.String cannot be converted to {}", display(&lt)),
            );
        }
        if result.is_boolean() != lt.is_boolean() {
            return self.error(
                a.location,
                format!("incompatible types: {} cannot be converted to {}", display(&result), display(&lt)),
            );
        }
        let slots = self.load_receiver(&lvalue)?;
        self.dup_receiver(slots);
        self.load_through(&lvalue)?;
        if is_string(&result) {
            self.gen_string_of(&lt)?;
            let vt = self.gen_expr(&a.value)?;
            self.gen_string_of(&vt)?;
            self.emit_string_concat()?;
        } else {
            self.coerce(&lt, &result);
            let vt = self.gen_expr(&a.value)?;
            let right = if op.is_shift() { Descriptor::int() } else { result.clone() };
            self.coerce(&vt, &right);
            self.emit_binary_op(op, &result);
            self.coerce(&result, &lt);
        }
        if want_value {
            self.dup_under(lt.size(), slots);
        }
        self.store_through(&lvalue)?;
        Ok(lt)
    }

    /// `++`/`--` in prefix or postfix form
    pub(super) fn gen_increment(&mut self, u: &UnaryExpr, want_value: bool) -> GenResult<Descriptor> {
        let lvalue = self.lvalue(&u.operand)?;
        let t = lvalue.value_type();
        self.unary_type(u, &t)?;
        self.check_final(&lvalue, u.location)?;
        let increment = matches!(u.operator, UnaryOp::PreInc | UnaryOp::PostInc);
        let prefix = matches!(u.operator, UnaryOp::PreInc | UnaryOp::PreDec);

        if let LValue::Local(local) = &lvalue {
            if t.as_str() == "I" {
                let kind = SlotKind::Int;
                if want_value && !prefix {
                    self.code.emit_load(local.slot, kind);
                }
                self.code.emit_iinc(local.slot, if increment { 1 } else { -1 });
                if want_value && prefix {
                    self.code.emit_load(local.slot, kind);
                }
                return Ok(t);
            }
        }

        let slots = self.load_receiver(&lvalue)?;
        self.dup_receiver(slots);
        self.load_through(&lvalue)?;
        if want_value && !prefix {
            self.dup_under(t.size(), slots);
        }
        let operand_type = binary_promotion(&t, &Descriptor::int());
        self.coerce(&t, &operand_type);
        let kind = SlotKind::of(&operand_type);
        let one = match kind {
            SlotKind::Long => LCONST_1,
            SlotKind::Float => FCONST_1,
            SlotKind::Double => DCONST_1,
            _ => ICONST_1,
        };
        self.code.emit_op(one, kind.width() as i32);
        let op = if increment { BinaryOp::Add } else { BinaryOp::Sub };
        self.emit_binary_op(op, &operand_type);
        self.coerce(&operand_type, &t);
        if want_value && prefix {
            self.dup_under(t.size(), slots);
        }
        self.store_through(&lvalue)?;
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_opcodes_follow_element_type() {
        assert_eq!(array_opcode(IALOAD, &Descriptor::int()), IALOAD);
        assert_eq!(array_opcode(IALOAD, &Descriptor::long()), LALOAD);
        assert_eq!(array_opcode(IALOAD, &Descriptor::boolean()), BALOAD);
        assert_eq!(array_opcode(IASTORE, &Descriptor::new("C").unwrap()), CASTORE);
        assert_eq!(array_opcode(IASTORE, &Descriptor::new("S").unwrap()), SASTORE);
        assert_eq!(array_opcode(IASTORE, &Descriptor::string()), AASTORE);
        assert_eq!(array_opcode(IALOAD, &Descriptor::double()), DALOAD);
    }

    #[test]
    fn test_arithmetic_opcodes() {
        assert_eq!(arithmetic_opcode(BinaryOp::Mod), Some(IREM));
        assert_eq!(arithmetic_opcode(BinaryOp::URShift), Some(IUSHR));
        assert_eq!(arithmetic_opcode(BinaryOp::Lt), None);
    }
}
