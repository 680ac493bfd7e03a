//! Conditional jumps
//!
//! Boolean expressions in branch position are compiled straight to jumps
//! instead of a pushed 0/1: short-circuit operators become jump chains,
//! comparisons fuse with the branch that consumes them.

use super::attr::{binary_promotion, is_null_type};
use super::code::{Label, SlotKind};
use super::enter::display;
use super::gen::{Gen, GenResult};
use super::opcodes::*;
use crate::ast::*;

/// `IF_ICMPxx` and `IFxx` forms of a comparison operator
fn comparison_opcodes(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Eq => (IF_ICMPEQ, IFEQ),
        BinaryOp::Ne => (IF_ICMPNE, IFNE),
        BinaryOp::Lt => (IF_ICMPLT, IFLT),
        BinaryOp::Ge => (IF_ICMPGE, IFGE),
        BinaryOp::Gt => (IF_ICMPGT, IFGT),
        _ => (IF_ICMPLE, IFLE),
    }
}

fn is_null_literal(expr: &Expr) -> bool {
    matches!(expr.unparenthesized(), Expr::Literal(LiteralExpr { value: Literal::Null, .. }))
}

impl Gen<'_> {
    /// Jump to `label` when `expr` evaluates to `jump_if`, fall through otherwise
    pub(super) fn gen_cond(&mut self, expr: &Expr, jump_if: bool, label: Label) -> GenResult<()> {
        match expr {
            Expr::Parenthesized(inner) => self.gen_cond(inner, jump_if, label),
            Expr::Literal(LiteralExpr { value: Literal::Boolean(value), .. }) => {
                if *value == jump_if {
                    self.code.branch(GOTO, label, 0);
                }
                Ok(())
            }
            Expr::Unary(u) if u.operator == UnaryOp::Not => {
                let t = self.attrib(&u.operand)?;
                self.unary_type(u, &t)?;
                self.gen_cond(&u.operand, !jump_if, label)
            }
            Expr::Binary(b) if matches!(b.operator, BinaryOp::LogicalAnd | BinaryOp::LogicalOr) => {
                self.attrib(expr)?;
                let is_and = b.operator == BinaryOp::LogicalAnd;
                if is_and == jump_if {
                    // The left operand alone can only decide against the jump
                    let skip = self.code.new_label();
                    self.gen_cond(&b.left, !jump_if, skip)?;
                    self.gen_cond(&b.right, jump_if, label)?;
                    self.code.place_label(skip);
                } else {
                    self.gen_cond(&b.left, jump_if, label)?;
                    self.gen_cond(&b.right, jump_if, label)?;
                }
                Ok(())
            }
            Expr::Binary(b) if b.operator.is_comparison() => self.gen_comparison(b, jump_if, label),
            Expr::Conditional(c) => {
                let t = self.attrib(expr)?;
                if !t.is_boolean() {
                    return self.error(
                        c.location,
                        format!("incompatible types: {} cannot be converted to boolean", display(&t)),
                    );
                }
                let else_label = self.code.new_label();
                let end = self.code.new_label();
                self.gen_cond(&c.condition, false, else_label)?;
                self.gen_cond(&c.then_expr, jump_if, label)?;
                if self.code.is_alive() {
                    self.code.branch(GOTO, end, 0);
                }
                self.code.place_label(else_label);
                self.gen_cond(&c.else_expr, jump_if, label)?;
                self.code.place_label(end);
                Ok(())
            }
            other => {
                let t = self.attrib(other)?;
                if !t.is_boolean() {
                    return self.error(
                        other.location(),
                        format!("incompatible types: {} cannot be converted to boolean", display(&t)),
                    );
                }
                self.gen_expr(other)?;
                self.code.branch(if jump_if { IFNE } else { IFEQ }, label, -1);
                Ok(())
            }
        }
    }

    fn gen_comparison(&mut self, b: &BinaryExpr, jump_if: bool, label: Label) -> GenResult<()> {
        let lt = self.attrib(&b.left)?;
        let rt = self.attrib(&b.right)?;
        self.binary_type(b.operator, &lt, &rt, b.location)?;
        let (icmp, zero) = comparison_opcodes(b.operator);
        let finish = |op: u8| if jump_if { op } else { negate_branch(op) };

        if lt.is_reference() || is_null_type(&lt) {
            let null_op = if b.operator == BinaryOp::Eq { IFNULL } else { IFNONNULL };
            if is_null_literal(&b.right) {
                self.gen_expr(&b.left)?;
                self.code.branch(finish(null_op), label, -1);
            } else if is_null_literal(&b.left) {
                self.gen_expr(&b.right)?;
                self.code.branch(finish(null_op), label, -1);
            } else {
                self.gen_expr(&b.left)?;
                self.gen_expr(&b.right)?;
                let op = if b.operator == BinaryOp::Eq { IF_ACMPEQ } else { IF_ACMPNE };
                self.code.branch(finish(op), label, -2);
            }
            return Ok(());
        }

        if lt.is_boolean() {
            self.gen_expr(&b.left)?;
            self.gen_expr(&b.right)?;
            self.code.branch(finish(icmp), label, -2);
            return Ok(());
        }

        let t = binary_promotion(&lt, &rt);
        let left = self.gen_expr(&b.left)?;
        self.coerce(&left, &t);
        let right = self.gen_expr(&b.right)?;
        self.coerce(&right, &t);
        // NaN compares false except for `!=`
        let less = matches!(b.operator, BinaryOp::Lt | BinaryOp::Le);
        match SlotKind::of(&t) {
            SlotKind::Long => self.code.emit_op(LCMP, -3),
            SlotKind::Float => self.code.emit_op(if less { FCMPG } else { FCMPL }, -1),
            SlotKind::Double => self.code.emit_op(if less { DCMPG } else { DCMPL }, -3),
            _ => {
                self.code.branch(finish(icmp), label, -2);
                return Ok(());
            }
        }
        self.code.branch(finish(zero), label, -1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_opcodes_negate_consistently() {
        for op in [BinaryOp::Eq, BinaryOp::Ne, BinaryOp::Lt, BinaryOp::Le, BinaryOp::Gt, BinaryOp::Ge] {
            let (icmp, zero) = comparison_opcodes(op);
            assert_eq!(icmp - IF_ICMPEQ, zero - IFEQ);
            assert_ne!(negate_branch(icmp), icmp);
        }
    }
}
