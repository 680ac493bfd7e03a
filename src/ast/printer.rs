use super::nodes::*;

/// Renders a compilation unit back to Java-like source, for trace logging
pub struct AstPrinter {
    indent_level: usize,
    output: String,
}

impl Default for AstPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl AstPrinter {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            output: String::new(),
        }
    }

    pub fn print(&mut self, unit: &CompilationUnit) -> String {
        self.output.clear();
        for import in &unit.imports {
            self.print_import(import);
        }
        if !unit.imports.is_empty() {
            self.output.push('\n');
        }
        for class in &unit.type_decls {
            self.print_class(unit, *class);
        }
        std::mem::take(&mut self.output)
    }

    fn indent(&mut self) {
        self.indent_level += 4;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(4);
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.output.push(' ');
        }
    }

    fn writeln(&mut self, s: &str) {
        self.write_indent();
        self.output.push_str(s);
        self.output.push('\n');
    }

    fn print_import(&mut self, import: &ImportDecl) {
        let line = match import {
            ImportDecl::SingleType { name, .. } => format!("import {};", name),
            ImportDecl::OnDemand { package, .. } => format!("import {}.*;", package),
            ImportDecl::StaticSingle { type_name, member, .. } => {
                format!("import static {}.{};", type_name, member)
            }
            ImportDecl::StaticOnDemand { type_name, .. } => format!("import static {}.*;", type_name),
        };
        self.writeln(&line);
    }

    fn print_class(&mut self, unit: &CompilationUnit, id: ClassId) {
        let class = unit.class(id);
        let mut header = modifiers_prefix(&class.modifiers);
        header.push_str(if class.is_interface { "interface " } else { "class " });
        header.push_str(&class.name);
        if let Some(extends) = &class.extends {
            header.push_str(&format!(" extends {}", type_text(extends)));
        }
        if !class.implements.is_empty() {
            let keyword = if class.is_interface { "extends" } else { "implements" };
            let list: Vec<String> = class.implements.iter().map(type_text).collect();
            header.push_str(&format!(" {} {}", keyword, list.join(", ")));
        }
        header.push_str(" {");
        self.writeln(&header);
        self.indent();

        for item in &class.init_order {
            match item {
                InitItem::Field(field) => self.print_field(unit.field(*field)),
                InitItem::Block(index) => {
                    let init = &class.initializers[*index];
                    self.write_indent();
                    if init.is_static {
                        self.output.push_str("static ");
                    }
                    self.print_block_inline(&init.body);
                    self.output.push('\n');
                }
            }
        }
        for ctor in &class.constructors {
            self.print_method(unit.method(*ctor), &class.name);
        }
        for method in &class.methods {
            self.print_method(unit.method(*method), &class.name);
        }
        for member in &class.member_types {
            self.print_class(unit, *member);
        }

        self.dedent();
        self.writeln("}");
    }

    fn print_field(&mut self, field: &FieldDecl) {
        let mut line = modifiers_prefix(&field.modifiers);
        line.push_str(&format!("{} {}", type_text(&field.type_ref), field.name));
        if let Some(init) = &field.initializer {
            line.push_str(&format!(" = {}", expr_text(init)));
        }
        line.push(';');
        self.writeln(&line);
    }

    fn print_method(&mut self, method: &MethodDecl, class_name: &str) {
        self.write_indent();
        self.output.push_str(&modifiers_prefix(&method.modifiers));
        match method.kind {
            MethodKind::Constructor => self.output.push_str(class_name),
            MethodKind::Method => {
                self.output.push_str(&format!("{} {}", type_text(&method.return_type), method.name));
            }
        }
        let params: Vec<String> = method
            .parameters
            .iter()
            .map(|p| format!("{}{} {}", modifiers_prefix(&p.modifiers), type_text(&p.type_ref), p.name))
            .collect();
        self.output.push_str(&format!("({})", params.join(", ")));
        if !method.throws.is_empty() {
            let list: Vec<String> = method.throws.iter().map(type_text).collect();
            self.output.push_str(&format!(" throws {}", list.join(", ")));
        }
        match &method.body {
            None => self.output.push_str(";\n"),
            Some(body) => {
                self.output.push(' ');
                if let Some(explicit) = &method.explicit_invocation {
                    self.output.push_str("{\n");
                    self.indent();
                    let keyword = if explicit.is_super { "super" } else { "this" };
                    let line = format!("{}({});", keyword, args_text(&explicit.arguments));
                    self.writeln(&line);
                    for stmt in &body.statements {
                        self.print_stmt(stmt);
                    }
                    self.dedent();
                    self.write_indent();
                    self.output.push('}');
                } else {
                    self.print_block_inline(body);
                }
                self.output.push('\n');
            }
        }
    }

    /// Print a block starting at the current column
    fn print_block_inline(&mut self, block: &Block) {
        self.output.push_str("{\n");
        self.indent();
        for stmt in &block.statements {
            self.print_stmt(stmt);
        }
        self.dedent();
        self.write_indent();
        self.output.push('}');
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                self.write_indent();
                self.print_block_inline(block);
                self.output.push('\n');
            }
            Stmt::If(s) => {
                self.writeln(&format!("if ({})", expr_text(&s.condition)));
                self.print_nested(&s.then_branch);
                if let Some(else_branch) = &s.else_branch {
                    self.writeln("else");
                    self.print_nested(else_branch);
                }
            }
            Stmt::While(s) => {
                self.writeln(&format!("while ({})", expr_text(&s.condition)));
                self.print_nested(&s.body);
            }
            Stmt::DoWhile(s) => {
                self.writeln("do");
                self.print_nested(&s.body);
                self.writeln(&format!("while ({});", expr_text(&s.condition)));
            }
            Stmt::For(s) => {
                let init: Vec<String> = s
                    .init
                    .iter()
                    .map(|i| simple_stmt_text(i).trim_end_matches(';').to_string())
                    .collect();
                let update: Vec<String> = s.update.iter().map(expr_text).collect();
                let condition = s.condition.as_ref().map(expr_text).unwrap_or_default();
                self.writeln(&format!("for ({}; {}; {})", init.join(", "), condition, update.join(", ")));
                self.print_nested(&s.body);
            }
            other => {
                let line = simple_stmt_text(other);
                self.writeln(&line);
            }
        }
    }

    fn print_nested(&mut self, stmt: &Stmt) {
        if matches!(stmt, Stmt::Block(_)) {
            self.print_stmt(stmt);
        } else {
            self.indent();
            self.print_stmt(stmt);
            self.dedent();
        }
    }
}

/// Render a whole unit; shorthand for `AstPrinter::new().print(unit)`
pub fn unparse(unit: &CompilationUnit) -> String {
    AstPrinter::new().print(unit)
}

fn modifiers_prefix(modifiers: &Modifiers) -> String {
    let mut out = String::new();
    for modifier in &modifiers.0 {
        let word = match modifier {
            Modifier::Public => "public",
            Modifier::Protected => "protected",
            Modifier::Private => "private",
            Modifier::Abstract => "abstract",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Native => "native",
            Modifier::Synchronized => "synchronized",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Strictfp => "strictfp",
        };
        out.push_str(word);
        out.push(' ');
    }
    out
}

pub fn type_text(type_ref: &TypeRef) -> String {
    match type_ref {
        TypeRef::Named { name, array_dims, .. } => format!("{}{}", name, "[]".repeat(*array_dims)),
        TypeRef::Resolved(d) => d.to_string(),
        TypeRef::Inferred => "var".to_string(),
    }
}

fn simple_stmt_text(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Expression(s) => format!("{};", expr_text(&s.expr)),
        Stmt::Declaration(d) => {
            let vars: Vec<String> = d
                .variables
                .iter()
                .map(|v| {
                    let mut text = format!("{}{}", v.name, "[]".repeat(v.array_dims));
                    if let Some(init) = &v.initializer {
                        text.push_str(&format!(" = {}", expr_text(init)));
                    }
                    text
                })
                .collect();
            format!("{}{} {};", modifiers_prefix(&d.modifiers), type_text(&d.type_ref), vars.join(", "))
        }
        Stmt::Return(r) => match &r.value {
            Some(v) => format!("return {};", expr_text(v)),
            None => "return;".to_string(),
        },
        Stmt::Break(_) => "break;".to_string(),
        Stmt::Continue(_) => "continue;".to_string(),
        Stmt::Throw(t) => format!("throw {};", expr_text(&t.expr)),
        Stmt::Empty(_) => ";".to_string(),
        Stmt::Block(_) | Stmt::If(_) | Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) => {
            "{ ... }".to_string()
        }
    }
}

fn args_text(args: &[Expr]) -> String {
    args.iter().map(expr_text).collect::<Vec<_>>().join(", ")
}

pub fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Int(v) => v.to_string(),
        Literal::Long(v) => format!("{}L", v),
        Literal::Float(v) => format!("{:?}F", v),
        Literal::Double(v) => format!("{:?}D", v),
        Literal::Boolean(v) => v.to_string(),
        Literal::Char(c) => match char::from_u32(*c as u32) {
            Some(ch) => format!("{:?}", ch),
            None => format!("'\\u{:04x}'", c),
        },
        Literal::String(s) => format!("{:?}", s),
        Literal::Null => "null".to_string(),
    }
}

/// Fully parenthesized rendering of an expression
pub fn expr_text(expr: &Expr) -> String {
    match expr {
        Expr::Literal(l) => literal_text(&l.value),
        Expr::Identifier(i) => i.name.clone(),
        Expr::Binary(b) => format!("({} {} {})", expr_text(&b.left), b.operator.symbol(), expr_text(&b.right)),
        Expr::Unary(u) => match u.operator {
            UnaryOp::Plus => format!("+{}", expr_text(&u.operand)),
            UnaryOp::Minus => format!("-{}", expr_text(&u.operand)),
            UnaryOp::Not => format!("!{}", expr_text(&u.operand)),
            UnaryOp::BitNot => format!("~{}", expr_text(&u.operand)),
            UnaryOp::PreInc => format!("++{}", expr_text(&u.operand)),
            UnaryOp::PreDec => format!("--{}", expr_text(&u.operand)),
            UnaryOp::PostInc => format!("{}++", expr_text(&u.operand)),
            UnaryOp::PostDec => format!("{}--", expr_text(&u.operand)),
        },
        Expr::Assignment(a) => format!("{} {} {}", expr_text(&a.target), a.operator.symbol(), expr_text(&a.value)),
        Expr::MethodCall(m) => match &m.target {
            Some(target) => format!("{}.{}({})", expr_text(target), m.name, args_text(&m.arguments)),
            None => format!("{}({})", m.name, args_text(&m.arguments)),
        },
        Expr::FieldAccess(f) => format!("{}.{}", expr_text(&f.target), f.name),
        Expr::ArrayAccess(a) => format!("{}[{}]", expr_text(&a.array), expr_text(&a.index)),
        Expr::Cast(c) => format!("(({}) {})", type_text(&c.target_type), expr_text(&c.expr)),
        Expr::InstanceOf(i) => format!("({} instanceof {})", expr_text(&i.expr), type_text(&i.target_type)),
        Expr::Conditional(c) => format!(
            "({} ? {} : {})",
            expr_text(&c.condition),
            expr_text(&c.then_expr),
            expr_text(&c.else_expr)
        ),
        Expr::New(n) => format!("new {}({})", type_text(&n.target_type), args_text(&n.arguments)),
        Expr::NewArray(n) => {
            let element = match &n.array_type {
                TypeRef::Named { name, array_dims, .. } => (name.clone(), *array_dims),
                other => (type_text(other), 0),
            };
            match (&n.dimension, &n.initializer) {
                (Some(dim), _) => format!(
                    "new {}[{}]{}",
                    element.0,
                    expr_text(dim),
                    "[]".repeat(element.1.saturating_sub(1))
                ),
                (None, Some(init)) => format!(
                    "new {}{} {{ {} }}",
                    element.0,
                    "[]".repeat(element.1),
                    args_text(&init.elements)
                ),
                (None, None) => format!("new {}{}", element.0, "[]".repeat(element.1)),
            }
        }
        Expr::ArrayInitializer(init) => format!("{{ {} }}", args_text(&init.elements)),
        Expr::This(_) => "this".to_string(),
        Expr::Super(_) => "super".to_string(),
        Expr::Parenthesized(inner) => expr_text(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    #[test]
    fn test_expr_text_parenthesizes() {
        let expr = parse_expression("a + b * c.d(1, \"x\")").unwrap();
        assert_eq!(expr_text(&expr), "(a + (b * c.d(1, \"x\")))");
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(literal_text(&Literal::Long(3)), "3L");
        assert_eq!(literal_text(&Literal::Char('a' as u16)), "'a'");
        assert_eq!(literal_text(&Literal::Double(7.95)), "7.95D");
    }
}
