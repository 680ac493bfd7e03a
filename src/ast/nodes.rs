use crate::descriptor::Descriptor;
use crate::parser::Location;

/// Index of a class or interface declaration in [`CompilationUnit::classes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

/// Index of a method or constructor declaration in [`CompilationUnit::methods`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub usize);

/// Index of a field declaration in [`CompilationUnit::fields`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub usize);

/// Root of the tree: imports plus arenas of declarations
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    pub file_name: Option<String>,
    pub imports: Vec<ImportDecl>,
    pub classes: Vec<ClassDecl>,
    pub methods: Vec<MethodDecl>,
    pub fields: Vec<FieldDecl>,
    /// Top-level classes in declaration order
    pub type_decls: Vec<ClassId>,
}

impl CompilationUnit {
    pub fn new(file_name: Option<String>) -> Self {
        Self { file_name, ..Default::default() }
    }

    pub fn add_import(&mut self, import: ImportDecl) {
        self.imports.push(import);
    }

    /// Add a class; member classes are linked into their outer class
    pub fn add_class(&mut self, decl: ClassDecl) -> ClassId {
        let id = ClassId(self.classes.len());
        match decl.outer {
            Some(outer) => self.classes[outer.0].member_types.push(id),
            None => self.type_decls.push(id),
        }
        self.classes.push(decl);
        id
    }

    /// Add a method or constructor to its declaring class
    pub fn add_method(&mut self, decl: MethodDecl) -> MethodId {
        let id = MethodId(self.methods.len());
        let class = &mut self.classes[decl.declaring_class.0];
        match decl.kind {
            MethodKind::Method => class.methods.push(id),
            MethodKind::Constructor => class.constructors.push(id),
        }
        self.methods.push(decl);
        id
    }

    pub fn add_field(&mut self, decl: FieldDecl) -> FieldId {
        let id = FieldId(self.fields.len());
        self.classes[decl.declaring_class.0].fields.push(id);
        self.fields.push(decl);
        id
    }

    pub fn class(&self, id: ClassId) -> &ClassDecl {
        &self.classes[id.0]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassDecl {
        &mut self.classes[id.0]
    }

    pub fn method(&self, id: MethodId) -> &MethodDecl {
        &self.methods[id.0]
    }

    pub fn field(&self, id: FieldId) -> &FieldDecl {
        &self.fields[id.0]
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(ClassId)
    }

    /// Dotted binary name: `SC`, `SC$Inner`
    pub fn binary_name(&self, id: ClassId) -> String {
        let class = self.class(id);
        match class.outer {
            Some(outer) => format!("{}${}", self.binary_name(outer), class.name),
            None => class.name.clone(),
        }
    }

    /// Find a class by its binary name
    pub fn find_class(&self, binary_name: &str) -> Option<ClassId> {
        self.class_ids().find(|id| self.binary_name(*id) == binary_name)
    }
}

#[derive(Debug, Clone)]
pub enum ImportDecl {
    /// `import a.b.C;`
    SingleType { name: String, location: Location },
    /// `import a.b.*;`
    OnDemand { package: String, location: Location },
    /// `import static a.b.C.m;`
    StaticSingle { type_name: String, member: String, location: Location },
    /// `import static a.b.C.*;`
    StaticOnDemand { type_name: String, location: Location },
}

impl ImportDecl {
    pub fn location(&self) -> Location {
        match self {
            ImportDecl::SingleType { location, .. }
            | ImportDecl::OnDemand { location, .. }
            | ImportDecl::StaticSingle { location, .. }
            | ImportDecl::StaticOnDemand { location, .. } => *location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Abstract,
    Static,
    Final,
    Native,
    Synchronized,
    Transient,
    Volatile,
    Strictfp,
}

/// Modifier list with lookup helpers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers(pub Vec<Modifier>);

impl Modifiers {
    pub fn new(modifiers: &[Modifier]) -> Self {
        Self(modifiers.to_vec())
    }

    pub fn has(&self, modifier: Modifier) -> bool {
        self.0.contains(&modifier)
    }

    pub fn add(&mut self, modifier: Modifier) {
        if !self.has(modifier) {
            self.0.push(modifier);
        }
    }

    pub fn is_static(&self) -> bool {
        self.has(Modifier::Static)
    }

    pub fn is_abstract(&self) -> bool {
        self.has(Modifier::Abstract)
    }
}

/// A type as it appears in a declaration
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// Written in source: `int`, `String`, `java.util.Map`, with array dimensions
    Named { name: String, array_dims: usize, location: Location },
    /// Already known by descriptor (synthesized declarations)
    Resolved(Descriptor),
    /// Return type left to the code generator: the static type of the returned expression
    Inferred,
}

impl TypeRef {
    pub fn named(name: impl Into<String>, array_dims: usize, location: Location) -> Self {
        TypeRef::Named { name: name.into(), array_dims, location }
    }

    pub fn with_extra_dims(self, extra: usize) -> Self {
        if extra == 0 {
            return self;
        }
        match self {
            TypeRef::Named { name, array_dims, location } => {
                TypeRef::Named { name, array_dims: array_dims + extra, location }
            }
            TypeRef::Resolved(d) => {
                let mut d = d;
                for _ in 0..extra {
                    d = d.array_of();
                }
                TypeRef::Resolved(d)
            }
            TypeRef::Inferred => TypeRef::Inferred,
        }
    }

    pub fn is_void(&self) -> bool {
        match self {
            TypeRef::Named { name, array_dims, .. } => name == "void" && *array_dims == 0,
            TypeRef::Resolved(d) => d.is_void(),
            TypeRef::Inferred => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub modifiers: Modifiers,
    pub name: String,
    pub is_interface: bool,
    pub extends: Option<TypeRef>,
    /// `implements` of a class, `extends` of an interface
    pub implements: Vec<TypeRef>,
    pub outer: Option<ClassId>,
    pub methods: Vec<MethodId>,
    pub constructors: Vec<MethodId>,
    pub fields: Vec<FieldId>,
    pub member_types: Vec<ClassId>,
    pub initializers: Vec<Initializer>,
    /// Field initializers and initializer blocks in textual order
    pub init_order: Vec<InitItem>,
    pub location: Location,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            modifiers: Modifiers::default(),
            name: name.into(),
            is_interface: false,
            extends: None,
            implements: Vec::new(),
            outer: None,
            methods: Vec::new(),
            constructors: Vec::new(),
            fields: Vec::new(),
            member_types: Vec::new(),
            initializers: Vec::new(),
            init_order: Vec::new(),
            location,
        }
    }
}

/// One entry of a class's initialization sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitItem {
    Field(FieldId),
    Block(usize),
}

#[derive(Debug, Clone)]
pub struct Initializer {
    pub is_static: bool,
    pub body: Block,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub declaring_class: ClassId,
    pub kind: MethodKind,
    pub modifiers: Modifiers,
    pub return_type: TypeRef,
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub throws: Vec<TypeRef>,
    /// Leading `this(...)` or `super(...)` of a constructor
    pub explicit_invocation: Option<ExplicitConstructorInvocation>,
    /// `None` for abstract and interface methods
    pub body: Option<Block>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub modifiers: Modifiers,
    pub type_ref: TypeRef,
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ExplicitConstructorInvocation {
    pub is_super: bool,
    pub arguments: Vec<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub declaring_class: ClassId,
    pub modifiers: Modifiers,
    pub type_ref: TypeRef,
    pub name: String,
    pub initializer: Option<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(ExprStmt),
    Declaration(VarDeclStmt),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),
    Return(ReturnStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Throw(ThrowStmt),
    Block(Block),
    Empty(Location),
}

impl Stmt {
    pub fn location(&self) -> Location {
        match self {
            Stmt::Expression(s) => s.location,
            Stmt::Declaration(s) => s.location,
            Stmt::If(s) => s.location,
            Stmt::While(s) => s.location,
            Stmt::DoWhile(s) => s.location,
            Stmt::For(s) => s.location,
            Stmt::Return(s) => s.location,
            Stmt::Break(s) => s.location,
            Stmt::Continue(s) => s.location,
            Stmt::Throw(s) => s.location,
            Stmt::Block(b) => b.location,
            Stmt::Empty(location) => *location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExprStmt {
    pub expr: Expr,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct VarDeclStmt {
    pub modifiers: Modifiers,
    pub type_ref: TypeRef,
    pub variables: Vec<VariableDeclarator>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub name: String,
    /// Dimensions written after the name: `int a[]`
    pub array_dims: usize,
    pub initializer: Option<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct DoWhileStmt {
    pub body: Box<Stmt>,
    pub condition: Expr,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub init: Vec<Stmt>,
    pub condition: Option<Expr>,
    pub update: Vec<Expr>,
    pub body: Box<Stmt>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct BreakStmt {
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ContinueStmt {
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ThrowStmt {
    pub expr: Expr,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(LiteralExpr),
    Identifier(IdentifierExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Assignment(AssignmentExpr),
    MethodCall(MethodCallExpr),
    FieldAccess(FieldAccessExpr),
    ArrayAccess(ArrayAccessExpr),
    Cast(CastExpr),
    InstanceOf(InstanceOfExpr),
    Conditional(ConditionalExpr),
    New(NewExpr),
    NewArray(NewArrayExpr),
    /// `{ a, b }` in a variable initializer
    ArrayInitializer(ArrayInitializerExpr),
    This(Location),
    Super(Location),
    Parenthesized(Box<Expr>),
}

impl Expr {
    pub fn location(&self) -> Location {
        match self {
            Expr::Literal(e) => e.location,
            Expr::Identifier(e) => e.location,
            Expr::Binary(e) => e.location,
            Expr::Unary(e) => e.location,
            Expr::Assignment(e) => e.location,
            Expr::MethodCall(e) => e.location,
            Expr::FieldAccess(e) => e.location,
            Expr::ArrayAccess(e) => e.location,
            Expr::Cast(e) => e.location,
            Expr::InstanceOf(e) => e.location,
            Expr::Conditional(e) => e.location,
            Expr::New(e) => e.location,
            Expr::NewArray(e) => e.location,
            Expr::ArrayInitializer(e) => e.location,
            Expr::This(location) | Expr::Super(location) => *location,
            Expr::Parenthesized(inner) => inner.location(),
        }
    }

    /// Strip redundant parentheses
    pub fn unparenthesized(&self) -> &Expr {
        match self {
            Expr::Parenthesized(inner) => inner.unparenthesized(),
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiteralExpr {
    pub value: Literal,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(u16),
    String(String),
    Null,
}

#[derive(Debug, Clone)]
pub struct IdentifierExpr {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub operator: BinaryOp,
    pub right: Box<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add, Sub, Mul, Div, Mod,
    Lt, Le, Gt, Ge, Eq, Ne,
    /// `&`, `|`, `^`
    And, Or, Xor,
    LShift, RShift, URShift,
    /// `&&`, `||`
    LogicalAnd, LogicalOr,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::URShift => ">>>",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::LShift | BinaryOp::RShift | BinaryOp::URShift)
    }
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub operator: UnaryOp,
    pub operand: Box<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus, Minus, Not, BitNot, PreInc, PreDec, PostInc, PostDec,
}

impl UnaryOp {
    pub fn is_increment(&self) -> bool {
        matches!(self, UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec)
    }
}

#[derive(Debug, Clone, PartialEq, Copy)]
pub enum AssignmentOp {
    Assign, AddAssign, SubAssign, MulAssign, DivAssign, ModAssign,
    AndAssign, OrAssign, XorAssign, LShiftAssign, RShiftAssign, URShiftAssign,
}

impl AssignmentOp {
    /// The binary operator applied by a compound assignment
    pub fn binary_op(&self) -> Option<BinaryOp> {
        match self {
            AssignmentOp::Assign => None,
            AssignmentOp::AddAssign => Some(BinaryOp::Add),
            AssignmentOp::SubAssign => Some(BinaryOp::Sub),
            AssignmentOp::MulAssign => Some(BinaryOp::Mul),
            AssignmentOp::DivAssign => Some(BinaryOp::Div),
            AssignmentOp::ModAssign => Some(BinaryOp::Mod),
            AssignmentOp::AndAssign => Some(BinaryOp::And),
            AssignmentOp::OrAssign => Some(BinaryOp::Or),
            AssignmentOp::XorAssign => Some(BinaryOp::Xor),
            AssignmentOp::LShiftAssign => Some(BinaryOp::LShift),
            AssignmentOp::RShiftAssign => Some(BinaryOp::RShift),
            AssignmentOp::URShiftAssign => Some(BinaryOp::URShift),
        }
    }

    pub fn symbol(&self) -> String {
        match self.binary_op() {
            None => "=".to_string(),
            Some(op) => format!("{}=", op.symbol()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentExpr {
    pub target: Box<Expr>,
    pub operator: AssignmentOp,
    pub value: Box<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct MethodCallExpr {
    /// `None` for an unqualified call
    pub target: Option<Box<Expr>>,
    pub name: String,
    pub arguments: Vec<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct FieldAccessExpr {
    pub target: Box<Expr>,
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ArrayAccessExpr {
    pub array: Box<Expr>,
    pub index: Box<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct CastExpr {
    pub target_type: TypeRef,
    pub expr: Box<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct InstanceOfExpr {
    pub expr: Box<Expr>,
    pub target_type: TypeRef,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ConditionalExpr {
    pub condition: Box<Expr>,
    pub then_expr: Box<Expr>,
    pub else_expr: Box<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct NewExpr {
    pub target_type: TypeRef,
    pub arguments: Vec<Expr>,
    pub location: Location,
}

/// `new int[n]`, `new String[] { ... }`
#[derive(Debug, Clone)]
pub struct NewArrayExpr {
    /// Full array type, e.g. `int[]` for `new int[n]`
    pub array_type: TypeRef,
    pub dimension: Option<Box<Expr>>,
    pub initializer: Option<ArrayInitializerExpr>,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ArrayInitializerExpr {
    pub elements: Vec<Expr>,
    pub location: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(class: ClassId, name: &str, kind: MethodKind) -> MethodDecl {
        MethodDecl {
            declaring_class: class,
            kind,
            modifiers: Modifiers::default(),
            return_type: TypeRef::Resolved(Descriptor::void()),
            name: name.to_string(),
            parameters: Vec::new(),
            throws: Vec::new(),
            explicit_invocation: None,
            body: None,
            location: Location::start(),
        }
    }

    #[test]
    fn test_arena_links_members() {
        let mut unit = CompilationUnit::new(None);
        let outer = unit.add_class(ClassDecl::new("SC", Location::start()));
        let mut inner = ClassDecl::new("Inner", Location::start());
        inner.outer = Some(outer);
        let inner = unit.add_class(inner);
        let m = unit.add_method(method(inner, "run", MethodKind::Method));
        let c = unit.add_method(method(outer, "<init>", MethodKind::Constructor));

        assert_eq!(unit.type_decls, vec![outer]);
        assert_eq!(unit.class(outer).member_types, vec![inner]);
        assert_eq!(unit.class(inner).methods, vec![m]);
        assert_eq!(unit.class(outer).constructors, vec![c]);
        assert_eq!(unit.method(m).declaring_class, inner);
        assert_eq!(unit.binary_name(inner), "SC$Inner");
        assert_eq!(unit.find_class("SC$Inner"), Some(inner));
    }

    #[test]
    fn test_type_ref_extra_dims() {
        let t = TypeRef::named("int", 1, Location::start()).with_extra_dims(1);
        assert!(matches!(t, TypeRef::Named { array_dims: 2, .. }));
        let t = TypeRef::Resolved(Descriptor::int()).with_extra_dims(2);
        assert_eq!(t, TypeRef::Resolved(Descriptor::new("[[I").unwrap()));
    }
}
