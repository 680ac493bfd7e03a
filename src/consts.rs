// Defaults for synthesized declarations

/// Name given to the class wrapped around a fragment
pub const DEFAULT_CLASS_NAME: &str = "SC";
/// Name given to the method wrapped around an expression or script
pub const DEFAULT_METHOD_NAME: &str = "eval";

// Global safety caps to prevent pathological recursion

// Parser: maximum nesting of expressions and statements
pub const PARSER_MAX_NESTING: usize = 200;
// Interpreter: maximum depth of interpreted calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;
// Resolver: maximum steps when walking a type hierarchy
pub const RESOLVER_MAX_HIERARCHY_STEPS: usize = 10_000;
