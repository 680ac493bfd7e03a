//! Compiler and evaluator configuration

use crate::codegen::defs::major_versions;
use crate::consts::{DEFAULT_CLASS_NAME, DEFAULT_MAX_CALL_DEPTH, DEFAULT_METHOD_NAME};

/// Configuration shared by the compile and load stages
#[derive(Debug, Clone)]
pub struct Config {
    /// Embed `SourceFile` and `LineNumberTable` attributes
    pub debug: bool,
    /// Name of the synthesized class
    pub class_name: String,
    /// Name of the synthesized method for expressions and scripts
    pub method_name: String,
    /// Optional file name reported in locations and the `SourceFile` attribute
    pub source_name: Option<String>,
    /// Maximum depth of interpreted calls before `StackOverflow` is reported
    pub max_call_depth: usize,
    /// Class file major version of the produced images
    pub class_file_version: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: true,
            class_name: DEFAULT_CLASS_NAME.to_string(),
            method_name: DEFAULT_METHOD_NAME.to_string(),
            source_name: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            class_file_version: major_versions::JAVA_5_0,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = name.into();
        self
    }

    pub fn with_method_name(mut self, name: impl Into<String>) -> Self {
        self.method_name = name.into();
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.debug);
        assert_eq!(config.class_name, "SC");
        assert_eq!(config.method_name, "eval");
        assert_eq!(config.class_file_version, 49);
    }

    #[test]
    fn test_builders() {
        let config = Config::new()
            .with_debug(false)
            .with_class_name("Rule")
            .with_source_name("rule.java")
            .with_max_call_depth(16);
        assert!(!config.debug);
        assert_eq!(config.class_name, "Rule");
        assert_eq!(config.source_name.as_deref(), Some("rule.java"));
        assert_eq!(config.max_call_depth, 16);
    }
}
