//! Loaded-class registry backed by in-memory class images

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::trace;

use super::class::{ClassLookup, RuntimeClass};
use super::error::{RuntimeError, RuntimeResult};
use super::reader::parse_class;
use super::value::lock;

/// Defines classes from a fixed set of images on first request
///
/// Names it owns are served child-first; every other name goes to the
/// parent. Each compilation gets its own loader, so static state never leaks
/// between evaluations.
pub struct ByteArrayClassLoader {
    images: HashMap<String, Vec<u8>>,
    defined: Mutex<HashMap<String, Arc<RuntimeClass>>>,
    parent: Arc<dyn ClassLookup>,
    this: Weak<ByteArrayClassLoader>,
}

impl ByteArrayClassLoader {
    /// `images` maps dotted binary names to class-file bytes
    pub fn new(images: HashMap<String, Vec<u8>>, parent: Arc<dyn ClassLookup>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            images,
            defined: Mutex::new(HashMap::new()),
            parent,
            this: this.clone(),
        })
    }

    /// Names of the classes this loader owns, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.images.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn owns(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    pub fn parent(&self) -> &Arc<dyn ClassLookup> {
        &self.parent
    }

    fn define(&self, name: &str, bytes: &[u8]) -> RuntimeResult<Arc<RuntimeClass>> {
        if let Some(class) = lock(&self.defined).get(name) {
            return Ok(class.clone());
        }
        let data = parse_class(bytes)?;
        let declared = data.this_class.replace('/', ".");
        if declared != name {
            return Err(RuntimeError::invalid_bytecode(
                name,
                format!("image declares class {}", declared),
            ));
        }
        let loader: Weak<dyn ClassLookup> = self.this.clone();
        let class = Arc::new(RuntimeClass::define(data, loader)?);
        trace!("Defined class {} ({} bytes)", name, bytes.len());
        Ok(lock(&self.defined).entry(name.to_string()).or_insert(class).clone())
    }
}

impl ClassLookup for ByteArrayClassLoader {
    fn find_class(&self, name: &str) -> RuntimeResult<Option<Arc<RuntimeClass>>> {
        match self.images.get(name) {
            Some(bytes) => self.define(name, bytes).map(Some),
            None => self.parent.find_class(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::HostRuntime;

    #[test]
    fn test_unknown_names_fall_through_to_parent() {
        let loader = ByteArrayClassLoader::new(HashMap::new(), HostRuntime::system());
        assert!(loader.find_class("java.lang.String").unwrap().is_some());
        assert!(loader.find_class("com.example.Missing").unwrap().is_none());
        assert!(matches!(
            loader.load_class("com.example.Missing"),
            Err(RuntimeError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_image_is_reported() {
        let mut images = HashMap::new();
        images.insert("Broken".to_string(), vec![0xCA, 0xFE]);
        let loader = ByteArrayClassLoader::new(images, HostRuntime::system());
        assert_eq!(loader.class_names(), vec!["Broken".to_string()]);
        assert!(matches!(loader.find_class("Broken"), Err(RuntimeError::InvalidBytecode { .. })));
    }
}
