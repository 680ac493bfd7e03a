//! Host runtime
//!
//! There is no JVM inside a Rust process, so compiled class images run here:
//! [`reader`] parses a class file with nom, [`ByteArrayClassLoader`] turns
//! images into [`RuntimeClass`]es on demand, [`HostRuntime`] supplies the
//! native system classes every image links against, and [`Interpreter`]
//! executes bytecode.

pub mod class;
pub mod error;
pub mod host;
pub mod interp;
pub mod loader;
pub mod reader;
pub mod value;

pub use class::{ClassLookup, Code, MethodBody, NativeFn, RuntimeClass, RuntimeField, RuntimeMethod};
pub use error::{RuntimeError, RuntimeResult};
pub use host::{HostClass, HostRuntime, HostRuntimeBuilder};
pub use interp::Interpreter;
pub use loader::ByteArrayClassLoader;
pub use value::{Object, ObjectRef, Value};
