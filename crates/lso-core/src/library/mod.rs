//! Library dispatch table
//!
//! Compiled scripts reach native code through `CALLLIB`, which names a
//! library function and its expected signature. The [`LibraryTable`] maps
//! names to declared signatures and native implementations. Binding is
//! late: a name the table does not know faults when it is called, not when
//! the image is loaded.
//!
//! Tables are built explicitly and handed to each engine, so hosts can run
//! engines with different library sets (test doubles for time and
//! randomness, sandboxed subsets, and so on).

pub mod builtins;
mod services;

pub use services::{
    ChatMessage, ChatSink, Clock, CollectingSink, FixedClock, HashProvider, HostServices,
    RandomSource, SeededRandom, StandardHashes, StdoutSink, SystemClock, ThreadRandom,
    TracingSink,
};

use crate::value::Value;
use lso_bytecode::ValueType;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Library dispatch errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LibraryError {
    /// Name is not declared, or declared without an implementation
    #[error("Library function not found: {0}")]
    NotFound(String),

    /// Name already declared with a different signature
    #[error("Library function {0} already declared with another signature")]
    AlreadyDeclared(String),

    /// Wrong number of arguments
    #[error("{name} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        /// Function name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Argument or return value has the wrong type
    #[error("argument {position}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Zero-based argument position (`usize::MAX` for the return value)
        position: usize,
        /// Declared type
        expected: ValueType,
        /// Supplied type
        found: ValueType,
    },

    /// Signature string uses an unknown type code
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The builtin rejected its input
    #[error("{0}")]
    Failed(String),
}

/// Position used in [`LibraryError::TypeMismatch`] for return values
pub const RETURN_POSITION: usize = usize::MAX;

/// Return and parameter types of a library function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Return type (`Void` for none)
    pub ret: ValueType,
    /// Parameter types, in declaration order
    pub params: Vec<ValueType>,
}

impl Signature {
    /// Create a signature
    pub fn new(ret: ValueType, params: &[ValueType]) -> Self {
        Self {
            ret,
            params: params.to_vec(),
        }
    }

    /// Parse type-code strings such as `("s", "sii")`
    ///
    /// Codes are `i` integer, `f` float, `s` string, `k` key, `v` vector,
    /// `q` rotation and `l` list. An empty return string means void.
    pub fn parse(ret: &str, params: &str) -> Result<Self, LibraryError> {
        let code = |c: char| {
            ValueType::from_code(c).ok_or_else(|| {
                LibraryError::InvalidSignature(format!("unknown type code '{c}'"))
            })
        };

        let mut ret_chars = ret.chars();
        let ret_type = match (ret_chars.next(), ret_chars.next()) {
            (None, _) => ValueType::Void,
            (Some(c), None) => code(c)?,
            _ => {
                return Err(LibraryError::InvalidSignature(format!(
                    "return type '{ret}' must be a single code"
                )))
            }
        };
        let params = params.chars().map(code).collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            ret: ret_type,
            params,
        })
    }

    /// Check argument count and tags against this signature
    pub fn check_args(&self, name: &str, args: &[Value]) -> Result<(), LibraryError> {
        if args.len() != self.params.len() {
            return Err(LibraryError::ArityMismatch {
                name: name.to_string(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        for (position, (arg, &expected)) in args.iter().zip(&self.params).enumerate() {
            let found = arg.value_type();
            if found != expected {
                return Err(LibraryError::TypeMismatch {
                    position,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ret)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

/// Per-call context handed to builtins
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    /// Object running the script
    pub object_id: Uuid,
    /// Host-provided nondeterministic services
    pub services: &'a HostServices,
}

/// Native implementation of a library function
pub type NativeFunction =
    Arc<dyn Fn(&CallContext<'_>, &[Value]) -> Result<Value, LibraryError> + Send + Sync>;

/// A declared library function and its implementation, if assigned
#[derive(Clone)]
pub struct LibraryFunction {
    name: String,
    signature: Signature,
    exec: Option<NativeFunction>,
}

impl LibraryFunction {
    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Whether an implementation has been assigned
    pub fn is_assigned(&self) -> bool {
        self.exec.is_some()
    }
}

impl fmt::Debug for LibraryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("assigned", &self.exec.is_some())
            .finish()
    }
}

/// Name-keyed table of library functions
#[derive(Clone, Default)]
pub struct LibraryTable {
    functions: FxHashMap<String, LibraryFunction>,
}

impl LibraryTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with every builtin registered
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        builtins::register_all(&mut table);
        table
    }

    /// Declare a function without an implementation
    ///
    /// Redeclaring with the same signature is a no-op.
    pub fn declare(&mut self, name: &str, signature: Signature) -> Result<(), LibraryError> {
        if let Some(existing) = self.functions.get(name) {
            if existing.signature == signature {
                return Ok(());
            }
            return Err(LibraryError::AlreadyDeclared(name.to_string()));
        }
        self.functions.insert(
            name.to_string(),
            LibraryFunction {
                name: name.to_string(),
                signature,
                exec: None,
            },
        );
        Ok(())
    }

    /// Attach an implementation to a declared function
    pub fn assign_exec<F>(&mut self, name: &str, exec: F) -> Result<(), LibraryError>
    where
        F: Fn(&CallContext<'_>, &[Value]) -> Result<Value, LibraryError> + Send + Sync + 'static,
    {
        let function = self
            .functions
            .get_mut(name)
            .ok_or_else(|| LibraryError::NotFound(name.to_string()))?;
        function.exec = Some(Arc::new(exec));
        Ok(())
    }

    /// Declare and assign in one step, replacing any previous entry
    pub fn register<F>(&mut self, name: &str, signature: Signature, exec: F)
    where
        F: Fn(&CallContext<'_>, &[Value]) -> Result<Value, LibraryError> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.to_string(),
            LibraryFunction {
                name: name.to_string(),
                signature,
                exec: Some(Arc::new(exec)),
            },
        );
    }

    /// Remove a function
    pub fn unregister(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    /// Find a callable function
    ///
    /// Declared names without an implementation are not callable.
    pub fn lookup(&self, name: &str) -> Result<&LibraryFunction, LibraryError> {
        self.functions
            .get(name)
            .filter(|f| f.exec.is_some())
            .ok_or_else(|| LibraryError::NotFound(name.to_string()))
    }

    /// Declared signature of a function, assigned or not
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.functions.get(name).map(|f| &f.signature)
    }

    /// Invoke a function after checking its arguments
    ///
    /// Void functions always yield the integer `0` sentinel.
    pub fn invoke(
        &self,
        function: &LibraryFunction,
        ctx: &CallContext<'_>,
        args: &[Value],
    ) -> Result<Value, LibraryError> {
        let exec = function
            .exec
            .as_ref()
            .ok_or_else(|| LibraryError::NotFound(function.name.clone()))?;
        function.signature.check_args(&function.name, args)?;

        let result = exec(ctx, args)?;
        if function.signature.ret == ValueType::Void {
            return Ok(Value::Integer(0));
        }
        if result.value_type() != function.signature.ret {
            return Err(LibraryError::TypeMismatch {
                position: RETURN_POSITION,
                expected: function.signature.ret,
                found: result.value_type(),
            });
        }
        Ok(result)
    }

    /// Look up and invoke by name
    pub fn call(
        &self,
        name: &str,
        ctx: &CallContext<'_>,
        args: &[Value],
    ) -> Result<Value, LibraryError> {
        let function = self.lookup(name)?;
        self.invoke(function, ctx, args)
    }

    /// Whether a name is declared
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Number of declared functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Declared names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for LibraryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryTable")
            .field("count", &self.functions.len())
            .finish()
    }
}
