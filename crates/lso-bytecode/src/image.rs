//! Bytecode image format
//!
//! A [`ScriptImage`] is the compiled form of one LSL script: a fixed header,
//! declaration tables (globals, functions, states, library imports), a string
//! pool, and the instruction stream. Images are immutable once loaded and are
//! shared between engine instances by reference.

use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use crate::types::ValueType;
use thiserror::Error;

/// Magic number for LSO images: "LSO2"
pub const MAGIC: [u8; 4] = *b"LSO2";

/// Current image format version
pub const VERSION: u32 = 2;

/// Size of the fixed header (magic, version, flags, checksum)
pub const HEADER_SIZE: usize = 16;

/// Default heap budget in bytes
pub const DEFAULT_HEAP_SIZE: u32 = 16 * 1024;

/// Default stack budget in slots
pub const DEFAULT_STACK_SIZE: u32 = 1024;

/// Name of the event run when a state is entered
pub const STATE_ENTRY: &str = "state_entry";

/// Name of the event run when a state is left
pub const STATE_EXIT: &str = "state_exit";

/// Image encoding/decoding errors
#[derive(Debug, Error)]
pub enum ImageError {
    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected LSO2, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },

    /// A declaration table exceeds the 16-bit index space
    #[error("Too many {0} (limit is 65535)")]
    TableOverflow(&'static str),
}

/// Compile-time constant used as a global initializer
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Integer literal
    Integer(i32),
    /// Float literal
    Float(f32),
    /// String literal
    String(String),
    /// Key literal
    Key(String),
    /// Vector literal
    Vector([f32; 3]),
    /// Rotation literal (x, y, z, s)
    Rotation([f32; 4]),
    /// List literal; elements are never lists
    List(Vec<Constant>),
}

impl Constant {
    /// Type of this constant
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Integer(_) => ValueType::Integer,
            Self::Float(_) => ValueType::Float,
            Self::String(_) => ValueType::String,
            Self::Key(_) => ValueType::Key,
            Self::Vector(_) => ValueType::Vector,
            Self::Rotation(_) => ValueType::Rotation,
            Self::List(_) => ValueType::List,
        }
    }

    /// Zero value for a declared type
    ///
    /// Rotations default to the identity, matching `ZERO_ROTATION`.
    pub fn default_for(ty: ValueType) -> Option<Self> {
        Some(match ty {
            ValueType::Void => return None,
            ValueType::Integer => Self::Integer(0),
            ValueType::Float => Self::Float(0.0),
            ValueType::String => Self::String(String::new()),
            ValueType::Key => Self::Key(String::new()),
            ValueType::Vector => Self::Vector([0.0; 3]),
            ValueType::Rotation => Self::Rotation([0.0, 0.0, 0.0, 1.0]),
            ValueType::List => Self::List(Vec::new()),
        })
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_type(self.value_type());
        match self {
            Self::Integer(v) => writer.emit_i32(*v),
            Self::Float(v) => writer.emit_f32(*v),
            Self::String(s) | Self::Key(s) => writer.emit_string(s),
            Self::Vector(v) => v.iter().for_each(|c| writer.emit_f32(*c)),
            Self::Rotation(q) => q.iter().for_each(|c| writer.emit_f32(*c)),
            Self::List(items) => {
                writer.emit_u16(items.len() as u16);
                for item in items {
                    item.encode(writer);
                }
            }
        }
    }

    fn decode(reader: &mut BytecodeReader<'_>, nested: bool) -> Result<Self, DecodeError> {
        let at = reader.position();
        let ty = reader.read_type()?;
        Ok(match ty {
            ValueType::Integer => Self::Integer(reader.read_i32()?),
            ValueType::Float => Self::Float(reader.read_f32()?),
            ValueType::String => Self::String(reader.read_string()?),
            ValueType::Key => Self::Key(reader.read_string()?),
            ValueType::Vector => {
                Self::Vector([reader.read_f32()?, reader.read_f32()?, reader.read_f32()?])
            }
            ValueType::Rotation => Self::Rotation([
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
            ]),
            ValueType::List if !nested => {
                let count = reader.read_u16()? as usize;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Self::decode(reader, true)?);
                }
                Self::List(items)
            }
            ValueType::List | ValueType::Void => {
                return Err(DecodeError::InvalidType(ty.to_u8(), at))
            }
        })
    }
}

/// Global variable declaration
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDef {
    /// Variable name
    pub name: String,
    /// Declared type
    pub ty: ValueType,
    /// Initial value
    pub init: Constant,
}

impl GlobalDef {
    /// Declare a global initialized to its type's zero value
    pub fn zeroed(name: impl Into<String>, ty: ValueType) -> Self {
        let init = Constant::default_for(ty).unwrap_or(Constant::Integer(0));
        Self {
            name: name.into(),
            ty,
            init,
        }
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_type(self.ty);
        self.init.encode(writer);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let ty = reader.read_type()?;
        let init = Constant::decode(reader, false)?;
        Ok(Self { name, ty, init })
    }
}

/// User-defined function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Return type (`Void` for none)
    pub return_type: ValueType,
    /// Parameter types, in declaration order
    pub params: Vec<ValueType>,
    /// Types of locals beyond the parameters
    pub locals: Vec<ValueType>,
    /// Code offset of the first instruction
    pub entry: u32,
}

impl FunctionDef {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_type(self.return_type);
        writer.emit_types(&self.params);
        writer.emit_types(&self.locals);
        writer.emit_u32(self.entry);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string()?,
            return_type: reader.read_type()?,
            params: reader.read_types()?,
            locals: reader.read_types()?,
            entry: reader.read_u32()?,
        })
    }
}

/// Event handler within a state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHandler {
    /// Event name, e.g. `state_entry` or `touch_start`
    pub event: String,
    /// Parameter types delivered with the event
    pub params: Vec<ValueType>,
    /// Types of locals beyond the parameters
    pub locals: Vec<ValueType>,
    /// Code offset of the first instruction
    pub entry: u32,
}

impl EventHandler {
    /// Handler without parameters or extra locals
    pub fn new(event: impl Into<String>, entry: u32) -> Self {
        Self {
            event: event.into(),
            params: Vec::new(),
            locals: Vec::new(),
            entry,
        }
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.event);
        writer.emit_types(&self.params);
        writer.emit_types(&self.locals);
        writer.emit_u32(self.entry);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            event: reader.read_string()?,
            params: reader.read_types()?,
            locals: reader.read_types()?,
            entry: reader.read_u32()?,
        })
    }
}

/// Named script state with its event handler table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDef {
    /// State name (`default` for state 0)
    pub name: String,
    /// Event handlers
    pub handlers: Vec<EventHandler>,
}

impl StateDef {
    /// Create a state without handlers
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Vec::new(),
        }
    }

    /// Find the handler for an event
    pub fn handler(&self, event: &str) -> Option<&EventHandler> {
        self.handlers.iter().find(|h| h.event == event)
    }

    /// Whether the state reacts to anything besides entry and exit
    pub fn listens_for_events(&self) -> bool {
        self.handlers
            .iter()
            .any(|h| h.event != STATE_ENTRY && h.event != STATE_EXIT)
    }

    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_u16(self.handlers.len() as u16);
        for handler in &self.handlers {
            handler.encode(writer);
        }
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let count = reader.read_u16()? as usize;
        let mut handlers = Vec::with_capacity(count);
        for _ in 0..count {
            handlers.push(EventHandler::decode(reader)?);
        }
        Ok(Self { name, handlers })
    }
}

/// Library function referenced by the code, resolved by name at call time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryImport {
    /// Library function name, e.g. `llGetSubString`
    pub name: String,
    /// Return type the caller expects
    pub return_type: ValueType,
    /// Argument types the caller pushes, first argument first
    pub params: Vec<ValueType>,
}

impl LibraryImport {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_string(&self.name);
        writer.emit_type(self.return_type);
        writer.emit_types(&self.params);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: reader.read_string()?,
            return_type: reader.read_type()?,
            params: reader.read_types()?,
        })
    }
}

/// A compiled LSO script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptImage {
    /// Image format version
    pub version: u32,
    /// Reserved header flags, preserved on round trip
    pub flags: u32,
    /// Heap budget in bytes
    pub heap_size: u32,
    /// Stack budget in slots
    pub stack_size: u32,
    /// String pool for `PUSHS`/`PUSHK`
    pub strings: Vec<String>,
    /// Global variables
    pub globals: Vec<GlobalDef>,
    /// User functions
    pub functions: Vec<FunctionDef>,
    /// States; index 0 is the default state
    pub states: Vec<StateDef>,
    /// Library imports
    pub imports: Vec<LibraryImport>,
    /// Instruction stream
    pub code: Vec<u8>,
}

impl ScriptImage {
    /// Create an empty image with a `default` state
    pub fn new() -> Self {
        Self {
            version: VERSION,
            flags: 0,
            heap_size: DEFAULT_HEAP_SIZE,
            stack_size: DEFAULT_STACK_SIZE,
            strings: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
            states: vec![StateDef::new("default")],
            imports: Vec::new(),
            code: Vec::new(),
        }
    }

    /// Intern a string in the pool and return its index
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(index) = self.strings.iter().position(|s| s == value) {
            return index as u32;
        }
        self.strings.push(value.to_string());
        (self.strings.len() - 1) as u32
    }

    /// Add (or reuse) a library import and return its index
    pub fn import(&mut self, name: &str, return_type: ValueType, params: &[ValueType]) -> u16 {
        if let Some(index) = self
            .imports
            .iter()
            .position(|i| i.name == name && i.return_type == return_type && i.params == params)
        {
            return index as u16;
        }
        self.imports.push(LibraryImport {
            name: name.to_string(),
            return_type,
            params: params.to_vec(),
        });
        (self.imports.len() - 1) as u16
    }

    /// Add a global and return its index
    pub fn add_global(&mut self, global: GlobalDef) -> u16 {
        self.globals.push(global);
        (self.globals.len() - 1) as u16
    }

    /// Add a user function and return its index
    pub fn add_function(&mut self, function: FunctionDef) -> u16 {
        self.functions.push(function);
        (self.functions.len() - 1) as u16
    }

    /// Add a state and return its index
    pub fn add_state(&mut self, state: StateDef) -> u16 {
        self.states.push(state);
        (self.states.len() - 1) as u16
    }

    /// Attach a handler to a state
    ///
    /// # Panics
    ///
    /// Panics if `state` is out of range.
    pub fn add_handler(&mut self, state: u16, handler: EventHandler) {
        self.states[state as usize].handlers.push(handler);
    }

    /// Entry offset of every handler, by state
    pub fn entry_points(&self) -> impl Iterator<Item = (&str, &str, u32)> + '_ {
        self.states.iter().flat_map(|state| {
            state
                .handlers
                .iter()
                .map(move |h| (state.name.as_str(), h.event.as_str(), h.entry))
        })
    }

    /// Validate header fields
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.version != VERSION {
            return Err(ImageError::UnsupportedVersion(self.version));
        }
        for (name, len) in [
            ("globals", self.globals.len()),
            ("functions", self.functions.len()),
            ("states", self.states.len()),
            ("imports", self.imports.len()),
        ] {
            if len > u16::MAX as usize {
                return Err(ImageError::TableOverflow(name));
            }
        }
        Ok(())
    }

    /// Encode the image to binary format (.lso)
    ///
    /// Format:
    /// - Header: magic (4 bytes) + version (u32) + flags (u32) + checksum (u32)
    /// - Heap size (u32) + stack size (u32)
    /// - String pool
    /// - Global, function, state and import tables
    /// - Code section
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BytecodeWriter::with_capacity(HEADER_SIZE + self.code.len() + 256);

        writer.emit_bytes(&MAGIC);
        writer.emit_u32(self.version);
        writer.emit_u32(self.flags);
        writer.emit_u32(0); // checksum placeholder

        writer.emit_u32(self.heap_size);
        writer.emit_u32(self.stack_size);

        writer.emit_u32(self.strings.len() as u32);
        for s in &self.strings {
            writer.emit_string(s);
        }

        writer.emit_u16(self.globals.len() as u16);
        for global in &self.globals {
            global.encode(&mut writer);
        }

        writer.emit_u16(self.functions.len() as u16);
        for function in &self.functions {
            function.encode(&mut writer);
        }

        writer.emit_u16(self.states.len() as u16);
        for state in &self.states {
            state.encode(&mut writer);
        }

        writer.emit_u16(self.imports.len() as u16);
        for import in &self.imports {
            import.encode(&mut writer);
        }

        writer.emit_u32(self.code.len() as u32);
        writer.emit_bytes(&self.code);

        // CRC32 of everything after the header
        let checksum = crc32fast::hash(&writer.buffer()[HEADER_SIZE..]);
        writer.patch_u32(12, checksum);

        writer.into_bytes()
    }

    /// Decode an image from binary format
    pub fn decode(data: &[u8]) -> Result<Self, ImageError> {
        let mut reader = BytecodeReader::new(data);

        let magic: [u8; 4] = reader.read_u32()?.to_le_bytes();
        if magic != MAGIC {
            return Err(ImageError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }

        let flags = reader.read_u32()?;
        let stored_checksum = reader.read_u32()?;

        let calculated_checksum = crc32fast::hash(&data[HEADER_SIZE..]);
        if stored_checksum != calculated_checksum {
            return Err(ImageError::ChecksumMismatch {
                expected: stored_checksum,
                actual: calculated_checksum,
            });
        }

        let heap_size = reader.read_u32()?;
        let stack_size = reader.read_u32()?;

        let string_count = reader.read_u32()? as usize;
        let mut strings = Vec::with_capacity(string_count.min(reader.remaining()));
        for _ in 0..string_count {
            strings.push(reader.read_string()?);
        }

        let count = reader.read_u16()? as usize;
        let mut globals = Vec::with_capacity(count);
        for _ in 0..count {
            globals.push(GlobalDef::decode(&mut reader)?);
        }

        let count = reader.read_u16()? as usize;
        let mut functions = Vec::with_capacity(count);
        for _ in 0..count {
            functions.push(FunctionDef::decode(&mut reader)?);
        }

        let count = reader.read_u16()? as usize;
        let mut states = Vec::with_capacity(count);
        for _ in 0..count {
            states.push(StateDef::decode(&mut reader)?);
        }

        let count = reader.read_u16()? as usize;
        let mut imports = Vec::with_capacity(count);
        for _ in 0..count {
            imports.push(LibraryImport::decode(&mut reader)?);
        }

        let code_len = reader.read_u32()? as usize;
        let code = reader.read_bytes(code_len)?;

        Ok(Self {
            version,
            flags,
            heap_size,
            stack_size,
            strings,
            globals,
            functions,
            states,
            imports,
            code,
        })
    }
}

impl Default for ScriptImage {
    fn default() -> Self {
        Self::new()
    }
}
