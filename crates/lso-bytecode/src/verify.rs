//! Structural verification of images
//!
//! Verification runs once at load time, before any engine touches the image.
//! It rejects images whose instruction stream does not decode cleanly, whose
//! jumps or entry points land between instructions, or whose operands name
//! table entries that do not exist. Type and stack discipline are still
//! checked by the engine at run time.

use crate::encoder::DecodeError;
use crate::image::{ImageError, ScriptImage};
use crate::instruction::Instruction;
use crate::types::ValueType;
use std::collections::HashSet;

/// Image verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Header validation failed
    #[error("Image validation error: {0}")]
    Image(#[from] ImageError),

    /// Instruction stream does not decode
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Jump lands outside the code or between instructions
    #[error("Invalid jump target {target} at offset {offset}")]
    InvalidJumpTarget {
        /// Computed absolute target
        target: i64,
        /// Offset of the jump instruction
        offset: usize,
    },

    /// Function or handler entry is not an instruction boundary
    #[error("Invalid entry point {entry} for {owner}")]
    InvalidEntryPoint {
        /// Function or handler name
        owner: String,
        /// Declared entry offset
        entry: u32,
    },

    /// Operand refers past the end of a table
    #[error("Invalid {table} reference: index {index} at offset {offset}")]
    InvalidReference {
        /// Table name
        table: &'static str,
        /// Referenced index
        index: u32,
        /// Offset of the instruction
        offset: usize,
    },

    /// A declaration uses `void` where a value type is required
    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    /// Execution falls off end
    #[error("Execution falls off end of code at offset {0}")]
    FallOffEnd(usize),
}

/// Verify an image
pub fn verify_image(image: &ScriptImage) -> Result<(), VerifyError> {
    image.validate()?;
    verify_declarations(image)?;

    let instructions = parse_instructions(&image.code)?;
    let boundaries: HashSet<usize> = instructions.iter().map(|(offset, _, _)| *offset).collect();

    verify_entry_points(image, &boundaries)?;

    for (offset, instr, next) in &instructions {
        if let Some(target) = instr.jump_target(*next) {
            if target < 0 || !boundaries.contains(&(target as usize)) {
                return Err(VerifyError::InvalidJumpTarget {
                    target,
                    offset: *offset,
                });
            }
        }
        verify_references(image, instr, *offset)?;
    }

    if let Some((offset, instr, _)) = instructions.last() {
        if !instr.opcode().is_terminator() {
            return Err(VerifyError::FallOffEnd(*offset));
        }
    }

    Ok(())
}

/// Decode the whole stream into (offset, instruction, next offset) triples
fn parse_instructions(code: &[u8]) -> Result<Vec<(usize, Instruction, usize)>, VerifyError> {
    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let (instr, next) = Instruction::decode(code, offset)?;
        instructions.push((offset, instr, next));
        offset = next;
    }
    Ok(instructions)
}

fn verify_declarations(image: &ScriptImage) -> Result<(), VerifyError> {
    let no_void = |types: &[ValueType], owner: &str| {
        if types.contains(&ValueType::Void) {
            Err(VerifyError::InvalidDeclaration(format!(
                "{owner} declares a void parameter or local"
            )))
        } else {
            Ok(())
        }
    };

    for global in &image.globals {
        if global.ty == ValueType::Void || global.init.value_type() != global.ty {
            return Err(VerifyError::InvalidDeclaration(format!(
                "global {} is {} but initialized with {}",
                global.name,
                global.ty,
                global.init.value_type()
            )));
        }
    }
    for function in &image.functions {
        no_void(&function.params, &function.name)?;
        no_void(&function.locals, &function.name)?;
    }
    for state in &image.states {
        for handler in &state.handlers {
            no_void(&handler.params, &handler.event)?;
            no_void(&handler.locals, &handler.event)?;
        }
    }
    for import in &image.imports {
        no_void(&import.params, &import.name)?;
    }
    if image.states.is_empty() {
        return Err(VerifyError::InvalidDeclaration("image has no default state".into()));
    }
    Ok(())
}

fn verify_entry_points(image: &ScriptImage, boundaries: &HashSet<usize>) -> Result<(), VerifyError> {
    let functions = image.functions.iter().map(|f| (f.name.clone(), f.entry));
    let handlers = image
        .states
        .iter()
        .flat_map(|s| s.handlers.iter().map(move |h| (format!("{}.{}", s.name, h.event), h.entry)));

    for (owner, entry) in functions.chain(handlers) {
        if !boundaries.contains(&(entry as usize)) {
            return Err(VerifyError::InvalidEntryPoint { owner, entry });
        }
    }
    Ok(())
}

fn verify_references(
    image: &ScriptImage,
    instr: &Instruction,
    offset: usize,
) -> Result<(), VerifyError> {
    let (table, index, len) = match *instr {
        Instruction::PushString(i) | Instruction::PushKey(i) => ("string", i, image.strings.len()),
        Instruction::LoadGlobal(i) | Instruction::StoreGlobal(i) => {
            ("global", i as u32, image.globals.len())
        }
        Instruction::Call(i) => ("function", i as u32, image.functions.len()),
        Instruction::State(i) => ("state", i as u32, image.states.len()),
        Instruction::CallLib(i) => ("import", i as u32, image.imports.len()),
        _ => return Ok(()),
    };
    if index as usize >= len {
        return Err(VerifyError::InvalidReference {
            table,
            index,
            offset,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::BytecodeWriter;
    use crate::image::{EventHandler, FunctionDef, GlobalDef, STATE_ENTRY};
    use crate::opcode::Opcode;

    fn image_with_code(code: Vec<u8>) -> ScriptImage {
        let mut image = ScriptImage::new();
        image.code = code;
        image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));
        image
    }

    #[test]
    fn test_verify_empty_image() {
        let image = ScriptImage::new();
        assert!(verify_image(&image).is_ok());
    }

    #[test]
    fn test_verify_simple_handler() {
        let mut writer = BytecodeWriter::new();
        writer.emit(&Instruction::PushInt(1));
        writer.emit(&Instruction::Pop);
        writer.emit(&Instruction::Return);
        assert!(verify_image(&image_with_code(writer.into_bytes())).is_ok());
    }

    #[test]
    fn test_verify_invalid_opcode() {
        let image = image_with_code(vec![0xEE, Opcode::Return.to_u8()]);
        assert!(matches!(
            verify_image(&image),
            Err(VerifyError::Decode(DecodeError::InvalidOpcode(0xEE, 0)))
        ));
    }

    #[test]
    fn test_verify_jump_into_operand() {
        let mut writer = BytecodeWriter::new();
        writer.emit(&Instruction::PushInt(5));
        // Jumps back into the middle of PUSHI's operand
        writer.emit(&Instruction::Jump(-7));
        let image = image_with_code(writer.into_bytes());
        assert!(matches!(
            verify_image(&image),
            Err(VerifyError::InvalidJumpTarget { target: 3, offset: 5 })
        ));
    }

    #[test]
    fn test_verify_bad_entry_point() {
        let mut image = image_with_code(vec![Opcode::Return.to_u8()]);
        image.add_function(FunctionDef {
            name: "f".into(),
            return_type: ValueType::Void,
            params: vec![],
            locals: vec![],
            entry: 9,
        });
        assert!(matches!(
            verify_image(&image),
            Err(VerifyError::InvalidEntryPoint { entry: 9, .. })
        ));
    }

    #[test]
    fn test_verify_invalid_import_ref() {
        let mut writer = BytecodeWriter::new();
        writer.emit(&Instruction::CallLib(0));
        writer.emit(&Instruction::Return);
        assert!(matches!(
            verify_image(&image_with_code(writer.into_bytes())),
            Err(VerifyError::InvalidReference { table: "import", index: 0, offset: 0 })
        ));
    }

    #[test]
    fn test_verify_global_initializer_type() {
        let mut image = image_with_code(vec![Opcode::Return.to_u8()]);
        let mut global = GlobalDef::zeroed("g", ValueType::Float);
        global.init = crate::image::Constant::Integer(3);
        image.add_global(global);
        assert!(matches!(
            verify_image(&image),
            Err(VerifyError::InvalidDeclaration(_))
        ));
    }

    #[test]
    fn test_verify_falls_off_end() {
        let image = image_with_code(vec![Opcode::Nop.to_u8()]);
        assert!(matches!(verify_image(&image), Err(VerifyError::FallOffEnd(0))));
    }
}
