//! `lso inspect`: print an image's header, tables and code.

use crate::output::StyledOutput;
use lso_bytecode::{Instruction, ScriptImage, ValueType};
use lso_core::Value;
use std::path::Path;
use termcolor::ColorChoice;

pub fn execute(path: &Path, disassemble: bool, color: ColorChoice) -> anyhow::Result<()> {
    let image = super::load_image(path)?;
    let mut out = StyledOutput::new(color);

    out.heading(&format!("{}", path.display()));
    out.line(&format!("Version:      {}", image.version));
    out.line(&format!("Flags:        0x{:08X}", image.flags));
    out.line(&format!("Heap:         {} bytes", image.heap_size));
    out.line(&format!("Stack:        {} slots", image.stack_size));
    out.line(&format!("Code:         {} bytes", image.code.len()));

    if !image.strings.is_empty() {
        out.heading(&format!("\nStrings ({})", image.strings.len()));
        for (i, s) in image.strings.iter().enumerate() {
            out.line(&format!("  #{i:<4} {s:?}"));
        }
    }

    if !image.globals.is_empty() {
        out.heading(&format!("\nGlobals ({})", image.globals.len()));
        for (i, g) in image.globals.iter().enumerate() {
            let init = Value::from(&g.init);
            out.line(&format!("  g{i:<4} {} {} = {init}", g.ty, g.name));
        }
    }

    if !image.functions.is_empty() {
        out.heading(&format!("\nFunctions ({})", image.functions.len()));
        for (i, f) in image.functions.iter().enumerate() {
            out.line(&format!(
                "  f{i:<4} {} {}({}) locals [{}] @ 0x{:04X}",
                f.return_type,
                f.name,
                type_list(&f.params),
                type_list(&f.locals),
                f.entry
            ));
        }
    }

    out.heading(&format!("\nStates ({})", image.states.len()));
    for (i, state) in image.states.iter().enumerate() {
        out.line(&format!("  s{i:<4} {}", state.name));
        for h in &state.handlers {
            out.line(&format!(
                "          {}({}) @ 0x{:04X}",
                h.event,
                type_list(&h.params),
                h.entry
            ));
        }
    }

    if !image.imports.is_empty() {
        out.heading(&format!("\nImports ({})", image.imports.len()));
        for (i, import) in image.imports.iter().enumerate() {
            out.line(&format!(
                "  i{i:<4} {} {}({})",
                import.return_type,
                import.name,
                type_list(&import.params)
            ));
        }
    }

    if disassemble {
        out.heading("\nCode");
        for line in disassembly(&image) {
            out.line(&line);
        }
    }

    out.flush();
    Ok(())
}

fn type_list(types: &[ValueType]) -> String {
    types
        .iter()
        .map(ValueType::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One line per instruction, marking handler and function entry points
fn disassembly(image: &ScriptImage) -> Vec<String> {
    let mut lines = Vec::new();
    let mut offset = 0;

    while offset < image.code.len() {
        for (state, event, entry) in image.entry_points() {
            if entry as usize == offset {
                lines.push(format!("{state}.{event}:"));
            }
        }
        for f in &image.functions {
            if f.entry as usize == offset {
                lines.push(format!("{}:", f.name));
            }
        }

        match Instruction::decode(&image.code, offset) {
            Ok((instruction, next)) => {
                lines.push(format!("  {offset:04X}  {instruction}"));
                offset = next;
            }
            Err(e) => {
                lines.push(format!("  {offset:04X}  <{e}>"));
                break;
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use lso_bytecode::{BytecodeWriter, EventHandler, STATE_ENTRY};

    #[test]
    fn test_disassembly_marks_entry_points() {
        let mut image = ScriptImage::new();
        let mut w = BytecodeWriter::new();
        w.emit(&Instruction::PushInt(7));
        w.emit(&Instruction::Print);
        w.emit(&Instruction::Return);
        image.code = w.into_bytes();
        image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));

        let lines = disassembly(&image);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "default.state_entry:");
        assert!(lines[1].starts_with("  0000"));
        assert!(lines[1].contains('7'));
    }

    #[test]
    fn test_disassembly_stops_at_bad_byte() {
        let mut image = ScriptImage::new();
        image.code = vec![0xFF, 0x00];
        let lines = disassembly(&image);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains('<'));
    }
}
