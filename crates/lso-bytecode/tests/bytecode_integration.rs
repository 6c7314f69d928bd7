//! Integration tests for the LSO image format

use lso_bytecode::{
    verify_image, BytecodeWriter, Constant, EventHandler, FunctionDef, GlobalDef, ImageError,
    Instruction, Opcode, OperandTypes, ScriptImage, StateDef, ValueType, VerifyError, STATE_ENTRY,
};

/// Counts from 0 to 10 in a global, then halts
fn counter_image() -> ScriptImage {
    let mut image = ScriptImage::new();
    let counter = image.add_global(GlobalDef::zeroed("counter", ValueType::Integer));

    let mut w = BytecodeWriter::new();
    let top = w.offset();
    w.emit(&Instruction::LoadGlobal(counter));
    w.emit(&Instruction::PushInt(10));
    w.emit(&Instruction::Compare(
        lso_bytecode::CompareOp::Lt,
        OperandTypes::same(ValueType::Integer),
    ));
    let exit = w.emit_jump_placeholder(Opcode::JumpIfNot);
    w.emit(&Instruction::LoadGlobal(counter));
    w.emit(&Instruction::PushInt(1));
    w.emit(&Instruction::Binary(
        lso_bytecode::ArithOp::Add,
        OperandTypes::same(ValueType::Integer),
    ));
    w.emit(&Instruction::StoreGlobal(counter));
    w.emit_jump_back(Opcode::Jump, top);
    w.patch_jump_here(exit);
    w.emit(&Instruction::Halt);

    image.code = w.into_bytes();
    image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));
    image
}

#[test]
fn test_encode_decode_verify() {
    let image = counter_image();
    let bytes = image.encode();
    let decoded = ScriptImage::decode(&bytes).expect("Failed to decode");
    assert_eq!(decoded, image);
    verify_image(&decoded).expect("Failed to verify");
}

#[test]
fn test_multiple_states_and_functions() {
    let mut image = ScriptImage::new();
    let mut w = BytecodeWriter::new();

    // fn double(integer x) -> integer
    let double_entry = w.offset() as u32;
    w.emit(&Instruction::LoadLocal(0));
    w.emit(&Instruction::PushInt(2));
    w.emit(&Instruction::Binary(
        lso_bytecode::ArithOp::Mul,
        OperandTypes::same(ValueType::Integer),
    ));
    w.emit(&Instruction::Return);

    let running = image.add_state(StateDef::new("running"));
    let default_entry = w.offset() as u32;
    w.emit(&Instruction::State(running));

    let running_entry = w.offset() as u32;
    w.emit(&Instruction::PushInt(21));
    w.emit(&Instruction::Call(0));
    w.emit(&Instruction::Print);
    w.emit(&Instruction::Return);

    image.add_function(FunctionDef {
        name: "double".into(),
        return_type: ValueType::Integer,
        params: vec![ValueType::Integer],
        locals: vec![],
        entry: double_entry,
    });
    image.add_handler(0, EventHandler::new(STATE_ENTRY, default_entry));
    image.add_handler(running, EventHandler::new(STATE_ENTRY, running_entry));
    image.code = w.into_bytes();

    let decoded = ScriptImage::decode(&image.encode()).unwrap();
    assert_eq!(decoded.states.len(), 2);
    assert_eq!(decoded.states[1].name, "running");
    assert_eq!(decoded.functions[0].params, vec![ValueType::Integer]);
    verify_image(&decoded).unwrap();

    let entries: Vec<_> = decoded.entry_points().collect();
    assert_eq!(
        entries,
        vec![
            ("default", STATE_ENTRY, default_entry),
            ("running", STATE_ENTRY, running_entry)
        ]
    );
}

#[test]
fn test_global_constants_survive_roundtrip() {
    let mut image = ScriptImage::new();
    image.add_global(GlobalDef {
        name: "gRot".into(),
        ty: ValueType::Rotation,
        init: Constant::Rotation([0.0, 0.0, 0.70710677, 0.70710677]),
    });
    image.add_global(GlobalDef {
        name: "gNames".into(),
        ty: ValueType::List,
        init: Constant::List(vec![
            Constant::String("alpha".into()),
            Constant::Key("00000000-0000-0000-0000-000000000001".into()),
            Constant::Float(-0.5),
        ]),
    });

    let decoded = ScriptImage::decode(&image.encode()).unwrap();
    assert_eq!(decoded.globals, image.globals);
}

#[test]
fn test_nested_list_constant_rejected() {
    let mut image = ScriptImage::new();
    image.add_global(GlobalDef {
        name: "bad".into(),
        ty: ValueType::List,
        init: Constant::List(vec![Constant::List(vec![])]),
    });
    assert!(matches!(
        ScriptImage::decode(&image.encode()),
        Err(ImageError::Decode(_))
    ));
}

#[test]
fn test_image_checksum() {
    let image = counter_image();
    let mut bytes = image.encode();
    let mid = bytes.len() / 2;
    bytes[mid] = bytes[mid].wrapping_add(1);
    assert!(matches!(
        ScriptImage::decode(&bytes),
        Err(ImageError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_verify_rejects_state_out_of_range() {
    let mut image = ScriptImage::new();
    let mut w = BytecodeWriter::new();
    w.emit(&Instruction::State(4));
    image.code = w.into_bytes();
    image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));

    assert!(matches!(
        verify_image(&image),
        Err(VerifyError::InvalidReference { table: "state", index: 4, .. })
    ));
}

#[test]
fn test_large_code_section() {
    let mut image = ScriptImage::new();
    let mut w = BytecodeWriter::new();
    for i in 0..10_000 {
        w.emit(&Instruction::PushInt(i));
        w.emit(&Instruction::Pop);
    }
    w.emit(&Instruction::Halt);
    image.code = w.into_bytes();
    image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));

    let decoded = ScriptImage::decode(&image.encode()).unwrap();
    assert_eq!(decoded.code.len(), 10_000 * 6 + 1);
    verify_image(&decoded).unwrap();
}
