//! Integration tests for the round-robin script scheduler

use lso_bytecode::{
    ArithOp, BytecodeWriter, EventHandler, GlobalDef, Instruction, Opcode, OperandTypes,
    ScriptImage, ValueType, STATE_ENTRY,
};
use lso_core::library::CollectingSink;
use lso_core::{
    EngineOptions, Event, ExecutionState, FaultKind, HostServices, LibraryTable, ResourceLimits,
    ScriptScheduler, Value,
};
use std::sync::Arc;
use std::time::Duration;

fn scheduler() -> (ScriptScheduler, Arc<CollectingSink>) {
    let chat = Arc::new(CollectingSink::new());
    let services = HostServices::system().with_chat(chat.clone());
    (
        ScriptScheduler::new(Arc::new(LibraryTable::with_builtins()), services),
        chat,
    )
}

/// `state_entry { while (TRUE) ; }`
fn spinning_image() -> Arc<ScriptImage> {
    let mut image = ScriptImage::new();
    let mut w = BytecodeWriter::new();
    let top = w.offset();
    w.emit(&Instruction::Nop);
    w.emit_jump_back(Opcode::Jump, top);
    image.code = w.into_bytes();
    image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));
    Arc::new(image)
}

/// `state_entry { say "<text>"; }`
fn greeting_image(text: &str) -> Arc<ScriptImage> {
    let mut image = ScriptImage::new();
    let s = image.intern(text);
    let mut w = BytecodeWriter::new();
    w.emit(&Instruction::PushString(s));
    w.emit(&Instruction::Print);
    w.emit(&Instruction::Return);
    image.code = w.into_bytes();
    image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));
    Arc::new(image)
}

#[test]
fn test_spinning_script_does_not_starve_others() {
    let (mut scheduler, chat) = scheduler();
    let spinner = scheduler.spawn(spinning_image());
    let greeter = scheduler.spawn(greeting_image("still responsive"));

    let report = scheduler.run_round(Duration::from_millis(2));
    assert_eq!(report.scripts_run, 2);
    assert_eq!(report.stopped, 1);
    assert_eq!(chat.texts(), vec!["still responsive"]);

    let reaped = scheduler.reap_terminated();
    assert_eq!(reaped, vec![(greeter, ExecutionState::Finished)]);
    assert_eq!(scheduler.ids(), vec![spinner]);
    assert!(scheduler.has_runnable());
}

#[test]
fn test_faulted_scripts_are_reaped_with_their_fault() {
    let (mut scheduler, _) = scheduler();
    let mut image = ScriptImage::new();
    image.code = vec![Opcode::Pop.to_u8()];
    image.add_handler(0, EventHandler::new(STATE_ENTRY, 0));
    let id = scheduler.spawn(Arc::new(image));

    scheduler.run_until_idle(8);
    let reaped = scheduler.reap_terminated();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].0, id);
    match &reaped[0].1 {
        ExecutionState::Faulted(fault) => assert_eq!(fault.kind(), FaultKind::StackUnderflow),
        other => panic!("expected fault, got {other}"),
    }
    assert_eq!(scheduler.stats().faulted, 1);
    assert!(scheduler.is_empty());
}

#[test]
fn test_instances_of_one_image_keep_separate_globals() {
    let (mut scheduler, _) = scheduler();
    let mut image = ScriptImage::new();
    image.add_global(GlobalDef::zeroed("touches", ValueType::Integer));
    let mut w = BytecodeWriter::new();
    w.emit(&Instruction::LoadGlobal(0));
    w.emit(&Instruction::PushInt(1));
    w.emit(&Instruction::Binary(
        ArithOp::Add,
        OperandTypes::same(ValueType::Integer),
    ));
    w.emit(&Instruction::StoreGlobal(0));
    w.emit(&Instruction::Return);
    image.code = w.into_bytes();
    image.add_handler(0, EventHandler::new("touch_start", 0));
    let image = Arc::new(image);

    let a = scheduler.spawn(Arc::clone(&image));
    let b = scheduler.spawn(image);
    scheduler.run_until_idle(8);

    scheduler.post_event(a, Event::named("touch_start"));
    scheduler.post_event(a, Event::named("touch_start"));
    scheduler.post_event(b, Event::named("touch_start"));
    scheduler.run_until_idle(8);

    let touches = |id| scheduler.get(id).and_then(|t| t.engine().global("touches"));
    assert_eq!(touches(a), Some(Value::Integer(2)));
    assert_eq!(touches(b), Some(Value::Integer(1)));
}

#[test]
fn test_spawn_uses_scheduler_options() {
    let (scheduler, _) = scheduler();
    let mut scheduler = scheduler.with_options(EngineOptions::with_limits(
        ResourceLimits::with_instruction_cap(10),
    ));
    let id = scheduler.spawn(spinning_image());

    let report = scheduler.run_round(Duration::from_secs(60));
    assert_eq!(report.instructions, 10);
    assert_eq!(
        scheduler.get(id).and_then(|t| t.last_report()).map(|r| r.instructions),
        Some(10)
    );
    assert_eq!(scheduler.stats().quanta, 1);
}

#[test]
fn test_run_until_idle_respects_round_limit() {
    let (mut scheduler, _) = scheduler();
    scheduler.spawn(spinning_image());
    assert_eq!(scheduler.run_until_idle(3), 3);
    assert_eq!(scheduler.stats().rounds, 3);
}
