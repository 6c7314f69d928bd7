use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lso_bytecode::{
    ArithOp, BytecodeWriter, CompareOp, EventHandler, Instruction, Opcode, OperandTypes,
    ScriptImage, ValueType, STATE_ENTRY,
};
use lso_core::{EngineOptions, HostServices, LibraryTable, ScriptEngine};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const INT: OperandTypes = OperandTypes::same(ValueType::Integer);

/// `for (i = 0; i < n; i++) { body }` inside `state_entry`
fn loop_image(n: i32, body: impl Fn(&mut ScriptImage, &mut BytecodeWriter)) -> Arc<ScriptImage> {
    let mut image = ScriptImage::new();
    image.states[0].handlers.push(EventHandler {
        event: STATE_ENTRY.to_string(),
        params: Vec::new(),
        locals: vec![ValueType::Integer],
        entry: 0,
    });

    let mut w = BytecodeWriter::new();
    let top = w.offset();
    w.emit(&Instruction::LoadLocal(0));
    w.emit(&Instruction::PushInt(n));
    w.emit(&Instruction::Compare(CompareOp::Lt, INT));
    let exit = w.emit_jump_placeholder(Opcode::JumpIfNot);
    body(&mut image, &mut w);
    w.emit(&Instruction::LoadLocal(0));
    w.emit(&Instruction::PushInt(1));
    w.emit(&Instruction::Binary(ArithOp::Add, INT));
    w.emit(&Instruction::StoreLocal(0));
    w.emit_jump_back(Opcode::Jump, top);
    w.patch_jump_here(exit);
    w.emit(&Instruction::Return);
    image.code = w.into_bytes();
    Arc::new(image)
}

fn run_to_completion(image: &Arc<ScriptImage>, library: &Arc<LibraryTable>) -> u64 {
    let mut engine = ScriptEngine::new(
        Arc::clone(image),
        Arc::clone(library),
        HostServices::system(),
        EngineOptions::default(),
    );
    let object = Uuid::nil();
    let mut instructions = 0;
    while engine.is_runnable() {
        instructions += engine
            .run_quanta(false, object, Duration::from_secs(1))
            .instructions;
    }
    instructions
}

fn bench_integer_loop(c: &mut Criterion) {
    let library = Arc::new(LibraryTable::with_builtins());
    let mut group = c.benchmark_group("integer_loop");

    for n in [100, 10_000] {
        let image = loop_image(n, |_, _| {});
        let instructions = run_to_completion(&image, &library);
        group.throughput(Throughput::Elements(instructions));
        group.bench_with_input(BenchmarkId::from_parameter(n), &image, |b, image| {
            b.iter(|| run_to_completion(black_box(image), &library));
        });
    }

    group.finish();
}

fn bench_string_churn(c: &mut Criterion) {
    let library = Arc::new(LibraryTable::with_builtins());
    let image = loop_image(1_000, |image, w| {
        let s = image.intern("the quick brown fox");
        w.emit(&Instruction::PushString(s));
        w.emit(&Instruction::PushString(s));
        w.emit(&Instruction::Binary(ArithOp::Add, OperandTypes::same(ValueType::String)));
        w.emit(&Instruction::Pop);
    });

    c.bench_function("string_concat_1000", |b| {
        b.iter(|| run_to_completion(black_box(&image), &library));
    });
}

fn bench_library_calls(c: &mut Criterion) {
    let library = Arc::new(LibraryTable::with_builtins());
    let image = loop_image(1_000, |image, w| {
        let f = image.import("llAbs", ValueType::Integer, &[ValueType::Integer]);
        w.emit(&Instruction::PushInt(-7));
        w.emit(&Instruction::CallLib(f));
        w.emit(&Instruction::Pop);
    });

    c.bench_function("calllib_llAbs_1000", |b| {
        b.iter(|| run_to_completion(black_box(&image), &library));
    });
}

fn bench_quantum_overhead(c: &mut Criterion) {
    let library = Arc::new(LibraryTable::with_builtins());
    let image = loop_image(i32::MAX, |_, _| {});

    c.bench_function("zero_slice_quantum", |b| {
        let mut engine = ScriptEngine::new(
            Arc::clone(&image),
            Arc::clone(&library),
            HostServices::system(),
            EngineOptions::default(),
        );
        b.iter(|| engine.run_quanta(false, Uuid::nil(), black_box(Duration::ZERO)));
    });
}

criterion_group!(
    benches,
    bench_integer_loop,
    bench_string_churn,
    bench_library_calls,
    bench_quantum_overhead
);
criterion_main!(benches);
