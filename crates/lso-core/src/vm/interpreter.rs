//! Instruction execution
//!
//! [`ScriptEngine::step`] decodes exactly one instruction at the
//! instruction pointer and applies it. An instruction either completes or
//! returns an error; the quantum loop turns errors into faults, so a
//! preempted script never exposes half an instruction.

use super::{ops, ExecutionState, ScriptEngine};
use crate::library::{CallContext, LibraryError, Signature};
use crate::math::{Quaternion, Vector};
use crate::stack::{FrameKind, Slot};
use crate::value::Value;
use crate::{VmError, VmResult};
use lso_bytecode::{
    ArithOp, CompareOp, DecodeError, Instruction, IntOp, LibraryImport, OperandTypes, ValueType,
};
use std::sync::Arc;
use uuid::Uuid;

impl ScriptEngine {
    /// Execute one instruction
    pub(super) fn step(&mut self, debug: bool, object_id: Uuid) -> VmResult<()> {
        let ip = self.ip;
        let code = &self.image.code;
        if ip >= code.len() {
            return Err(VmError::BoundsViolation(format!(
                "instruction pointer 0x{ip:X} past end of code (0x{:X})",
                code.len()
            )));
        }
        let (instruction, next) = Instruction::decode(code, ip).map_err(|e| match e {
            DecodeError::InvalidOpcode(byte, _) => VmError::IllegalOpcode(byte),
            _ => VmError::IllegalOpcode(code[ip]),
        })?;

        if debug {
            let text = instruction.to_string();
            tracing::trace!(
                "{ip:04X}  {text:<20} sp={} bp={} hp={}",
                self.stack.depth(),
                self.stack.base_pointer(),
                self.heap.used()
            );
        }

        self.ip = next;

        match instruction {
            // ===== Stack Manipulation & Constants =====
            Instruction::Nop => {}
            Instruction::Pop => {
                self.stack.pop()?;
            }
            Instruction::Dup => {
                let top = self.stack.peek(0)?;
                self.stack.push(top)?;
            }
            Instruction::Swap => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push(a)?;
                self.stack.push(b)?;
            }
            Instruction::PushInt(v) => self.stack.push(Slot::Integer(v))?,
            Instruction::PushFloat(v) => self.stack.push(Slot::Float(v))?,
            Instruction::PushString(index) => self.op_push_text(index, false)?,
            Instruction::PushKey(index) => self.op_push_text(index, true)?,
            Instruction::BuildVector => {
                let [x, y, z] = self.pop_floats()?;
                self.stack.push(Slot::Vector(Vector::new(x, y, z)))?;
            }
            Instruction::BuildRotation => {
                let [x, y, z, s] = self.pop_floats()?;
                self.stack.push(Slot::Rotation(Quaternion::new(x, y, z, s)))?;
            }
            Instruction::BuildList(count) => self.op_build_list(count as usize)?,

            // ===== Variables =====
            Instruction::LoadLocal(index) => {
                let slot = self.stack.load_local(index as usize)?;
                self.stack.push(slot)?;
            }
            Instruction::StoreLocal(index) => {
                let slot = self.stack.pop()?;
                self.stack.store_local(index as usize, slot)?;
            }
            Instruction::LoadGlobal(index) => {
                let slot = *self
                    .globals
                    .get(index as usize)
                    .ok_or_else(|| global_out_of_range(index))?;
                self.stack.push(slot)?;
            }
            Instruction::StoreGlobal(index) => {
                let slot = self.stack.pop()?;
                let target = self
                    .globals
                    .get_mut(index as usize)
                    .ok_or_else(|| global_out_of_range(index))?;
                slot.expect_type(target.value_type())?;
                *target = slot;
            }

            // ===== Operators =====
            Instruction::Binary(op, types) => self.op_binary(op, types)?,
            Instruction::Neg(ty) => {
                let value = self.pop_typed(ty)?;
                self.push_value(ops::negate(&value)?)?;
            }
            Instruction::Compare(op, types) => self.op_compare(op, types)?,
            Instruction::Int(op) => self.op_int(op)?,
            Instruction::Cast(ty) => self.op_cast(ty)?,

            // ===== Control Flow =====
            Instruction::Jump(_) => {
                self.ip = self.jump_target(&instruction, next)?;
            }
            Instruction::JumpIf(_) | Instruction::JumpIfNot(_) => {
                let slot = self.stack.pop()?;
                let truthy = self.materialize(slot)?.is_truthy();
                if truthy == matches!(instruction, Instruction::JumpIf(_)) {
                    self.ip = self.jump_target(&instruction, next)?;
                }
            }
            Instruction::Call(index) => self.op_call(index, next)?,
            Instruction::Return => self.op_return()?,
            Instruction::State(target) => self.change_state(target)?,
            Instruction::Halt => {
                tracing::info!(state = self.current_state_name(), ip, "script halted");
                self.state = ExecutionState::Finished;
            }

            // ===== Host Output =====
            Instruction::Print => {
                let slot = self.stack.pop()?;
                let text = self.materialize(slot)?.to_string();
                self.services.chat.say(object_id, 0, &text);
            }

            // ===== Library Calls =====
            Instruction::CallLib(index) => self.op_call_lib(index, object_id)?,
        }
        Ok(())
    }

    // ===== Operand Helpers =====

    fn pop_typed(&mut self, ty: ValueType) -> VmResult<Value> {
        let slot = self.stack.pop()?;
        slot.expect_type(ty)?;
        self.materialize(slot)
    }

    fn pop_int(&mut self) -> VmResult<i32> {
        match self.stack.pop()? {
            Slot::Integer(v) => Ok(v),
            other => Err(VmError::type_mismatch(ValueType::Integer, other.value_type())),
        }
    }

    /// Pop `N` floats, first component deepest
    fn pop_floats<const N: usize>(&mut self) -> VmResult<[f32; N]> {
        let slots = self.stack.pop_n(N)?;
        let mut out = [0.0; N];
        for (dst, slot) in out.iter_mut().zip(slots) {
            *dst = match slot {
                Slot::Float(f) => f,
                other => return Err(VmError::type_mismatch(ValueType::Float, other.value_type())),
            };
        }
        Ok(out)
    }

    fn push_value(&mut self, value: Value) -> VmResult<()> {
        let slot = self.store(value)?;
        self.stack.push(slot)
    }

    fn jump_target(&self, instruction: &Instruction, next: usize) -> VmResult<usize> {
        let target = instruction.jump_target(next).unwrap_or(next as i64);
        if target < 0 || target as usize >= self.image.code.len() {
            return Err(VmError::BoundsViolation(format!(
                "jump target {target} outside code"
            )));
        }
        Ok(target as usize)
    }

    // ===== Instruction Bodies =====

    fn op_push_text(&mut self, index: u32, key: bool) -> VmResult<()> {
        let text = self
            .image
            .strings
            .get(index as usize)
            .cloned()
            .ok_or_else(|| {
                VmError::BoundsViolation(format!("string pool index {index} out of range"))
            })?;
        self.push_value(if key { Value::Key(text) } else { Value::String(text) })
    }

    fn op_build_list(&mut self, count: usize) -> VmResult<()> {
        let slots = self.stack.pop_n(count)?;
        let mut items = Vec::with_capacity(count);
        for slot in slots {
            // Lists cannot nest
            if let Slot::List(_) = slot {
                return Err(VmError::InvalidOperands {
                    op: "[]",
                    lhs: ValueType::List,
                    rhs: ValueType::List,
                });
            }
            items.push(self.materialize(slot)?);
        }
        self.push_value(Value::List(items))
    }

    fn op_binary(&mut self, op: ArithOp, types: OperandTypes) -> VmResult<()> {
        let rhs = self.pop_typed(types.rhs)?;
        let lhs = self.pop_typed(types.lhs)?;
        let result = ops::arith(op, &lhs, &rhs)?;
        self.push_value(result)
    }

    fn op_compare(&mut self, op: CompareOp, types: OperandTypes) -> VmResult<()> {
        let rhs = self.pop_typed(types.rhs)?;
        let lhs = self.pop_typed(types.lhs)?;
        let result = ops::compare(op, &lhs, &rhs)?;
        self.stack.push(Slot::Integer(result))
    }

    fn op_int(&mut self, op: IntOp) -> VmResult<()> {
        let result = if op.is_unary() {
            let a = self.pop_int()?;
            ops::int_unary(op, a)
        } else {
            let b = self.pop_int()?;
            let a = self.pop_int()?;
            ops::int_binary(op, a, b)
        };
        self.stack.push(Slot::Integer(result))
    }

    fn op_cast(&mut self, target: ValueType) -> VmResult<()> {
        let slot = self.stack.pop()?;
        if slot.value_type() == target {
            return self.stack.push(slot);
        }
        let value = self.materialize(slot)?;
        let cast = value
            .cast(target)
            .ok_or_else(|| VmError::type_mismatch(target, value.value_type()))?;
        self.push_value(cast)
    }

    fn op_call(&mut self, index: u16, return_ip: usize) -> VmResult<()> {
        let image = Arc::clone(&self.image);
        let function = image.functions.get(index as usize).ok_or_else(|| {
            VmError::BoundsViolation(format!("function index {index} out of range"))
        })?;

        let param_count = function.params.len();
        if self.stack.operand_count() < param_count {
            return Err(VmError::StackUnderflow);
        }
        for (i, &ty) in function.params.iter().enumerate() {
            self.stack.peek(param_count - 1 - i)?.expect_type(ty)?;
        }
        for &ty in &function.locals {
            let slot = self.default_slot(ty)?;
            self.stack.push(slot)?;
        }

        self.stack.push_frame(
            FrameKind::Function(index),
            return_ip,
            param_count + function.locals.len(),
            &[],
            function.return_type,
        )?;
        self.ip = function.entry as usize;
        Ok(())
    }

    fn op_return(&mut self) -> VmResult<()> {
        let frame = self
            .stack
            .current_frame()
            .cloned()
            .ok_or(VmError::StackUnderflow)?;

        let result = if frame.return_type == ValueType::Void {
            None
        } else {
            let slot = self.stack.pop()?;
            slot.expect_type(frame.return_type)?;
            Some(slot)
        };
        self.stack.pop_frame()?;

        match frame.kind {
            FrameKind::Handler => self.end_handler(),
            FrameKind::Function(_) => {
                if let Some(slot) = result {
                    self.stack.push(slot)?;
                }
                self.ip = frame.return_ip;
            }
        }
        Ok(())
    }

    /// `CALLLIB`: pop the arguments, call the builtin, push one result
    fn op_call_lib(&mut self, index: u16, object_id: Uuid) -> VmResult<()> {
        let image = Arc::clone(&self.image);
        let import = image.imports.get(index as usize).ok_or_else(|| {
            VmError::BoundsViolation(format!("library import {index} out of range"))
        })?;

        let slots = self.stack.pop_n(import.params.len())?;
        let mut args = Vec::with_capacity(slots.len());
        for (slot, &ty) in slots.into_iter().zip(&import.params) {
            slot.expect_type(ty)?;
            args.push(self.materialize(slot)?);
        }

        let library = Arc::clone(&self.library);
        let function = library
            .lookup(&import.name)
            .map_err(|_| VmError::UnknownFunction(import.name.clone()))?;
        check_import(import, function.signature())?;

        let ctx = CallContext {
            object_id,
            services: &self.services,
        };
        let result = library
            .invoke(function, &ctx, &args)
            .map_err(|e| library_fault(&import.name, e))?;

        if import.return_type == ValueType::Void {
            return self.stack.push(Slot::Integer(0));
        }
        if result.value_type() != import.return_type {
            return Err(VmError::type_mismatch(import.return_type, result.value_type()));
        }
        self.push_value(result)
    }
}

fn global_out_of_range(index: u16) -> VmError {
    VmError::BoundsViolation(format!("global index {index} out of range"))
}

/// Compare the caller's view of a library function with the registered one
fn check_import(import: &LibraryImport, registered: &Signature) -> VmResult<()> {
    if import.params.len() != registered.params.len() {
        return Err(VmError::ArityMismatch {
            name: import.name.clone(),
            expected: registered.params.len(),
            actual: import.params.len(),
        });
    }
    for (&declared, &expected) in import.params.iter().zip(&registered.params) {
        if declared != expected {
            return Err(VmError::type_mismatch(expected, declared));
        }
    }
    if import.return_type != registered.ret {
        return Err(VmError::type_mismatch(registered.ret, import.return_type));
    }
    Ok(())
}

/// Convert a library error into an engine fault
fn library_fault(name: &str, error: LibraryError) -> VmError {
    match error {
        LibraryError::NotFound(name) => VmError::UnknownFunction(name),
        LibraryError::ArityMismatch {
            name,
            expected,
            actual,
        } => VmError::ArityMismatch {
            name,
            expected,
            actual,
        },
        LibraryError::TypeMismatch {
            expected, found, ..
        } => VmError::TypeMismatch { expected, found },
        other => VmError::LibraryFailure {
            name: name.to_string(),
            message: other.to_string(),
        },
    }
}
