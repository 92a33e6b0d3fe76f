use std::collections::{HashMap, HashSet};

use primitive_types::U256;

use emberchain_core::error::EmberError;

use crate::context::ExecutionContext;
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::stack::Stack;
use crate::storage::Storage;

/// Outcome of a single `execute` call.
#[derive(Debug)]
pub struct ExecutionResult {
    pub success: bool,
    pub gas_used: u64,
    pub return_data: Vec<u8>,
    /// Post-execution storage. Only meaningful (and only to be
    /// persisted) when `success` is true.
    pub storage: HashMap<U256, U256>,
    pub logs: Vec<Vec<u8>>,
    pub stack: Vec<U256>,
    pub error: Option<EmberError>,
}

/// A single-threaded, synchronous bytecode interpreter. See component C7.
pub struct Vm;

impl Vm {
    /// Scan `bytecode` for valid `JUMPDEST` positions, skipping bytes
    /// that fall inside a `PUSH1`/`PUSH32` immediate.
    fn valid_jumpdests(bytecode: &[u8]) -> HashSet<usize> {
        let mut dests = HashSet::new();
        let mut pc = 0;
        while pc < bytecode.len() {
            let byte = bytecode[pc];
            if byte == Opcode::JumpDest as u8 {
                dests.insert(pc);
            }
            let step = match Opcode::from_byte(byte) {
                Some(op) => 1 + op.immediate_len(),
                None => 1,
            };
            pc += step;
        }
        dests
    }

    fn word_to_usize(value: U256) -> Option<usize> {
        if value > U256::from(usize::MAX) {
            None
        } else {
            Some(value.as_usize())
        }
    }

    /// Run `bytecode` to completion (or to a trap), charging gas against
    /// `context.gas_limit`.
    pub fn execute(bytecode: &[u8], context: ExecutionContext) -> ExecutionResult {
        let jumpdests = Self::valid_jumpdests(bytecode);
        let mut stack = Stack::new();
        let mut memory = Memory::new();
        let mut storage = Storage::from_slots(context.storage.clone());
        let mut logs = Vec::new();
        let mut gas_used: u64 = 0;
        let mut pc = 0usize;
        let mut return_data = Vec::new();

        macro_rules! halt {
            ($success:expr, $error:expr) => {{
                return ExecutionResult {
                    success: $success,
                    gas_used,
                    return_data,
                    storage: storage.into_slots(),
                    logs,
                    stack: stack.into_vec(),
                    error: $error,
                };
            }};
        }

        macro_rules! try_op {
            ($expr:expr) => {
                match $expr {
                    Ok(v) => v,
                    Err(e) => halt!(false, Some(e)),
                }
            };
        }

        loop {
            if pc >= bytecode.len() {
                // fell off the end of the bytecode
                halt!(true, None);
            }

            let byte = bytecode[pc];
            let Some(op) = Opcode::from_byte(byte) else {
                halt!(false, Some(EmberError::InvalidOpcode(byte)));
            };

            let cost = op.gas_cost();
            if gas_used + cost > context.gas_limit {
                halt!(false, Some(EmberError::OutOfGas));
            }
            gas_used += cost;

            match op {
                Opcode::Stop => halt!(true, None),

                Opcode::Push1 => {
                    let byte = *bytecode.get(pc + 1).unwrap_or(&0);
                    stack.push(U256::from(byte));
                    pc += 2;
                    continue;
                }
                Opcode::Push32 => {
                    let mut word = [0u8; 32];
                    let start = pc + 1;
                    let end = (start + 32).min(bytecode.len());
                    word[..end - start].copy_from_slice(&bytecode[start..end]);
                    stack.push(U256::from_big_endian(&word));
                    pc += 33;
                    continue;
                }
                Opcode::Pop => {
                    try_op!(stack.pop());
                }
                Opcode::Dup => try_op!(stack.dup()),
                Opcode::Swap => try_op!(stack.swap()),

                Opcode::Add => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(a.overflowing_add(b).0);
                }
                Opcode::Sub => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(a.overflowing_sub(b).0);
                }
                Opcode::Mul => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(a.overflowing_mul(b).0);
                }
                Opcode::Div => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(if b.is_zero() { U256::zero() } else { a / b });
                }
                Opcode::Mod => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(if b.is_zero() { U256::zero() } else { a % b });
                }

                Opcode::Lt => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(U256::from((a < b) as u8));
                }
                Opcode::Gt => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(U256::from((a > b) as u8));
                }
                Opcode::Eq => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(U256::from((a == b) as u8));
                }
                Opcode::IsZero => {
                    let a = try_op!(stack.pop());
                    stack.push(U256::from(a.is_zero() as u8));
                }

                Opcode::And => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(a & b);
                }
                Opcode::Or => {
                    let b = try_op!(stack.pop());
                    let a = try_op!(stack.pop());
                    stack.push(a | b);
                }
                Opcode::Not => {
                    let a = try_op!(stack.pop());
                    stack.push(!a);
                }

                Opcode::Jump => {
                    let dest = try_op!(stack.pop());
                    let Some(dest) = Self::word_to_usize(dest).filter(|d| jumpdests.contains(d))
                    else {
                        halt!(false, Some(EmberError::InvalidJump));
                    };
                    pc = dest;
                    continue;
                }
                Opcode::JumpI => {
                    let dest = try_op!(stack.pop());
                    let cond = try_op!(stack.pop());
                    if !cond.is_zero() {
                        let Some(dest) =
                            Self::word_to_usize(dest).filter(|d| jumpdests.contains(d))
                        else {
                            halt!(false, Some(EmberError::InvalidJump));
                        };
                        pc = dest;
                        continue;
                    }
                }
                Opcode::JumpDest => {}

                Opcode::Caller => {
                    // The caller's public key is a hex string far wider than
                    // one word. Truncate to its first 16 hex characters and
                    // parse as a number — lossy (collisions are possible
                    // across distinct callers) but deterministic.
                    let hex_str = context.caller.as_str();
                    let prefix = &hex_str[..hex_str.len().min(16)];
                    let value = u64::from_str_radix(prefix, 16).unwrap_or(0);
                    stack.push(U256::from(value));
                }
                Opcode::CallValue => stack.push(U256::from(context.call_value)),
                Opcode::CallDataLoad => {
                    let offset = try_op!(stack.pop());
                    let offset = Self::word_to_usize(offset).unwrap_or(usize::MAX);
                    let mut window = [0u8; 32];
                    if offset < context.calldata.len() {
                        let end = (offset + 32).min(context.calldata.len());
                        window[..end - offset].copy_from_slice(&context.calldata[offset..end]);
                    }
                    stack.push(U256::from_big_endian(&window));
                }
                Opcode::CallDataSize => {
                    stack.push(U256::from(context.calldata.len() as u64));
                }

                Opcode::SLoad => {
                    let key = try_op!(stack.pop());
                    stack.push(storage.load(key));
                }
                Opcode::SStore => {
                    let key = try_op!(stack.pop());
                    let value = try_op!(stack.pop());
                    storage.store(key, value);
                }

                Opcode::MLoad => {
                    let addr = try_op!(stack.pop());
                    stack.push(memory.load(addr));
                }
                Opcode::MStore => {
                    let addr = try_op!(stack.pop());
                    let value = try_op!(stack.pop());
                    memory.store(addr, value);
                }

                Opcode::Return | Opcode::Revert => {
                    let offset = try_op!(stack.pop());
                    let count = try_op!(stack.pop());
                    let count = Self::word_to_usize(count).unwrap_or(0);
                    let mut data = Vec::with_capacity(count * 32);
                    let mut word_addr = offset;
                    for _ in 0..count {
                        let mut buf = [0u8; 32];
                        memory.load(word_addr).to_big_endian(&mut buf);
                        data.extend_from_slice(&buf);
                        word_addr = word_addr.overflowing_add(U256::one()).0;
                    }
                    return_data = data;
                    halt!(matches!(op, Opcode::Return), None);
                }

                Opcode::Log => {
                    let offset = try_op!(stack.pop());
                    let count = try_op!(stack.pop());
                    let count = Self::word_to_usize(count).unwrap_or(0);
                    let mut data = Vec::with_capacity(count * 32);
                    let mut word_addr = offset;
                    for _ in 0..count {
                        let mut buf = [0u8; 32];
                        memory.load(word_addr).to_big_endian(&mut buf);
                        data.extend_from_slice(&buf);
                        word_addr = word_addr.overflowing_add(U256::one()).0;
                    }
                    logs.push(data);
                }
            }

            pc += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberchain_core::types::PublicKeyHex;

    fn ctx(gas_limit: u64) -> ExecutionContext {
        ExecutionContext::new(PublicKeyHex::from("alice"), 0, Vec::new(), gas_limit)
    }

    #[test]
    fn stop_halts_successfully_with_no_effects() {
        let result = Vm::execute(&[Opcode::Stop as u8], ctx(100));
        assert!(result.success);
        assert_eq!(result.gas_used, 0);
    }

    #[test]
    fn push_add_leaves_sum_on_stack() {
        // PUSH1 2; PUSH1 3; ADD; STOP
        let code = [0x01, 2, 0x01, 3, 0x10, 0x00];
        let result = Vm::execute(&code, ctx(1000));
        assert!(result.success);
        assert_eq!(result.stack, vec![U256::from(5)]);
    }

    #[test]
    fn division_by_zero_yields_zero_not_a_fault() {
        // PUSH1 0; PUSH1 9; DIV; STOP
        let code = [0x01, 0, 0x01, 9, 0x13, 0x00];
        let result = Vm::execute(&code, ctx(1000));
        assert!(result.success);
        assert_eq!(result.stack, vec![U256::zero()]);
    }

    #[test]
    fn out_of_gas_halts_execution() {
        let code = [0x01, 1, 0x01, 2, 0x10, 0x00];
        let result = Vm::execute(&code, ctx(5)); // not enough for both pushes + add
        assert!(!result.success);
        assert!(matches!(result.error, Some(EmberError::OutOfGas)));
    }

    #[test]
    fn jump_to_non_jumpdest_traps() {
        // PUSH1 5; JUMP  (position 5 is mid-stream, not a JUMPDEST)
        let code = [0x01, 5, 0x40, 0x00, 0x00, 0x00];
        let result = Vm::execute(&code, ctx(1000));
        assert!(!result.success);
        assert!(matches!(result.error, Some(EmberError::InvalidJump)));
    }

    #[test]
    fn jump_into_push_immediate_is_rejected() {
        // PUSH1 3; JUMP; PUSH1 99 (byte 99 sits at offset 3, inside the immediate)
        let code = [0x01, 3, 0x40, 0x01, 99];
        let result = Vm::execute(&code, ctx(1000));
        assert!(!result.success);
        assert!(matches!(result.error, Some(EmberError::InvalidJump)));
    }

    #[test]
    fn jump_to_valid_jumpdest_succeeds() {
        // PUSH1 4; JUMP; STOP; STOP; JUMPDEST; STOP
        let code = [0x01, 4, 0x40, 0x00, 0x00, 0x42, 0x00];
        let result = Vm::execute(&code, ctx(1000));
        assert!(result.success);
    }

    #[test]
    fn sstore_then_sload_round_trips_within_one_execution() {
        // PUSH1 7; PUSH1 1; SSTORE; PUSH1 1; SLOAD; STOP
        let code = [0x01, 7, 0x01, 1, 0x61, 0x01, 1, 0x60, 0x00];
        let result = Vm::execute(&code, ctx(10_000));
        assert!(result.success);
        assert_eq!(result.stack, vec![U256::from(7)]);
        assert_eq!(result.storage.get(&U256::from(1)), Some(&U256::from(7)));
    }

    #[test]
    fn revert_discards_storage_but_reports_failure() {
        // PUSH1 7; PUSH1 1; SSTORE; PUSH1 0; PUSH1 0; REVERT
        let code = [0x01, 7, 0x01, 1, 0x61, 0x01, 0, 0x01, 0, 0x81];
        let result = Vm::execute(&code, ctx(10_000));
        assert!(!result.success);
        // storage map still reflects the write; caller must discard it
        // precisely because success is false.
        assert_eq!(result.storage.get(&U256::from(1)), Some(&U256::from(7)));
    }

    #[test]
    fn caller_truncates_hex_pubkey_to_first_16_chars() {
        // CALLER; STOP
        let code = [0x50, 0x00];
        let caller = ExecutionContext::new(
            PublicKeyHex::from("04ab34cd12ff000000restofthepubkeyistoolongtomatter"),
            0,
            Vec::new(),
            1000,
        );
        let result = Vm::execute(&code, caller);
        assert!(result.success);
        assert_eq!(result.stack, vec![U256::from(0x04ab34cd12ff0000u64)]);
    }

    #[test]
    fn unknown_opcode_traps() {
        let result = Vm::execute(&[0xff], ctx(1000));
        assert!(!result.success);
        assert!(matches!(result.error, Some(EmberError::InvalidOpcode(0xff))));
    }
}
