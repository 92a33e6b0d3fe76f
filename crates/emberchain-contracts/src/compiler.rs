use primitive_types::U256;

use emberchain_core::error::EmberError;
use emberchain_vm::Opcode;

/// Compile assembly-like contract source into bytecode. Line-based;
/// `//` starts a comment; blank lines are ignored. Tokens are
/// whitespace-separated and case-insensitive.
///
/// `STORE`/`LOAD` both accept an optional key operand: with one, the key
/// is pushed for you (`STORE 1` → `PUSH1 1; SSTORE`); without one, the
/// bare mnemonic compiles straight to `SSTORE`/`SLOAD` and expects the
/// key (and, for `STORE`, the value) already on the stack.
pub fn compile(source: &str) -> Result<Vec<u8>, EmberError> {
    let mut out = Vec::new();

    for raw_line in source.lines() {
        let line = match raw_line.split_once("//") {
            Some((code, _comment)) => code.trim(),
            None => raw_line.trim(),
        };
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace().peekable();
        let mnemonic = tokens
            .next()
            .expect("non-empty line has at least one token")
            .to_ascii_uppercase();

        match mnemonic.as_str() {
            "PUSH" => {
                let operand = require_operand(&mut tokens, "PUSH")?;
                let value = parse_word(operand)?;
                emit_push(&mut out, value);
            }
            "ADD" => out.push(Opcode::Add as u8),
            "SUB" => out.push(Opcode::Sub as u8),
            "MUL" => out.push(Opcode::Mul as u8),
            "DIV" => out.push(Opcode::Div as u8),
            "MOD" => out.push(Opcode::Mod as u8),
            "LT" => out.push(Opcode::Lt as u8),
            "GT" => out.push(Opcode::Gt as u8),
            "EQ" => out.push(Opcode::Eq as u8),
            "ISZERO" => out.push(Opcode::IsZero as u8),
            "AND" => out.push(Opcode::And as u8),
            "OR" => out.push(Opcode::Or as u8),
            "NOT" => out.push(Opcode::Not as u8),
            "POP" => out.push(Opcode::Pop as u8),
            "DUP" => out.push(Opcode::Dup as u8),
            "SWAP" => out.push(Opcode::Swap as u8),

            // With an operand, `STORE <k>`/`LOAD <k>` push the key
            // themselves. Bare `STORE`/`LOAD` instead consume the key (and,
            // for STORE, the value) already sitting on the stack.
            "STORE" => {
                if tokens.peek().is_some() {
                    let key = require_byte_operand(&mut tokens, "STORE")?;
                    out.push(Opcode::Push1 as u8);
                    out.push(key);
                }
                out.push(Opcode::SStore as u8);
            }
            "LOAD" => {
                if tokens.peek().is_some() {
                    let key = require_byte_operand(&mut tokens, "LOAD")?;
                    out.push(Opcode::Push1 as u8);
                    out.push(key);
                }
                out.push(Opcode::SLoad as u8);
            }

            "CALLER" => out.push(Opcode::Caller as u8),
            "CALLVALUE" => out.push(Opcode::CallValue as u8),
            "CALLDATASIZE" => out.push(Opcode::CallDataSize as u8),

            "JUMP" => {
                let dest = require_byte_operand(&mut tokens, "JUMP")?;
                out.push(Opcode::Push1 as u8);
                out.push(dest);
                out.push(Opcode::Jump as u8);
            }
            "JUMPDEST" => out.push(Opcode::JumpDest as u8),
            "STOP" => out.push(Opcode::Stop as u8),
            "RETURN" => out.push(Opcode::Return as u8),
            "REVERT" => out.push(Opcode::Revert as u8),
            "LOG" => out.push(Opcode::Log as u8),

            other => return Err(EmberError::UnknownInstruction(other.to_string())),
        }
    }

    Ok(out)
}

fn require_operand<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    mnemonic: &str,
) -> Result<&'a str, EmberError> {
    tokens
        .next()
        .ok_or_else(|| EmberError::UnknownInstruction(format!("{mnemonic} requires an operand")))
}

fn require_byte_operand<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    mnemonic: &str,
) -> Result<u8, EmberError> {
    let raw = require_operand(tokens, mnemonic)?;
    let value = parse_word(raw)?;
    if value > U256::from(u8::MAX) {
        return Err(EmberError::UnknownInstruction(format!(
            "{mnemonic} operand {raw} does not fit in one byte"
        )));
    }
    Ok(value.as_u32() as u8)
}

fn parse_word(token: &str) -> Result<U256, EmberError> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        U256::from_str_radix(hex, 16)
            .map_err(|e| EmberError::UnknownInstruction(format!("bad literal {token}: {e}")))
    } else {
        U256::from_dec_str(token)
            .map_err(|e| EmberError::UnknownInstruction(format!("bad literal {token}: {e}")))
    }
}

fn emit_push(out: &mut Vec<u8>, value: U256) {
    if value < U256::from(256u32) {
        out.push(Opcode::Push1 as u8);
        out.push(value.as_u32() as u8);
    } else {
        out.push(Opcode::Push32 as u8);
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        out.extend_from_slice(&buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_small_value_emits_push1() {
        let code = compile("PUSH 5").unwrap();
        assert_eq!(code, vec![Opcode::Push1 as u8, 5]);
    }

    #[test]
    fn push_large_value_emits_push32() {
        let code = compile("PUSH 300").unwrap();
        assert_eq!(code[0], Opcode::Push32 as u8);
        assert_eq!(code.len(), 33);
    }

    #[test]
    fn store_expands_to_push1_and_sstore() {
        let code = compile("STORE 1").unwrap();
        assert_eq!(code, vec![Opcode::Push1 as u8, 1, Opcode::SStore as u8]);
    }

    #[test]
    fn bare_load_emits_sload_consuming_stack_key() {
        let code = compile("LOAD").unwrap();
        assert_eq!(code, vec![Opcode::SLoad as u8]);
    }

    #[test]
    fn bare_store_emits_sstore_consuming_stack_operands() {
        let code = compile("STORE").unwrap();
        assert_eq!(code, vec![Opcode::SStore as u8]);
    }

    #[test]
    fn scenario_deploy_then_bare_load_round_trips_through_storage() {
        // PUSH 7; STORE 1; PUSH 1; LOAD; STOP
        let code = compile("PUSH 7\nSTORE 1\nPUSH 1\nLOAD\nSTOP").unwrap();
        assert_eq!(
            code,
            vec![
                Opcode::Push1 as u8,
                7,
                Opcode::Push1 as u8,
                1,
                Opcode::SStore as u8,
                Opcode::Push1 as u8,
                1,
                Opcode::SLoad as u8,
                Opcode::Stop as u8,
            ]
        );
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let code = compile("// a counter\n\nPUSH 1\n// done\n").unwrap();
        assert_eq!(code, vec![Opcode::Push1 as u8, 1]);
    }

    #[test]
    fn unknown_mnemonic_fails_compilation() {
        let err = compile("FROBNICATE").unwrap_err();
        assert!(matches!(err, EmberError::UnknownInstruction(_)));
    }

    #[test]
    fn case_insensitive_mnemonics() {
        let code = compile("push 1\nadd").unwrap();
        assert_eq!(code, vec![Opcode::Push1 as u8, 1, Opcode::Add as u8]);
    }
}
