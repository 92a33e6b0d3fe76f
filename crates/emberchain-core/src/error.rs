use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmberError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("transaction has no receiver")]
    MissingReceiver,

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: i64, have: i64 },

    #[error("block hash mismatch: expected {expected}, computed {computed}")]
    BlockHashMismatch { expected: String, computed: String },

    #[error("block link mismatch: expected previous_hash {expected}, got {got}")]
    BlockLinkMismatch { expected: String, got: String },

    #[error("block hash does not meet difficulty target {difficulty}")]
    BlockDifficultyUnmet { difficulty: usize },

    #[error("chain is invalid")]
    ChainInvalid,

    // ── Storage ──────────────────────────────────────────────────────────────
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store is locked by another process")]
    Locked,

    #[error("store is corrupt: {0}")]
    Corrupt(String),

    // ── VM ───────────────────────────────────────────────────────────────────
    #[error("out of gas")]
    OutOfGas,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("invalid jump destination")]
    InvalidJump,

    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    // ── Gossip ───────────────────────────────────────────────────────────────
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("self connection rejected")]
    SelfConnection,

    // ── Compiler ─────────────────────────────────────────────────────────────
    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),

    // ── General ──────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}
