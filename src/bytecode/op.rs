use serde::{Deserialize, Serialize};

// =============================================================================
// OP - cinder instructions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // literals
    PushInt(u64),
    PushStr(String),

    // stack ops
    Drop,
    Dup,
    /// Duplicate the top N values, preserving their order. 2 <= N <= 6.
    DupN(u8),
    Swap,
    Over,
    Rot,

    // arithmetic
    Add,
    Sub,
    Mul,

    // comparison
    Eq,
    Gt,
    Lt,

    // bitwise
    Shr,
    Shl,
    Or,
    And,

    // debug
    Print,
    Comment(String),

    // ==========================================================================
    // Control flow - jump targets are filled in by the resolver
    // ==========================================================================
    If,
    Else,
    While,
    Do,
    End,

    // memory
    Mem,
    Load,
    Store,

    // ==========================================================================
    // Abstraction
    // ==========================================================================
    /// `proc` marker. Jumps past the body when reached in straight-line code.
    ProcDef,
    /// Resolved call site of a named procedure.
    ProcCall(String),
    /// First instruction of a procedure body (the rewritten name).
    ProcBegin(String),
    /// The `end` that closes a procedure.
    ProcRet,
    /// Unresolved name. Never survives resolution.
    Ident(String),

    // compile time
    MacroDef,

    /// `(N)syscall`: pops the syscall number, then N arguments.
    Syscall(u8),
}

/// Source spelling of every fixed keyword and symbol.
pub const KEYWORDS: &[(&str, Op)] = &[
    ("drop", Op::Drop),
    ("dup", Op::Dup),
    ("swap", Op::Swap),
    ("over", Op::Over),
    ("rot", Op::Rot),
    ("+", Op::Add),
    ("-", Op::Sub),
    ("*", Op::Mul),
    ("=", Op::Eq),
    (">", Op::Gt),
    ("<", Op::Lt),
    ("shr", Op::Shr),
    ("shl", Op::Shl),
    ("or", Op::Or),
    ("and", Op::And),
    (".", Op::Print),
    ("if", Op::If),
    ("else", Op::Else),
    ("while", Op::While),
    ("do", Op::Do),
    ("end", Op::End),
    ("mem", Op::Mem),
    ("@", Op::Load),
    ("!", Op::Store),
    ("proc", Op::ProcDef),
    ("macro", Op::MacroDef),
];

impl Op {
    pub fn keyword(text: &str) -> Option<Op> {
        KEYWORDS
            .iter()
            .find(|(word, _)| *word == text)
            .map(|(_, op)| op.clone())
    }

    /// Short lowercase name used in diagnostics and disassembly.
    pub fn name(&self) -> &'static str {
        match self {
            Op::PushInt(_) => "push-int",
            Op::PushStr(_) => "push-str",
            Op::Drop => "drop",
            Op::Dup => "dup",
            Op::DupN(_) => "dup-n",
            Op::Swap => "swap",
            Op::Over => "over",
            Op::Rot => "rot",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Eq => "eq",
            Op::Gt => "gt",
            Op::Lt => "lt",
            Op::Shr => "shr",
            Op::Shl => "shl",
            Op::Or => "or",
            Op::And => "and",
            Op::Print => "print",
            Op::Comment(_) => "comment",
            Op::If => "if",
            Op::Else => "else",
            Op::While => "while",
            Op::Do => "do",
            Op::End => "end",
            Op::Mem => "mem",
            Op::Load => "load",
            Op::Store => "store",
            Op::ProcDef => "proc",
            Op::ProcCall(_) => "call",
            Op::ProcBegin(_) => "proc-begin",
            Op::ProcRet => "proc-ret",
            Op::Ident(_) => "ident",
            Op::MacroDef => "macro",
            Op::Syscall(_) => "syscall",
        }
    }

    /// The two-operand operator this op performs, if any.
    pub fn binary(&self) -> Option<BinOp> {
        Some(match self {
            Op::Add => BinOp::Add,
            Op::Sub => BinOp::Sub,
            Op::Mul => BinOp::Mul,
            Op::Eq => BinOp::Eq,
            Op::Gt => BinOp::Gt,
            Op::Lt => BinOp::Lt,
            Op::Shr => BinOp::Shr,
            Op::Shl => BinOp::Shl,
            Op::Or => BinOp::Or,
            Op::And => BinOp::And,
            _ => return None,
        })
    }

    /// True for instructions whose `jump` field is meaningful after resolution.
    pub fn has_jump(&self) -> bool {
        matches!(
            self,
            Op::If | Op::Else | Op::Do | Op::End | Op::ProcDef | Op::ProcCall(_)
        )
    }
}

// =============================================================================
// BinOp - pop two, compute, push one
// =============================================================================

/// Binary operators, described once for both engines.
///
/// Operands are named by pop order: `a` is popped first (the top of the
/// stack), `b` second. Every operator computes `b <op> a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Eq,
    Gt,
    Lt,
    Shr,
    Shl,
    Or,
    And,
}

impl BinOp {
    /// Evaluate with x86-64 semantics: wrapping arithmetic, signed
    /// comparisons, logical right shift, shift count masked to 6 bits.
    pub fn eval(self, b: u64, a: u64) -> u64 {
        match self {
            BinOp::Add => b.wrapping_add(a),
            BinOp::Sub => b.wrapping_sub(a),
            BinOp::Mul => b.wrapping_mul(a),
            BinOp::Eq => (b == a) as u64,
            BinOp::Gt => ((b as i64) > (a as i64)) as u64,
            BinOp::Lt => ((b as i64) < (a as i64)) as u64,
            BinOp::Shr => b.wrapping_shr(a as u32),
            BinOp::Shl => b.wrapping_shl(a as u32),
            BinOp::Or => b | a,
            BinOp::And => b & a,
        }
    }

    /// NASM lines computing the result, with `a` in `rax`, `b` in `rbx`.
    /// The result is left in the register returned alongside.
    pub fn asm(self) -> (&'static [&'static str], &'static str) {
        match self {
            BinOp::Add => (&["add rbx, rax"], "rbx"),
            BinOp::Sub => (&["sub rbx, rax"], "rbx"),
            BinOp::Mul => (&["imul rbx, rax"], "rbx"),
            BinOp::Eq => (COMPARE_EQ, "rcx"),
            BinOp::Gt => (COMPARE_GT, "rcx"),
            BinOp::Lt => (COMPARE_LT, "rcx"),
            BinOp::Shr => (&["mov rcx, rax", "shr rbx, cl"], "rbx"),
            BinOp::Shl => (&["mov rcx, rax", "shl rbx, cl"], "rbx"),
            BinOp::Or => (&["or rbx, rax"], "rbx"),
            BinOp::And => (&["and rbx, rax"], "rbx"),
        }
    }
}

const COMPARE_EQ: &[&str] = &["xor rcx, rcx", "mov rdx, 1", "cmp rbx, rax", "cmove rcx, rdx"];
const COMPARE_GT: &[&str] = &["xor rcx, rcx", "mov rdx, 1", "cmp rbx, rax", "cmovg rcx, rdx"];
const COMPARE_LT: &[&str] = &["xor rcx, rcx", "mov rdx, 1", "cmp rbx, rax", "cmovl rcx, rdx"];
