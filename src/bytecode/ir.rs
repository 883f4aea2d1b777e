use crate::bytecode::Op;
use crate::frontend::token::Loc;
use serde::{Deserialize, Serialize};

/// A single instruction with its origin.
///
/// `jump` holds an instruction index and is only meaningful for control
/// instructions (see [`Op::has_jump`]). The resolver writes it once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Op,
    pub loc: Loc,
    pub jump: Option<usize>,
}

impl Instruction {
    pub fn new(op: Op, loc: Loc) -> Self {
        Self { op, loc, jump: None }
    }
}

/// A resolved program: jump-linked, macro-expanded, identifier-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub instrs: Vec<Instruction>,
}

impl Program {
    pub fn new(instrs: Vec<Instruction>) -> Self {
        Self { instrs }
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Encode as a compact binary image.
    pub fn to_image(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_image(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// A macro body, captured verbatim at its definition site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub loc: Loc,
    pub body: Vec<Instruction>,
}

/// What a defined name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Known {
    /// Index of the procedure's `ProcBegin` instruction.
    Procedure { entry: usize },
    Macro(Macro),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Loc {
        Loc::new("ir.cdr", 1, 1)
    }

    #[test]
    fn test_image_roundtrip_keeps_jumps() {
        let mut cond = Instruction::new(Op::If, loc());
        cond.jump = Some(3);
        let program = Program::new(vec![
            Instruction::new(Op::PushInt(1), loc()),
            cond,
            Instruction::new(Op::PushStr("hi\n".to_string()), loc()),
            Instruction::new(Op::Syscall(3), loc()),
        ]);

        let bytes = program.to_image().unwrap();
        let decoded = Program::from_image(&bytes).unwrap();
        assert_eq!(decoded, program);
        assert_eq!(decoded.instrs[1].jump, Some(3));
    }

    #[test]
    fn test_image_rejects_garbage() {
        assert!(Program::from_image(&[0xff, 0xff, 0xff]).is_err());
    }
}
