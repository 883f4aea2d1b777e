use tracing::debug;

use crate::bytecode::{Instruction, Op, Program};
use crate::codegen::codegen_error::CodegenError;
use crate::runtime::memory::StaticLayout;
use crate::runtime::syscall::{ARG_REGS, SYS_EXIT, SYS_WRITE};

#[derive(Debug, Clone)]
pub struct CodegenConfig {
    pub static_cap: usize,
    pub mem_cap: usize,
    pub proc_stack_cap: usize,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        CodegenConfig {
            static_cap: 64 * 1024,
            mem_cap: 64 * 1024,
            proc_stack_cap: 1024,
        }
    }
}

/// Registers used to shuttle values for `(N)dup`, top of stack first.
const DUP_REGS: [&str; 6] = ["rax", "rbx", "rcx", "rdx", "rdi", "rsi"];

const OVERFLOW_MESSAGE: &str = "error: procedure call stack overflow";

/// Bytes per `db` line in the static image.
const IMAGE_ROW: usize = 16;

/// Emits NASM source for x86-64 Linux.
///
/// The operand stack is the native stack. Procedure return addresses live in a
/// separate `proc_stack` region; calls swap `rsp` between the two.
pub struct CodeGenerator {
    config: CodegenConfig,
    out: String,
}

impl CodeGenerator {
    pub fn new(config: CodegenConfig) -> Self {
        Self {
            config,
            out: String::new(),
        }
    }

    pub fn generate(mut self, program: &Program) -> Result<String, CodegenError> {
        let layout = StaticLayout::from_program(program);
        if layout.size() > self.config.static_cap {
            return Err(CodegenError::StaticSegmentExhausted {
                size: layout.size(),
                cap: self.config.static_cap,
            });
        }

        self.raw("BITS 64");
        self.raw("segment .text");
        self.emit_print_u64();
        self.emit_overflow_handler();
        self.emit_start(&layout);

        for (i, instr) in program.instrs.iter().enumerate() {
            self.label(&format!("addr_{}", i));
            self.emit_instruction(i, instr, &layout)?;
        }

        self.label(&format!("addr_{}", program.len()));
        self.ins(format!("mov rax, {}", SYS_EXIT));
        self.ins("mov rdi, 0");
        self.ins("syscall");

        self.emit_data(&layout);

        debug!(
            instructions = program.len(),
            bytes = self.out.len(),
            "assembly generated"
        );

        Ok(self.out)
    }

    // =========================================================================
    // Output helpers
    // =========================================================================

    fn raw(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn label(&mut self, name: &str) {
        self.out.push_str(name);
        self.out.push_str(":\n");
    }

    fn ins(&mut self, text: impl AsRef<str>) {
        self.out.push_str("    ");
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    // =========================================================================
    // Fixed routines
    // =========================================================================

    /// `print_u64`: writes `rdi` as unsigned decimal plus a newline to fd 1.
    fn emit_print_u64(&mut self) {
        self.label("print_u64");
        for line in [
            "mov rax, rdi",
            "mov rcx, 10",
            "sub rsp, 32",
            "lea rsi, [rsp+31]",
            "mov byte [rsi], 10",
            "mov r8, 1",
        ] {
            self.ins(line);
        }
        self.label(".digit");
        for line in [
            "xor rdx, rdx",
            "div rcx",
            "add dl, '0'",
            "dec rsi",
            "mov [rsi], dl",
            "inc r8",
            "test rax, rax",
            "jnz .digit",
        ] {
            self.ins(line);
        }
        self.ins(format!("mov rax, {}", SYS_WRITE));
        self.ins("mov rdi, 1");
        self.ins("mov rdx, r8");
        self.ins("syscall");
        self.ins("add rsp, 32");
        self.ins("ret");
    }

    fn emit_overflow_handler(&mut self) {
        self.label("proc_stack_overflow");
        self.ins(format!("mov rax, {}", SYS_WRITE));
        self.ins("mov rdi, 2");
        self.ins("mov rsi, proc_stack_overflow_msg");
        self.ins("mov rdx, proc_stack_overflow_msg_len");
        self.ins("syscall");
        self.ins(format!("mov rax, {}", SYS_EXIT));
        self.ins("mov rdi, 1");
        self.ins("syscall");
    }

    fn emit_start(&mut self, layout: &StaticLayout) {
        self.raw("global _start");
        self.label("_start");
        self.ins("mov rax, proc_stack_end");
        self.ins("mov [proc_stack_rsp], rax");
        if !layout.is_empty() {
            self.ins("mov rsi, static_image");
            self.ins("mov rdi, memory");
            self.ins(format!("mov rcx, {}", layout.size()));
            self.ins("rep movsb");
        }
    }

    fn emit_data(&mut self, layout: &StaticLayout) {
        self.raw("segment .rodata");
        self.label("static_image");
        for row in layout.image().chunks(IMAGE_ROW) {
            let bytes: Vec<String> = row.iter().map(|b| b.to_string()).collect();
            self.ins(format!("db {}", bytes.join(",")));
        }
        self.label("proc_stack_overflow_msg");
        self.ins(format!("db \"{}\", 10", OVERFLOW_MESSAGE));
        self.raw("proc_stack_overflow_msg_len equ $ - proc_stack_overflow_msg");

        self.raw("segment .bss");
        self.label("proc_stack_rsp");
        self.ins("resq 1");
        self.label("proc_stack");
        self.ins(format!("resq {}", self.config.proc_stack_cap));
        self.label("proc_stack_end");
        self.label("memory");
        self.ins(format!("resb {}", self.config.static_cap + self.config.mem_cap));
    }

    // =========================================================================
    // Instructions
    // =========================================================================

    fn emit_instruction(
        &mut self,
        i: usize,
        instr: &Instruction,
        layout: &StaticLayout,
    ) -> Result<(), CodegenError> {
        self.ins(format!(";; -- {} --", instr.op.name()));

        match &instr.op {
            Op::PushInt(v) => {
                self.ins(format!("mov rax, {}", v));
                self.ins("push rax");
            }
            Op::PushStr(text) => {
                let slot = layout
                    .slot(text.as_bytes())
                    .ok_or_else(|| unresolved(instr))?;
                self.ins(format!("mov rax, {}", slot.len));
                self.ins("push rax");
                self.ins(format!("mov rax, memory + {}", slot.offset));
                self.ins("push rax");
            }

            Op::Drop => self.ins("pop rax"),
            Op::Dup => {
                self.ins("pop rax");
                self.ins("push rax");
                self.ins("push rax");
            }
            Op::DupN(n) => {
                let regs = DUP_REGS
                    .get(..usize::from(*n))
                    .ok_or_else(|| invalid_arity(instr, *n))?;
                for reg in regs {
                    self.ins(format!("pop {}", reg));
                }
                for _ in 0..2 {
                    for reg in regs.iter().rev() {
                        self.ins(format!("push {}", reg));
                    }
                }
            }
            Op::Swap => {
                self.ins("pop rax");
                self.ins("pop rbx");
                self.ins("push rax");
                self.ins("push rbx");
            }
            Op::Over => {
                self.ins("pop rax");
                self.ins("pop rbx");
                self.ins("push rbx");
                self.ins("push rax");
                self.ins("push rbx");
            }
            Op::Rot => {
                self.ins("pop rax");
                self.ins("pop rbx");
                self.ins("pop rcx");
                self.ins("push rbx");
                self.ins("push rax");
                self.ins("push rcx");
            }

            op @ (Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Eq
            | Op::Gt
            | Op::Lt
            | Op::Shr
            | Op::Shl
            | Op::Or
            | Op::And) => {
                let bin = op.binary().ok_or_else(|| unresolved(instr))?;
                let (lines, result) = bin.asm();
                self.ins("pop rax");
                self.ins("pop rbx");
                for line in lines {
                    self.ins(line);
                }
                self.ins(format!("push {}", result));
            }

            Op::Print => {
                self.ins("pop rdi");
                self.ins("call print_u64");
            }
            Op::Comment(_) | Op::While => {}

            Op::If | Op::Do => {
                let target = jump_target(instr)?;
                self.ins("pop rax");
                self.ins("test rax, rax");
                self.ins(format!("jz addr_{}", target));
            }
            Op::Else | Op::ProcDef => {
                let target = jump_target(instr)?;
                self.ins(format!("jmp addr_{}", target));
            }
            Op::End => {
                let target = jump_target(instr)?;
                if target != i + 1 {
                    self.ins(format!("jmp addr_{}", target));
                }
            }

            Op::Mem => {
                self.ins(format!("mov rax, memory + {}", self.config.static_cap));
                self.ins("push rax");
            }
            Op::Load => {
                self.ins("pop rax");
                self.ins("xor rbx, rbx");
                self.ins("mov bl, [rax]");
                self.ins("push rbx");
            }
            Op::Store => {
                self.ins("pop rbx");
                self.ins("pop rax");
                self.ins("mov [rax], bl");
            }

            Op::ProcCall(_) => {
                let entry = jump_target(instr)?;
                self.ins("mov rax, rsp");
                self.ins("mov rsp, [proc_stack_rsp]");
                self.ins("mov rbx, proc_stack + 8");
                self.ins("cmp rsp, rbx");
                self.ins("jb proc_stack_overflow");
                self.ins(format!("call addr_{}", entry));
                self.ins("mov [proc_stack_rsp], rsp");
                self.ins("mov rsp, rax");
            }
            Op::ProcBegin(_) => {
                self.ins("mov [proc_stack_rsp], rsp");
                self.ins("mov rsp, rax");
            }
            Op::ProcRet => {
                self.ins("mov rax, rsp");
                self.ins("mov rsp, [proc_stack_rsp]");
                self.ins("ret");
            }

            Op::Syscall(arity) => {
                self.ins("pop rax");
                let regs = ARG_REGS
                    .get(..usize::from(*arity))
                    .ok_or_else(|| invalid_arity(instr, *arity))?;
                for reg in regs {
                    self.ins(format!("pop {}", reg));
                }
                self.ins("syscall");
            }

            Op::Ident(_) | Op::MacroDef => return Err(unresolved(instr)),
        }

        Ok(())
    }
}

fn jump_target(instr: &Instruction) -> Result<usize, CodegenError> {
    instr.jump.ok_or_else(|| unresolved(instr))
}

fn unresolved(instr: &Instruction) -> CodegenError {
    CodegenError::Unresolved {
        op: instr.op.name(),
        loc: instr.loc.clone(),
    }
}

/// Images and dumps are decoded without the parser's arity check.
fn invalid_arity(instr: &Instruction, arity: u8) -> CodegenError {
    CodegenError::InvalidArity {
        op: instr.op.name(),
        arity,
        loc: instr.loc.clone(),
    }
}

/// Generate with the given configuration.
pub fn generate(program: &Program, config: CodegenConfig) -> Result<String, CodegenError> {
    CodeGenerator::new(config).generate(program)
}
