use std::collections::HashSet;
use std::io::Write;

use crate::bytecode::{Instruction, Op, Program};
use crate::frontend::token::Loc;
use crate::runtime::memory::{Memory, Slot, StaticLayout};
use crate::runtime::runtime_error::RuntimeError;
use crate::runtime::syscall::{self, Stream, Syscall};

#[derive(Debug, Clone)]
pub struct InterpConfig {
    /// Bytes reserved for string literals; `mem` points just past them.
    pub static_cap: usize,
    /// Bytes of zero-initialized memory after the static segment.
    pub mem_cap: usize,
    /// Maximum number of pending procedure returns.
    pub proc_stack_cap: usize,
    /// Finish each stream a program wrote to with one newline.
    pub trailing_newline: bool,
    pub max_steps: Option<usize>,
}

impl Default for InterpConfig {
    fn default() -> Self {
        InterpConfig {
            static_cap: 64 * 1024,
            mem_cap: 64 * 1024,
            proc_stack_cap: 1024,
            trailing_newline: true,
            max_steps: None,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fell off the end of the program.
    Finished,
    /// Stopped by the exit syscall, with the process status it requested.
    Exit(i32),
}

enum Flow {
    Next,
    Jump(usize),
    Exit(i32),
}

pub struct Interpreter {
    stack: Vec<u64>,
    memory: Memory,
    layout: StaticLayout,
    interned: HashSet<Slot>,
    static_used: usize,
    call_stack: Vec<usize>,
    config: InterpConfig,
    steps: usize,
    wrote_stdout: bool,
    wrote_stderr: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpConfig::default())
    }

    pub fn with_config(config: InterpConfig) -> Self {
        Self {
            stack: Vec::new(),
            memory: Memory::new(0),
            layout: StaticLayout::default(),
            interned: HashSet::new(),
            static_used: 0,
            call_stack: Vec::new(),
            config,
            steps: 0,
            wrote_stdout: false,
            wrote_stderr: false,
        }
    }

    pub fn stack(&self) -> &[u64] {
        &self.stack
    }

    /// Static segment bytes filled by literals the last run actually pushed.
    pub fn static_used(&self) -> usize {
        self.static_used
    }

    pub fn config(&self) -> &InterpConfig {
        &self.config
    }

    fn reset(&mut self, program: &Program) {
        self.stack.clear();
        self.memory = Memory::new(self.config.static_cap + self.config.mem_cap);
        self.layout = StaticLayout::from_program(program);
        // literals occupy their slots before any instruction runs, as in the
        // compiled image; slots past `static_cap` fail when first pushed
        let cap = self.config.static_cap;
        for (bytes, slot) in self.layout.iter().filter(|(_, slot)| slot.end() <= cap) {
            self.memory.write(slot.offset, bytes);
        }
        self.interned.clear();
        self.static_used = 0;
        self.call_stack.clear();
        self.steps = 0;
        self.wrote_stdout = false;
        self.wrote_stderr = false;
    }

    /// Execute `program` from its first instruction, writing program output
    /// to `stdout` / `stderr`.
    pub fn run(
        &mut self,
        program: &Program,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<Outcome, RuntimeError> {
        self.reset(program);

        let mut ip = 0;
        while let Some(instr) = program.instrs.get(ip) {
            self.check_limits(instr)?;

            ip = match self.step(ip, instr, stdout, stderr)? {
                Flow::Next => ip + 1,
                Flow::Jump(target) => target,
                Flow::Exit(status) => {
                    flush(stdout, stderr, instr)?;
                    return Ok(Outcome::Exit(status));
                }
            };
        }

        if self.config.trailing_newline {
            let io = |source: std::io::Error| RuntimeError::Io {
                loc: end_loc(program),
                source,
            };
            if self.wrote_stdout {
                stdout.write_all(b"\n").map_err(io)?;
            }
            if self.wrote_stderr {
                stderr.write_all(b"\n").map_err(io)?;
            }
        }
        stdout.flush().and_then(|_| stderr.flush()).map_err(|source| RuntimeError::Io {
            loc: end_loc(program),
            source,
        })?;

        Ok(Outcome::Finished)
    }

    fn check_limits(&mut self, instr: &Instruction) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(limit) = self.config.max_steps {
            if self.steps > limit {
                return Err(RuntimeError::StepLimitExceeded {
                    limit,
                    loc: instr.loc.clone(),
                });
            }
        }

        Ok(())
    }

    fn step(
        &mut self,
        ip: usize,
        instr: &Instruction,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<Flow, RuntimeError> {
        match &instr.op {
            // Literals
            Op::PushInt(v) => self.stack.push(*v),
            Op::PushStr(text) => {
                let slot = self.intern(text.as_bytes(), instr)?;
                self.stack.push(slot.len as u64);
                self.stack.push(slot.offset as u64);
            }

            // Stack operations
            Op::Drop => {
                self.pop(instr)?;
            }
            Op::Dup => {
                let a = self.pop(instr)?;
                self.stack.push(a);
                self.stack.push(a);
            }
            Op::DupN(n) => {
                let n = usize::from(*n);
                let Some(start) = self.stack.len().checked_sub(n) else {
                    return Err(underflow(instr));
                };
                self.stack.extend_from_within(start..);
            }
            Op::Swap => {
                let a = self.pop(instr)?;
                let b = self.pop(instr)?;
                self.stack.push(a);
                self.stack.push(b);
            }
            Op::Over => {
                let a = self.pop(instr)?;
                let b = self.pop(instr)?;
                self.stack.push(b);
                self.stack.push(a);
                self.stack.push(b);
            }
            Op::Rot => {
                let a = self.pop(instr)?;
                let b = self.pop(instr)?;
                let c = self.pop(instr)?;
                self.stack.push(b);
                self.stack.push(a);
                self.stack.push(c);
            }

            // Arithmetic, comparison and bitwise
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
                let Some(bin) = op.binary() else {
                    return Err(unresolved(instr));
                };
                let a = self.pop(instr)?;
                let b = self.pop(instr)?;
                self.stack.push(bin.eval(b, a));
            }

            // Debug
            Op::Print => {
                let a = self.pop(instr)?;
                writeln!(stdout, "{}", a).map_err(|source| io_error(instr, source))?;
            }
            Op::Comment(_) => {}

            // Control flow
            Op::If | Op::Do => {
                if self.pop(instr)? == 0 {
                    return Ok(Flow::Jump(target(instr)?));
                }
            }
            Op::Else | Op::End | Op::ProcDef => return Ok(Flow::Jump(target(instr)?)),
            Op::While | Op::ProcBegin(_) => {}

            // Memory
            Op::Mem => self.stack.push(self.config.static_cap as u64),
            Op::Load => {
                let addr = self.pop(instr)?;
                let byte = self
                    .memory
                    .load(addr)
                    .ok_or_else(|| self.out_of_bounds(addr, instr))?;
                self.stack.push(u64::from(byte));
            }
            Op::Store => {
                let value = self.pop(instr)?;
                let addr = self.pop(instr)?;
                if self.memory.store(addr, (value & 0xff) as u8).is_none() {
                    return Err(self.out_of_bounds(addr, instr));
                }
            }

            // Procedures
            Op::ProcCall(_) => {
                let entry = target(instr)?;
                if self.call_stack.len() >= self.config.proc_stack_cap {
                    return Err(RuntimeError::CallStackOverflow {
                        cap: self.config.proc_stack_cap,
                        loc: instr.loc.clone(),
                    });
                }
                self.call_stack.push(ip + 1);
                return Ok(Flow::Jump(entry));
            }
            Op::ProcRet => {
                let ret = self
                    .call_stack
                    .pop()
                    .ok_or_else(|| RuntimeError::CallStackUnderflow {
                        loc: instr.loc.clone(),
                    })?;
                return Ok(Flow::Jump(ret));
            }

            Op::Syscall(arity) => return self.syscall(*arity, instr, stdout, stderr),

            Op::Ident(_) | Op::MacroDef => return Err(unresolved(instr)),
        }

        Ok(Flow::Next)
    }

    fn syscall<'a>(
        &mut self,
        arity: u8,
        instr: &Instruction,
        stdout: &'a mut dyn Write,
        stderr: &'a mut dyn Write,
    ) -> Result<Flow, RuntimeError> {
        let number = self.pop(instr)?;
        let args = (0..arity)
            .map(|_| self.pop(instr))
            .collect::<Result<Vec<_>, _>>()?;

        match Syscall::decode(number, &args, &instr.loc)? {
            Syscall::Write { stream, addr, len } => {
                let bytes = self
                    .memory
                    .slice(addr, len)
                    .ok_or_else(|| self.out_of_bounds(addr.saturating_add(len), instr))?;
                let out = match stream {
                    Stream::Stdout => {
                        self.wrote_stdout = true;
                        &mut *stdout
                    }
                    Stream::Stderr => {
                        self.wrote_stderr = true;
                        &mut *stderr
                    }
                };
                out.write_all(bytes)
                    .map_err(|source| io_error(instr, source))?;
                Ok(Flow::Next)
            }
            Syscall::Exit { code } => Ok(Flow::Exit(syscall::exit_status(code))),
        }
    }

    /// Account for a literal the first time it is pushed. Its bytes are
    /// already in place from `reset`.
    fn intern(&mut self, bytes: &[u8], instr: &Instruction) -> Result<Slot, RuntimeError> {
        let slot = self.layout.slot(bytes).ok_or_else(|| unresolved(instr))?;
        if self.interned.contains(&slot) {
            return Ok(slot);
        }

        if slot.end() > self.config.static_cap {
            return Err(RuntimeError::StaticSegmentExhausted {
                start: slot.offset,
                end: slot.end(),
                cap: self.config.static_cap,
                loc: instr.loc.clone(),
            });
        }
        self.interned.insert(slot);
        self.static_used += slot.len;

        Ok(slot)
    }

    // Stack helpers

    fn pop(&mut self, instr: &Instruction) -> Result<u64, RuntimeError> {
        self.stack.pop().ok_or_else(|| underflow(instr))
    }

    fn out_of_bounds(&self, addr: u64, instr: &Instruction) -> RuntimeError {
        RuntimeError::OutOfBounds {
            addr,
            size: self.memory.len(),
            loc: instr.loc.clone(),
        }
    }
}

fn target(instr: &Instruction) -> Result<usize, RuntimeError> {
    instr.jump.ok_or_else(|| unresolved(instr))
}

fn underflow(instr: &Instruction) -> RuntimeError {
    RuntimeError::StackUnderflow {
        op: instr.op.name(),
        loc: instr.loc.clone(),
    }
}

fn unresolved(instr: &Instruction) -> RuntimeError {
    RuntimeError::Unresolved {
        op: instr.op.name(),
        loc: instr.loc.clone(),
    }
}

fn io_error(instr: &Instruction, source: std::io::Error) -> RuntimeError {
    RuntimeError::Io {
        loc: instr.loc.clone(),
        source,
    }
}

fn flush(
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    instr: &Instruction,
) -> Result<(), RuntimeError> {
    stdout
        .flush()
        .and_then(|_| stderr.flush())
        .map_err(|source| io_error(instr, source))
}

fn end_loc(program: &Program) -> Loc {
    program
        .instrs
        .last()
        .map(|instr| instr.loc.clone())
        .unwrap_or_else(|| Loc::new("<program>", 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::resolve::resolve;
    use crate::frontend::{lexer::Lexer, parser::Parser};

    // ============================================================
    // Test Helpers

    struct Run {
        result: Result<Outcome, RuntimeError>,
        stack: Vec<u64>,
        stdout: String,
        stderr: String,
        static_used: usize,
    }

    fn program(source: &str) -> Program {
        let tokens = Lexer::new(source, "i.cdr").tokenize().unwrap();
        resolve(Parser::new(tokens).parse().unwrap()).unwrap()
    }

    /// Test default: no trailing newline, so output is exactly what the
    /// program wrote.
    fn config() -> InterpConfig {
        InterpConfig {
            trailing_newline: false,
            ..InterpConfig::default()
        }
    }

    fn run_program_with_config(program: &Program, config: InterpConfig) -> Run {
        let mut interp = Interpreter::with_config(config);
        let mut stdout: Vec<u8> = Vec::new();
        let mut stderr: Vec<u8> = Vec::new();
        let result = interp.run(program, &mut stdout, &mut stderr);
        Run {
            result,
            stack: interp.stack().to_vec(),
            stdout: String::from_utf8(stdout).unwrap(),
            stderr: String::from_utf8(stderr).unwrap(),
            static_used: interp.static_used(),
        }
    }

    fn run_with_config(source: &str, config: InterpConfig) -> Run {
        run_program_with_config(&program(source), config)
    }

    fn run(source: &str) -> Run {
        run_with_config(source, config())
    }

    /// Assert that running code produces expected stack
    fn assert_stack(source: &str, expected: &[u64]) {
        let r = run(source);
        assert!(r.result.is_ok(), "source: {}: {:?}", source, r.result);
        assert_eq!(r.stack, expected, "source: {}", source);
    }

    /// Assert that running code prints exactly `expected` to stdout
    fn assert_output(source: &str, expected: &str) {
        let r = run(source);
        assert!(r.result.is_ok(), "source: {}: {:?}", source, r.result);
        assert_eq!(r.stdout, expected, "source: {}", source);
    }

    /// Assert that running code produces an error containing substring
    fn assert_error(source: &str, contains: &str) {
        match run(source).result {
            Ok(outcome) => panic!("expected error '{}', got {:?}", contains, outcome),
            Err(e) => assert!(
                e.to_string().contains(contains),
                "expected '{}' in error, got: {}",
                contains,
                e
            ),
        }
    }

    // ============================================================
    // Scenarios

    #[test]
    fn test_add_and_print() {
        assert_output("2 3 + .", "5\n");
    }

    #[test]
    fn test_if_else_branches() {
        assert_output("1 if 2 . else 3 . end", "2\n");
        assert_output("0 if 2 . else 3 . end", "3\n");
        assert_output("0 if 2 . end 4 .", "4\n");
    }

    #[test]
    fn test_while_countdown() {
        let expected: String = (1..=10).rev().map(|n| format!("{}\n", n)).collect();
        assert_output("10 while dup 0 > do dup . 1 - end", &expected);
    }

    #[test]
    fn test_macro_square() {
        assert_output("macro sq dup * end 4 sq .", "16\n");
    }

    #[test]
    fn test_empty_program() {
        let r = run("");
        assert_eq!(r.result.unwrap(), Outcome::Finished);
        assert!(r.stdout.is_empty());
    }

    // ============================================================
    // Stack operations

    #[test]
    fn test_stack_shuffles() {
        assert_stack("1 2 drop", &[1]);
        assert_stack("1 dup", &[1, 1]);
        assert_stack("1 2 swap", &[2, 1]);
        assert_stack("1 2 over", &[1, 2, 1]);
        assert_stack("1 2 3 rot", &[2, 3, 1]);
    }

    #[test]
    fn test_dup_n_preserves_order() {
        assert_stack("1 2 (2)dup", &[1, 2, 1, 2]);
        assert_stack("9 1 2 3 (3)dup", &[9, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_underflow() {
        assert_error("+", "stack underflow in `add`");
        assert_error("1 swap", "stack underflow in `swap`");
        assert_error("1 (2)dup", "stack underflow in `dup-n`");
        assert_error(".", "stack underflow in `print`");
    }

    // ============================================================
    // Arithmetic

    #[test]
    fn test_operand_order() {
        assert_stack("10 3 -", &[7]);
        assert_stack("1 4 shl", &[16]);
        assert_stack("256 4 shr", &[16]);
        assert_stack("3 2 >", &[1]);
        assert_stack("3 2 <", &[0]);
    }

    #[test]
    fn test_wrapping_and_signed_compare() {
        assert_output("0 1 - .", "18446744073709551615\n");
        assert_stack("0 1 - 0 <", &[1]);
        assert_stack("5 5 =", &[1]);
        assert_stack("12 10 and 12 10 or", &[8, 14]);
    }

    // ============================================================
    // Memory

    #[test]
    fn test_mem_is_static_cap() {
        assert_stack("mem", &[64 * 1024]);
    }

    #[test]
    fn test_store_and_load_byte() {
        assert_output("mem 65 ! mem @ .", "65\n");
        assert_stack("mem 1 + 300 ! mem 1 + @", &[44]);
    }

    #[test]
    fn test_dynamic_memory_starts_zeroed() {
        assert_stack("mem 100 + @", &[0]);
    }

    #[test]
    fn test_out_of_bounds() {
        assert_error("18446744073709551615 @", "out of bounds");
        assert_error("mem 65536 + 1 !", "out of bounds");
    }

    #[test]
    fn test_write_from_dynamic_memory() {
        assert_output("mem 72 ! mem 1 + 105 ! 2 mem 1 1 (3)syscall", "Hi");
    }

    // ============================================================
    // Strings and syscalls

    #[test]
    fn test_hello_world() {
        assert_output("\"Hello, World\\n\" 1 1 (3)syscall", "Hello, World\n");
    }

    #[test]
    fn test_write_to_stderr() {
        let r = run("\"oops\" 2 1 (3)syscall");
        assert!(r.result.is_ok());
        assert!(r.stdout.is_empty());
        assert_eq!(r.stderr, "oops");
    }

    #[test]
    fn test_same_literal_same_address() {
        let r = run("\"ab\" \"ab\"");
        assert_eq!(r.stack, vec![2, 0, 2, 0]);
        assert_eq!(r.static_used, 2);
    }

    #[test]
    fn test_distinct_literals_disjoint() {
        let r = run("\"ab\" \"cde\"");
        assert_eq!(r.stack, vec![2, 0, 3, 2]);
        assert_eq!(r.static_used, 5);
    }

    #[test]
    fn test_literal_in_untaken_branch_not_interned() {
        let r = run("0 if \"skipped\" drop drop end \"hit\"");
        assert_eq!(r.static_used, 3);
        // layout offsets are fixed by instruction order
        assert_eq!(r.stack, vec![3, 7]);
    }

    #[test]
    fn test_literal_repeated_in_loop_interned_once() {
        let r = run("3 while dup 0 > do \"x\" drop drop 1 - end drop");
        assert!(r.result.is_ok());
        assert_eq!(r.static_used, 1);
    }

    #[test]
    fn test_static_bytes_readable_before_literal_runs() {
        let r = run("0 @ . 1 @ . \"AB\" drop drop");
        assert!(r.result.is_ok());
        assert_eq!(r.stdout, "65\n66\n");
        assert_eq!(r.static_used, 2);
    }

    #[test]
    fn test_untaken_literal_still_in_static_segment() {
        let r = run("0 if \"xyz\" drop drop end 2 @");
        assert_eq!(r.stack, vec![u64::from(b'z')]);
        assert_eq!(r.static_used, 0);
    }

    #[test]
    fn test_static_segment_exhausted() {
        let r = run_with_config(
            "\"ab\" \"cd\"",
            InterpConfig {
                static_cap: 3,
                ..config()
            },
        );
        assert!(matches!(
            r.result,
            Err(RuntimeError::StaticSegmentExhausted {
                start: 2,
                end: 4,
                cap: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_static_limit_follows_literal_table_order() {
        let r = run_with_config(
            "0 if \"abcd\" drop drop end \"x\" drop drop",
            InterpConfig {
                static_cap: 3,
                ..config()
            },
        );
        assert!(matches!(
            r.result,
            Err(RuntimeError::StaticSegmentExhausted {
                start: 4,
                end: 5,
                cap: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_exit_stops_and_skips_trailing_newline() {
        let r = run_with_config(
            "\"bye\" 1 1 (3)syscall 7 60 (1)syscall 1 .",
            InterpConfig::default(),
        );
        assert_eq!(r.result.unwrap(), Outcome::Exit(7));
        assert_eq!(r.stdout, "bye");
    }

    #[test]
    fn test_trailing_newline_after_write() {
        let r = run_with_config("\"a\" 1 1 (3)syscall \"b\" 2 1 (3)syscall", InterpConfig::default());
        assert_eq!(r.result.unwrap(), Outcome::Finished);
        assert_eq!(r.stdout, "a\n");
        assert_eq!(r.stderr, "b\n");
    }

    #[test]
    fn test_no_trailing_newline_without_write() {
        let r = run_with_config("1 .", InterpConfig::default());
        assert_eq!(r.stdout, "1\n");
        assert!(r.stderr.is_empty());
    }

    #[test]
    fn test_syscall_errors() {
        assert_error("0 0 0 1 (3)syscall", "unsupported file descriptor 0");
        assert_error("1 2 3 99 (3)syscall", "unknown syscall 99");
        assert_error("1 1 (1)syscall", "needs 3 arguments, got 1");
        assert_error("1 1 (3)syscall", "stack underflow in `syscall`");
        assert_error("\"ab\" drop 100000000 1 1 (3)syscall", "out of bounds");
    }

    // ============================================================
    // Procedures

    #[test]
    fn test_procedure_call() {
        assert_output("proc inc 1 + end 5 inc .", "6\n");
        assert_output("3 inc . proc inc 1 + end", "4\n");
    }

    #[test]
    fn test_procedure_body_skipped_in_straight_line() {
        assert_output("proc loud 99 . end 1 .", "1\n");
    }

    #[test]
    fn test_recursion() {
        let src = "proc down dup if dup . 1 - down else drop end end 3 down";
        assert_output(src, "3\n2\n1\n");
    }

    #[test]
    fn test_call_stack_overflow() {
        let r = run_with_config(
            "proc f f end f",
            InterpConfig {
                proc_stack_cap: 16,
                ..config()
            },
        );
        assert!(matches!(
            r.result,
            Err(RuntimeError::CallStackOverflow { cap: 16, .. })
        ));
    }

    #[test]
    fn test_recursion_within_capacity() {
        let src = "proc down dup if 1 - down else drop end end 16 down";
        let r = run_with_config(
            src,
            InterpConfig {
                proc_stack_cap: 17,
                ..config()
            },
        );
        assert!(r.result.is_ok(), "{:?}", r.result);
    }

    #[test]
    fn test_return_without_call() {
        let loc = Loc::new("i.cdr", 1, 1);
        let program = Program::new(vec![Instruction::new(Op::ProcRet, loc)]);
        let r = run_program_with_config(&program, config());
        assert!(matches!(r.result, Err(RuntimeError::CallStackUnderflow { .. })));
    }

    #[test]
    fn test_unresolved_identifier_is_error() {
        let loc = Loc::new("i.cdr", 1, 1);
        let program = Program::new(vec![Instruction::new(Op::Ident("x".to_string()), loc)]);
        let r = run_program_with_config(&program, config());
        assert!(matches!(r.result, Err(RuntimeError::Unresolved { op: "ident", .. })));
    }

    // ============================================================
    // Limits

    #[test]
    fn test_step_limit() {
        let r = run_with_config(
            "while 1 do end",
            InterpConfig {
                max_steps: Some(100),
                ..config()
            },
        );
        assert!(matches!(
            r.result,
            Err(RuntimeError::StepLimitExceeded { limit: 100, .. })
        ));
    }

    #[test]
    fn test_interpreter_reusable() {
        let mut interp = Interpreter::with_config(config());
        let p = program("\"ab\" 1 2");
        let mut out: Vec<u8> = Vec::new();
        let mut err: Vec<u8> = Vec::new();
        interp.run(&p, &mut out, &mut err).unwrap();
        interp.run(&p, &mut out, &mut err).unwrap();
        assert_eq!(interp.stack(), &[2, 0, 1, 2]);
        assert_eq!(interp.static_used(), 2);
    }
}
