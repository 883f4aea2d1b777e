use std::collections::HashSet;
use std::io::{self, Write};

use thiserror::Error;

use crate::bytecode::{Instruction, Op, Program};

// =============================================================================
// Text disassembly
// =============================================================================

/// Write a human readable listing, one instruction per line.
pub fn write_disasm(program: &Program, out: &mut dyn Write) -> io::Result<()> {
    let jump_targets = collect_jump_targets(program);

    writeln!(out, "════════════════════════════════════════")?;
    writeln!(out, " {} instructions", program.len())?;
    writeln!(out, "════════════════════════════════════════")?;

    for (ip, instr) in program.instrs.iter().enumerate() {
        let is_target = jump_targets.contains(&ip);
        if is_target {
            writeln!(out, "      ┌──────────────────────────────────")?;
        }
        let marker = if is_target { "► " } else { "  " };
        writeln!(out, "{:04} {}{}", ip, marker, format_instruction(ip, instr))?;
    }

    // the fall-off-the-end address is a valid target too
    if jump_targets.contains(&program.len()) {
        writeln!(out, "      ┌──────────────────────────────────")?;
        writeln!(out, "{:04} ► <exit>", program.len())?;
    }

    Ok(())
}

/// Return disassembly as a String
pub fn disassemble_to_string(program: &Program) -> String {
    let mut buf: Vec<u8> = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_disasm(program, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

fn collect_jump_targets(program: &Program) -> HashSet<usize> {
    program.instrs.iter().filter_map(|instr| instr.jump).collect()
}

fn format_instruction(ip: usize, instr: &Instruction) -> String {
    let mnemonic = instr.op.name().to_uppercase().replace('-', "_");
    let operand = match &instr.op {
        Op::PushInt(v) => v.to_string(),
        Op::PushStr(s) => format!("{:?}", s),
        Op::DupN(n) | Op::Syscall(n) => n.to_string(),
        Op::ProcCall(name) | Op::ProcBegin(name) | Op::Ident(name) => name.clone(),
        Op::Comment(text) => text.clone(),
        _ => String::new(),
    };

    let mut line = format!("{:<12}{}", mnemonic, operand);
    if let Some(target) = instr.jump {
        let direction = if target <= ip { "↑" } else { "↓" };
        line = format!("{:<28}{} (→ {:04})", line.trim_end(), direction, target);
    }
    format!("{:<44}; {}", line.trim_end(), instr.loc)
}

// =============================================================================
// JSON lines dump
// =============================================================================

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("line {line}: expected `index: instruction`")]
    MissingSeparator { line: usize },

    #[error("line {line}: expected index {expected}, found `{found}`")]
    BadIndex {
        line: usize,
        expected: usize,
        found: String,
    },

    #[error("line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Write `index: {json}` lines, one per instruction.
pub fn write_dump_json(program: &Program, out: &mut dyn Write) -> io::Result<()> {
    for (ip, instr) in program.instrs.iter().enumerate() {
        let json = serde_json::to_string(instr).map_err(io::Error::other)?;
        writeln!(out, "{}: {}", ip, json)?;
    }
    Ok(())
}

/// Read back the output of [`write_dump_json`]. Blank lines are skipped;
/// indices must count up from zero.
pub fn parse_dump(text: &str) -> Result<Program, DumpError> {
    let mut instrs = Vec::new();

    for (lineno, raw) in text.lines().enumerate() {
        let line = lineno + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let (index, json) = raw
            .split_once(": ")
            .ok_or(DumpError::MissingSeparator { line })?;

        let expected = instrs.len();
        if index.trim().parse::<usize>().ok() != Some(expected) {
            return Err(DumpError::BadIndex {
                line,
                expected,
                found: index.to_string(),
            });
        }

        let instr: Instruction =
            serde_json::from_str(json).map_err(|source| DumpError::Json { line, source })?;
        instrs.push(instr);
    }

    Ok(Program::new(instrs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::resolve::resolve;
    use crate::frontend::{lexer::Lexer, parser::Parser};

    fn program(source: &str) -> Program {
        let tokens = Lexer::new(source, "d.cdr").tokenize().unwrap();
        resolve(Parser::new(tokens).parse().unwrap()).unwrap()
    }

    #[test]
    fn test_disasm_lists_every_instruction() {
        let p = program("1 2 + .");
        let text = disassemble_to_string(&p);
        assert!(text.contains("4 instructions"));
        assert!(text.contains("0000   PUSH_INT    1"));
        assert!(text.contains("ADD"));
        assert!(text.contains("PRINT"));
        assert!(text.contains("; d.cdr:1:7"));
    }

    #[test]
    fn test_disasm_marks_jump_targets() {
        // 0:1 1:if 2:2 3:. 4:end
        let p = program("1 if 2 . end");
        let text = disassemble_to_string(&p);
        assert!(text.contains("0004 ► END"));
        assert!(text.contains("(→ 0004)"));
        assert!(text.contains("0005 ► <exit>"));
    }

    #[test]
    fn test_disasm_loop_points_up() {
        let p = program("while 1 do end");
        let text = disassemble_to_string(&p);
        assert!(text.contains("↑ (→ 0000)"));
    }

    #[test]
    fn test_disasm_shows_names_and_strings() {
        let p = program("proc greet \"hi\\n\" end greet");
        let text = disassemble_to_string(&p);
        assert!(text.contains("PROC_BEGIN  greet"));
        assert!(text.contains("\"hi\\n\""));
        assert!(text.contains("CALL        greet"));
    }

    #[test]
    fn test_dump_roundtrip_preserves_jumps() {
        let p = program("10 while dup 0 > do dup . 1 - end proc f 1 if 2 else 3 end end f");
        let mut buf: Vec<u8> = Vec::new();
        write_dump_json(&p, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("0: {"));
        assert_eq!(parse_dump(&text).unwrap(), p);
    }

    #[test]
    fn test_parse_dump_rejects_out_of_order_index() {
        let p = program("1 2");
        let mut buf: Vec<u8> = Vec::new();
        write_dump_json(&p, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap().replacen("1: ", "7: ", 1);

        assert!(matches!(
            parse_dump(&text),
            Err(DumpError::BadIndex {
                line: 2,
                expected: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_dump_errors() {
        assert!(matches!(
            parse_dump("no separator here"),
            Err(DumpError::MissingSeparator { line: 1 })
        ));
        assert!(matches!(
            parse_dump("0: {not json}"),
            Err(DumpError::Json { line: 1, .. })
        ));
        assert!(parse_dump("\n\n").unwrap().is_empty());
    }
}
