//! Pipeline glue shared by the CLI and the integration tests.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::bytecode::{Program, disasm, resolve::Resolver};
use crate::codegen::{Artifacts, CodeGenerator, toolchain};
use crate::config::{DumpFormat, RunOptions};
use crate::error::{Error, Result};
use crate::frontend::{Lexer, Parser, Token};
use crate::runtime::{InterpConfig, Interpreter, Outcome};

pub const SOURCE_EXT: &str = "cdr";
pub const IMAGE_EXT: &str = "cimg";

/// Lex, parse and resolve source text.
pub fn compile_source(source: &str, path: &str) -> Result<Program> {
    let tokens = Lexer::new(source, path).tokenize()?;
    let instrs = Parser::new(tokens).parse()?;
    let program = Resolver::new().resolve(instrs)?;
    Ok(program)
}

pub fn load_tokens(path: &Path) -> Result<Vec<Token>> {
    let source = read_source(path)?;
    Ok(Lexer::new(&source, path.display().to_string()).tokenize()?)
}

/// Load a `.cdr` source file or a `.cimg` program image.
pub fn load_program(path: &Path) -> Result<Program> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(SOURCE_EXT) => {
            let source = read_source(path)?;
            compile_source(&source, &path.display().to_string())
        }
        Some(IMAGE_EXT) => {
            let bytes = fs::read(path).map_err(|source| Error::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Program::from_image(&bytes).map_err(|source| Error::Image {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => Err(Error::UnknownExtension {
            path: path.to_path_buf(),
        }),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn dump(program: &Program, format: DumpFormat, out: &mut dyn Write) -> Result<()> {
    match format {
        DumpFormat::Text => disasm::write_disasm(program, out)?,
        DumpFormat::Json => disasm::write_dump_json(program, out)?,
    }
    Ok(())
}

pub fn write_image(program: &Program, path: &Path) -> Result<()> {
    let bytes = program.to_image().map_err(Error::Encode)?;
    fs::write(path, bytes)?;
    info!("wrote program image {} ({} instructions)", path.display(), program.len());
    Ok(())
}

/// Run `program` in the interpreter.
pub fn simulate(
    program: &Program,
    config: InterpConfig,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<Outcome> {
    let static_cap = config.static_cap;
    let mut interp = Interpreter::with_config(config);
    let outcome = interp.run(program, stdout, stderr)?;

    info!(
        "static memory used: {}/{} bytes",
        interp.static_used(),
        static_cap
    );
    Ok(outcome)
}

/// Generate assembly for `program`, then assemble and link it.
pub fn compile(program: &Program, options: &RunOptions) -> Result<Artifacts> {
    let asm = CodeGenerator::new(options.codegen_config()).generate(program)?;
    Ok(toolchain::build(&asm, &options.out_prefix)?)
}

/// Run a linked executable, relaying its trimmed stdout and raw stderr.
/// Returns the process exit code.
pub fn run_compiled(
    artifacts: &Artifacts,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let output = toolchain::run_executable(&artifacts.executable)?;

    let text = String::from_utf8_lossy(&output.stdout);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        writeln!(stdout, "{}", trimmed)?;
    }
    stderr.write_all(&output.stderr)?;

    Ok(output.code())
}

/// Compile, and run the result when `options.execute` is set. Returns the
/// executable's exit code, or 0 when it was not run.
pub fn compile_and_maybe_run(
    program: &Program,
    options: &RunOptions,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let artifacts = compile(program, options)?;
    if !options.execute {
        return Ok(0);
    }
    run_compiled(&artifacts, stdout, stderr)
}

/// Simulate, then compile and run. A simulation that ends with an exit
/// syscall still moves on to compilation.
pub fn mix(
    program: &Program,
    options: &RunOptions,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    info!("sim");
    simulate(program, options.interp_config(), stdout, stderr)?;

    info!("com");
    let artifacts = compile(program, options)?;
    run_compiled(&artifacts, stdout, stderr)
}
