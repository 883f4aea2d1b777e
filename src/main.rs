use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cinder::config::{DumpFormat, RunOptions};
use cinder::driver;
use cinder::frontend::token_dumper::TokenDumper;
use cinder::runtime::Outcome;

#[derive(Parser, Debug)]
#[command(name = "cinder")]
#[command(about = "Stack language interpreter and x86-64 compiler")]
struct Cli {
    #[command(flatten)]
    options: OptionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct OptionArgs {
    /// Output prefix for the generated .asm, .o and executable
    #[arg(short = 'o', long = "out", global = true, default_value = "./build/out")]
    out_prefix: PathBuf,

    /// Bytes reserved for string literals
    #[arg(long, global = true, default_value_t = 64 * 1024)]
    static_cap: usize,

    /// Bytes of runtime memory after the static segment
    #[arg(long, global = true, default_value_t = 64 * 1024)]
    mem_cap: usize,

    /// Maximum procedure nesting depth
    #[arg(long, global = true, default_value_t = 1024)]
    proc_stack_cap: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the located tokens of a source file
    Tokens {
        file: PathBuf,
        #[arg(long)]
        no_color: bool,
        /// Print raw token text instead of its debug form
        #[arg(long)]
        pretty: bool,
    },
    /// Print the resolved program
    Dump {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = DumpFormat::Text)]
        format: DumpFormat,
        /// Also write a binary program image (.cimg)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Run the program in the interpreter
    Sim { file: PathBuf },
    /// Compile the program to a native executable
    Com {
        file: PathBuf,
        /// Run the executable after linking
        #[arg(long)]
        run: bool,
    },
    /// Interpret, then compile and run
    Mix { file: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cinder=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> cinder::Result<u8> {
    let mut options = RunOptions {
        out_prefix: cli.options.out_prefix,
        static_cap: cli.options.static_cap,
        mem_cap: cli.options.mem_cap,
        proc_stack_cap: cli.options.proc_stack_cap,
        execute: false,
    };

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    let code = match cli.command {
        Command::Tokens {
            file,
            no_color,
            pretty,
        } => {
            let tokens = driver::load_tokens(&file)?;
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            if pretty {
                dumper = dumper.pretty();
            }
            dumper.dump(&tokens, &mut out)?;
            0
        }
        Command::Dump {
            file,
            format,
            image,
        } => {
            let program = driver::load_program(&file)?;
            driver::dump(&program, format, &mut out)?;
            if let Some(path) = image {
                driver::write_image(&program, &path)?;
            }
            0
        }
        Command::Sim { file } => {
            let program = driver::load_program(&file)?;
            match driver::simulate(&program, options.interp_config(), &mut out, &mut err)? {
                Outcome::Finished => 0,
                Outcome::Exit(status) => status,
            }
        }
        Command::Com { file, run } => {
            options.execute = run;
            let program = driver::load_program(&file)?;
            driver::compile_and_maybe_run(&program, &options, &mut out, &mut err)?
        }
        Command::Mix { file } => {
            let program = driver::load_program(&file)?;
            driver::mix(&program, &options, &mut out, &mut err)?
        }
    };

    out.flush()?;
    Ok((code & 0xff) as u8)
}
