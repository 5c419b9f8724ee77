mod run_c;

use clap::Parser;
use compiler::{Config, Error, Target};
use owo_colors::OwoColorize;
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};
use std::fs;
use std::io::stderr;
use std::path::PathBuf;
use std::process::exit;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory of the main package
    dir: PathBuf,
    #[arg(short('c'), long)]
    /// Output generated c code
    emit_c: bool,
    #[arg(short('g'), long, conflicts_with = "emit_c")]
    /// Output the flattened go program
    emit_go: bool,
    #[arg(short, long)]
    /// Write generated c code to a file
    output: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    /// Directory import paths are resolved against
    src_root: PathBuf,
    #[arg(long, default_value_t = 8, value_parser = parse_int_size)]
    /// Size of `int` in bytes
    int_size: usize,
    #[arg(long, default_value = "clang")]
    /// C compiler used to run the program
    cc: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    /// Extra options passed to the c compiler
    cc_options: String,
    #[arg(short, long, action = clap::ArgAction::Count)]
    /// Log more; repeat for debug output
    verbose: u8,
}

fn parse_int_size(s: &str) -> Result<usize, String> {
    match s.parse() {
        Ok(n @ (4 | 8)) => Ok(n),
        _ => Err(format!("`{s}` is not 4 or 8")),
    }
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
    match run(&args) {
        Ok(code) => exit(code),
        Err(e @ Error::Parse { .. }) => {
            let _ = e.write(stderr());
            exit(1);
        }
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            exit(1);
        }
    }
}

fn run(args: &Args) -> Result<i32, Error> {
    let config = Config {
        src_root: args.src_root.clone(),
        target: Target {
            int_size: args.int_size,
            ..Target::default()
        },
    };
    let graph = compiler::load(&args.dir, &config)?;
    if args.emit_go {
        print!("{}", compiler::flatten_go(&graph)?);
        return Ok(0);
    }
    let c = compiler::compile(&graph, config.target)?;
    if args.emit_c {
        print!("{c}");
        return Ok(0);
    }
    if let Some(path) = &args.output {
        fs::write(path, &c).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        return Ok(0);
    }
    match run_c::run(&c, &args.cc, &args.cc_options) {
        Ok(status) => Ok(status.code().unwrap_or(1)),
        Err(()) => Ok(1),
    }
}
