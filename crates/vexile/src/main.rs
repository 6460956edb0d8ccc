use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use vexile::config::{FileConfig, DEFAULT_CONFIG_FILE};
use vexile::{Engine, Preset, Protector, Tuning};
use vexile_compiler::disasm::disassemble;

#[derive(Parser, Debug)]
#[command(name = "vexile", version, about = "Protect a Lua or JavaScript script")]
struct Cli {
    /// Script to protect (stdin when absent or `-`)
    input: Option<PathBuf>,

    /// Write the artifact here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// LuaU or JavaScript
    #[arg(long)]
    engine: Option<Engine>,

    /// Fast, Medium, High, Test or Custom
    #[arg(long)]
    preset: Option<Preset>,

    /// Reproducible output for a fixed seed
    #[arg(long)]
    seed: Option<u64>,

    /// Configuration file (defaults to ./vexile.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the bytecode listing to stderr
    #[arg(long)]
    disasm: bool,

    /// -v for debug logs, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file = load_config(cli.config.as_deref())?;
    let engine = cli.engine.or(file.engine).unwrap_or_default();
    let preset = cli.preset.or(file.preset).unwrap_or_default();
    let seed = cli.seed.or(file.seed);

    let tuning = file.tuning.apply(Tuning::for_preset(preset));
    let mut protector = Protector::new(engine, preset, file.custom)?.tuning(tuning);
    if let Some(seed) = seed {
        protector = protector.seed(seed);
    }

    let source = read_input(cli.input.as_deref())?;
    let artifact = protector.build(&source)?;

    if cli.disasm {
        match &artifact.unit {
            Some(unit) => eprint!("{}", disassemble(unit)),
            None => eprintln!("vexile: no bytecode (virtualization is off for this run)"),
        }
    }

    match &cli.output {
        Some(path) => fs::write(path, &artifact.text)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(artifact.text.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !path.exists() {
                return Ok(FileConfig::default());
            }
            path
        }
    };
    let text = fs::read_to_string(&path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    FileConfig::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).with_context(|| format!("cannot open {}", path.display()))
        }
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            if buf.is_empty() {
                bail!("no input: pass a script path or pipe one on stdin");
            }
            Ok(buf)
        }
    }
}
