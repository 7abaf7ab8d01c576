use std::fs;
use std::io::IsTerminal;

use milopt::Result;
use milopt::cli::Cli;
use milopt::frontend;
use milopt::optimizer::Optimizer;
use milopt::optimizer::registry::global_registry;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let registry = global_registry()?;

    if cli.list {
        for identifier in registry.identifiers() {
            println!("{identifier}");
        }
        return Ok(());
    }

    let mut program = frontend::compile(&cli.program)?;
    let optimizer = Optimizer::new(registry).with_verification(cli.verify);
    if cli.passes.is_empty() {
        optimizer.run_all(&mut program)?;
    } else {
        optimizer.run(&mut program, cli.passes.as_slice())?;
    }

    match &cli.output {
        Some(path) => fs::write(path, program.to_string())?,
        None => print!("{program}"),
    }
    Ok(())
}
