use alla::{disassemble, Runtime, RuntimeConfig, VERSION};
use alla::utils::{generate_demo_program, write_program};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "alla-run", version)]
#[command(about = "Run compiled alla bytecode files")]
struct Cli {
    /// `.alb` files to run, in order (writes and runs `demo.alb` when empty)
    files: Vec<PathBuf>,

    /// Log every executed instruction
    #[arg(long)]
    trace: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.trace { "alla=trace" } else { "alla=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("alla bytecode runtime v{}", VERSION);

    let files = if cli.files.is_empty() {
        let demo_path = PathBuf::from("demo.alb");
        let demo = generate_demo_program();
        if let Err(e) = write_program(&demo, &demo_path) {
            error!("failed to create demo bytecode file: {}", e);
            process::exit(1);
        }
        info!("created demo bytecode file: {}", demo_path.display());
        if let Ok(listing) = disassemble(&demo) {
            print!("{}", listing);
        }
        vec![demo_path]
    } else {
        cli.files
    };

    let runtime = Runtime::with_config(
        RuntimeConfig::default()
            .with_debug_mode(true)
            .with_stack_trace(cli.trace),
    );

    let mut names = Vec::with_capacity(files.len());
    for path in &files {
        match runtime.load_file(path) {
            Ok(name) => names.push(name),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }

    let labelled = names.len() > 1;
    for name in &names {
        match runtime.execute_program(name) {
            Ok(value) if labelled => println!("{}: {}", name, value.report()),
            Ok(value) => println!("{}", value.report()),
            Err(e) => {
                eprintln!("Error: {}: {}", name, e);
                process::exit(1);
            }
        }
    }
}
