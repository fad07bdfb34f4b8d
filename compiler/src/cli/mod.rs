//! Command-line harness for the alla compiler and VM

use std::path::{Path, PathBuf};
use std::time::Instant;

use alla::bytecode::{disassemble, Instruction, Parser as BytecodeParser, Program};
use alla::utils::encode_program;
use alla::{Runtime, RuntimeConfig, Value};
use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::codegen::Compiler;
use crate::lexer::{tokenize, Token};

#[derive(Parser)]
#[command(name = "alla", version, about = "Compile and run alla expression scripts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile and execute a source file
    Run {
        file: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },

    /// Compile and execute an inline source string
    Eval {
        source: String,
        #[command(flatten)]
        options: RunOptions,
    },

    /// Compile a source file to an `.alb` bytecode file
    Compile {
        file: PathBuf,
        /// Output path (defaults to the input with an `.alb` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print a JSON summary of the program instead of writing bytecode
        #[arg(long)]
        json: bool,
    },

    /// Print the disassembly of a source file
    Disasm { file: PathBuf },

    /// Print the token stream of a source file as JSON
    Tokens { file: PathBuf },

    /// Execute a compiled `.alb` bytecode file
    Exec {
        file: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunOptions {
    /// Print the disassembly before running
    #[arg(long)]
    pub disassemble: bool,

    /// Print constant, variable and bytecode counts
    #[arg(long)]
    pub stats: bool,

    /// Log every executed instruction and print the execution path
    #[arg(long)]
    pub trace: bool,
}

impl Cli {
    /// Whether the selected command asked for instruction tracing
    pub fn trace_requested(&self) -> bool {
        match &self.command {
            Commands::Run { options, .. }
            | Commands::Eval { options, .. }
            | Commands::Exec { options, .. } => options.trace,
            _ => false,
        }
    }
}

/// JSON view of a compiled program
#[derive(Debug, Serialize)]
pub struct ProgramSummary {
    pub constants: Vec<ConstantEntry>,
    pub variables: Vec<String>,
    pub instructions: usize,
    pub bytecode_bytes: usize,
    pub code: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct ConstantEntry {
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub value: String,
}

impl ProgramSummary {
    pub fn new(program: &Program) -> Self {
        let constants = program
            .constants
            .iter()
            .map(|constant| {
                let value = Value::from(constant);
                ConstantEntry {
                    type_name: value.type_name(),
                    value: value.to_string(),
                }
            })
            .collect();

        Self {
            constants,
            variables: program.variables.clone(),
            instructions: program.instruction_count(),
            bytecode_bytes: program.code.len(),
            code: program.code.clone(),
        }
    }
}

/// Everything one run produced, ready to print
#[derive(Debug)]
pub struct RunReport {
    pub result: Value,
    pub listing: Option<String>,
    pub stats: Option<String>,
    pub execution_path: Option<String>,
}

impl RunReport {
    fn render(&self) -> String {
        let mut out = String::new();
        if let Some(listing) = &self.listing {
            out.push_str(listing);
        }
        if let Some(path) = &self.execution_path {
            out.push_str(path);
        }
        out.push_str(&self.result.report());
        out.push('\n');
        if let Some(stats) = &self.stats {
            out.push_str(stats);
        }
        out
    }
}

#[derive(Default)]
pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn handle(&self, cli: Cli) -> Result<()> {
        match cli.command {
            Commands::Run { file, options } => {
                let source = read_source(&file).await?;
                let report = self.run_source(&source, &options)?;
                print!("{}", report.render());
            }
            Commands::Eval { source, options } => {
                let report = self.run_source(&source, &options)?;
                print!("{}", report.render());
            }
            Commands::Compile { file, output, json } => {
                let source = read_source(&file).await?;
                let program = self.compile_source(&source)?;
                if json {
                    let summary = ProgramSummary::new(&program);
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    let output = output.unwrap_or_else(|| file.with_extension("alb"));
                    self.write_bytecode(&program, &output).await?;
                    println!("Wrote {}", output.display());
                }
            }
            Commands::Disasm { file } => {
                let source = read_source(&file).await?;
                let program = self.compile_source(&source)?;
                print!("{}", disassemble(&program)?);
            }
            Commands::Tokens { file } => {
                let source = read_source(&file).await?;
                let tokens = tokenize(&source)?;
                println!("{}", tokens_to_json(&tokens)?);
            }
            Commands::Exec { file, options } => {
                let program = read_bytecode(&file).await?;
                let report = self.run_program(program, &options)?;
                print!("{}", report.render());
            }
        }
        Ok(())
    }

    /// Lex and compile, logging how long each phase took
    pub fn compile_source(&self, source: &str) -> Result<Program> {
        let started = Instant::now();
        let tokens = tokenize(source)?;
        info!(
            tokens = tokens.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "lexer finished"
        );

        let started = Instant::now();
        let program = Compiler::new(tokens).compile()?;
        info!(
            bytes = program.code.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "compiler finished"
        );
        Ok(program)
    }

    pub fn run_source(&self, source: &str, options: &RunOptions) -> Result<RunReport> {
        let program = self.compile_source(source)?;
        self.run_program(program, options)
    }

    pub fn run_program(&self, program: Program, options: &RunOptions) -> Result<RunReport> {
        let listing = if options.disassemble {
            Some(disassemble(&program)?)
        } else {
            None
        };
        let stats = options.stats.then(|| program_stats(&program));

        let runtime = Runtime::with_config(
            RuntimeConfig::default()
                .with_stack_trace(options.trace)
                .with_record_history(options.trace),
        );

        let started = Instant::now();
        let mut context = runtime.create_context(program.into());
        let result = runtime.execute_context(&mut context)?;
        info!(
            elapsed_us = started.elapsed().as_micros() as u64,
            "interpreter finished"
        );

        let execution_path = context
            .history()
            .map(|history| render_execution_path(context.program(), history));

        Ok(RunReport {
            result,
            listing,
            stats,
            execution_path,
        })
    }

    async fn write_bytecode(&self, program: &Program, path: &Path) -> Result<()> {
        let mut bytes = Vec::new();
        encode_program(program, &mut bytes)?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| anyhow!("cannot write {}: {}", path.display(), e))
    }
}

async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("cannot read {}: {}", path.display(), e))
}

async fn read_bytecode(path: &Path) -> Result<Program> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow!("cannot read {}: {}", path.display(), e))?;
    Ok(BytecodeParser::parse(&mut bytes.as_slice())?)
}

pub fn tokens_to_json(tokens: &[Token]) -> Result<String> {
    Ok(serde_json::to_string_pretty(tokens)?)
}

fn program_stats(program: &Program) -> String {
    format!(
        "{} Constants\n{} Variables\n{} Bytecodes\n",
        program.constants.len(),
        program.variables.len(),
        program.code.len()
    )
}

/// One line per executed instruction, in execution order
fn render_execution_path(program: &Program, history: &[usize]) -> String {
    let mut out = String::new();
    for &offset in history {
        if let Ok(instruction) = Instruction::decode(&program.code, offset) {
            out.push_str(&format!(
                "{:04}  {}\t{}\n",
                offset,
                instruction.opcode.mnemonic(),
                instruction.operand
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_run_source_reports_tail_variable() {
        let handler = CliHandler::new();
        let report = handler
            .run_source("x = 1\ny = 2\nz = x + y", &RunOptions::default())
            .unwrap();
        assert_eq!(report.render(), "3 (Double)\n");
    }

    #[test]
    fn test_run_with_stats_and_disassembly() {
        let handler = CliHandler::new();
        let options = RunOptions {
            disassemble: true,
            stats: true,
            trace: false,
        };
        let report = handler.run_source("s = \"a\" + \"b\"", &options).unwrap();
        let rendered = report.render();

        assert!(rendered.starts_with("LOAD_CONST\t0 (a)\n"));
        assert!(rendered.contains("ab (String)\n"));
        assert!(rendered.ends_with("2 Constants\n1 Variables\n8 Bytecodes\n"));
    }

    #[test]
    fn test_trace_prints_execution_path() {
        let handler = CliHandler::new();
        let options = RunOptions {
            trace: true,
            ..RunOptions::default()
        };
        let report = handler.run_source("t = false and true", &options).unwrap();
        assert_eq!(
            report.execution_path.as_deref(),
            Some("0000  LOAD_CONST\t0\n0002  JUMP_IF_FALSE_OR_POP\t2\n0006  STORE_VAR\t0\n")
        );
    }

    #[test]
    fn test_compile_and_runtime_errors_surface() {
        let handler = CliHandler::new();
        let err = handler.run_source("x = (1", &RunOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected end of input, expected ')'");

        let err = handler.run_source("y = ghost", &RunOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "VM error: 'ghost' is not defined");
    }

    #[test]
    fn test_program_summary_json() {
        let handler = CliHandler::new();
        let program = handler.compile_source("x = 1.5 == 1").unwrap();
        let json = serde_json::to_value(ProgramSummary::new(&program)).unwrap();

        assert_eq!(json["variables"], serde_json::json!(["x"]));
        assert_eq!(json["constants"][0]["type"], "Double");
        assert_eq!(json["constants"][0]["value"], "1.5");
        assert_eq!(json["constants"][1]["type"], "Int64");
        assert_eq!(json["instructions"], 4);
        assert_eq!(json["bytecode_bytes"], 8);
    }

    #[test]
    fn test_tokens_to_json() {
        let tokens = tokenize("a = 1").unwrap();
        let json: serde_json::Value = serde_json::from_str(&tokens_to_json(&tokens).unwrap()).unwrap();
        assert_eq!(json[1]["kind"], "Assign");
        assert_eq!(json[2]["value"], "1");
    }

    #[tokio::test]
    async fn test_compile_then_exec_bytecode_file() {
        let temp_dir = tempdir().unwrap();
        let output = temp_dir.path().join("greeting.alb");

        let handler = CliHandler::new();
        let program = handler.compile_source("g = \"n\" + 5").unwrap();
        handler.write_bytecode(&program, &output).await.unwrap();

        let loaded = read_bytecode(&output).await.unwrap();
        assert_eq!(loaded, program);

        let report = handler.run_program(loaded, &RunOptions::default()).unwrap();
        assert_eq!(report.render(), "n5 (String)\n");
    }

    #[tokio::test]
    async fn test_read_missing_source() {
        let err = read_source(Path::new("/no/such/file.alla")).await.unwrap_err();
        assert!(err.to_string().starts_with("cannot read /no/such/file.alla"));
    }
}
