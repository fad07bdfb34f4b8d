use std::sync::Arc;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use crate::vm::{ExecutionContext, Value, VM};
use crate::runtime::{RuntimeConfig, RuntimeError, RuntimeResult};
use crate::bytecode::{Parser, Program};

/// The Runtime is the main entry point for using the bytecode VM
///
/// Clones share the program registry. Every execution gets its own
/// `ExecutionContext`, so one runtime can serve several threads.
#[derive(Clone)]
pub struct Runtime {
    vm: VM,
    programs: Arc<DashMap<String, Arc<Program>>>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a new runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut vm = VM::new();
        vm.set_stack_trace(config.stack_trace);
        vm.set_record_history(config.record_history);

        Self {
            vm,
            programs: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register a program under `name`, replacing any previous one
    pub fn load_program(&self, name: impl Into<String>, program: Program) {
        let name = name.into();
        debug!(name = %name, bytes = program.code.len(), "loading program");
        self.programs.insert(name, Arc::new(program));
    }

    /// Remove a program from the registry, returning it if present
    pub fn unload_program(&self, name: &str) -> Option<Arc<Program>> {
        self.programs.remove(name).map(|(_, program)| program)
    }

    /// Names of all loaded programs, sorted
    pub fn program_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.programs.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Execute a previously loaded program
    pub fn execute_program(&self, name: &str) -> RuntimeResult<Value> {
        let program = self
            .programs
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuntimeError::ProgramNotFound(name.to_string()))?;

        let mut context = self.create_context(program);
        self.execute_context(&mut context)
    }

    /// Execute a program without registering it
    pub fn execute(&self, program: &Program) -> RuntimeResult<Value> {
        let mut context = self.create_context(Arc::new(program.clone()));
        self.execute_context(&mut context)
    }

    /// Build a context with this runtime's tracing and history settings
    pub fn create_context(&self, program: Arc<Program>) -> ExecutionContext {
        self.vm.create_context(program)
    }

    /// Execute a context prepared by `create_context`. The context stays
    /// inspectable afterwards (history, leftover stack).
    pub fn execute_context(&self, context: &mut ExecutionContext) -> RuntimeResult<Value> {
        if self.config.debug_mode {
            let program = context.program();
            debug!(
                constants = program.constants.len(),
                variables = program.variables.len(),
                instructions = program.instruction_count(),
                "program statistics"
            );
        }

        Ok(self.vm.execute(context)?)
    }

    /// Execute a bytecode file and return the result
    pub fn execute_file<P: AsRef<Path>>(&self, path: P) -> RuntimeResult<Value> {
        let program = read_program(path.as_ref())?;
        self.execute(&program)
    }

    /// Parse a bytecode file and register it under its file stem.
    /// Returns the registered name.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> RuntimeResult<String> {
        let path = path.as_ref();
        let program = read_program(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if self.programs.contains_key(&name) {
            warn!(name = %name, path = %path.display(), "replacing loaded program");
        }
        self.load_program(name.clone(), program);
        Ok(name)
    }
}

fn read_program(path: &Path) -> RuntimeResult<Program> {
    let file = File::open(path).map_err(|source| RuntimeError::FileError {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let program = Parser::parse(&mut reader)?;

    info!(path = %path.display(), "loaded bytecode file");
    Ok(program)
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
