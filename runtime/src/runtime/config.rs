//! Runtime configuration options

/// Configuration options for the alla runtime
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    /// Log program statistics before executing
    pub debug_mode: bool,
    /// Log the operand stack after every instruction
    pub stack_trace: bool,
    /// Keep the offsets of executed instructions in the context
    pub record_history: bool,
}

impl RuntimeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable debug mode
    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    /// Enable or disable stack trace
    pub fn with_stack_trace(mut self, stack_trace: bool) -> Self {
        self.stack_trace = stack_trace;
        self
    }

    pub fn with_record_history(mut self, record_history: bool) -> Self {
        self.record_history = record_history;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_quiet() {
        let config = RuntimeConfig::new();
        assert!(!config.debug_mode);
        assert!(!config.stack_trace);
        assert!(!config.record_history);
    }

    #[test]
    fn test_builders_chain() {
        let config = RuntimeConfig::default()
            .with_debug_mode(true)
            .with_stack_trace(true)
            .with_record_history(true);
        assert!(config.debug_mode);
        assert!(config.stack_trace);
        assert!(config.record_history);
    }
}
