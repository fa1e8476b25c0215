// Compiler options, loadable from a TOML file

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::tads_compiler::error::CompilerError;

/// Options controlling code generation and debug-record output.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// c_mode = true
/// debug_lines = true
/// node_pool_size = 32768
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Start in C operator mode (`==` compares, `=` assigns)
    pub c_mode: bool,
    /// Emit LINE records for the debugger
    pub debug_lines: bool,
    /// Emit FRAME records naming local variables
    pub debug_locals: bool,
    /// Emit CHKARGC at the start of functions and methods
    pub check_arg_count: bool,
    /// Write verb templates in the pre-flags format
    pub old_templates: bool,
    /// Fold identifiers to lower case
    pub case_insensitive: bool,
    /// Capacity of the parse node arena in bytes
    pub node_pool_size: usize,
    /// Number of label/forward-reference slots
    pub label_pool_size: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            c_mode: false,
            debug_lines: false,
            debug_locals: false,
            check_arg_count: true,
            old_templates: false,
            case_insensitive: false,
            node_pool_size: 65536,
            label_pool_size: 1000,
        }
    }
}

impl CompilerOptions {
    pub fn from_toml_str(text: &str) -> Result<Self, CompilerError> {
        let options: CompilerOptions =
            toml::from_str(text).map_err(|e| CompilerError::ConfigError(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: &Path) -> Result<Self, CompilerError> {
        let text = fs::read_to_string(path).map_err(|e| {
            CompilerError::IOError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// True when either kind of debug record is being generated
    pub fn debug_info(&self) -> bool {
        self.debug_lines || self.debug_locals
    }

    fn validate(&self) -> Result<(), CompilerError> {
        if self.node_pool_size < 1024 {
            return Err(CompilerError::ConfigError(format!(
                "node_pool_size {} is below the 1024-byte minimum",
                self.node_pool_size
            )));
        }
        if self.label_pool_size < 16 || self.label_pool_size > u16::MAX as usize {
            return Err(CompilerError::ConfigError(format!(
                "label_pool_size {} must be between 16 and {}",
                self.label_pool_size,
                u16::MAX
            )));
        }
        Ok(())
    }
}
