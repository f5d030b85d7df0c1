use std::ffi::{OsStr, OsString};
use std::path::Path;

use anyhow::Error;

use crate::languages::{env_flags, gcc_args, Language};

/// Configuration of the C language to use.
#[derive(Clone, Debug)]
pub struct LanguageCConfiguration {
    /// Compiler to use (e.g. `gcc`).
    pub compiler: OsString,
    /// Version of the C standard to use (e.g. `c11`).
    pub std_version: String,
    /// Extra flags to pass to the compiler.
    pub extra_flags: Vec<String>,
}

impl Default for LanguageCConfiguration {
    fn default() -> Self {
        LanguageCConfiguration {
            compiler: "gcc".into(),
            std_version: "c11".into(),
            extra_flags: vec![],
        }
    }
}

impl LanguageCConfiguration {
    /// Get the configuration of C from the environment variables `JB_CC` and `JB_CFLAGS`.
    pub fn from_env() -> Result<LanguageCConfiguration, Error> {
        let default = LanguageCConfiguration::default();
        Ok(LanguageCConfiguration {
            compiler: std::env::var_os("JB_CC").unwrap_or(default.compiler),
            extra_flags: env_flags("JB_CFLAGS")?,
            ..default
        })
    }
}

/// The C language.
#[derive(Debug)]
pub struct LanguageC {
    config: LanguageCConfiguration,
}

impl LanguageC {
    /// Make a new LanguageC using the specified configuration.
    pub fn new(config: LanguageCConfiguration) -> LanguageC {
        LanguageC { config }
    }
}

impl Language for LanguageC {
    fn name(&self) -> &'static str {
        "C / gcc"
    }

    fn extensions(&self) -> Vec<&'static str> {
        vec!["c"]
    }

    fn compiler(&self) -> &OsStr {
        &self.config.compiler
    }

    fn compilation_args(&self, source: &Path, dest: &Path) -> Vec<String> {
        gcc_args(&self.config.std_version, &self.config.extra_flags, source, dest)
    }
}
