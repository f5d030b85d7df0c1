use std::ffi::{OsStr, OsString};
use std::path::Path;

use anyhow::Error;

use crate::languages::{env_flags, gcc_args, Language};

/// Configuration of the C++ language to use.
#[derive(Clone, Debug)]
pub struct LanguageCppConfiguration {
    /// Compiler to use (e.g. `g++`).
    pub compiler: OsString,
    /// Version of the C++ standard to use (e.g. `c++17`).
    pub std_version: String,
    /// Extra flags to pass to the compiler.
    pub extra_flags: Vec<String>,
}

impl Default for LanguageCppConfiguration {
    fn default() -> Self {
        LanguageCppConfiguration {
            compiler: "g++".into(),
            std_version: "c++17".into(),
            extra_flags: vec![],
        }
    }
}

impl LanguageCppConfiguration {
    /// Get the configuration of C++ from the environment variables `JB_CXX` and `JB_CXXFLAGS`.
    pub fn from_env() -> Result<LanguageCppConfiguration, Error> {
        let default = LanguageCppConfiguration::default();
        Ok(LanguageCppConfiguration {
            compiler: std::env::var_os("JB_CXX").unwrap_or(default.compiler),
            extra_flags: env_flags("JB_CXXFLAGS")?,
            ..default
        })
    }
}

/// The C++ language.
#[derive(Debug)]
pub struct LanguageCpp {
    config: LanguageCppConfiguration,
}

impl LanguageCpp {
    /// Make a new LanguageCpp using the specified configuration.
    pub fn new(config: LanguageCppConfiguration) -> LanguageCpp {
        LanguageCpp { config }
    }
}

impl Language for LanguageCpp {
    fn name(&self) -> &'static str {
        "C++17 / g++"
    }

    fn extensions(&self) -> Vec<&'static str> {
        vec!["cpp", "cc", "cxx"]
    }

    fn compiler(&self) -> &OsStr {
        &self.config.compiler
    }

    fn compilation_args(&self, source: &Path, dest: &Path) -> Vec<String> {
        gcc_args(&self.config.std_version, &self.config.extra_flags, source, dest)
    }
}
