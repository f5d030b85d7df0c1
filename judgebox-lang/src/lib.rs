//! Compilation of the submitted sources.
//!
//! The [`Language`] trait describes how to compile a source file of a given language; the list of
//! the supported languages can be found in the source of this crate.
//!
//! The entry point of this crate is [`LanguageManager`], which detects the language of a source
//! file from its extension, and [`compile`], which runs the compiler.
//!
//! # Example
//!
//! ```
//! use judgebox_lang::LanguageManager;
//!
//! let lang = LanguageManager::detect_language("sol.cpp").expect("unknown lang");
//! assert!(lang.name().contains("C++"))
//! ```

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod compile;
mod languages;

pub use compile::{compile, Compilation};
pub use languages::c::{LanguageC, LanguageCConfiguration};
pub use languages::cpp::{LanguageCpp, LanguageCppConfiguration};
pub use languages::Language;

use std::path::Path;
use std::sync::Arc;

use anyhow::Error;

/// Manager of all the known languages, you should use this to get [`Language`] instances.
pub struct LanguageManager {
    /// The list of all the known languages.
    known_languages: Vec<Arc<dyn Language>>,
}

impl LanguageManager {
    /// Make a new `LanguageManager` with all the known languages, configured from the environment.
    pub fn from_env() -> Result<LanguageManager, Error> {
        Ok(LanguageManager {
            // ordered by most important first
            known_languages: vec![
                Arc::new(LanguageCpp::new(LanguageCppConfiguration::from_env()?)),
                Arc::new(LanguageC::new(LanguageCConfiguration::from_env()?)),
            ],
        })
    }

    /// Given a path to a file guess the language that the source file probably is.
    ///
    /// ```
    /// use judgebox_lang::LanguageManager;
    ///
    /// let c = LanguageManager::detect_language("test.c").unwrap();
    /// assert!(c.name().contains("C"));
    /// let unknown = LanguageManager::detect_language("test.foobar");
    /// assert!(unknown.is_none());
    /// ```
    pub fn detect_language<P: AsRef<Path>>(path: P) -> Option<Arc<dyn Language>> {
        match LanguageManager::from_env() {
            Ok(manager) => manager.find(path),
            Err(e) => {
                warn!("Invalid compiler configuration: {:?}", e);
                None
            }
        }
    }

    /// Find the language among the known ones that handles the extension of `path`.
    pub fn find<P: AsRef<Path>>(&self, path: P) -> Option<Arc<dyn Language>> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        self.known_languages
            .iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
            .cloned()
    }
}
