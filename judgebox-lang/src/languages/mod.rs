use std::ffi::OsStr;
use std::fmt::Debug;
use std::path::Path;

pub(crate) mod c;
pub(crate) mod cpp;

/// Trait that defines the properties of the supported languages.
pub trait Language: Debug + Send + Sync {
    /// Full name of the language. This must be unique between all the other languages.
    fn name(&self) -> &'static str;

    /// List of valid extensions for this language, lower case. A file is considered in this
    /// language if its extension is inside this list.
    fn extensions(&self) -> Vec<&'static str>;

    /// The compiler, either a name to look up in `$PATH` or a path.
    fn compiler(&self) -> &OsStr;

    /// Arguments to pass to the compiler to compile `source` into the executable `dest`.
    fn compilation_args(&self, source: &Path, dest: &Path) -> Vec<String>;
}

/// The command line of a gcc-like compiler: the shared flags, the `-std` version, the `extra`
/// flags and the files, linking the math library.
pub(crate) fn gcc_args(
    std_version: &str,
    extra: &[String],
    source: &Path,
    dest: &Path,
) -> Vec<String> {
    let mut args = vec!["-O2".into(), "-Wall".into(), format!("-std={}", std_version)];
    args.extend(extra.iter().cloned());
    args.push("-o".into());
    args.push(dest.to_string_lossy().into_owned());
    args.push(source.to_string_lossy().into_owned());
    args.push("-lm".into());
    args
}


/// Read the variable `name` and split it like a shell would.
pub(crate) fn env_flags(name: &str) -> Result<Vec<String>, anyhow::Error> {
    use anyhow::Context;

    match std::env::var(name) {
        Ok(flags) => shell_words::split(&flags).with_context(|| format!("Invalid ${}", name)),
        Err(_) => Ok(vec![]),
    }
}
