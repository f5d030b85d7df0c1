use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Error};

use crate::Language;

/// The result of a compilation that managed to run the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compilation {
    /// The executable has been written to this path.
    Compiled(PathBuf),
    /// The compiler rejected the source.
    Failed(ExitStatus),
}

/// Compile `source` into the executable `dest` using `lang`.
///
/// The diagnostics of the compiler go straight to the standard error of this process. An `Err`
/// means that the compiler could not be started at all.
pub fn compile<P: AsRef<Path>, Q: AsRef<Path>>(
    lang: &dyn Language,
    source: P,
    dest: Q,
) -> Result<Compilation, Error> {
    let (source, dest) = (source.as_ref(), dest.as_ref());
    let compiler = which::which(lang.compiler()).with_context(|| {
        format!(
            "Cannot find the compiler {:?} for {}",
            lang.compiler(),
            lang.name()
        )
    })?;
    let args = lang.compilation_args(source, dest);
    debug!(
        "Compiling {}: {} {}",
        source.display(),
        compiler.display(),
        shell_words::join(&args)
    );
    let status = Command::new(&compiler)
        .args(&args)
        .stdin(Stdio::null())
        .status()
        .with_context(|| format!("Failed to run {}", compiler.display()))?;
    if status.success() {
        info!("Compiled {} into {}", source.display(), dest.display());
        Ok(Compilation::Compiled(dest.to_owned()))
    } else {
        warn!("Compilation of {} failed: {}", source.display(), status);
        Ok(Compilation::Failed(status))
    }
}
