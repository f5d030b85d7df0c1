use std::path::PathBuf;
use std::process::Command;

/// The package version, followed by the git revision when built from a checkout.
fn version() -> String {
    let pkg = env!("CARGO_PKG_VERSION");
    let revision = Command::new("git")
        .args(["describe", "--tags", "--long", "--always", "--dirty=+dirty"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|rev| !rev.is_empty());
    match revision {
        Some(rev) => format!("{pkg} ({rev})"),
        None => pkg.to_string(),
    }
}

fn main() {
    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").expect("cargo sets OUT_DIR"));
    let path = out_dir.join("version.txt");
    if let Err(e) = std::fs::write(&path, version()) {
        panic!("cannot write {}: {}", path.display(), e);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}
