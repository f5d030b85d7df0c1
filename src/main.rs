use clap::Parser;

use judgebox::error::NiceError;
use judgebox::tools::compare::main_compare;
use judgebox::tools::hint::main_hint;
use judgebox::tools::judge::main_judge;
use judgebox::tools::run::main_run;
use judgebox::{Opt, Tool};
use judgebox_verdict::Verdict;

/// Exit status of a malformed invocation.
const EXIT_FAILURE: i32 = 1;

fn main() {
    let base_opt = match Opt::try_parse() {
        Ok(opt) => opt,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not errors
            std::process::exit(if e.use_stderr() { EXIT_FAILURE } else { 0 });
        }
    };
    base_opt.logger.enable_log();

    let code = match base_opt.tool {
        Tool::Run(opt) => main_run(opt).nice_unwrap().map_or(0, Verdict::exit_code),
        Tool::Compare(opt) => main_compare(opt).nice_unwrap().exit_code(),
        Tool::Hint(opt) => {
            main_hint(opt).nice_expect("Cannot find the first mismatch");
            0
        }
        Tool::Judge(opt) => main_judge(opt).nice_unwrap().exit_code(),
    };
    std::process::exit(code);
}
