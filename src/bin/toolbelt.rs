//! `toolbelt` entry point.
//!
//! Exit status is the tool's own status when a tool ran, `0` on success, and
//! `1` for every launcher-side failure.

use std::env;

fn main() {
    match toolbelt::cli::run(env::args_os()) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<toolbelt::Error>()
                .map(toolbelt::Error::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}
