use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=TOOLBELT_ROOT_HINT");

    if let Ok(raw_hint) = env::var("TOOLBELT_ROOT_HINT") {
        let candidate = PathBuf::from(raw_hint);
        let canonical = candidate.canonicalize().unwrap_or(candidate);

        println!("cargo:rustc-env=TOOLBELT_ROOT_HINT={}", canonical.display());
    }

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=TOOLBELT_BUILD_TARGET={target}");
}
