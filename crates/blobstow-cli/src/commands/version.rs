//! Version command implementation.

/// Version, commit and build date, as stamped at build time.
fn version_info() -> String {
    format!(
        "Version: {}\nCommit: {}\nDate: {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("BLOBSTOW_BUILD_COMMIT").unwrap_or("none"),
        option_env!("BLOBSTOW_BUILD_DATE").unwrap_or("unknown"),
    )
}

/// Prints version information.
pub fn run() {
    println!("blobstow");
    println!("{}", version_info());
}
