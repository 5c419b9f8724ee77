use owo_colors::OwoColorize;
use std::io::{ErrorKind, Write};
use std::process::{self, ExitStatus, Stdio};

/// Compiles `c_src` with `cc` into a scratch directory and runs the result.
pub fn run(c_src: &str, cc: &str, cc_options: &str) -> Result<ExitStatus, ()> {
    let dir = tempfile::tempdir().map_err(|e| eprintln!("failed to create a directory: {e}"))?;
    let exe = dir.path().join("ogo_a.out");
    log::info!("   {} {}", "Compiling".green().bold(), exe.display());
    let mut child = match process::Command::new(cc)
        .args(["-std=c17", "-x", "c", "-O2", "-fwrapv", "-o"])
        .arg(&exe)
        .arg("-")
        .args(cc_options.split_ascii_whitespace())
        .stdin(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            match e.kind() {
                ErrorKind::NotFound => eprintln!(
                    "{cc} command not found. \
                    You need to install {cc}."
                ),
                _ => eprintln!("failed to run {cc}: {e}"),
            };
            return Err(());
        }
    };
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(c_src.as_bytes())
            .map_err(|e| eprintln!("failed to write to {cc}: {e}"))?;
    }
    let status = child
        .wait()
        .map_err(|e| eprintln!("failed to wait for {cc}: {e}"))?;
    if !status.success() {
        eprintln!("{cc} failed with {status}");
        return Err(());
    }
    log::info!("     {} {}", "Running".green().bold(), exe.display());
    process::Command::new(&exe)
        .status()
        .map_err(|e| eprintln!("failed to run {}: {e}", exe.display()))
}
