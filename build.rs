use std::process::Command;

fn main() {
    println!(
        "cargo:rustc-env=VOTABOT_GIT_HASH={}",
        capture("git", &["rev-parse", "--short", "HEAD"])
    );
    println!(
        "cargo:rustc-env=VOTABOT_BUILD_DATE={}",
        capture("date", &["+%Y-%m-%d"])
    );
}

/// First line of a command's stdout, or "unknown" when it cannot run.
fn capture(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
