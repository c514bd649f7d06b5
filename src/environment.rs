//! Host environment facts for the generation prompt.
//!
//! Candidate commands are far more useful when the model knows which OS,
//! distribution and shell they will run under.

use std::fmt;
use std::path::PathBuf;

/// Facts about the machine the command will run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellEnvironment {
    pub os: String,
    pub distro: Option<String>,
    pub shell: String,
    pub cwd: PathBuf,
}

impl ShellEnvironment {
    /// Gather facts from the running process. Never fails; every lookup has
    /// a fallback.
    pub fn detect() -> Self {
        Self {
            os: os_info(),
            distro: distro_info(),
            shell: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl fmt::Display for ShellEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OS: {}", self.os)?;
        if let Some(distro) = &self.distro {
            writeln!(f, "Distro: {}", distro)?;
        }
        writeln!(f, "Shell: {}", self.shell)?;
        write!(f, "CWD: {}", self.cwd.display())
    }
}

fn os_info() -> String {
    #[cfg(unix)]
    {
        use std::process::Command;
        if let Ok(output) = Command::new("uname").arg("-sr").output() {
            if output.status.success() {
                let uname = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !uname.is_empty() {
                    return uname;
                }
            }
        }
    }

    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

fn distro_info() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(contents) = std::fs::read_to_string("/etc/os-release") {
            return parse_pretty_name(&contents);
        }
    }

    #[cfg(target_os = "macos")]
    {
        use std::process::Command;
        if let Ok(output) = Command::new("sw_vers").arg("-productVersion").output() {
            if output.status.success() {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                return Some(format!("macOS {}", version));
            }
        }
    }

    None
}

/// Extract `PRETTY_NAME` from os-release contents.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_pretty_name(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
