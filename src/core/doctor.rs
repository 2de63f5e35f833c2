use crate::utils::error::{PicamError, Result};
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::process::Command;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|\s)v?(\d+\.\d+(?:\.\d+)*)\b").expect("version pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCheck {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub package_hint: String,
}

impl ToolCheck {
    pub fn new(name: &str, program: &str, args: &[&str], package_hint: &str) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            package_hint: package_hint.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Ok { version: Option<String> },
    Missing,
    Failed { status: Option<i32>, stderr: String },
}

impl CheckOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, CheckOutcome::Ok { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub results: Vec<(ToolCheck, CheckOutcome)>,
}

impl DoctorReport {
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|(_, outcome)| outcome.is_ok())
    }

    pub fn missing_packages(&self) -> Vec<&str> {
        let mut packages: Vec<&str> = self
            .results
            .iter()
            .filter(|(_, outcome)| !outcome.is_ok())
            .map(|(check, _)| check.package_hint.as_str())
            .collect();
        packages.dedup();
        packages
    }

    pub fn install_hint(&self) -> Option<String> {
        let packages = self.missing_packages();
        if packages.is_empty() {
            None
        } else {
            Some(format!("sudo apt install -y {}", packages.join(" ")))
        }
    }
}

/// camera stack, GStreamer and OpenCV, in setup order
pub fn default_checks() -> Vec<ToolCheck> {
    vec![
        ToolCheck::new("libcamera", "libcamera-hello", &["--version"], "libcamera-apps"),
        ToolCheck::new("GStreamer", "gst-launch-1.0", &["--version"], "gstreamer1.0-tools"),
        ToolCheck::new(
            "OpenCV",
            "pkg-config",
            &["--modversion", "opencv4"],
            "libopencv-dev",
        ),
    ]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub fn find_in_path(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    if program.contains('/') {
        let candidate = PathBuf::from(program);
        return is_executable(&candidate).then_some(candidate);
    }
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

/// First whitespace-delimited dotted version; `gst-launch-1.0` itself is not one.
pub fn parse_version(output: &str) -> Option<String> {
    VERSION_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

async fn run_check(check: &ToolCheck, path_var: &OsStr) -> Result<CheckOutcome> {
    let Some(program) = find_in_path(&check.program, path_var) else {
        tracing::debug!("{} not found on PATH", check.program);
        return Ok(CheckOutcome::Missing);
    };

    let mut command = Command::new(&program);
    command.args(&check.args).kill_on_drop(true);
    let output = match tokio::time::timeout(CHECK_TIMEOUT, command.output()).await {
        Ok(result) => result.map_err(|e| PicamError::ToolCheckError {
            tool: check.program.clone(),
            message: e.to_string(),
        })?,
        Err(_) => {
            return Ok(CheckOutcome::Failed {
                status: None,
                stderr: format!("timed out after {:?}", CHECK_TIMEOUT),
            })
        }
    };

    if !output.status.success() {
        return Ok(CheckOutcome::Failed {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version(&stdout)
        .or_else(|| parse_version(&String::from_utf8_lossy(&output.stderr)));
    Ok(CheckOutcome::Ok { version })
}

pub async fn run_checks(checks: Vec<ToolCheck>, path_var: &OsStr) -> Result<DoctorReport> {
    let mut report = DoctorReport::default();
    for check in checks {
        let outcome = match run_check(&check, path_var).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Check for {} errored: {}", check.name, e);
                CheckOutcome::Failed {
                    status: None,
                    stderr: e.to_string(),
                }
            }
        };
        tracing::debug!("{}: {:?}", check.name, outcome);
        report.results.push((check, outcome));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("GStreamer Core Library version 1.22.0\n"),
            Some("1.22.0".to_string())
        );
        assert_eq!(parse_version("4.6.0\n"), Some("4.6.0".to_string()));
        assert_eq!(
            parse_version("rpicam-apps build: v1.4.2 "),
            Some("1.4.2".to_string())
        );
        assert_eq!(
            parse_version("gst-launch-1.0 version 1.22.0\nGStreamer 1.22.0\n"),
            Some("1.22.0".to_string())
        );
        assert_eq!(parse_version("no version here"), None);
    }

    #[test]
    fn test_parse_version_repeated_calls() {
        for _ in 0..3 {
            assert_eq!(parse_version("v0.5.1"), Some("0.5.1".to_string()));
        }
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_install_hint_lists_failed_packages() {
        let checks = default_checks();
        let report = DoctorReport {
            results: vec![
                (checks[0].clone(), CheckOutcome::Ok { version: None }),
                (checks[1].clone(), CheckOutcome::Missing),
                (
                    checks[2].clone(),
                    CheckOutcome::Failed {
                        status: Some(1),
                        stderr: "Package opencv4 was not found".to_string(),
                    },
                ),
            ],
        };
        assert!(!report.all_ok());
        assert_eq!(
            report.install_hint().as_deref(),
            Some("sudo apt install -y gstreamer1.0-tools libopencv-dev")
        );
    }

    #[tokio::test]
    async fn test_missing_tool_does_not_abort_report() {
        let empty_path = OsString::new();
        let report = run_checks(default_checks(), &empty_path).await.unwrap();
        assert_eq!(report.results.len(), 3);
        assert!(report
            .results
            .iter()
            .all(|(_, outcome)| *outcome == CheckOutcome::Missing));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_tool_reports_version() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake-gst");
        std::fs::write(&script, "#!/bin/sh\necho 'gst-launch-1.0 version 1.22.0'\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let check = ToolCheck::new("GStreamer", "fake-gst", &["--version"], "gstreamer1.0-tools");
        let report = run_checks(vec![check], dir.path().as_os_str()).await.unwrap();
        assert_eq!(
            report.results[0].1,
            CheckOutcome::Ok {
                version: Some("1.22.0".to_string())
            }
        );
        assert!(report.all_ok());
    }
}
