//! Generates a standalone shell script that keeps `sdo-fetch monitor` running.

use std::fmt::Write as _;
use std::fs;
use std::time::Duration;

use camino::Utf8Path;
use serde::Serialize;

use crate::domain::SourceKey;
use crate::error::SdoError;

pub const DEFAULT_DAEMON_PATH: &str = "monitoring_daemon.sh";
pub const DEFAULT_DAEMON_INTERVAL_SECS: u64 = 900;
pub const DEFAULT_DAEMON_OUTPUT_DIR: &str = "continuous_monitoring";
pub const DEFAULT_DAEMON_LOG_FILE: &str = "sdo_monitor.log";
pub const RESTART_DELAY_SECS: u64 = 60;

pub fn default_daemon_sources() -> Vec<SourceKey> {
    ["AIA_171", "AIA_193", "HMI_Magnetogram"]
        .iter()
        .filter_map(|key| key.parse().ok())
        .collect()
}

#[derive(Debug, Clone)]
pub struct DaemonScript {
    pub binary: String,
    pub sources: Vec<SourceKey>,
    pub interval: Duration,
    pub output_dir: String,
    pub log_file: String,
}

impl Default for DaemonScript {
    fn default() -> Self {
        Self {
            binary: "sdo-fetch".to_string(),
            sources: default_daemon_sources(),
            interval: Duration::from_secs(DEFAULT_DAEMON_INTERVAL_SECS),
            output_dir: DEFAULT_DAEMON_OUTPUT_DIR.to_string(),
            log_file: DEFAULT_DAEMON_LOG_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonWritten {
    pub path: String,
    pub sources: Vec<SourceKey>,
    pub interval_secs: u64,
}

impl DaemonScript {
    pub fn render(&self) -> String {
        let sources = self
            .sources
            .iter()
            .map(SourceKey::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let interval = self.interval.as_secs();

        let mut script = String::new();
        script.push_str("#!/bin/sh\n");
        let _ = writeln!(
            script,
            "# Automated SDO monitoring: downloads {sources} every {interval} seconds."
        );
        let _ = writeln!(
            script,
            "# Generated by sdo-fetch {}. Stop with Ctrl+C or `kill <pid>`.",
            env!("CARGO_PKG_VERSION")
        );
        script.push('\n');
        let _ = writeln!(
            script,
            "SDO_FETCH=\"${{SDO_FETCH:-{}}}\"",
            shell_escape(&self.binary)
        );
        let _ = writeln!(script, "SOURCES=\"{}\"", shell_escape(&sources));
        let _ = writeln!(script, "INTERVAL={interval}");
        let _ = writeln!(script, "OUTPUT_DIR=\"{}\"", shell_escape(&self.output_dir));
        let _ = writeln!(script, "LOG_FILE=\"{}\"", shell_escape(&self.log_file));
        script.push('\n');
        // Children run in the background so a trapped INT/TERM is handled
        // while the shell waits, not after the monitor exits.
        script.push_str("pid=\"\"\n");
        script.push_str("stop() {\n");
        script.push_str("    if [ -n \"$pid\" ]; then\n");
        script.push_str("        kill -TERM \"$pid\" 2>/dev/null\n");
        script.push_str("        wait \"$pid\"\n");
        script.push_str("    fi\n");
        script.push_str("    echo \"Monitoring stopped by user\" >> \"$LOG_FILE\"\n");
        script.push_str("    exit 0\n");
        script.push_str("}\n");
        script.push_str("trap stop INT TERM\n\n");
        script.push_str("while true; do\n");
        script.push_str(
            "    \"$SDO_FETCH\" --output \"$OUTPUT_DIR\" --non-interactive monitor \\\n",
        );
        script.push_str(
            "        --sources \"$SOURCES\" --interval \"$INTERVAL\" --log-file \"$LOG_FILE\" &\n",
        );
        script.push_str("    pid=$!\n");
        script.push_str("    wait \"$pid\"\n");
        script.push_str("    status=$?\n");
        script.push_str("    pid=\"\"\n");
        script.push_str("    if [ \"$status\" -eq 0 ]; then\n");
        script.push_str("        exit 0\n");
        script.push_str("    fi\n");
        let _ = writeln!(
            script,
            "    echo \"$(date -u +%Y-%m-%dT%H:%M:%SZ) monitor exited with status $status, restarting in {RESTART_DELAY_SECS} seconds\" >> \"$LOG_FILE\""
        );
        let _ = writeln!(script, "    sleep {RESTART_DELAY_SECS} &");
        script.push_str("    pid=$!\n");
        script.push_str("    wait \"$pid\"\n");
        script.push_str("    pid=\"\"\n");
        script.push_str("done\n");
        script
    }

    pub fn write(&self, path: &Utf8Path) -> Result<DaemonWritten, SdoError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| SdoError::Filesystem(err.to_string()))?;
        }
        fs::write(path.as_std_path(), self.render())
            .map_err(|err| SdoError::Filesystem(format!("write {path}: {err}")))?;
        make_executable(path)?;
        tracing::info!(path = %path, "daemon script written");
        Ok(DaemonWritten {
            path: path.to_string(),
            sources: self.sources.clone(),
            interval_secs: self.interval.as_secs(),
        })
    }
}

#[cfg(unix)]
fn make_executable(path: &Utf8Path) -> Result<(), SdoError> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path.as_std_path())
        .map_err(|err| SdoError::Filesystem(err.to_string()))?
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path.as_std_path(), permissions)
        .map_err(|err| SdoError::Filesystem(err.to_string()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Utf8Path) -> Result<(), SdoError> {
    Ok(())
}

/// Escapes characters that are special inside a double-quoted shell string.
fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_specials() {
        assert_eq!(shell_escape("a\"b$c"), "a\\\"b\\$c");
        assert_eq!(shell_escape("plain_dir"), "plain_dir");
    }

    #[test]
    fn render_defaults() {
        let script = DaemonScript::default().render();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("SOURCES=\"AIA_171,AIA_193,HMI_Magnetogram\""));
        assert!(script.contains("INTERVAL=900"));
        assert!(script.contains("SDO_FETCH=\"${SDO_FETCH:-sdo-fetch}\""));
        assert!(script.contains("--log-file \"$LOG_FILE\""));
        assert!(script.contains("sleep 60 &"));
        assert!(script.contains("trap stop INT TERM"));
        assert!(script.contains("--log-file \"$LOG_FILE\" &\n    pid=$!\n    wait \"$pid\""));
    }
}
