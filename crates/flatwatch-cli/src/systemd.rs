//! systemd unit generation for periodic runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;

pub const UNIT_NAME: &str = "flatwatch";
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Where the service runs from: the binary and the directory holding the
/// catalog, ledger and `.env`.
#[derive(Debug, Clone)]
pub struct UnitPaths {
    pub exe: PathBuf,
    pub workdir: PathBuf,
}

impl UnitPaths {
    pub fn current() -> Result<Self> {
        Ok(Self {
            exe: std::env::current_exe().context("Failed to locate the flatwatch binary")?,
            workdir: std::env::current_dir().context("Failed to read working directory")?,
        })
    }
}

/// Service unit. With `user_param` the unit is a template (`flatwatch@.service`)
/// that runs as the instance user.
pub fn service_file(paths: &UnitPaths, user_param: bool) -> String {
    let mut unit = format!(
        "[Unit]\n\
         Description=Check rental listing sites for new flat offers{for_user}\n\
         After=network-online.target nss-lookup.target\n\
         \n\
         [Service]\n\
         Type=oneshot\n\
         ExecStart=\"{exe}\"\n\
         WorkingDirectory={workdir}\n",
        for_user = if user_param { " for %I" } else { "" },
        exe = paths.exe.display(),
        workdir = paths.workdir.display(),
    );
    if user_param {
        unit.push_str("User=%i\n");
    }
    unit.push_str("\n[Install]\nWantedBy=multi-user.target\n");
    unit
}

pub fn timer_file(interval: Duration) -> String {
    let secs = interval.as_secs();
    format!(
        "[Unit]\n\
         Description=Run flatwatch periodically\n\
         \n\
         [Timer]\n\
         OnActiveSec=1min\n\
         OnUnitActiveSec={secs}s\n\
         RandomizedDelaySec={delay}s\n\
         \n\
         [Install]\n\
         WantedBy=timers.target\n",
        delay = secs / 4,
    )
}

/// `~/.local/share/systemd/user`
pub fn user_unit_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME not set")?;
    Ok(Path::new(&home).join(".local/share/systemd/user"))
}

/// Write the service and timer units into `dir`.
pub fn write_units(dir: &Path, paths: &UnitPaths) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(
        dir.join(format!("{UNIT_NAME}.service")),
        service_file(paths, false),
    )?;
    std::fs::write(
        dir.join(format!("{UNIT_NAME}.timer")),
        timer_file(CHECK_INTERVAL),
    )?;
    Ok(())
}

/// Reload the user manager and start the timer. Returns systemctl's exit code.
pub async fn enable_timer() -> Result<i32> {
    systemctl(&["--user", "daemon-reload"]).await?;
    systemctl(&["--user", "enable", "--now", &format!("{UNIT_NAME}.timer")]).await
}

async fn systemctl(args: &[&str]) -> Result<i32> {
    let status = Command::new("systemctl")
        .args(args)
        .status()
        .await
        .context("Failed to run systemctl")?;
    if !status.success() {
        tracing::warn!(args = ?args, %status, "systemctl failed");
    }
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> UnitPaths {
        UnitPaths {
            exe: PathBuf::from("/opt/flatwatch/bin/flatwatch"),
            workdir: PathBuf::from("/srv/flatwatch"),
        }
    }

    #[test]
    fn test_service_file() {
        let unit = service_file(&paths(), false);
        assert!(unit.contains("ExecStart=\"/opt/flatwatch/bin/flatwatch\"\n"));
        assert!(unit.contains("WorkingDirectory=/srv/flatwatch\n"));
        assert!(!unit.contains("User="));
        assert!(unit.ends_with("WantedBy=multi-user.target\n"));
    }

    #[test]
    fn test_service_template_runs_as_instance_user() {
        let unit = service_file(&paths(), true);
        assert!(unit.contains("new flat offers for %I\n"));
        assert!(unit.contains("User=%i\n"));
    }

    #[test]
    fn test_timer_hourly_with_quarter_jitter() {
        let unit = timer_file(CHECK_INTERVAL);
        assert!(unit.contains("OnUnitActiveSec=3600s\n"));
        assert!(unit.contains("RandomizedDelaySec=900s\n"));
        assert!(unit.contains("WantedBy=timers.target"));
    }

    #[test]
    fn test_write_units() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("systemd/user");
        write_units(&target, &paths()).unwrap();
        let service = std::fs::read_to_string(target.join("flatwatch.service")).unwrap();
        let timer = std::fs::read_to_string(target.join("flatwatch.timer")).unwrap();
        assert_eq!(service, service_file(&paths(), false));
        assert!(timer.contains("OnUnitActiveSec=3600s"));
    }

    #[test]
    fn test_write_units_fails_on_unwritable_target() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        assert!(write_units(&blocker.join("sub"), &paths()).is_err());
    }
}
