use std::path::PathBuf;
use std::process::{Command, Stdio};

use fixlog_engine::AnalysisTrigger;
use tracing::{debug, warn};

/// Runs `fixlog analyze --quiet` as a detached child. The capture that fires
/// it does not wait, and spawn failures are only logged.
#[derive(Debug, Clone)]
pub struct SpawnAnalysis {
    exe: Option<PathBuf>,
}

impl SpawnAnalysis {
    pub fn current_exe() -> Self {
        let exe = std::env::current_exe()
            .inspect_err(|err| warn!(%err, "cannot locate own executable"))
            .ok();
        Self { exe }
    }

    fn command(&self) -> Option<Command> {
        let exe = self.exe.as_ref()?;
        let mut cmd = Command::new(exe);
        cmd.args(["analyze", "--quiet"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group: the hook runner may kill ours when capture exits.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        Some(cmd)
    }
}

impl AnalysisTrigger for SpawnAnalysis {
    fn fire(&self) {
        let Some(mut cmd) = self.command() else {
            return;
        };
        match cmd.spawn() {
            Ok(child) => debug!(pid = child.id(), "spawned background analysis"),
            Err(err) => warn!(%err, "failed to spawn background analysis"),
        }
    }
}
