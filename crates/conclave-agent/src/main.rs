//! # conclave
//!
//! Command-line entry point: runs one collaborative session against a
//! shared workspace and streams its events to stdout as JSON lines.

#![deny(unsafe_code)]

mod completion_factory;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conclave_core::events::{SessionEvent, SessionStatus};
use conclave_core::logging::{init_json_subscriber, init_subscriber};
use conclave_runtime::{SessionSupervisor, SupervisorConfig};
use conclave_settings::{ConclaveSettings, load_settings_from_path, settings_path};
use conclave_workspace::{GuardedWorkspace, LockManager, WorkspaceStore};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Multi-agent collaboration over a shared workspace.
#[derive(Parser, Debug)]
#[command(name = "conclave", about = "Run agent teams over a shared workspace")]
struct Cli {
    /// Settings file (defaults to `~/.conclave/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Workspace directory (overrides settings).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a session on a topic and stream its events.
    Run {
        /// What the agents should build.
        #[arg(long)]
        topic: String,

        /// Session deadline in seconds (overrides settings).
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Use a canned offline backend instead of the Messages API.
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete every file in the workspace.
    Wipe,
}

impl Cli {
    fn load_settings(&self) -> Result<ConclaveSettings> {
        let path = self.settings.clone().unwrap_or_else(settings_path);
        let mut settings = load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(dir) = &self.workspace {
            settings.workspace.root = dir.display().to_string();
        }
        if let Command::Run {
            timeout_secs: Some(secs),
            ..
        } = &self.command
        {
            settings.session.timeout_ms = secs.saturating_mul(1_000);
        }
        Ok(settings)
    }
}

fn open_workspace(settings: &ConclaveSettings) -> Result<Arc<GuardedWorkspace>> {
    let root = PathBuf::from(&settings.workspace.root);
    let store = WorkspaceStore::open(&root)
        .with_context(|| format!("Failed to open workspace: {}", root.display()))?;
    let locks = Arc::new(LockManager::new(settings.workspace.lock_timeout()));
    Ok(Arc::new(GuardedWorkspace::new(store, locks)))
}

fn exit_code(status: SessionStatus) -> ExitCode {
    match status {
        SessionStatus::Complete => ExitCode::SUCCESS,
        SessionStatus::Timeout => ExitCode::from(2),
        SessionStatus::Stopped => ExitCode::from(130),
        SessionStatus::Active => ExitCode::FAILURE,
    }
}

fn print_event(out: &mut impl Write, event: &SessionEvent) -> Result<()> {
    let line = serde_json::to_string(event).context("Failed to encode event")?;
    writeln!(out, "{line}").context("Failed to write event")?;
    out.flush().context("Failed to flush stdout")
}

async fn run(settings: &ConclaveSettings, topic: &str, dry_run: bool) -> Result<SessionStatus> {
    let workspace = open_workspace(settings)?;
    let config = SupervisorConfig::from(settings);
    let completion = if dry_run {
        completion_factory::dry_run(&config.roles)
    } else {
        completion_factory::live(&settings.completion)?
    };
    info!(
        backend = completion.name(),
        root = %settings.workspace.root,
        timeout_secs = config.timeout.as_secs(),
        "starting session"
    );

    let supervisor = SessionSupervisor::new(config, workspace, completion);
    let handle = supervisor.start(topic).context("Failed to start session")?;
    let mut events = handle.subscribe();
    let mut stdout = std::io::stdout();
    let mut interrupted = false;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let last = matches!(event, SessionEvent::SessionComplete { .. });
                    print_event(&mut stdout, &event)?;
                    if last {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.context("Failed to listen for Ctrl-C")?;
                interrupted = true;
                info!(session_id = %handle.id(), "interrupt received, stopping session");
                if let Err(e) = supervisor.stop(handle.id()) {
                    warn!(error = %e, "stop raced with session resolution");
                }
            }
        }
    }

    let status = tokio::time::timeout(Duration::from_secs(5), handle.finished())
        .await
        .unwrap_or_else(|_| handle.status());
    info!(session_id = %handle.id(), %status, "session finished");
    Ok(status)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    if settings.logging.json {
        init_json_subscriber(&settings.logging.level);
    } else {
        init_subscriber(&settings.logging.level);
    }

    match &cli.command {
        Command::Run { topic, dry_run, .. } => {
            let status = run(&settings, topic, *dry_run).await?;
            Ok(exit_code(status))
        }
        Command::Wipe => {
            open_workspace(&settings)?
                .wipe()
                .context("Failed to wipe workspace")?;
            info!(root = %settings.workspace.root, "workspace wiped");
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_override_settings() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("settings.json");
        let cli = Cli::parse_from([
            "conclave",
            "--settings",
            missing.to_str().unwrap(),
            "--workspace",
            dir.path().to_str().unwrap(),
            "run",
            "--topic",
            "todo app",
            "--timeout-secs",
            "7",
            "--dry-run",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.session.timeout_ms, 7_000);
        assert_eq!(settings.workspace.root, dir.path().display().to_string());
        assert!(matches!(cli.command, Command::Run { dry_run: true, .. }));
    }

    #[test]
    fn wipe_clears_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let mut settings = ConclaveSettings::default();
        settings.workspace.root = dir.path().display().to_string();
        open_workspace(&settings).unwrap().wipe().unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn terminal_statuses_map_to_exit_codes() {
        assert_eq!(exit_code(SessionStatus::Complete), ExitCode::SUCCESS);
        assert_eq!(exit_code(SessionStatus::Timeout), ExitCode::from(2));
        assert_eq!(exit_code(SessionStatus::Stopped), ExitCode::from(130));
    }

    #[tokio::test]
    async fn dry_run_session_completes() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = ConclaveSettings::default();
        settings.workspace.root = dir.path().display().to_string();
        settings.session.timeout_ms = 20_000;
        settings.agent.nudge_grace_ms = 100;
        let status = run(&settings, "a tiny service", true).await.unwrap();
        assert_eq!(status, SessionStatus::Complete);
        assert!(dir.path().join("backend/README.md").exists());
    }
}
