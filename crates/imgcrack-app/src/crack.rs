use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use imgcrack_core::candidates::CandidateSource;
use imgcrack_core::config::ImgcrackConfig;
use imgcrack_core::events::Reporter;
use imgcrack_core::executor::AttemptExecutor;
use imgcrack_core::flow::FlowController;
use imgcrack_core::input::{LineSource, PromptMailbox};
use imgcrack_core::listener::ListenerHandle;
use imgcrack_core::mount::{HdiutilBackend, MountBackend};
use imgcrack_core::scheduler::{Scheduler, SchedulerDeps, TargetReport};
use imgcrack_core::signal_bus::SignalBus;

use crate::App;

#[derive(Debug, Clone, PartialEq)]
pub struct CrackPlan {
    pub config: ImgcrackConfig,
    pub targets: Vec<PathBuf>,
    pub sources: Vec<CandidateSource>,
}

/// Per-run collaborators owned by the caller. The bus is shared so a
/// Ctrl+C handler can raise abort from outside the run.
pub struct RunSession<'s> {
    pub bus: Arc<SignalBus>,
    pub reporter: &'s dyn Reporter,
    pub lines: Box<dyn LineSource + Send>,
}

impl<'a> App<'a> {
    pub fn crack(&self, plan: &CrackPlan, session: RunSession<'_>) -> Result<Vec<TargetReport>> {
        let backend = HdiutilBackend::new(self.runner, plan.config.mount.clone());
        crack_with_backend(&backend, plan, session)
    }
}

/// Sweeps, starts the operator listener, runs every target in plan order,
/// then stops the listener and sweeps again.
pub fn crack_with_backend(
    backend: &dyn MountBackend,
    plan: &CrackPlan,
    session: RunSession<'_>,
) -> Result<Vec<TargetReport>> {
    if plan.targets.is_empty() {
        bail!("no disk images to attempt");
    }
    if plan.sources.is_empty() {
        bail!("no candidate sources to attempt");
    }

    let RunSession {
        bus,
        reporter,
        lines,
    } = session;
    let config = &plan.config;

    let executor = AttemptExecutor::new(backend, &bus, &config.attempt);
    tracing::info!("cleaning up attached disk images before starting");
    executor.sweep();

    let mailbox = Arc::new(PromptMailbox::new());
    let listener = ListenerHandle::spawn(
        lines,
        Arc::clone(&bus),
        Arc::clone(&mailbox),
        config.input.listener_poll(),
    );

    let controller = FlowController::new(&config.schedule);
    let scheduler = Scheduler::new(SchedulerDeps {
        executor: &executor,
        controller: &controller,
        prompt: mailbox.as_ref(),
        bus: &bus,
        reporter,
        counting: config.sources.clone(),
        default_rate: config.schedule.default_rate,
    });

    let reports = scheduler.run(&plan.targets, &plan.sources);

    listener.stop();
    executor.sweep();
    tracing::info!(targets = reports.len(), "run finished");
    Ok(reports)
}
