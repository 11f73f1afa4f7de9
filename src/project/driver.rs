//! The project's main loop.
//!
//! One task owns the [`Project`] and serializes every mutation: filesystem
//! events from the watcher, job outcomes from the workers, and the periodic
//! debounce tick that turns dirty marks into jobs.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::time::Duration;

use super::jobs::JobOutcome;
use super::watch::FsEvent;
use super::Project;

/// Interval between debounce checks.
const TICK: Duration = Duration::from_millis(100);

pub struct ProjectDriver {
    project: Project,
    events: UnboundedReceiver<FsEvent>,
    results: UnboundedReceiver<JobOutcome>,
}

impl ProjectDriver {
    pub fn new(
        project: Project,
        events: UnboundedReceiver<FsEvent>,
        results: UnboundedReceiver<JobOutcome>,
    ) -> Self {
        Self {
            project,
            events,
            results,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    /// Drive the project until `shutdown` fires, then save and hand the
    /// project back.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Project {
        tracing::debug!("project driver started");
        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    self.dispatch(event);
                }
                Some(outcome) = self.results.recv() => {
                    self.project.on_job_finished(outcome);
                }
                _ = tokio::time::sleep(TICK) => {
                    let started = self.project.poll_dirty();
                    if started > 0 {
                        tracing::debug!("debounce fired, {started} jobs started");
                    }
                }
                _ = &mut shutdown => {
                    tracing::debug!("project driver stopping");
                    self.project.shutdown();
                    return self.project;
                }
            }
        }
    }

    fn dispatch(&mut self, event: FsEvent) {
        match event {
            FsEvent::Added(path) => self.project.on_file_added(&path),
            FsEvent::Modified(path) => self.project.on_file_modified(&path),
            FsEvent::Removed(path) => self.project.on_file_removed(&path),
        }
    }
}
