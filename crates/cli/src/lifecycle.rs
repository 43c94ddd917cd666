// Copyright 2024, 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{process::ExitCode, time::Duration};

use futures_util::future::BoxFuture;
use idp_templates::Templates;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// How long in-flight requests get to finish once a shutdown started
const GRACE_PERIOD: Duration = Duration::from_secs(60);

type ReloadHandler = Box<dyn Fn() -> BoxFuture<'static, ()> + Send>;

/// Something which can be refreshed in place on SIGHUP
pub trait Reloadable: Clone + Send + Sync + 'static {
    fn reload(&self) -> impl Future<Output = ()> + Send;
}

impl Reloadable for Templates {
    async fn reload(&self) {
        match Templates::reload(self).await {
            Ok(()) => tracing::info!("Templates reloaded"),
            Err(err) => tracing::error!(
                error = &err as &dyn std::error::Error,
                "Could not reload the templates, keeping the previous ones"
            ),
        }
    }
}

/// Drives the server tasks through their lifetime.
///
/// Tasks are spawned on the [`TaskTracker`]. They should stop accepting work
/// once the drain token is cancelled, and drop whatever they are doing once
/// the abort token is cancelled. Cancelling the drain token from a task tells
/// the manager that it failed.
pub struct LifecycleManager {
    drain: CancellationToken,
    abort: CancellationToken,
    tasks: TaskTracker,
    sigterm: Signal,
    sigint: Signal,
    sighup: Signal,
    on_reload: Vec<ReloadHandler>,
}

/// Wait for either SIGTERM or SIGINT, returning which one arrived
async fn stop_signal(sigterm: &mut Signal, sigint: &mut Signal) -> &'static str {
    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

impl LifecycleManager {
    /// Install the signal handlers
    ///
    /// # Errors
    ///
    /// Returns an error if one of the signal handlers could not be installed
    pub fn new() -> Result<Self, std::io::Error> {
        let abort = CancellationToken::new();

        Ok(Self {
            drain: abort.child_token(),
            abort,
            tasks: TaskTracker::new(),
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sighup: signal(SignalKind::hangup())?,
            on_reload: Vec::new(),
        })
    }

    /// Reload `reloadable` every time the process gets a SIGHUP
    pub fn register_reloadable(&mut self, reloadable: &impl Reloadable) {
        let reloadable = reloadable.clone();
        self.on_reload.push(Box::new(move || {
            let reloadable = reloadable.clone();
            Box::pin(async move { reloadable.reload().await })
        }));
    }

    #[must_use]
    pub fn task_tracker(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Cancelled when the tasks should stop taking new work
    #[must_use]
    pub fn soft_shutdown_token(&self) -> CancellationToken {
        self.drain.clone()
    }

    /// Cancelled when the tasks should drop the work still in progress
    #[must_use]
    pub fn hard_shutdown_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Serve until a stop signal, then drain and stop the tasks.
    ///
    /// The exit code is a failure when a task initiated the shutdown.
    pub async fn run(mut self) -> ExitCode {
        let task_failed = loop {
            tokio::select! {
                () = self.drain.cancelled() => {
                    tracing::error!("A server task stopped unexpectedly, shutting down");
                    break true;
                },

                name = stop_signal(&mut self.sigterm, &mut self.sigint) => {
                    tracing::info!(signal = name, "Shutting down, waiting for in-flight requests");
                    break false;
                },

                _ = self.sighup.recv() => {
                    tracing::info!(signal = "SIGHUP", "Reloading");
                    futures_util::future::join_all(self.on_reload.iter().map(|reload| reload()))
                        .await;
                },
            }
        };

        self.drain.cancel();
        self.tasks.close();

        tokio::select! {
            () = self.tasks.wait() => {},

            name = stop_signal(&mut self.sigterm, &mut self.sigint) => {
                tracing::warn!(signal = name, "Stopping now, dropping in-flight requests");
            },

            () = tokio::time::sleep(GRACE_PERIOD) => {
                tracing::warn!(
                    grace_period = ?GRACE_PERIOD,
                    "Requests did not finish in time, dropping them"
                );
            },
        }

        // The tasks return as soon as they see the abort token
        self.abort.cancel();
        self.tasks.wait().await;

        tracing::info!("Stopped");

        if task_failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}
