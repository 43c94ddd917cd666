// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{future::IntoFuture, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use figment::Figment;
use idp_config::{AppConfig, ConfigurationSection};
use idp_data_model::SystemClock;
use idp_storage::RepositoryFactory;
use idp_storage_memory::MemoryRepositoryFactory;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tracing::{info, info_span};

use crate::{
    app_state::AppState,
    lifecycle::LifecycleManager,
    util::{cookie_manager_from_config, site_config_from_config, templates_from_config},
};

#[derive(Parser, Debug, Default)]
pub(super) struct Options {
    /// Do not register the clients from the configuration file
    #[arg(long)]
    no_sync: bool,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let span = info_span!("cli.run.init").entered();
        let mut shutdown = LifecycleManager::new()?;
        let config = AppConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;

        info!(version = crate::VERSION, "Starting up");

        let repository_factory = MemoryRepositoryFactory::new();

        if self.no_sync {
            info!("Skipping configuration sync");
        } else {
            // XXX: we should disallow SeedableRng::from_entropy
            let mut rng = rand_chacha::ChaChaRng::from_entropy();
            let repo = repository_factory.create().await?;
            crate::sync::config_sync(
                config.clients.clone(),
                repo,
                &mut rng,
                &SystemClock::default(),
            )
            .await
            .context("could not sync the configuration with the store")?;
        }

        // Initialize the key store
        let key_store = config
            .secrets
            .key_store()
            .await
            .context("could not import keys from config")?;

        let cookie_manager = cookie_manager_from_config(&config.http, &config.secrets);

        let site_config = site_config_from_config(&config.http, &config.oidc, &config.logout);
        if site_config.logout.enabled {
            info!("RP-Initiated Logout is enabled");
        }

        // Load and compile the templates
        let templates = templates_from_config(&config.templates).await?;
        shutdown.register_reloadable(&templates);

        let listen = config.http.listen;

        // Explicitly drop the config to not keep the secrets around
        drop(config);

        let router = idp_handlers::router(&site_config).with_state(AppState {
            repository_factory,
            templates,
            key_store,
            cookie_manager,
            site_config,
        });

        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("could not bind to {listen}"))?;

        match listener.local_addr() {
            Ok(addr) => info!("Listening on http://{addr}"),
            Err(e) => tracing::warn!(
                error = &e as &dyn std::error::Error,
                "Could not get local address for listener, something might be wrong!"
            ),
        }

        span.exit();

        let soft_shutdown_token = shutdown.soft_shutdown_token();
        let hard_shutdown_token = shutdown.hard_shutdown_token();
        shutdown.task_tracker().spawn(async move {
            let server = axum::serve(listener, router)
                .with_graceful_shutdown(soft_shutdown_token.clone().cancelled_owned())
                .into_future();

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        tracing::error!(
                            error = &e as &dyn std::error::Error,
                            "Server failed"
                        );
                        // Make the lifecycle manager notice
                        soft_shutdown_token.cancel();
                    }
                },

                () = hard_shutdown_token.cancelled() => {
                    tracing::warn!("Closing the connections still open");
                },
            }
        });

        let exit_code = shutdown.run().await;

        Ok(exit_code)
    }
}
