// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Utilities to synchronize the configuration file with the store.

use idp_config::{ClientTypeConfig, ClientsConfig};
use idp_data_model::{ClientType, Clock};
use idp_storage::{BoxRepository, RepositoryError};
use rand::RngCore;
use tracing::info;

const fn map_client_type(config: ClientTypeConfig) -> ClientType {
    match config {
        ClientTypeConfig::Confidential => ClientType::Confidential,
        ClientTypeConfig::Public => ClientType::Public,
    }
}

/// Register the clients from the configuration in the store
///
/// # Errors
///
/// Returns an error if the store fails
#[tracing::instrument(name = "config.sync", skip_all)]
pub async fn config_sync(
    clients_config: ClientsConfig,
    mut repo: BoxRepository,
    rng: &mut (dyn RngCore + Send),
    clock: &dyn Clock,
) -> Result<(), RepositoryError> {
    info!(count = clients_config.len(), "Syncing static clients");

    for client in clients_config {
        let client = repo
            .oauth2_client()
            .upsert_static(
                &mut *rng,
                clock,
                client.client_id,
                map_client_type(client.client_type),
                client.client_name,
                client.post_logout_redirect_uris,
            )
            .await?;

        info!(
            client.id = %client.id,
            client.client_id = %client.client_id,
            "Synced client"
        );
    }

    repo.save().await?;

    Ok(())
}
