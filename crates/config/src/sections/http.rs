// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::net::{Ipv6Addr, SocketAddr};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ConfigurationSection, util::error_on_field};

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 8080))
}

fn default_allowed_hosts() -> Vec<String> {
    vec![
        ".localhost".to_owned(),
        "127.0.0.1".to_owned(),
        "[::1]".to_owned(),
    ]
}

/// Configuration related to the web server
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone)]
pub struct HttpConfig {
    /// Address the server listens on. Defaults to `[::]:8080`
    #[serde(default = "default_listen")]
    #[schemars(with = "String", example = "default_listen")]
    pub listen: SocketAddr,

    /// Issuer advertised in the discovery document.
    ///
    /// When set, absolute URLs are built from its scheme and host. Otherwise
    /// they are derived from each request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Url>,

    /// Host names the server answers to when no issuer is set.
    ///
    /// Requests with a `Host` header outside this list are rejected. A name
    /// starting with a dot also matches its subdomains, and `*` matches any
    /// host. Defaults to the loopback names only.
    #[serde(default = "default_allowed_hosts")]
    #[schemars(example = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            issuer: None,
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

impl ConfigurationSection for HttpConfig {
    const PATH: Option<&'static str> = Some("http");

    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        if let Some(issuer) = &self.issuer {
            if !matches!(issuer.scheme(), "http" | "https") {
                let error = figment::Error::from(format!(
                    "Issuer scheme must be http or https, got {:?}",
                    issuer.scheme()
                ));
                return Err(error_on_field::<Self>(figment, error, "issuer").into());
            }

            if issuer.host_str().is_none() {
                let error = figment::Error::from("Issuer must have a host".to_owned());
                return Err(error_on_field::<Self>(figment, error, "issuer").into());
            }
        }

        if self.allowed_hosts.iter().any(|host| host.trim().is_empty()) {
            let error = figment::Error::from("Allowed hosts must not be empty".to_owned());
            return Err(error_on_field::<Self>(figment, error, "allowed_hosts").into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::{
        Figment, Jail,
        providers::{Format, Yaml},
    };

    use super::*;

    #[test]
    fn load_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    http:
                      listen: 127.0.0.1:9000
                      issuer: https://auth.example.com/
                      allowed_hosts:
                        - .example.com
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = HttpConfig::extract(&figment).map_err(|e| e.to_string())?;

            assert_eq!(config.listen, "127.0.0.1:9000".parse().unwrap());
            assert_eq!(
                config.issuer.as_ref().map(Url::as_str),
                Some("https://auth.example.com/")
            );
            assert_eq!(config.allowed_hosts, [".example.com"]);

            Ok(())
        });
    }

    #[test]
    fn default_allowed_hosts_are_loopback() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "http: {}")?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            let config = HttpConfig::extract(&figment).map_err(|e| e.to_string())?;
            assert_eq!(config.allowed_hosts, [".localhost", "127.0.0.1", "[::1]"]);

            jail.create_file(
                "config.yaml",
                r#"
                    http:
                      allowed_hosts: [""]
                "#,
            )?;
            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            assert!(HttpConfig::extract(&figment).is_err());

            Ok(())
        });
    }

    #[test]
    fn reject_bad_issuer() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r"
                    http:
                      issuer: ftp://auth.example.com/
                ",
            )?;

            let figment = Figment::new().merge(Yaml::file("config.yaml"));
            assert!(HttpConfig::extract(&figment).is_err());

            Ok(())
        });
    }
}
