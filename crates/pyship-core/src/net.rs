use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::config::NetworkConfig;
use crate::PYSHIP_VERSION;

pub(crate) fn build_http_client(network: &NetworkConfig) -> Result<Client> {
    let builder = Client::builder()
        .user_agent(format!("pyship/{PYSHIP_VERSION}"))
        .timeout(network.timeout);
    let builder = if network.keep_proxies {
        builder
    } else {
        builder.no_proxy()
    };
    builder.build().context("failed to build HTTP client")
}
