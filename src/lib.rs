pub(crate) mod api;
pub(crate) mod auth;
pub(crate) mod cli;
pub(crate) mod core;
pub(crate) mod exam;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, telemetry};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let command = cli::parse_args(std::env::args().skip(1))?;
    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    tracing::debug!(
        environment = %settings.runtime().environment.as_str(),
        api = %settings.api().base_url(),
        "exam-portal starting"
    );

    cli::commands::execute(command, &settings).await
}
