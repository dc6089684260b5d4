pub(crate) mod config;
pub(crate) mod notify;
pub(crate) mod shutdown;
pub(crate) mod telemetry;
pub(crate) mod time;
