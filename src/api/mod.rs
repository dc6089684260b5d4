pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod client;
pub(crate) mod errors;
pub(crate) mod student;
