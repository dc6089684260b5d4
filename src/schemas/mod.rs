pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod exam;
pub(crate) mod results;
pub(crate) mod session;
