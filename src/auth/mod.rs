pub(crate) mod credentials;
pub(crate) mod guards;
pub(crate) mod token;
