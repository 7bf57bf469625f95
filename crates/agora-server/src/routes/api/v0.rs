pub(crate) mod admin;
pub(crate) mod agents;
pub(crate) mod chat;
pub(crate) mod conversations;
pub(crate) mod status;
