pub mod conversation;
pub mod error_kind;
pub mod status;
pub mod turn;
pub mod user;
