pub mod activity_log;
pub mod agent_access;
pub mod conversation;
pub mod schema;
pub mod turn;
pub mod user;
pub mod util;

pub use sea_orm;
