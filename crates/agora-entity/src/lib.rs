pub mod activity_log;
pub mod agent_access;
pub mod conversation;
pub mod turn;
pub mod user;
