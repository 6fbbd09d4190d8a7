pub mod attendance;
pub mod auth;
pub mod core;
pub mod groups;
pub mod realtime;
