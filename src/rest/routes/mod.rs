pub mod auth;
pub mod messages;
pub mod misc;
pub mod notifications;
pub mod sessions;
