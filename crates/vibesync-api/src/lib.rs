pub mod auth;
pub mod convert;
pub mod error;
pub mod friends;
pub mod messages;
pub mod middleware;
pub mod posts;
