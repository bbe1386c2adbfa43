pub mod messages;
pub mod webhooks;
