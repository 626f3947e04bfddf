pub mod availability;
pub mod coordinator;
pub mod meeting;
pub mod notifications;
pub mod packages;
pub mod payments;
pub mod resolver;
pub mod sessions;
