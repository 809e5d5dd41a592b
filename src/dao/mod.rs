pub mod cache;
pub mod memory;
pub mod message_dao;
pub mod module_dao;
pub mod notification_dao;
pub mod post_dao;
pub mod postgres;
pub mod redis_db;
pub mod store;
pub mod subscription_dao;
pub mod ticket_dao;
pub mod user_dao;

#[cfg(test)]
pub mod fixtures;
