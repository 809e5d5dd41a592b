pub mod material;
pub mod message;
pub mod module;
pub mod notification;
pub mod post;
pub mod subscription;
pub mod ticket;
pub mod traits;
pub mod user;
