pub mod file;
pub mod jwt;
pub mod mailer;
pub mod outbox;
pub mod templates;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
