use std::time::Duration;

// Headers
pub const AUTHORIZATION: &str = "Authorization";

//table_name
pub const USER_TABLE_NAME: &str = "users";
pub const MODULE_TABLE_NAME: &str = "modules";
pub const POST_TABLE_NAME: &str = "posts";
pub const LIKE_TABLE_NAME: &str = "likes";
pub const SUBSCRIPTION_TABLE_NAME: &str = "subscriptions";
pub const NOTIFICATION_TABLE_NAME: &str = "notifications";
pub const TICKET_TABLE_NAME: &str = "query_ticket";
pub const RESPONSE_TABLE_NAME: &str = "responses";
pub const MATERIAL_TABLE_NAME: &str = "materials";
pub const MESSAGE_TABLE_NAME: &str = "direct_messages";

pub const POSTGRES_POOL_SIZE: usize = 8;
pub const REDIS_POOL_SIZE: u64 = 10;

// cache keys; every key family ends with ':' so prefix removal cannot bleed into other ids
pub const USER_SUBSCRIPTIONS_KEY: &str = "user_subscriptions:";
pub const SUBSCRIPTION_CHECK_KEY: &str = "subscription_check:";
pub const SUBSCRIBERS_KEY: &str = "subscribers:";
pub const USER_KEY: &str = "user:";

// cache lifetimes
pub const USER_SUBSCRIPTIONS_TTL: Duration = Duration::from_secs(10 * 60);
pub const SUBSCRIPTION_CHECK_TTL: Duration = Duration::from_secs(5 * 60);
pub const SUBSCRIBERS_TTL: Duration = Duration::from_secs(5 * 60);
pub const USER_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SLIDING_WINDOW: Duration = Duration::from_secs(60);

// query tickets
pub const CLAIM_SENTINEL: &str = "[CLAIMED]";
pub const MAX_TICKET_TITLE_LEN: usize = 200;
pub const MAX_ATTACHMENT_SIZE: usize = 10 * 1024 * 1024;
pub const ALLOWED_ATTACHMENT_EXTENSIONS: [&str; 7] =
    [".pdf", ".doc", ".docx", ".txt", ".jpg", ".jpeg", ".png"];

// email
pub const EMAIL_SUBJECT_PREFIX: &str = "Campus Learn: ";
pub const DEFAULT_EMAIL_SEND_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_EMAIL_BATCH_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_EMAIL_MAX_INFLIGHT: usize = 8;
pub const EMAIL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const ANONYMOUS_AUTHOR: &str = "Anonymous";
pub const ANONYMOUS_EMAIL: &str = "anonymous@campuslearn.com";
