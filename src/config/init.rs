use super::env::Config;
use crate::dao::{
    cache::{Cache, MemoryCache, RedisCache},
    memory::MemStore,
    message_dao::MessageEngine,
    module_dao::Catalog,
    notification_dao::{FanOut, Notifier},
    post_dao::PostEngine,
    postgres::{self, PgStore},
    redis_db,
    store::Store,
    subscription_dao::SubscriptionRegistry,
    ticket_dao::TicketEngine,
    user_dao::{AuthResolver, JwtResolver, UserDirectory},
};
use crate::utils::{
    jwt::TokenCodec,
    mailer::{HttpMailer, LogMailer, Mailer},
    outbox::{EmailWorker, Outbox},
};
use std::sync::Arc;

/// Every engine, wired to one store, one cache and one outbox. Shared by all handlers.
pub struct AppState {
    pub auth: Arc<dyn AuthResolver>,
    pub users: UserDirectory,
    pub subscriptions: SubscriptionRegistry,
    pub notifier: Notifier,
    pub fan_out: FanOut,
    pub posts: PostEngine,
    pub tickets: TicketEngine,
    pub messages: MessageEngine,
    pub catalog: Catalog,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>, outbox: Outbox, codec: TokenCodec) -> Self {
        let users = UserDirectory::new(store.clone(), cache.clone());
        let subscriptions = SubscriptionRegistry::new(store.clone(), cache);
        let notifier = Notifier::new(store.clone(), users.clone(), outbox);
        let fan_out = FanOut::new(store.clone(), subscriptions.clone(), notifier.clone());
        Self {
            auth: Arc::new(JwtResolver::new(codec, users.clone())),
            posts: PostEngine::new(
                store.clone(),
                users.clone(),
                subscriptions.clone(),
                notifier.clone(),
                fan_out.clone(),
            ),
            tickets: TicketEngine::new(
                store.clone(),
                users.clone(),
                subscriptions.clone(),
                notifier.clone(),
            ),
            messages: MessageEngine::new(store.clone(), users.clone(), notifier.clone()),
            catalog: Catalog::new(store),
            users,
            subscriptions,
            notifier,
            fan_out,
        }
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match &config.database_url {
        Some(url) => {
            let pool = postgres::config_pg_pool(url)?;
            postgres::init_tables(&pool, &config.sql_dir).await?;
            tracing::info!("using postgres store");
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data lives in memory only");
            Ok(Arc::new(MemStore::new()))
        }
    }
}

async fn open_cache(config: &Config) -> anyhow::Result<Arc<dyn Cache>> {
    match &config.redis_url {
        Some(url) => {
            let pool = redis_db::create_redis_pool(url)?;
            match redis_db::ping(&pool).await {
                Ok(pong) => tracing::info!("redis answered {}", pong),
                Err(e) => tracing::warn!("redis unreachable, cache will miss until it is back: {}", e),
            }
            Ok(Arc::new(RedisCache::new(pool, config.cache_sliding)))
        }
        None => {
            tracing::info!("using in-process cache");
            Ok(Arc::new(MemoryCache::new(config.cache_sliding)))
        }
    }
}

fn open_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.mail_relay_url {
        Some(url) => Ok(Arc::new(HttpMailer::new(
            url,
            config.mail_relay_token.clone(),
            &config.mail_from_name,
            &config.mail_from_address,
        )?)),
        None => {
            tracing::warn!("MAIL_RELAY_URL not set, emails are only logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Opens the backends and starts the email worker.
pub async fn init(config: &Config) -> anyhow::Result<(Arc<AppState>, EmailWorker)> {
    let store = open_store(config).await?;
    let cache = open_cache(config).await?;
    let (outbox, worker) = Outbox::spawn(open_mailer(config)?, config.outbox.clone());
    let codec = TokenCodec::new(&config.jwt_key, config.token_validity_secs);
    Ok((Arc::new(AppState::new(store, cache, outbox, codec)), worker))
}
