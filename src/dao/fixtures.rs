//! In-memory wiring for engine tests.

use super::cache::MemoryCache;
use super::memory::MemStore;
use super::store::Store;
use crate::config::init::AppState;
use crate::model::{
    module::{Module, NewModule},
    post::{NewPost, Post},
    user::{AccessLevel, User},
};
use crate::utils::jwt::TokenCodec;
use crate::utils::outbox::{EmailJob, Outbox};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Fixture {
    pub mem: Arc<MemStore>,
    pub store: Arc<dyn Store>,
    pub state: AppState,
    mail: UnboundedReceiver<EmailJob>,
}

impl Fixture {
    pub fn new() -> Self {
        let mem = Arc::new(MemStore::new());
        let store: Arc<dyn Store> = mem.clone();
        let (outbox, mail) = Outbox::channel();
        let state = AppState::new(
            store.clone(),
            Arc::new(MemoryCache::default()),
            outbox,
            TokenCodec::new("test-secret", 3600),
        );
        Self {
            mem,
            store,
            state,
            mail,
        }
    }

    pub fn user(&self, name: &str, level: AccessLevel) -> User {
        self.mem.add_user(User {
            email: format!("{}@campus.test", name.to_lowercase()),
            name: name.to_string(),
            surname: "Tester".to_string(),
            access_level: level,
            ..Default::default()
        })
    }

    pub fn user_without_email(&self, name: &str) -> User {
        self.mem.add_user(User {
            name: name.to_string(),
            ..Default::default()
        })
    }

    pub async fn module(&self, name: &str) -> Module {
        self.store
            .insert_module(NewModule {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn topic(&self, author_id: i64, title: &str, module_id: Option<i64>) -> Post {
        self.state
            .posts
            .create(author_id, NewPost::topic(title, "Let's discuss", module_id))
            .await
            .unwrap()
    }

    /// Every email job posted so far.
    pub fn drain_mail(&mut self) -> Vec<EmailJob> {
        let mut jobs = Vec::new();
        while let Ok(job) = self.mail.try_recv() {
            jobs.push(job);
        }
        jobs
    }
}
