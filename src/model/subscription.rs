use super::traits::Model;
use crate::constants;
use campus_learn::{FromPgRow, PgEnum};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PgEnum)]
#[serde(try_from = "i32", into = "i32")]
pub enum SubscribableKind {
    #[default]
    Topic = 1,
    Module = 2,
}

impl SubscribableKind {
    pub fn name(&self) -> &'static str {
        match self {
            SubscribableKind::Topic => "Topic",
            SubscribableKind::Module => "Module",
        }
    }
}

/// Something a user can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionTarget {
    Topic(i64),
    Module(i64),
}

impl SubscriptionTarget {
    pub fn new(kind: SubscribableKind, id: i64) -> Self {
        match kind {
            SubscribableKind::Topic => SubscriptionTarget::Topic(id),
            SubscribableKind::Module => SubscriptionTarget::Module(id),
        }
    }

    pub fn kind(&self) -> SubscribableKind {
        match self {
            SubscriptionTarget::Topic(_) => SubscribableKind::Topic,
            SubscriptionTarget::Module(_) => SubscribableKind::Module,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            SubscriptionTarget::Topic(id) | SubscriptionTarget::Module(id) => id,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, FromPgRow)]
pub struct Subscription {
    pub subscription_id: i64,
    pub user_id: i64,
    pub subscribable_type: SubscribableKind,
    pub subscribable_id: i64,
    pub time_created: i64,
}

impl Subscription {
    pub fn target(&self) -> SubscriptionTarget {
        SubscriptionTarget::new(self.subscribable_type, self.subscribable_id)
    }
}

impl Model for Subscription {
    fn table_name() -> &'static str {
        constants::SUBSCRIPTION_TABLE_NAME
    }
    fn id_column() -> &'static str {
        "subscription_id"
    }
}
