use super::store::*;
use crate::constants;
use crate::model::{
    material::{Material, Upload},
    message::DirectMessage,
    module::{Module, NewModule},
    notification::{NewNotification, Notification},
    post::{Post, PostKind},
    subscription::{SubscribableKind, Subscription, SubscriptionTarget},
    ticket::{QueryTicket, TicketRecord, TicketResponse, TicketStatus},
    traits::Model,
    user::User,
};
use crate::types::error::{Error, Result};
use async_trait::async_trait;
use deadpool_postgres::{Client, Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

pub fn config_pg_pool(database_url: &str) -> Result<Pool> {
    let cfg = tokio_postgres::Config::from_str(database_url)?;
    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(cfg, tokio_postgres::NoTls, mgr_config);
    Ok(Pool::new(mgr, constants::POSTGRES_POOL_SIZE))
}

/// Runs every `.sql` file under `sql_dir`. A failing file is logged and skipped.
pub async fn init_tables(pool: &Pool, sql_dir: &str) -> Result<()> {
    let conn = pool.get().await?;
    let mut entries = async_walkdir::WalkDir::new(Path::new(sql_dir));
    while let Some(entry) = entries.next().await {
        let entry = entry.map_err(|e| Error::system_error(e.to_string().as_str()))?;
        let path = entry.path();
        let is_sql = path.extension().map_or(false, |ext| ext == "sql");
        if !is_sql || entry.metadata().await.map_or(true, |m| m.is_dir()) {
            continue;
        }
        let sql = crate::utils::file::async_get_content(path.as_path()).await?;
        match conn.batch_execute(sql.as_str()).await {
            Ok(()) => tracing::info!("applied {}", path.display()),
            Err(e) => tracing::error!("{}: {}", path.display(), e),
        }
    }
    Ok(())
}

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Client> {
        Ok(self.pool.get().await?)
    }

    async fn get_object<T: Model>(&self, id: i64) -> Result<Option<T>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE {} = $1",
            T::table_name(),
            T::id_column()
        );
        let conn = self.conn().await?;
        Ok(conn.query_opt(sql.as_str(), &[&id]).await?.map(T::from))
    }

    async fn count_where(&self, sql: &str, params: &[&(dyn tokio_postgres::types::ToSql + Sync)]) -> Result<i64> {
        let conn = self.conn().await?;
        Ok(conn.query_one(sql, params).await?.try_get("count")?)
    }

    /// Attaches responses, oldest first, to each ticket row.
    async fn records(&self, conn: &Client, tickets: Vec<QueryTicket>) -> Result<Vec<TicketRecord>> {
        if tickets.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = tickets.iter().map(|t| t.ticket_id).collect();
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE query_id = ANY($1) ORDER BY time_created, response_id",
            constants::RESPONSE_TABLE_NAME
        );
        let mut by_ticket: HashMap<i64, Vec<TicketResponse>> = HashMap::new();
        for row in conn.query(sql.as_str(), &[&ids]).await? {
            let r = TicketResponse::from(row);
            by_ticket.entry(r.query_id).or_default().push(r);
        }
        Ok(tickets
            .into_iter()
            .map(|t| {
                let responses = by_ticket.remove(&t.ticket_id).unwrap_or_default();
                TicketRecord::new(t, responses)
            })
            .collect())
    }

    async fn load_record(&self, conn: &Client, ticket_id: i64) -> Result<Option<TicketRecord>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE ticket_id = $1",
            constants::TICKET_TABLE_NAME
        );
        let ticket = match conn.query_opt(sql.as_str(), &[&ticket_id]).await? {
            Some(row) => QueryTicket::from(row),
            None => return Ok(None),
        };
        Ok(self.records(conn, vec![ticket]).await?.pop())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.get_object::<User>(user_id).await
    }
}

#[async_trait]
impl ModuleStore for PgStore {
    async fn get_module(&self, module_id: i64) -> Result<Option<Module>> {
        self.get_object::<Module>(module_id).await
    }

    async fn list_modules(&self) -> Result<Vec<Module>> {
        let sql = format!("SELECT * FROM \"{}\" ORDER BY name", constants::MODULE_TABLE_NAME);
        let conn = self.conn().await?;
        Ok(conn.query(sql.as_str(), &[]).await?.into_iter().map(Module::from).collect())
    }

    async fn insert_module(&self, module: NewModule) -> Result<Module> {
        let sql = format!(
            "INSERT INTO \"{}\" (name, tag, description) VALUES ($1, $2, $3) RETURNING *",
            constants::MODULE_TABLE_NAME
        );
        let conn = self.conn().await?;
        let row = conn
            .query_one(sql.as_str(), &[&module.name, &module.tag, &module.description])
            .await?;
        Ok(Module::from(row))
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn insert_post(&self, post: Post) -> Result<Post> {
        let sql = format!(
            "INSERT INTO \"{}\" (user_id, parent_post_id, title, content, kind, module_id, material_id, is_anonymous, time_created) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
            constants::POST_TABLE_NAME
        );
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                sql.as_str(),
                &[
                    &post.user_id,
                    &post.parent_post_id,
                    &post.title,
                    &post.content,
                    &post.kind,
                    &post.module_id,
                    &post.material_id,
                    &post.is_anonymous,
                    &post.time_created,
                ],
            )
            .await?;
        Ok(Post::from(row))
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        self.get_object::<Post>(post_id).await
    }

    async fn find_posts(&self, filter: PostFilter) -> Result<Vec<Post>> {
        let table = constants::POST_TABLE_NAME;
        let newest = "ORDER BY time_created DESC, post_id DESC";
        let conn = self.conn().await?;
        let rows = match filter {
            PostFilter::TopLevel => {
                let sql = format!("SELECT * FROM \"{}\" WHERE parent_post_id IS NULL {}", table, newest);
                conn.query(sql.as_str(), &[]).await?
            }
            PostFilter::PostsBy(uid) => {
                let sql = format!("SELECT * FROM \"{}\" WHERE user_id = $1 AND kind <> $2 {}", table, newest);
                conn.query(sql.as_str(), &[&uid, &PostKind::Comment]).await?
            }
            PostFilter::CommentsBy(uid) => {
                let sql = format!("SELECT * FROM \"{}\" WHERE user_id = $1 AND kind = $2 {}", table, newest);
                conn.query(sql.as_str(), &[&uid, &PostKind::Comment]).await?
            }
            PostFilter::CommentsOf(pid) => {
                let sql = format!(
                    "SELECT * FROM \"{}\" WHERE parent_post_id = $1 AND kind = $2 ORDER BY time_created, post_id",
                    table
                );
                conn.query(sql.as_str(), &[&pid, &PostKind::Comment]).await?
            }
            PostFilter::InModule(mid) => {
                let sql = format!(
                    "SELECT * FROM \"{}\" WHERE module_id = $1 AND parent_post_id IS NULL {}",
                    table, newest
                );
                conn.query(sql.as_str(), &[&mid]).await?
            }
            PostFilter::LikedBy(uid) => {
                let sql = format!(
                    "SELECT p.* FROM \"{}\" p JOIN \"{}\" l ON l.post_id = p.post_id WHERE l.user_id = $1 \
                     ORDER BY p.time_created DESC, p.post_id DESC",
                    table,
                    constants::LIKE_TABLE_NAME
                );
                conn.query(sql.as_str(), &[&uid]).await?
            }
            PostFilter::Search(q) => {
                let pattern = format!("%{}%", q);
                let sql = format!(
                    "SELECT * FROM \"{}\" WHERE title ILIKE $1 OR content ILIKE $1 {}",
                    table, newest
                );
                conn.query(sql.as_str(), &[&pattern]).await?
            }
        };
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn update_post(
        &self,
        post_id: i64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Option<Post>> {
        let sql = format!(
            "UPDATE \"{}\" SET title = COALESCE($2, title), content = COALESCE($3, content) \
             WHERE post_id = $1 RETURNING *",
            constants::POST_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn
            .query_opt(sql.as_str(), &[&post_id, &title, &content])
            .await?
            .map(Post::from))
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        let likes = format!(
            "DELETE FROM \"{}\" WHERE post_id = $1 OR post_id IN (SELECT post_id FROM \"{}\" WHERE parent_post_id = $1)",
            constants::LIKE_TABLE_NAME,
            constants::POST_TABLE_NAME
        );
        tx.execute(likes.as_str(), &[&post_id]).await?;
        let comments = format!(
            "DELETE FROM \"{}\" WHERE parent_post_id = $1",
            constants::POST_TABLE_NAME
        );
        tx.execute(comments.as_str(), &[&post_id]).await?;
        let post = format!("DELETE FROM \"{}\" WHERE post_id = $1", constants::POST_TABLE_NAME);
        let n = tx.execute(post.as_str(), &[&post_id]).await?;
        tx.commit().await?;
        Ok(n > 0)
    }

    async fn toggle_like(&self, user_id: i64, post_id: i64, now: i64) -> Result<bool> {
        let conn = self.conn().await?;
        let del = format!(
            "DELETE FROM \"{}\" WHERE user_id = $1 AND post_id = $2",
            constants::LIKE_TABLE_NAME
        );
        if conn.execute(del.as_str(), &[&user_id, &post_id]).await? > 0 {
            return Ok(false);
        }
        let ins = format!(
            "INSERT INTO \"{}\" (user_id, post_id, time_created) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            constants::LIKE_TABLE_NAME
        );
        conn.execute(ins.as_str(), &[&user_id, &post_id, &now]).await?;
        Ok(true)
    }

    async fn has_liked(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let sql = format!(
            "SELECT count(*) AS count FROM \"{}\" WHERE user_id = $1 AND post_id = $2",
            constants::LIKE_TABLE_NAME
        );
        Ok(self.count_where(sql.as_str(), &[&user_id, &post_id]).await? > 0)
    }

    async fn like_count(&self, post_id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT count(*) AS count FROM \"{}\" WHERE post_id = $1",
            constants::LIKE_TABLE_NAME
        );
        self.count_where(sql.as_str(), &[&post_id]).await
    }

    async fn comment_count(&self, post_id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT count(*) AS count FROM \"{}\" WHERE parent_post_id = $1 AND kind = $2",
            constants::POST_TABLE_NAME
        );
        self.count_where(sql.as_str(), &[&post_id, &PostKind::Comment]).await
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn find_subscription(
        &self,
        user_id: i64,
        target: SubscriptionTarget,
    ) -> Result<Option<Subscription>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE user_id = $1 AND subscribable_type = $2 AND subscribable_id = $3",
            constants::SUBSCRIPTION_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn
            .query_opt(sql.as_str(), &[&user_id, &target.kind(), &target.id()])
            .await?
            .map(Subscription::from))
    }

    async fn upsert_subscription(
        &self,
        user_id: i64,
        target: SubscriptionTarget,
        now: i64,
    ) -> Result<Subscription> {
        let sql = format!(
            "INSERT INTO \"{}\" (user_id, subscribable_type, subscribable_id, time_created) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, subscribable_type, subscribable_id) DO NOTHING",
            constants::SUBSCRIPTION_TABLE_NAME
        );
        {
            let conn = self.conn().await?;
            conn.execute(sql.as_str(), &[&user_id, &target.kind(), &target.id(), &now])
                .await?;
        }
        self.find_subscription(user_id, target)
            .await?
            .ok_or_else(|| Error::system_error("subscription vanished after insert"))
    }

    async fn delete_subscription(&self, user_id: i64, target: SubscriptionTarget) -> Result<bool> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE user_id = $1 AND subscribable_type = $2 AND subscribable_id = $3",
            constants::SUBSCRIPTION_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn
            .execute(sql.as_str(), &[&user_id, &target.kind(), &target.id()])
            .await?
            > 0)
    }

    async fn list_subscriptions(
        &self,
        user_id: i64,
        kind: Option<SubscribableKind>,
    ) -> Result<Vec<Subscription>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE user_id = $1 AND ($2::INT IS NULL OR subscribable_type = $2) \
             ORDER BY time_created DESC, subscription_id DESC",
            constants::SUBSCRIPTION_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn
            .query(sql.as_str(), &[&user_id, &kind])
            .await?
            .into_iter()
            .map(Subscription::from)
            .collect())
    }

    async fn list_subscribers(&self, target: SubscriptionTarget) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT DISTINCT user_id FROM \"{}\" WHERE subscribable_type = $1 AND subscribable_id = $2 AND user_id > 0",
            constants::SUBSCRIPTION_TABLE_NAME
        );
        let conn = self.conn().await?;
        let rows = conn
            .query(sql.as_str(), &[&target.kind(), &target.id()])
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.try_get::<_, i64>("user_id").ok())
            .collect())
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notifications(
        &self,
        items: Vec<NewNotification>,
        now: i64,
    ) -> Result<Vec<Notification>> {
        let sql = format!(
            "INSERT INTO \"{}\" (user_id, title, message, kind, related_id, is_read, time_created) \
             VALUES ($1, $2, $3, $4, $5, FALSE, $6) RETURNING *",
            constants::NOTIFICATION_TABLE_NAME
        );
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        let stmt = tx.prepare(sql.as_str()).await?;
        let mut out = Vec::with_capacity(items.len());
        for n in &items {
            let row = tx
                .query_one(
                    &stmt,
                    &[&n.user_id, &n.title, &n.message, &n.kind, &n.related_id, &now],
                )
                .await?;
            out.push(Notification::from(row));
        }
        tx.commit().await?;
        Ok(out)
    }

    async fn list_notifications(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE) \
             ORDER BY time_created DESC, notification_id DESC",
            constants::NOTIFICATION_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn
            .query(sql.as_str(), &[&user_id, &unread_only])
            .await?
            .into_iter()
            .map(Notification::from)
            .collect())
    }

    async fn unread_notifications(&self, user_id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT count(*) AS count FROM \"{}\" WHERE user_id = $1 AND is_read = FALSE",
            constants::NOTIFICATION_TABLE_NAME
        );
        self.count_where(sql.as_str(), &[&user_id]).await
    }

    async fn mark_notification_read(&self, notification_id: i64, user_id: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE \"{}\" SET is_read = TRUE WHERE notification_id = $1 AND user_id = $2",
            constants::NOTIFICATION_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn.execute(sql.as_str(), &[&notification_id, &user_id]).await? > 0)
    }

    async fn mark_all_notifications_read(&self, user_id: i64) -> Result<u64> {
        let sql = format!(
            "UPDATE \"{}\" SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
            constants::NOTIFICATION_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn.execute(sql.as_str(), &[&user_id]).await?)
    }

    async fn delete_notification(&self, notification_id: i64, user_id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE notification_id = $1 AND user_id = $2",
            constants::NOTIFICATION_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn.execute(sql.as_str(), &[&notification_id, &user_id]).await? > 0)
    }

    async fn delete_read_notifications(&self, user_id: i64) -> Result<u64> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE user_id = $1 AND is_read = TRUE",
            constants::NOTIFICATION_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn.execute(sql.as_str(), &[&user_id]).await?)
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn insert_ticket(
        &self,
        mut ticket: QueryTicket,
        attachment: Option<&Upload>,
    ) -> Result<(QueryTicket, Option<Material>)> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;
        let material = match attachment {
            Some(upload) => {
                let sql = material_insert_sql();
                let size = upload.bytes.len() as i64;
                let row = tx
                    .query_one(
                        sql.as_str(),
                        &[
                            &upload.file_name,
                            &upload.file_name,
                            &upload.content_type,
                            &size,
                            &upload.bytes,
                            &ticket.time_created,
                        ],
                    )
                    .await?;
                Some(Material::from(row))
            }
            None => None,
        };
        ticket.material_id = material.as_ref().map(|m| m.material_id);
        let sql = format!(
            "INSERT INTO \"{}\" (user_id, module_id, title, content, status, material_id, time_created) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
            constants::TICKET_TABLE_NAME
        );
        let row = tx
            .query_one(
                sql.as_str(),
                &[
                    &ticket.user_id,
                    &ticket.module_id,
                    &ticket.title,
                    &ticket.content,
                    &ticket.status,
                    &ticket.material_id,
                    &ticket.time_created,
                ],
            )
            .await?;
        // dropping `tx` without commit rolls the material back too
        tx.commit().await?;
        Ok((QueryTicket::from(row), material))
    }

    async fn get_ticket(&self, ticket_id: i64) -> Result<Option<TicketRecord>> {
        let conn = self.conn().await?;
        self.load_record(&conn, ticket_id).await
    }

    async fn find_tickets(&self, filter: TicketFilter) -> Result<Vec<TicketRecord>> {
        let table = constants::TICKET_TABLE_NAME;
        let newest = "ORDER BY time_created DESC, ticket_id DESC";
        let conn = self.conn().await?;
        let rows = match filter {
            TicketFilter::All => {
                let sql = format!("SELECT * FROM \"{}\" {}", table, newest);
                conn.query(sql.as_str(), &[]).await?
            }
            TicketFilter::Open(modules) => {
                let sql = format!(
                    "SELECT * FROM \"{}\" WHERE status = $1 AND ($2::BIGINT[] IS NULL OR module_id = ANY($2)) {}",
                    table, newest
                );
                conn.query(sql.as_str(), &[&TicketStatus::Sent, &modules]).await?
            }
            TicketFilter::OwnedBy(uid) => {
                let sql = format!("SELECT * FROM \"{}\" WHERE user_id = $1 {}", table, newest);
                conn.query(sql.as_str(), &[&uid]).await?
            }
            TicketFilter::RespondedBy(uid) => {
                let sql = format!(
                    "SELECT * FROM \"{}\" WHERE ticket_id IN (SELECT query_id FROM \"{}\" WHERE user_id = $1) {}",
                    table,
                    constants::RESPONSE_TABLE_NAME,
                    newest
                );
                conn.query(sql.as_str(), &[&uid]).await?
            }
        };
        let tickets = rows.into_iter().map(QueryTicket::from).collect();
        self.records(&conn, tickets).await
    }

    async fn claim_ticket(&self, ticket_id: i64, tutor_id: i64, now: i64) -> Result<ClaimOutcome> {
        let mut conn = self.conn().await?;
        {
            let tx = conn.transaction().await?;
            let claim = format!(
                "UPDATE \"{}\" SET status = $1 WHERE ticket_id = $2 AND status = $3",
                constants::TICKET_TABLE_NAME
            );
            let claimed = tx
                .execute(
                    claim.as_str(),
                    &[&TicketStatus::Received, &ticket_id, &TicketStatus::Sent],
                )
                .await?;
            if claimed == 0 {
                let sql = format!(
                    "SELECT status FROM \"{}\" WHERE ticket_id = $1",
                    constants::TICKET_TABLE_NAME
                );
                return Ok(match tx.query_opt(sql.as_str(), &[&ticket_id]).await? {
                    Some(row) => ClaimOutcome::Rejected(row.try_get("status")?),
                    None => ClaimOutcome::NotFound,
                });
            }
            let marker = format!(
                "INSERT INTO \"{}\" (query_id, user_id, content, material_id, time_created) VALUES ($1, $2, $3, NULL, $4)",
                constants::RESPONSE_TABLE_NAME
            );
            tx.execute(
                marker.as_str(),
                &[&ticket_id, &tutor_id, &constants::CLAIM_SENTINEL, &now],
            )
            .await?;
            tx.commit().await?;
        }
        Ok(match self.load_record(&conn, ticket_id).await? {
            Some(record) => ClaimOutcome::Claimed(record),
            None => ClaimOutcome::NotFound,
        })
    }

    async fn respond_ticket(
        &self,
        ticket_id: i64,
        tutor_id: i64,
        content: &str,
        material_id: Option<i64>,
        now: i64,
    ) -> Result<RespondOutcome> {
        let mut conn = self.conn().await?;
        {
            let tx = conn.transaction().await?;
            let lock = format!(
                "SELECT status FROM \"{}\" WHERE ticket_id = $1 FOR UPDATE",
                constants::TICKET_TABLE_NAME
            );
            let status: TicketStatus = match tx.query_opt(lock.as_str(), &[&ticket_id]).await? {
                Some(row) => row.try_get("status")?,
                None => return Ok(RespondOutcome::NotFound),
            };
            let prior = format!(
                "SELECT count(*) AS count FROM \"{}\" WHERE query_id = $1 AND user_id = $2",
                constants::RESPONSE_TABLE_NAME
            );
            let count: i64 = tx
                .query_one(prior.as_str(), &[&ticket_id, &tutor_id])
                .await?
                .try_get("count")?;
            if count == 0 {
                return Ok(RespondOutcome::NotClaimedByCaller(status));
            }
            let answer = format!(
                "INSERT INTO \"{}\" (query_id, user_id, content, material_id, time_created) VALUES ($1, $2, $3, $4, $5)",
                constants::RESPONSE_TABLE_NAME
            );
            tx.execute(
                answer.as_str(),
                &[&ticket_id, &tutor_id, &content, &material_id, &now],
            )
            .await?;
            let update = format!(
                "UPDATE \"{}\" SET status = $1 WHERE ticket_id = $2",
                constants::TICKET_TABLE_NAME
            );
            tx.execute(update.as_str(), &[&TicketStatus::Responded, &ticket_id])
                .await?;
            tx.commit().await?;
        }
        Ok(match self.load_record(&conn, ticket_id).await? {
            Some(record) => RespondOutcome::Responded(record),
            None => RespondOutcome::NotFound,
        })
    }
}

fn material_insert_sql() -> String {
    format!(
        "INSERT INTO \"{}\" (title, file_name, file_type, file_size, data, time_created) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING material_id, title, file_name, file_type, file_size, time_created",
        constants::MATERIAL_TABLE_NAME
    )
}

#[async_trait]
impl MaterialStore for PgStore {
    async fn insert_material(&self, title: &str, upload: &Upload, now: i64) -> Result<Material> {
        let sql = material_insert_sql();
        let size = upload.bytes.len() as i64;
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                sql.as_str(),
                &[
                    &title,
                    &upload.file_name,
                    &upload.content_type,
                    &size,
                    &upload.bytes,
                    &now,
                ],
            )
            .await?;
        Ok(Material::from(row))
    }

    async fn get_material(&self, material_id: i64) -> Result<Option<Material>> {
        let sql = format!(
            "SELECT material_id, title, file_name, file_type, file_size, time_created FROM \"{}\" WHERE material_id = $1",
            constants::MATERIAL_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn
            .query_opt(sql.as_str(), &[&material_id])
            .await?
            .map(Material::from))
    }

    async fn fetch_material(&self, material_id: i64) -> Result<Option<(Material, Vec<u8>)>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE material_id = $1",
            constants::MATERIAL_TABLE_NAME
        );
        let conn = self.conn().await?;
        match conn.query_opt(sql.as_str(), &[&material_id]).await? {
            Some(row) => {
                let data: Vec<u8> = row.try_get("data")?;
                Ok(Some((Material::from(row), data)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert_message(&self, message: DirectMessage) -> Result<DirectMessage> {
        let sql = format!(
            "INSERT INTO \"{}\" (sender_id, recipient_id, content, material_id, is_read, time_created) \
             VALUES ($1, $2, $3, $4, FALSE, $5) RETURNING *",
            constants::MESSAGE_TABLE_NAME
        );
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                sql.as_str(),
                &[
                    &message.sender_id,
                    &message.recipient_id,
                    &message.content,
                    &message.material_id,
                    &message.time_created,
                ],
            )
            .await?;
        Ok(DirectMessage::from(row))
    }

    async fn messages_of(&self, user_id: i64) -> Result<Vec<DirectMessage>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE sender_id = $1 OR recipient_id = $1 \
             ORDER BY time_created DESC, message_id DESC",
            constants::MESSAGE_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn
            .query(sql.as_str(), &[&user_id])
            .await?
            .into_iter()
            .map(DirectMessage::from)
            .collect())
    }

    async fn messages_between(&self, user_id: i64, other_id: i64) -> Result<Vec<DirectMessage>> {
        let sql = format!(
            "SELECT * FROM \"{}\" WHERE (sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1) \
             ORDER BY time_created, message_id",
            constants::MESSAGE_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn
            .query(sql.as_str(), &[&user_id, &other_id])
            .await?
            .into_iter()
            .map(DirectMessage::from)
            .collect())
    }

    async fn mark_messages_read(&self, recipient_id: i64, sender_id: i64) -> Result<u64> {
        let sql = format!(
            "UPDATE \"{}\" SET is_read = TRUE WHERE recipient_id = $1 AND sender_id = $2 AND is_read = FALSE",
            constants::MESSAGE_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn.execute(sql.as_str(), &[&recipient_id, &sender_id]).await?)
    }

    async fn mark_message_read(&self, message_id: i64, recipient_id: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE \"{}\" SET is_read = TRUE WHERE message_id = $1 AND recipient_id = $2",
            constants::MESSAGE_TABLE_NAME
        );
        let conn = self.conn().await?;
        Ok(conn.execute(sql.as_str(), &[&message_id, &recipient_id]).await? > 0)
    }

    async fn unread_messages(&self, user_id: i64) -> Result<i64> {
        let sql = format!(
            "SELECT count(*) AS count FROM \"{}\" WHERE recipient_id = $1 AND is_read = FALSE",
            constants::MESSAGE_TABLE_NAME
        );
        self.count_where(sql.as_str(), &[&user_id]).await
    }
}
