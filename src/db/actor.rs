use crate::db::models::Post;
use crate::db::schema::SQLITE_INIT;
use crate::error::StoreError;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub enum StoreActorMessage {
    /// Create the `posts` table if absent. No-op once done.
    EnsureSchema(RpcReplyPort<Result<(), StoreError>>),

    /// Insert or replace one record by id; committed on its own.
    Upsert(Post, RpcReplyPort<Result<(), StoreError>>),

    /// All rows ordered by id.
    ReadAll(RpcReplyPort<Result<Vec<Post>, StoreError>>),
}

/// Cloneable handle to the store actor.
///
/// Every call is one mailbox message, so writers are serialized by the actor while
/// reads issued between two upserts of a batch see the rows written so far.
#[derive(Clone)]
pub struct StoreHandle {
    actor: ActorRef<StoreActorMessage>,
}

impl StoreHandle {
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        ractor::call!(self.actor, StoreActorMessage::EnsureSchema).map_err(|e| {
            StoreError::RactorError(format!("StoreActor EnsureSchema RPC failed: {e}"))
        })?
    }

    pub async fn upsert(&self, post: Post) -> Result<(), StoreError> {
        ractor::call!(self.actor, StoreActorMessage::Upsert, post)
            .map_err(|e| StoreError::RactorError(format!("StoreActor Upsert RPC failed: {e}")))?
    }

    /// Upsert each record in order, one commit per record, sleeping `pacing` after each.
    ///
    /// `proceed(written, next)` runs before every record; returning `false` ends the batch
    /// there. Returns how many records were written. On a failed write the rows before it
    /// stay written and the rows after it are not attempted.
    pub async fn upsert_all<F>(
        &self,
        posts: &[Post],
        pacing: Duration,
        mut proceed: F,
    ) -> Result<usize, StoreError>
    where
        F: FnMut(usize, &Post) -> bool,
    {
        for (written, post) in posts.iter().enumerate() {
            if !proceed(written, post) {
                return Ok(written);
            }
            if let Err(e) = self.upsert(post.clone()).await {
                debug!(
                    written,
                    total = posts.len(),
                    id = post.id,
                    "upsert_all stopped at failing record"
                );
                return Err(e);
            }
            debug!(id = post.id, "Post saved");
            if !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
        }
        Ok(posts.len())
    }

    pub async fn read_all(&self) -> Result<Vec<Post>, StoreError> {
        ractor::call!(self.actor, StoreActorMessage::ReadAll)
            .map_err(|e| StoreError::RactorError(format!("StoreActor ReadAll RPC failed: {e}")))?
    }

    /// Stop the actor; pending calls on other clones fail with `RactorError`.
    pub fn stop(&self) {
        self.actor.stop(None);
    }
}

struct StoreActorState {
    pool: SqlitePool,
    schema_ready: bool,
}

struct StoreActor;

#[ractor::async_trait]
impl Actor for StoreActor {
    type Msg = StoreActorMessage;
    type State = StoreActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        info!(database_url = %database_url, "StoreActor initialized");
        Ok(StoreActorState {
            pool,
            schema_ready: false,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StoreActorMessage::EnsureSchema(reply) => {
                let res = self.ensure_schema(state).await;
                let _ = reply.send(res);
            }
            StoreActorMessage::Upsert(post, reply) => {
                let res = match self.ensure_schema(state).await {
                    Ok(()) => self.upsert(&state.pool, post).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(res);
            }
            StoreActorMessage::ReadAll(reply) => {
                let res = self.read_all(state).await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.pool.close().await;
        info!("StoreActor stopped");
        Ok(())
    }
}

impl StoreActor {
    async fn ensure_schema(&self, state: &mut StoreActorState) -> Result<(), StoreError> {
        if state.schema_ready {
            return Ok(());
        }
        apply_schema(&state.pool).await?;
        state.schema_ready = true;
        debug!("posts schema ensured");
        Ok(())
    }

    async fn upsert(&self, pool: &SqlitePool, post: Post) -> Result<(), StoreError> {
        sqlx::query(
            r#"
        INSERT INTO posts (id, title)
        VALUES (?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title
        "#,
        )
        .bind(post.id)
        .bind(post.title)
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn read_all(&self, state: &mut StoreActorState) -> Result<Vec<Post>, StoreError> {
        // The table only appears on first write; before that the store is simply empty.
        if !state.schema_ready {
            let exists: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'posts'",
            )
            .fetch_one(&state.pool)
            .await?;
            if exists == 0 {
                return Ok(Vec::new());
            }
            state.schema_ready = true;
        }

        let rows = sqlx::query_as::<_, Post>(
            r#"
        SELECT id, title
        FROM posts
        ORDER BY id
        "#,
        )
        .fetch_all(&state.pool)
        .await?;

        Ok(rows)
    }
}

/// Spawn the store actor and return a cloneable handle.
pub async fn spawn(database_url: &str) -> Result<StoreHandle, StoreError> {
    let (actor, _jh) = Actor::spawn(None, StoreActor, database_url.to_string())
        .await
        .map_err(|e| StoreError::RactorError(format!("StoreActor spawn failed: {e}")))?;

    Ok(StoreHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
