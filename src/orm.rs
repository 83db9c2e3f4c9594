// Model persistence with lifecycle signals around every write

use std::sync::Arc;

use sqlx::{pool::PoolConnection, Row, Sqlite, SqliteConnection, Transaction};
use tracing::{debug, instrument};

use crate::{
    database::Database,
    error::{AppError, AppResult},
    models::{Like, LikeUpdate, NewLike, NewPage, NewUser, Page, PageUpdate, User},
    signals::{Instance, Signal, SignalContext, SignalRegistry},
};

const SELECT_USER: &str = "SELECT id, username, password, is_staff FROM users";
const SELECT_PAGE: &str = "SELECT user, page_name, page_info, date FROM pages";
const SELECT_LIKE: &str = "SELECT l.page_in, l.likes, p.user, p.page_name, p.page_info, p.date \
                           FROM likes l JOIN pages p ON p.user = l.page_in";

/// Every write runs in one transaction together with the signals it sends.
/// Receivers get that transaction's connection and must do their own
/// writes through the `*_in` methods on it, so a failing receiver rolls
/// back the whole operation.
#[derive(Clone)]
pub struct Orm {
    db: Database,
    signals: Arc<SignalRegistry>,
}

impl Orm {
    pub fn new(db: Database, signals: SignalRegistry) -> Self {
        Self {
            db,
            signals: Arc::new(signals),
        }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        self.db
            .pool
            .begin()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to begin transaction", e))
    }

    async fn commit(tx: Transaction<'static, Sqlite>) -> AppResult<()> {
        tx.commit()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to commit transaction", e))
    }

    async fn acquire(&self) -> AppResult<PoolConnection<Sqlite>> {
        self.db
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::from_sqlx("Failed to acquire connection", e))
    }

    async fn send(&self, conn: &mut SqliteConnection, ctx: SignalContext) -> AppResult<()> {
        self.signals.send(self, conn, &ctx).await
    }

    // Users

    /// Unsaved users carry id 0 in their pre-save signal
    #[instrument(skip(self, new), fields(username = %new.username))]
    pub async fn create_user(&self, new: NewUser) -> AppResult<User> {
        new.validate()?;
        let mut user = User {
            id: 0,
            username: new.username,
            password: new.password,
            is_staff: new.is_staff,
        };

        let mut tx = self.begin().await?;
        self.send(&mut tx, SignalContext::save(Signal::PreSave, Instance::User(user.clone()), true))
            .await?;
        let result = sqlx::query("INSERT INTO users (username, password, is_staff) VALUES (?, ?, ?)")
            .bind(&user.username)
            .bind(&user.password)
            .bind(user.is_staff)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to create user", e))?;
        user.id = result.last_insert_rowid();
        debug!(id = user.id, "user created");

        self.send(&mut tx, SignalContext::save(Signal::PostSave, Instance::User(user.clone()), true))
            .await?;
        Self::commit(tx).await?;
        Ok(user)
    }

    pub async fn find_user_in(&self, conn: &mut SqliteConnection, id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to get user {}", id), e))?;
        Ok(row.as_ref().map(User::from_row))
    }

    pub async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        let mut conn = self.acquire().await?;
        self.find_user_in(&mut conn, id).await
    }

    pub async fn get_user(&self, id: i64) -> AppResult<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_USER))
            .fetch_all(&self.db.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to list users", e))?;
        Ok(rows.iter().map(User::from_row).collect())
    }

    /// Deletes the user and, through storage cascades, its page and like.
    /// Returns false when the user does not exist.
    pub async fn delete_user(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.begin().await?;
        let deleted = self.delete_user_in(&mut tx, id).await?;
        Self::commit(tx).await?;
        Ok(deleted)
    }

    #[instrument(skip(self, conn))]
    pub async fn delete_user_in(&self, conn: &mut SqliteConnection, id: i64) -> AppResult<bool> {
        let Some(user) = self.find_user_in(conn, id).await? else {
            return Ok(false);
        };
        let page = self.find_page_in(conn, id).await?;
        let like = self.find_like_in(conn, id).await?;

        let mut collected = Vec::new();
        collected.extend(like.map(Instance::Like));
        collected.extend(page.map(Instance::Page));
        collected.push(Instance::User(user));

        self.delete_collected(conn, collected, "DELETE FROM users WHERE id = ?", id)
            .await
    }

    // Pages

    #[instrument(skip(self, new), fields(user = new.user))]
    pub async fn create_page(&self, new: NewPage) -> AppResult<Page> {
        new.validate()?;
        let page = Page::from(new);

        let mut tx = self.begin().await?;
        self.send(&mut tx, SignalContext::save(Signal::PreSave, Instance::Page(page.clone()), true))
            .await?;
        sqlx::query("INSERT INTO pages (user, page_name, page_info, date) VALUES (?, ?, ?, ?)")
            .bind(page.user)
            .bind(&page.page_name)
            .bind(&page.page_info)
            .bind(page.date)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::from_sqlx(&format!("Failed to create page for user {}", page.user), e)
            })?;

        self.send(&mut tx, SignalContext::save(Signal::PostSave, Instance::Page(page.clone()), true))
            .await?;
        Self::commit(tx).await?;
        Ok(page)
    }

    pub async fn find_page_in(&self, conn: &mut SqliteConnection, user: i64) -> AppResult<Option<Page>> {
        let row = sqlx::query(&format!("{} WHERE user = ?", SELECT_PAGE))
            .bind(user)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to get page {}", user), e))?;
        Ok(row.as_ref().map(Page::from_row))
    }

    pub async fn find_page(&self, user: i64) -> AppResult<Option<Page>> {
        let mut conn = self.acquire().await?;
        self.find_page_in(&mut conn, user).await
    }

    pub async fn get_page(&self, user: i64) -> AppResult<Page> {
        self.find_page(user)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page {} not found", user)))
    }

    pub async fn list_pages(&self) -> AppResult<Vec<Page>> {
        let rows = sqlx::query(&format!("{} ORDER BY user", SELECT_PAGE))
            .fetch_all(&self.db.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to list pages", e))?;
        Ok(rows.iter().map(Page::from_row).collect())
    }

    pub async fn update_page(&self, user: i64, update: PageUpdate) -> AppResult<Page> {
        update.validate()?;

        let mut tx = self.begin().await?;
        let mut page = self
            .find_page_in(&mut tx, user)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Page {} not found", user)))?;
        update.apply(&mut page);
        self.send(&mut tx, SignalContext::save(Signal::PreSave, Instance::Page(page.clone()), false))
            .await?;

        sqlx::query("UPDATE pages SET page_name = ?, page_info = ?, date = ? WHERE user = ?")
            .bind(&page.page_name)
            .bind(&page.page_info)
            .bind(page.date)
            .bind(user)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to update page {}", user), e))?;

        self.send(&mut tx, SignalContext::save(Signal::PostSave, Instance::Page(page.clone()), false))
            .await?;
        Self::commit(tx).await?;
        Ok(page)
    }

    /// Deletes the page, the like extending it, and (via the post-delete
    /// receiver) the owning user.
    pub async fn delete_page(&self, user: i64) -> AppResult<bool> {
        let mut tx = self.begin().await?;
        let deleted = self.delete_page_in(&mut tx, user).await?;
        Self::commit(tx).await?;
        Ok(deleted)
    }

    #[instrument(skip(self, conn))]
    pub async fn delete_page_in(&self, conn: &mut SqliteConnection, user: i64) -> AppResult<bool> {
        let Some(page) = self.find_page_in(conn, user).await? else {
            return Ok(false);
        };
        let like = self.find_like_in(conn, user).await?;

        let mut collected = Vec::new();
        collected.extend(like.map(Instance::Like));
        collected.push(Instance::Page(page));

        self.delete_collected(conn, collected, "DELETE FROM pages WHERE user = ?", user)
            .await
    }

    // Likes

    /// Writes the parent page row and the like row in one transaction
    #[instrument(skip(self, new), fields(user = new.page.user))]
    pub async fn create_like(&self, new: NewLike) -> AppResult<Like> {
        new.validate()?;
        let page = Page::from(new.page);
        let like = Like {
            page_in: page.user,
            page,
            likes: new.likes,
        };

        let mut tx = self.begin().await?;
        self.send(&mut tx, SignalContext::save(Signal::PreSave, Instance::Like(like.clone()), true))
            .await?;
        sqlx::query("INSERT INTO pages (user, page_name, page_info, date) VALUES (?, ?, ?, ?)")
            .bind(like.page.user)
            .bind(&like.page.page_name)
            .bind(&like.page.page_info)
            .bind(like.page.date)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::from_sqlx(&format!("Failed to create page for like {}", like.page_in), e)
            })?;
        sqlx::query("INSERT INTO likes (page_in, likes) VALUES (?, ?)")
            .bind(like.page_in)
            .bind(like.likes)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::from_sqlx(&format!("Failed to create like {}", like.page_in), e)
            })?;

        self.send(&mut tx, SignalContext::save(Signal::PostSave, Instance::Like(like.clone()), true))
            .await?;
        Self::commit(tx).await?;
        Ok(like)
    }

    pub async fn find_like_in(&self, conn: &mut SqliteConnection, page_in: i64) -> AppResult<Option<Like>> {
        let row = sqlx::query(&format!("{} WHERE l.page_in = ?", SELECT_LIKE))
            .bind(page_in)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to get like {}", page_in), e))?;
        Ok(row.as_ref().map(Like::from_row))
    }

    pub async fn find_like(&self, page_in: i64) -> AppResult<Option<Like>> {
        let mut conn = self.acquire().await?;
        self.find_like_in(&mut conn, page_in).await
    }

    pub async fn get_like(&self, page_in: i64) -> AppResult<Like> {
        self.find_like(page_in)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Like {} not found", page_in)))
    }

    pub async fn list_likes(&self) -> AppResult<Vec<Like>> {
        let rows = sqlx::query(&format!("{} ORDER BY l.page_in", SELECT_LIKE))
            .fetch_all(&self.db.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to list likes", e))?;
        Ok(rows.iter().map(Like::from_row).collect())
    }

    pub async fn update_like(&self, page_in: i64, update: LikeUpdate) -> AppResult<Like> {
        update.page.validate()?;

        let mut tx = self.begin().await?;
        let mut like = self
            .find_like_in(&mut tx, page_in)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Like {} not found", page_in)))?;
        update.page.apply(&mut like.page);
        if let Some(likes) = update.likes {
            like.likes = likes;
        }
        self.send(&mut tx, SignalContext::save(Signal::PreSave, Instance::Like(like.clone()), false))
            .await?;

        sqlx::query("UPDATE pages SET page_name = ?, page_info = ?, date = ? WHERE user = ?")
            .bind(&like.page.page_name)
            .bind(&like.page.page_info)
            .bind(like.page.date)
            .bind(page_in)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to update page {}", page_in), e))?;
        sqlx::query("UPDATE likes SET likes = ? WHERE page_in = ?")
            .bind(like.likes)
            .bind(page_in)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to update like {}", page_in), e))?;

        self.send(&mut tx, SignalContext::save(Signal::PostSave, Instance::Like(like.clone()), false))
            .await?;
        Self::commit(tx).await?;
        Ok(like)
    }

    /// Deleting a like removes its parent page row too
    pub async fn delete_like(&self, page_in: i64) -> AppResult<bool> {
        let mut tx = self.begin().await?;
        let deleted = self.delete_like_in(&mut tx, page_in).await?;
        Self::commit(tx).await?;
        Ok(deleted)
    }

    #[instrument(skip(self, conn))]
    pub async fn delete_like_in(&self, conn: &mut SqliteConnection, page_in: i64) -> AppResult<bool> {
        let Some(like) = self.find_like_in(conn, page_in).await? else {
            return Ok(false);
        };
        let page = like.page.clone();
        let collected = vec![Instance::Like(like), Instance::Page(page)];

        self.delete_collected(conn, collected, "DELETE FROM pages WHERE user = ?", page_in)
            .await
    }

    /// Delete one root row and send delete signals for every instance the
    /// storage cascade removes with it. `collected` is ordered children
    /// first.
    async fn delete_collected(
        &self,
        conn: &mut SqliteConnection,
        collected: Vec<Instance>,
        statement: &str,
        pk: i64,
    ) -> AppResult<bool> {
        for instance in &collected {
            self.send(conn, SignalContext::delete(Signal::PreDelete, instance.clone()))
                .await?;
        }

        let result = sqlx::query(statement)
            .bind(pk)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::from_sqlx(&format!("Failed to delete {}", pk), e))?;
        if result.rows_affected() == 0 {
            debug!(pk, "row vanished before delete");
            return Ok(false);
        }

        for instance in collected {
            self.send(conn, SignalContext::delete(Signal::PostDelete, instance))
                .await?;
        }
        Ok(true)
    }

    /// Row counts per table, used by health reporting
    pub async fn table_counts(&self) -> AppResult<Vec<(&'static str, i64)>> {
        let mut counts = Vec::new();
        for table in ["users", "pages", "likes"] {
            let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
                .fetch_one(&self.db.pool)
                .await
                .map_err(|e| AppError::from_sqlx(&format!("Failed to count {}", table), e))?;
            counts.push((table, row.get::<i64, _>("n")));
        }
        Ok(counts)
    }
}
