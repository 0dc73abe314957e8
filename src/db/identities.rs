//! Identity repository.
//!
//! Plain CRUD over the `users`, `nicks` and `hosts` tables. Resolution policy
//! lives in [`crate::identity::IdentityResolver`]; nothing here decides which
//! user an observation belongs to.

use super::StorageError;
use sqlx::{SqliteConnection, SqlitePool};

/// Stable user identifier, assigned monotonically by the store.
pub type UserId = i64;

/// A durable user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub last_nick: String,
    /// Last seen `ident@hostname`.
    pub last_host: String,
    pub created_at: i64,
    pub modified_at: i64,
}

impl User {
    /// Ident half of `last_host`.
    pub fn ident(&self) -> &str {
        self.last_host
            .split_once('@')
            .map(|(ident, _)| ident)
            .unwrap_or("")
    }

    /// Hostname half of `last_host`.
    pub fn hostname(&self) -> &str {
        self.last_host
            .split_once('@')
            .map(|(_, host)| host)
            .unwrap_or(self.last_host.as_str())
    }
}

type UserRow = (i64, String, String, i64, i64);

/// Stamp for a history row: microseconds, raised above the table's newest
/// stamp on write so the most recent touch always sorts first.
fn history_stamp() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

fn user_from_row((id, last_nick, last_host, created_at, modified_at): UserRow) -> User {
    User {
        id,
        last_nick,
        last_host,
        created_at,
        modified_at,
    }
}

/// Repository for identity operations.
pub struct IdentityRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> IdentityRepository<'a> {
    /// Create a new identity repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user row. Nick and host history are recorded separately.
    pub async fn insert_user(&self, nick: &str, host: &str) -> Result<User, StorageError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO users (last_nick, last_host, created_at, modified_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(nick)
        .bind(host)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            last_nick: nick.to_string(),
            last_host: host.to_string(),
            created_at: now,
            modified_at: now,
        })
    }

    /// Record `nick` as the user's current nickname.
    ///
    /// Updates `last_nick` and either appends a (nick, user) history row or
    /// restamps the existing one, so this association becomes the newest for
    /// `nick`.
    pub async fn upsert_nick(&self, user_id: UserId, nick: &str) -> Result<(), StorageError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET last_nick = ?, modified_at = ? WHERE id = ?")
            .bind(nick)
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO nicks (nick, user_id, created_at, modified_at)
            VALUES (?1, ?2, ?3, MAX(?3, (SELECT COALESCE(MAX(modified_at), 0) + 1 FROM nicks)))
            ON CONFLICT (nick, user_id) DO UPDATE SET modified_at = excluded.modified_at
            "#,
        )
        .bind(nick)
        .bind(user_id)
        .bind(history_stamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Record `host` (ident@hostname) as the user's current host.
    pub async fn upsert_host(&self, user_id: UserId, host: &str) -> Result<(), StorageError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET last_host = ?, modified_at = ? WHERE id = ?")
            .bind(host)
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO hosts (host, user_id, created_at, modified_at)
            VALUES (?1, ?2, ?3, MAX(?3, (SELECT COALESCE(MAX(modified_at), 0) + 1 FROM hosts)))
            ON CONFLICT (host, user_id) DO UPDATE SET modified_at = excluded.modified_at
            "#,
        )
        .bind(host)
        .bind(user_id)
        .bind(history_stamp())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Find the user currently associated with `nick` (case-insensitive).
    ///
    /// History may hold the same nick under several users; the most recently
    /// touched association wins.
    pub async fn find_user_by_nick(&self, nick: &str) -> Result<Option<UserId>, StorageError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id FROM nicks
            WHERE nick = ?
            ORDER BY modified_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(nick)
        .fetch_optional(self.pool)
        .await?;

        Ok(user_id)
    }

    /// Find the user currently associated with `host` (case-insensitive).
    pub async fn find_user_by_host(&self, host: &str) -> Result<Option<UserId>, StorageError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_id FROM hosts
            WHERE host = ?
            ORDER BY modified_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(host)
        .fetch_optional(self.pool)
        .await?;

        Ok(user_id)
    }

    /// Find user by ID.
    pub async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, last_nick, last_host, created_at, modified_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    /// All users, oldest first.
    pub async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, last_nick, last_host, created_at, modified_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(user_from_row).collect())
    }

    /// Nicknames ever recorded for a user, oldest first.
    pub async fn nicks_of(&self, user_id: UserId) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT nick FROM nicks WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Hosts ever recorded for a user, oldest first.
    pub async fn hosts_of(&self, user_id: UserId) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT host FROM hosts WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Move every nick association owned by `from` to `to`.
    pub async fn reassign_nick_owner(&self, from: UserId, to: UserId) -> Result<u64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        reassign_nicks(&mut conn, from, to).await
    }

    /// Move every host association owned by `from` to `to`.
    pub async fn reassign_host_owner(&self, from: UserId, to: UserId) -> Result<u64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        reassign_hosts(&mut conn, from, to).await
    }

    /// Delete a user row. Returns false if no such user existed.
    pub async fn delete_user(&self, id: UserId) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await?;
        delete_user_row(&mut conn, id).await
    }

    /// Fold user `from` into user `to` in a single transaction.
    ///
    /// Reassigns all nick and host history, then deletes `from`. Returns false
    /// (and changes nothing) if either user does not exist.
    pub async fn merge_users(&self, from: UserId, to: UserId) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id IN (?, ?)")
            .bind(from)
            .bind(to)
            .fetch_one(&mut *tx)
            .await?;

        if from == to || existing != 2 {
            tx.rollback().await?;
            return Ok(false);
        }

        reassign_nicks(&mut tx, from, to).await?;
        reassign_hosts(&mut tx, from, to).await?;
        delete_user_row(&mut tx, from).await?;

        tx.commit().await?;
        Ok(true)
    }
}

// Moved rows keep their stamps. Where `to` already owns the same value, the
// loser's row is dropped and `to` inherits the newer of the two stamps, so a
// lookup that resolved to `from` resolves to `to` afterwards.

async fn reassign_nicks(
    conn: &mut SqliteConnection,
    from: UserId,
    to: UserId,
) -> Result<u64, StorageError> {
    sqlx::query(
        r#"
        UPDATE nicks
        SET modified_at = MAX(modified_at, (
            SELECT lost.modified_at FROM nicks AS lost
            WHERE lost.user_id = ?1 AND lost.nick = nicks.nick
        ))
        WHERE user_id = ?2 AND nick IN (SELECT nick FROM nicks WHERE user_id = ?1)
        "#,
    )
    .bind(from)
    .bind(to)
    .execute(&mut *conn)
    .await?;

    let moved = sqlx::query("UPDATE OR IGNORE nicks SET user_id = ? WHERE user_id = ?")
        .bind(to)
        .bind(from)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM nicks WHERE user_id = ?")
        .bind(from)
        .execute(&mut *conn)
        .await?;

    Ok(moved)
}

async fn reassign_hosts(
    conn: &mut SqliteConnection,
    from: UserId,
    to: UserId,
) -> Result<u64, StorageError> {
    sqlx::query(
        r#"
        UPDATE hosts
        SET modified_at = MAX(modified_at, (
            SELECT lost.modified_at FROM hosts AS lost
            WHERE lost.user_id = ?1 AND lost.host = hosts.host
        ))
        WHERE user_id = ?2 AND host IN (SELECT host FROM hosts WHERE user_id = ?1)
        "#,
    )
    .bind(from)
    .bind(to)
    .execute(&mut *conn)
    .await?;

    let moved = sqlx::query("UPDATE OR IGNORE hosts SET user_id = ? WHERE user_id = ?")
        .bind(to)
        .bind(from)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM hosts WHERE user_id = ?")
        .bind(from)
        .execute(&mut *conn)
        .await?;

    Ok(moved)
}

async fn delete_user_row(conn: &mut SqliteConnection, id: UserId) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::UserId;
    use crate::db::Database;

    #[tokio::test]
    async fn insert_user_assigns_increasing_ids() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.identities();

        let a = repo.insert_user("alice", "a@one.example").await.unwrap();
        let b = repo.insert_user("bob", "b@two.example").await.unwrap();
        assert!(b.id > a.id);

        let found = repo.find_user_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(found.last_nick, "alice");
        assert_eq!(found.ident(), "a");
        assert_eq!(found.hostname(), "one.example");
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.identities();

        let a = repo.insert_user("alice", "a@host").await.unwrap();
        assert!(repo.delete_user(a.id).await.unwrap());
        let b = repo.insert_user("bob", "b@host").await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn nick_lookup_is_case_insensitive() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.identities();

        let user = repo.insert_user("Alice", "a@host").await.unwrap();
        repo.upsert_nick(user.id, "Alice").await.unwrap();
        repo.upsert_host(user.id, "a@Host").await.unwrap();

        assert_eq!(repo.find_user_by_nick("aLiCe").await.unwrap(), Some(user.id));
        assert_eq!(repo.find_user_by_host("A@HOST").await.unwrap(), Some(user.id));
        assert_eq!(repo.find_user_by_nick("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_nick_is_unique_per_user() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.identities();

        let user = repo.insert_user("alice", "a@host").await.unwrap();
        repo.upsert_nick(user.id, "alice").await.unwrap();
        repo.upsert_nick(user.id, "ALICE").await.unwrap();
        repo.upsert_nick(user.id, "alice_").await.unwrap();

        assert_eq!(repo.nicks_of(user.id).await.unwrap(), vec!["alice", "alice_"]);
        let refreshed = repo.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(refreshed.last_nick, "alice_");
    }

    #[tokio::test]
    async fn merge_users_moves_history_and_deletes_loser() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.identities();

        let keep = repo.insert_user("alice", "a@home").await.unwrap();
        repo.upsert_nick(keep.id, "alice").await.unwrap();
        repo.upsert_host(keep.id, "a@home").await.unwrap();

        let lose = repo.insert_user("alice_work", "a@work").await.unwrap();
        repo.upsert_nick(lose.id, "alice_work").await.unwrap();
        repo.upsert_nick(lose.id, "alice").await.unwrap();
        repo.upsert_host(lose.id, "a@work").await.unwrap();

        assert!(repo.merge_users(lose.id, keep.id).await.unwrap());

        assert!(repo.find_user_by_id(lose.id).await.unwrap().is_none());
        assert_eq!(repo.find_user_by_nick("alice_work").await.unwrap(), Some(keep.id));
        assert_eq!(repo.find_user_by_host("a@work").await.unwrap(), Some(keep.id));
        // The shared nick collapses into one row.
        assert_eq!(repo.nicks_of(keep.id).await.unwrap(), vec!["alice", "alice_work"]);
        assert!(repo.nicks_of(lose.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_users_with_missing_side_changes_nothing() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.identities();

        let user = repo.insert_user("alice", "a@host").await.unwrap();
        repo.upsert_nick(user.id, "alice").await.unwrap();

        assert!(!repo.merge_users(user.id + 100, user.id).await.unwrap());
        assert!(!repo.merge_users(user.id, user.id + 100).await.unwrap());
        assert_eq!(repo.find_user_by_nick("alice").await.unwrap(), Some(user.id));
    }

    async fn set_stamp(db: &Database, table: &str, column: &str, user: UserId, value: &str, at: i64) {
        sqlx::query(&format!(
            "UPDATE {table} SET modified_at = ? WHERE user_id = ? AND {column} = ?"
        ))
        .bind(at)
        .bind(user)
        .bind(value)
        .execute(db.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn most_recent_touch_wins_within_one_second() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.identities();

        let a = repo.insert_user("a", "a@one").await.unwrap().id;
        let b = repo.insert_user("b", "b@two").await.unwrap().id;

        repo.upsert_nick(a, "shared").await.unwrap();
        repo.upsert_nick(b, "shared").await.unwrap();
        assert_eq!(repo.find_user_by_nick("shared").await.unwrap(), Some(b));

        // The nick comes back to its first owner.
        repo.upsert_nick(a, "shared").await.unwrap();
        assert_eq!(repo.find_user_by_nick("shared").await.unwrap(), Some(a));

        repo.upsert_host(a, "x@box").await.unwrap();
        repo.upsert_host(b, "x@box").await.unwrap();
        repo.upsert_host(a, "x@box").await.unwrap();
        assert_eq!(repo.find_user_by_host("x@box").await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn merge_never_hands_a_lookup_to_a_third_user() {
        let db = Database::new(":memory:").await.unwrap();
        let repo = db.identities();

        let winner = repo.insert_user("w", "w@w").await.unwrap().id;
        let third = repo.insert_user("c", "c@c").await.unwrap().id;
        let loser = repo.insert_user("l", "l@l").await.unwrap().id;

        for (user, at) in [(winner, 100), (third, 200), (loser, 300)] {
            repo.upsert_nick(user, "shared").await.unwrap();
            repo.upsert_host(user, "s@shared").await.unwrap();
            set_stamp(&db, "nicks", "nick", user, "shared", at).await;
            set_stamp(&db, "hosts", "host", user, "s@shared", at).await;
        }

        // A stale association of the loser must not override the third user.
        repo.upsert_nick(loser, "other").await.unwrap();
        repo.upsert_nick(third, "other").await.unwrap();
        set_stamp(&db, "nicks", "nick", loser, "other", 400).await;
        set_stamp(&db, "nicks", "nick", third, "other", 500).await;

        assert_eq!(repo.find_user_by_nick("shared").await.unwrap(), Some(loser));
        assert_eq!(repo.find_user_by_host("s@shared").await.unwrap(), Some(loser));

        assert!(repo.merge_users(loser, winner).await.unwrap());

        assert_eq!(repo.find_user_by_nick("shared").await.unwrap(), Some(winner));
        assert_eq!(repo.find_user_by_host("s@shared").await.unwrap(), Some(winner));
        assert_eq!(repo.find_user_by_nick("other").await.unwrap(), Some(third));
        assert!(repo.nicks_of(winner).await.unwrap().contains(&"other".to_string()));
    }
}
