use crate::Database;
use crate::models::{CommentRow, LikeRow, MessageRow, PostRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddFriendOutcome {
    Added,
    AlreadyFriends,
    NoSuchUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveFriendOutcome {
    /// Also covers the no-op case: unfriending someone who was never a
    /// friend succeeds.
    Removed,
    NoSuchUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleLikeOutcome {
    Liked,
    Unliked,
    PostMissing,
    /// Authors may not like their own posts.
    OwnPost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteCommentOutcome {
    Deleted,
    PostMissing,
    CommentMissing,
    NotAuthor,
}

impl Database {
    // -- Users --

    /// Returns false if the email is already taken. The UNIQUE constraint
    /// is the authoritative check — two concurrent signups race here, and
    /// the loser must see a duplicate, not an opaque failure.
    pub fn create_user(&self, id: &str, name: &str, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, email, password_hash],
            ) {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, name, email, password, created_at FROM users WHERE email = ?1", email)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, name, email, password, created_at FROM users WHERE id = ?1", id)
        })
    }

    // -- Friends --

    /// Establish a symmetric friend edge. Both directed rows go in one
    /// transaction so a failure after the first insert cannot leave the
    /// edge half-written.
    pub fn add_friend(&self, actor_id: &str, target_id: &str) -> Result<AddFriendOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !user_exists(&tx, target_id)? {
                return Ok(AddFriendOutcome::NoSuchUser);
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
                    params![actor_id, target_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(AddFriendOutcome::AlreadyFriends);
            }

            tx.execute(
                "INSERT INTO friendships (user_id, friend_id) VALUES (?1, ?2)",
                params![actor_id, target_id],
            )?;
            tx.execute(
                "INSERT INTO friendships (user_id, friend_id) VALUES (?1, ?2)",
                params![target_id, actor_id],
            )?;

            tx.commit()?;
            Ok(AddFriendOutcome::Added)
        })
    }

    /// Remove both directions of a friend edge. Idempotent — deleting an
    /// edge that does not exist is a successful no-op.
    pub fn remove_friend(&self, actor_id: &str, target_id: &str) -> Result<RemoveFriendOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !user_exists(&tx, target_id)? {
                return Ok(RemoveFriendOutcome::NoSuchUser);
            }

            tx.execute(
                "DELETE FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
                params![actor_id, target_id],
            )?;
            tx.execute(
                "DELETE FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
                params![target_id, actor_id],
            )?;

            tx.commit()?;
            Ok(RemoveFriendOutcome::Removed)
        })
    }

    pub fn friends_of(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, u.email, u.password, u.created_at
                 FROM friendships f
                 JOIN users u ON u.id = f.friend_id
                 WHERE f.user_id = ?1
                 ORDER BY f.rowid",
            )?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Approximately uniform random sample of users the actor could
    /// befriend: everyone except the actor and their current friends.
    pub fn suggest_users(&self, user_id: &str, count: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, password, created_at FROM users
                 WHERE id != ?1
                   AND id NOT IN (SELECT friend_id FROM friendships WHERE user_id = ?1)
                 ORDER BY RANDOM()
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user_id, count], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Case-insensitive substring match on display name, in natural store
    /// order. `instr` rather than LIKE so the query text is never
    /// interpreted as a pattern.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, password, created_at FROM users
                 WHERE instr(lower(name), lower(?1)) > 0
                 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([query], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Posts --

    pub fn insert_post(&self, id: &str, author_id: &str, author_name: &str, text: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, author_name, text) VALUES (?1, ?2, ?3, ?4)",
                params![id, author_id, author_name, text],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, author_id, author_name, text, created_at FROM posts WHERE id = ?1",
                    [id],
                    post_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// All posts, newest first. rowid breaks ties within the same
    /// one-second timestamp resolution.
    pub fn feed_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, author_name, text, created_at FROM posts
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn posts_by_author(&self, author_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, author_name, text, created_at FROM posts
                 WHERE author_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([author_id], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Toggle a like: removes the row if present, inserts it if not.
    /// The post's own author is rejected outright. The mutation is a
    /// targeted single-row insert/delete — two users toggling
    /// concurrently can never clobber each other's like.
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<ToggleLikeOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let author: Option<String> = tx
                .query_row(
                    "SELECT author_id FROM posts WHERE id = ?1",
                    [post_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(author) = author else {
                return Ok(ToggleLikeOutcome::PostMissing);
            };
            if author == user_id {
                return Ok(ToggleLikeOutcome::OwnPost);
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM likes WHERE post_id = ?1 AND user_id = ?2",
                    params![post_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = if existing.is_some() {
                tx.execute(
                    "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
                    params![post_id, user_id],
                )?;
                ToggleLikeOutcome::Unliked
            } else {
                tx.execute(
                    "INSERT INTO likes (post_id, user_id) VALUES (?1, ?2)",
                    params![post_id, user_id],
                )?;
                ToggleLikeOutcome::Liked
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Returns false if the post does not exist.
    pub fn insert_comment(
        &self,
        id: &str,
        post_id: &str,
        author_id: &str,
        author_name: &str,
        text: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !post_exists(&tx, post_id)? {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO comments (id, post_id, author_id, author_name, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, post_id, author_id, author_name, text],
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        requester_id: &str,
    ) -> Result<DeleteCommentOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !post_exists(&tx, post_id)? {
                return Ok(DeleteCommentOutcome::PostMissing);
            }

            let author: Option<String> = tx
                .query_row(
                    "SELECT author_id FROM comments WHERE id = ?1 AND post_id = ?2",
                    params![comment_id, post_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(author) = author else {
                return Ok(DeleteCommentOutcome::CommentMissing);
            };
            if author != requester_id {
                return Ok(DeleteCommentOutcome::NotAuthor);
            }

            tx.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;

            tx.commit()?;
            Ok(DeleteCommentOutcome::Deleted)
        })
    }

    /// Delete a post together with its likes and comments. The lookup
    /// matches on id AND author in one go: a non-owner gets the same
    /// "false" as a missing post, leaking nothing about its existence.
    pub fn delete_post(&self, post_id: &str, requester_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owned: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM posts WHERE id = ?1 AND author_id = ?2",
                    params![post_id, requester_id],
                    |row| row.get(0),
                )
                .optional()?;
            if owned.is_none() {
                return Ok(false);
            }

            tx.execute("DELETE FROM likes WHERE post_id = ?1", [post_id])?;
            tx.execute("DELETE FROM comments WHERE post_id = ?1", [post_id])?;
            tx.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;

            tx.commit()?;
            Ok(true)
        })
    }

    /// Batch-fetch likes for a set of post IDs.
    pub fn likes_for_posts(&self, post_ids: &[String]) -> Result<Vec<LikeRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT post_id, user_id FROM likes WHERE post_id IN ({}) ORDER BY rowid",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = post_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(LikeRow {
                        post_id: row.get(0)?,
                        user_id: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Batch-fetch comments for a set of post IDs, in insertion order.
    pub fn comments_for_posts(&self, post_ids: &[String]) -> Result<Vec<CommentRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, post_id, author_id, author_name, text, created_at
                 FROM comments WHERE post_id IN ({}) ORDER BY rowid",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = post_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_name: row.get(3)?,
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    /// Append one logical message into both participants' boxes in a
    /// single transaction. Returns false if the recipient does not exist.
    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        recipient_id: &str,
        text: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !user_exists(&tx, recipient_id)? {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO messages (id, owner_id, sender_id, recipient_id, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, sender_id, sender_id, recipient_id, text],
            )?;
            if sender_id != recipient_id {
                tx.execute(
                    "INSERT INTO messages (id, owner_id, sender_id, recipient_id, text)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, recipient_id, sender_id, recipient_id, text],
                )?;
            }

            tx.commit()?;
            Ok(true)
        })
    }

    /// Messages in the owner's box exchanged with the counterpart, in
    /// append order. Insertion order is the ordering contract — no
    /// re-sorting by timestamp.
    pub fn thread(&self, owner_id: &str, counterpart_id: &str) -> Result<Vec<MessageRow>> {
        // Every row in the box trivially has the owner on one side, so a
        // self-thread must require the counterpart on BOTH sides or it
        // would match the entire mailbox.
        let sql = if owner_id == counterpart_id {
            "SELECT id, owner_id, sender_id, recipient_id, text, created_at
             FROM messages
             WHERE owner_id = ?1 AND sender_id = ?2 AND recipient_id = ?2
             ORDER BY rowid"
        } else {
            "SELECT id, owner_id, sender_id, recipient_id, text, created_at
             FROM messages
             WHERE owner_id = ?1 AND (sender_id = ?2 OR recipient_id = ?2)
             ORDER BY rowid"
        };

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params![owner_id, counterpart_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        recipient_id: row.get(3)?,
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct other parties across the owner's box, as user rows.
    pub fn chat_partners(&self, owner_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, password, created_at FROM users
                 WHERE id IN (
                     SELECT CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END
                     FROM messages WHERE owner_id = ?1
                 ) AND id != ?1
                 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map([owner_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn user_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn post_exists(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM posts WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn query_user(conn: &Connection, sql: &str, key: &str) -> Result<Option<UserRow>> {
    let row = conn.query_row(sql, [key], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_name: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let email = format!("{}@example.com", name.to_lowercase());
        db.create_user(&id, name, &email, "hash").unwrap();
        id
    }

    fn add_post(db: &Database, author_id: &str, author_name: &str, text: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_post(&id, author_id, author_name, text).unwrap();
        id
    }

    fn friend_ids(db: &Database, user_id: &str) -> Vec<String> {
        db.friends_of(user_id).unwrap().into_iter().map(|u| u.id).collect()
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = test_db();
        let id = Uuid::new_v4().to_string();
        assert!(db.create_user(&id, "Ana", "ana@example.com", "hash").unwrap());
        // Same email again: reported as a duplicate, not an error — the
        // constraint is what a concurrent second signup runs into.
        let other = Uuid::new_v4().to_string();
        assert!(!db.create_user(&other, "Ana 2", "ana@example.com", "hash").unwrap());
        assert!(db.get_user_by_id(&other).unwrap().is_none());
    }

    #[test]
    fn add_friend_is_symmetric() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");

        assert_eq!(db.add_friend(&a, &b).unwrap(), AddFriendOutcome::Added);
        assert_eq!(friend_ids(&db, &a), vec![b.clone()]);
        assert_eq!(friend_ids(&db, &b), vec![a.clone()]);
    }

    #[test]
    fn add_friend_twice_conflicts() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");

        assert_eq!(db.add_friend(&a, &b).unwrap(), AddFriendOutcome::Added);
        assert_eq!(db.add_friend(&a, &b).unwrap(), AddFriendOutcome::AlreadyFriends);
        // The reverse direction was written by the first call, so it
        // conflicts from the other side too.
        assert_eq!(db.add_friend(&b, &a).unwrap(), AddFriendOutcome::AlreadyFriends);
    }

    #[test]
    fn add_friend_unknown_target() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        assert_eq!(db.add_friend(&a, "nope").unwrap(), AddFriendOutcome::NoSuchUser);
        assert!(friend_ids(&db, &a).is_empty());
    }

    #[test]
    fn unfriend_removes_both_sides() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        db.add_friend(&a, &b).unwrap();

        assert_eq!(db.remove_friend(&a, &b).unwrap(), RemoveFriendOutcome::Removed);
        assert!(friend_ids(&db, &a).is_empty());
        assert!(friend_ids(&db, &b).is_empty());
    }

    #[test]
    fn unfriend_is_idempotent() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");

        // Never friends in the first place — still succeeds.
        assert_eq!(db.remove_friend(&a, &b).unwrap(), RemoveFriendOutcome::Removed);
        db.add_friend(&a, &b).unwrap();
        assert_eq!(db.remove_friend(&a, &b).unwrap(), RemoveFriendOutcome::Removed);
        assert_eq!(db.remove_friend(&a, &b).unwrap(), RemoveFriendOutcome::Removed);
    }

    #[test]
    fn unfriend_unknown_target() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        assert_eq!(db.remove_friend(&a, "nope").unwrap(), RemoveFriendOutcome::NoSuchUser);
    }

    #[test]
    fn suggestions_exclude_self_and_friends() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        let c = add_user(&db, "Cal");
        let d = add_user(&db, "Dee");
        db.add_friend(&a, &b).unwrap();

        let suggested: Vec<String> = db
            .suggest_users(&a, 10)
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();

        assert_eq!(suggested.len(), 2);
        assert!(!suggested.contains(&a));
        assert!(!suggested.contains(&b));
        assert!(suggested.contains(&c));
        assert!(suggested.contains(&d));
    }

    #[test]
    fn suggestions_respect_count() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        for i in 0..5 {
            add_user(&db, &format!("User{}", i));
        }
        assert_eq!(db.suggest_users(&a, 3).unwrap().len(), 3);
        // Pool smaller than count: return what there is.
        assert_eq!(db.suggest_users(&a, 50).unwrap().len(), 5);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let db = test_db();
        add_user(&db, "Alice Smith");
        add_user(&db, "Bob Smithers");
        add_user(&db, "Carol Jones");

        let hits: Vec<String> = db
            .search_users("sMiTh")
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(hits, vec!["Alice Smith", "Bob Smithers"]);

        assert!(db.search_users("zzz").unwrap().is_empty());
    }

    #[test]
    fn search_treats_percent_literally() {
        let db = test_db();
        add_user(&db, "Ana");
        // "%" would match everything under LIKE; here it matches nothing.
        assert!(db.search_users("%").unwrap().is_empty());
    }

    #[test]
    fn feed_is_newest_first() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let first = add_post(&db, &a, "Ana", "first");
        let second = add_post(&db, &a, "Ana", "second");
        let third = add_post(&db, &a, "Ana", "third");

        let ids: Vec<String> = db.feed_posts().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![third, second, first]);
    }

    #[test]
    fn posts_by_author_filters() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        let ap = add_post(&db, &a, "Ana", "mine");
        add_post(&db, &b, "Ben", "theirs");

        let ids: Vec<String> = db.posts_by_author(&a).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![ap]);
    }

    #[test]
    fn toggle_like_flips_membership() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        let post = add_post(&db, &a, "Ana", "hello");

        assert_eq!(db.toggle_like(&post, &b).unwrap(), ToggleLikeOutcome::Liked);
        let likes = db.likes_for_posts(&[post.clone()]).unwrap();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].user_id, b);

        // Second toggle is a net no-op.
        assert_eq!(db.toggle_like(&post, &b).unwrap(), ToggleLikeOutcome::Unliked);
        assert!(db.likes_for_posts(&[post.clone()]).unwrap().is_empty());
    }

    #[test]
    fn toggle_like_missing_post() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        assert_eq!(db.toggle_like("nope", &a).unwrap(), ToggleLikeOutcome::PostMissing);
    }

    #[test]
    fn author_cannot_like_own_post() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let post = add_post(&db, &a, "Ana", "hello");

        assert_eq!(db.toggle_like(&post, &a).unwrap(), ToggleLikeOutcome::OwnPost);
        assert!(db.likes_for_posts(&[post]).unwrap().is_empty());
    }

    #[test]
    fn comments_keep_insertion_order() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let post = add_post(&db, &a, "Ana", "hello");

        db.insert_comment("c1", &post, &a, "Ana", "one").unwrap();
        db.insert_comment("c2", &post, &a, "Ana", "two").unwrap();
        db.insert_comment("c3", &post, &a, "Ana", "three").unwrap();

        let texts: Vec<String> = db
            .comments_for_posts(&[post.clone()])
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn comment_on_missing_post_fails() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        assert!(!db.insert_comment("c1", "nope", &a, "Ana", "hi").unwrap());
    }

    #[test]
    fn delete_comment_requires_authorship() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        let post = add_post(&db, &a, "Ana", "hello");
        db.insert_comment("c1", &post, &b, "Ben", "nice").unwrap();

        // Post owner but not comment author: forbidden, distinct from
        // the not-found outcomes.
        assert_eq!(
            db.delete_comment(&post, "c1", &a).unwrap(),
            DeleteCommentOutcome::NotAuthor
        );
        assert_eq!(
            db.delete_comment(&post, "missing", &b).unwrap(),
            DeleteCommentOutcome::CommentMissing
        );
        assert_eq!(
            db.delete_comment("missing", "c1", &b).unwrap(),
            DeleteCommentOutcome::PostMissing
        );
        assert_eq!(
            db.delete_comment(&post, "c1", &b).unwrap(),
            DeleteCommentOutcome::Deleted
        );
    }

    #[test]
    fn delete_comment_preserves_order_of_rest() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let post = add_post(&db, &a, "Ana", "hello");
        db.insert_comment("c1", &post, &a, "Ana", "one").unwrap();
        db.insert_comment("c2", &post, &a, "Ana", "two").unwrap();
        db.insert_comment("c3", &post, &a, "Ana", "three").unwrap();

        db.delete_comment(&post, "c2", &a).unwrap();

        let texts: Vec<String> = db
            .comments_for_posts(&[post.clone()])
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["one", "three"]);
    }

    #[test]
    fn delete_post_conflates_missing_and_unowned() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        let post = add_post(&db, &a, "Ana", "hello");

        // Non-owner and missing id observe the same outcome.
        assert!(!db.delete_post(&post, &b).unwrap());
        assert!(!db.delete_post("missing", &a).unwrap());
        assert!(db.get_post(&post).unwrap().is_some());

        assert!(db.delete_post(&post, &a).unwrap());
        assert!(db.get_post(&post).unwrap().is_none());
    }

    #[test]
    fn delete_post_removes_embedded_state() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        let post = add_post(&db, &a, "Ana", "hello");
        db.toggle_like(&post, &b).unwrap();
        db.insert_comment("c1", &post, &b, "Ben", "nice").unwrap();

        assert!(db.delete_post(&post, &a).unwrap());
        assert!(db.likes_for_posts(&[post.clone()]).unwrap().is_empty());
        assert!(db.comments_for_posts(&[post]).unwrap().is_empty());
    }

    #[test]
    fn message_lands_in_both_boxes() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");

        assert!(db.insert_message("m1", &a, &b, "hi").unwrap());

        let from_a = db.thread(&a, &b).unwrap();
        let from_b = db.thread(&b, &a).unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_a[0].text, "hi");
        assert_eq!(from_b[0].text, "hi");
    }

    #[test]
    fn message_to_unknown_recipient_fails() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        assert!(!db.insert_message("m1", &a, "nope", "hi").unwrap());
        assert!(db.thread(&a, "nope").unwrap().is_empty());
    }

    #[test]
    fn thread_filters_by_counterpart() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        let c = add_user(&db, "Cal");
        db.insert_message("m1", &a, &b, "to ben").unwrap();
        db.insert_message("m2", &a, &c, "to cal").unwrap();
        db.insert_message("m3", &b, &a, "from ben").unwrap();

        let texts: Vec<String> = db.thread(&a, &b).unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["to ben", "from ben"]);
    }

    #[test]
    fn self_thread_contains_only_self_messages() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        db.insert_message("m1", &a, &b, "to ben").unwrap();
        db.insert_message("m2", &b, &a, "from ben").unwrap();
        db.insert_message("m3", &a, &a, "note to self").unwrap();

        let texts: Vec<String> = db.thread(&a, &a).unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["note to self"]);
    }

    #[test]
    fn chat_partners_are_distinct_and_exclude_owner() {
        let db = test_db();
        let a = add_user(&db, "Ana");
        let b = add_user(&db, "Ben");
        let c = add_user(&db, "Cal");
        db.insert_message("m1", &a, &b, "one").unwrap();
        db.insert_message("m2", &b, &a, "two").unwrap();
        db.insert_message("m3", &c, &a, "three").unwrap();

        let partners: Vec<String> = db.chat_partners(&a).unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(partners.len(), 2);
        assert!(partners.contains(&b));
        assert!(partners.contains(&c));
        assert!(!partners.contains(&a));
    }
}
