use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- A friend edge is two rows, one per direction. Both rows are
        -- written and deleted together in one transaction.
        CREATE TABLE IF NOT EXISTS friendships (
            user_id     TEXT NOT NULL REFERENCES users(id),
            friend_id   TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (user_id, friend_id)
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            author_id   TEXT NOT NULL REFERENCES users(id),
            author_name TEXT NOT NULL,
            text        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);

        CREATE TABLE IF NOT EXISTS likes (
            post_id     TEXT NOT NULL REFERENCES posts(id),
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (post_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id),
            author_id   TEXT NOT NULL REFERENCES users(id),
            author_name TEXT NOT NULL,
            text        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id);

        -- Each logical message lands twice: once in the sender's box and
        -- once in the recipient's (owner_id). Thread reads never have to
        -- look outside a single owner's box.
        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT NOT NULL,
            owner_id      TEXT NOT NULL REFERENCES users(id),
            sender_id     TEXT NOT NULL REFERENCES users(id),
            recipient_id  TEXT NOT NULL REFERENCES users(id),
            text          TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_owner
            ON messages(owner_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
