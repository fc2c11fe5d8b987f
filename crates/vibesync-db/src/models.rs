/// Database row types — these map directly to SQLite rows.
/// Distinct from the vibesync-types API models to keep the DB layer
/// independent of the wire format.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
}

pub struct LikeRow {
    pub post_id: String,
    pub user_id: String,
}

pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub text: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub owner_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub text: String,
    pub created_at: String,
}
