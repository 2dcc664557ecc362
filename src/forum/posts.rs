use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Row, TransactionBehavior};

use crate::db::display_timestamp;
use crate::error::{AppError, AppResult};
use crate::forum::domain::{Category, ListFilter, PostDraft, ReactionState};
use crate::state::DbPool;

/// A post with everything the templates show about it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostView {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub categories: Vec<String>,
    pub likes: i64,
    pub dislikes: i64,
    pub comment_count: i64,
    pub viewer_reaction: ReactionState,
    /// Oldest first. Left empty by `list_posts`.
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
    pub likes: i64,
    pub dislikes: i64,
    pub viewer_reaction: ReactionState,
}

// ?1 is the viewer id (NULL for guests, which matches no reaction row)
const POST_SELECT: &str = "
    SELECT p.id, p.user_id, u.name, p.title, p.content, p.created_at,
           (SELECT COUNT(*) FROM reactions r WHERE r.post_id = p.id AND r.is_like = 1),
           (SELECT COUNT(*) FROM reactions r WHERE r.post_id = p.id AND r.is_like = 0),
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
           (SELECT r.is_like FROM reactions r WHERE r.post_id = p.id AND r.user_id = ?1)
    FROM posts p
    JOIN users u ON u.id = p.user_id";

const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.user_id, u.name, c.content, c.created_at,
           (SELECT COUNT(*) FROM reactions r WHERE r.comment_id = c.id AND r.is_like = 1),
           (SELECT COUNT(*) FROM reactions r WHERE r.comment_id = c.id AND r.is_like = 0),
           (SELECT r.is_like FROM reactions r WHERE r.comment_id = c.id AND r.user_id = ?1)
    FROM comments c
    JOIN users u ON u.id = c.user_id
    WHERE c.post_id = ?2
    ORDER BY c.created_at ASC, c.id ASC";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    let created_at: String = row.get(5)?;
    Ok(PostView {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author_name: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        created_at: display_timestamp(&created_at),
        categories: Vec::new(),
        likes: row.get(6)?,
        dislikes: row.get(7)?,
        comment_count: row.get(8)?,
        viewer_reaction: ReactionState::from_is_like(row.get(9)?),
        comments: Vec::new(),
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentView> {
    let created_at: String = row.get(5)?;
    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_name: row.get(3)?,
        content: row.get(4)?,
        created_at: display_timestamp(&created_at),
        likes: row.get(6)?,
        dislikes: row.get(7)?,
        viewer_reaction: ReactionState::from_is_like(row.get(8)?),
    })
}

/// Posts, comments and their category links.
#[derive(Clone)]
pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store a post and its category links atomically, creating category
    /// rows the first time a label is used. Returns the new post id.
    pub fn create_post(&self, user_id: i64, draft: &PostDraft) -> AppResult<i64> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO posts (user_id, title, content) VALUES (?1, ?2, ?3)",
            params![user_id, draft.title, draft.content],
        )?;
        let post_id = tx.last_insert_rowid();

        for category in &draft.categories {
            tx.execute(
                "INSERT OR IGNORE INTO categories (label) VALUES (?1)",
                params![category.as_str()],
            )?;
            let category_id: i64 = tx.query_row(
                "SELECT id FROM categories WHERE label = ?1",
                params![category.as_str()],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO post_categories (post_id, category_id) VALUES (?1, ?2)",
                params![post_id, category_id],
            )?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()?;
        Ok(post_id)
    }

    pub fn add_comment(&self, post_id: i64, user_id: i64, content: &str) -> AppResult<i64> {
        if !self.post_exists(post_id)? {
            return Err(AppError::NotFound);
        }
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO comments (post_id, user_id, content) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn post_exists(&self, post_id: i64) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            params![post_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// The post a comment belongs to, if the comment exists.
    pub fn comment_post_id(&self, comment_id: i64) -> AppResult<Option<i64>> {
        let conn = self.pool.get()?;
        let post_id = conn
            .query_row(
                "SELECT post_id FROM comments WHERE id = ?1",
                params![comment_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(post_id)
    }

    /// Full view of one post: categories, counts, comments and the viewer's
    /// own reactions.
    pub fn get_post(&self, post_id: i64, viewer: Option<i64>) -> AppResult<PostView> {
        let conn = self.pool.get()?;

        let mut post = conn
            .query_row(
                &format!("{} WHERE p.id = ?2", POST_SELECT),
                params![viewer, post_id],
                post_from_row,
            )
            .optional()?
            .ok_or(AppError::NotFound)?;

        post.categories = load_categories(&conn, post.id)?;

        let mut stmt = conn.prepare(COMMENT_SELECT)?;
        post.comments = stmt
            .query_map(params![viewer, post_id], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(post)
    }

    /// Newest first. A non-empty `categories` keeps posts carrying any of
    /// them. Guests cannot ask for `Mine` or `Liked`.
    pub fn list_posts(
        &self,
        filter: ListFilter,
        categories: &[Category],
        viewer: Option<i64>,
    ) -> AppResult<Vec<PostView>> {
        if filter.needs_user() && viewer.is_none() {
            return Err(AppError::Unauthorized);
        }

        let mut sql = format!("{} WHERE 1 = 1", POST_SELECT);
        let mut args: Vec<Value> = vec![viewer.map(Value::Integer).unwrap_or(Value::Null)];

        match filter {
            ListFilter::All => {}
            ListFilter::Mine => sql.push_str(" AND p.user_id = ?1"),
            ListFilter::Liked => sql.push_str(
                " AND EXISTS (SELECT 1 FROM reactions r \
                  WHERE r.post_id = p.id AND r.user_id = ?1 AND r.is_like = 1)",
            ),
        }

        if !categories.is_empty() {
            let placeholders: Vec<String> = (0..categories.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM post_categories pc \
                  JOIN categories cat ON cat.id = pc.category_id \
                  WHERE pc.post_id = p.id AND cat.label IN ({}))",
                placeholders.join(", ")
            ));
            args.extend(
                categories
                    .iter()
                    .map(|c| Value::Text(c.as_str().to_string())),
            );
        }

        sql.push_str(" ORDER BY p.created_at DESC, p.id DESC");

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut posts = stmt
            .query_map(params_from_iter(args), post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for post in &mut posts {
            post.categories = load_categories(&conn, post.id)?;
        }

        Ok(posts)
    }
}

fn load_categories(conn: &rusqlite::Connection, post_id: i64) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT c.label FROM post_categories pc \
         JOIN categories c ON c.id = pc.category_id \
         WHERE pc.post_id = ?1 ORDER BY c.id",
    )?;
    let labels = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(labels)
}
