//! Database repositories
//!
//! Repository pattern implementations for database access. Each repository
//! exposes a trait (the seam services depend on) and an SQLx implementation
//! that works against both SQLite and MySQL.

/// Run `$body` against whichever backend the pool holds.
///
/// The body is expanded once per backend with `$p` bound to the concrete
/// pool, so the same SQL text and row mapping serve both drivers. Each call
/// is timed by a [`QueryTimer`](crate::db::QueryTimer).
macro_rules! with_backend {
    ($pool:expr, $label:expr, |$p:ident| $body:expr) => {{
        let _timer = $crate::db::QueryTimer::start($label);
        match $pool.backend() {
            $crate::db::Backend::Sqlite($p) => $body,
            $crate::db::Backend::Mysql($p) => $body,
        }
    }};
}

pub mod chat;
pub mod contact;
pub mod post;
pub mod session;
pub mod settings;
pub mod tool;
pub mod user;

pub use chat::{ChatRepository, SqlxChatRepository};
pub use contact::{ContactRepository, SqlxContactRepository};
pub use post::{PostRecord, PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use settings::{Setting, SettingsRepository, SqlxSettingsRepository};
pub use tool::{SqlxToolRepository, ToolRecord, ToolRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Uniform access to the generated key of an INSERT
pub(crate) trait LastInsertId {
    fn last_id(&self) -> i64;
}

impl LastInsertId for sqlx::sqlite::SqliteQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl LastInsertId for sqlx::mysql::MySqlQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}
