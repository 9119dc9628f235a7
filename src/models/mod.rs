//! Data models
//!
//! Database entities (Post, Tool, ContactMessage, ChatMessage, User, Session)
//! and the input/pagination types passed between the HTTP layer, services and
//! repositories.

mod chat_message;
mod contact_message;
mod pagination;
mod post;
mod session;
mod tool;
mod user;

pub use chat_message::{ChatMessage, NewChatMessage};
pub use contact_message::{ContactMessage, NewContactMessage};
pub use pagination::{ListParams, PagedResult};
pub use post::{CreatePostInput, Post, PostStatus, UpdatePostInput};
pub use session::Session;
pub use tool::{CreateToolInput, Tool, UpdateToolInput};
pub use user::{CreateUserInput, User, UserRole};
