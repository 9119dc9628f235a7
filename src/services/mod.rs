//! Services layer - business logic
//!
//! Services implement the rules of the site on top of the repositories and
//! the cache: validation, slugs, markdown rendering, rate limits and cache
//! invalidation.

pub mod chat;
pub mod contact;
pub mod email;
pub mod fingerprint;
pub mod form_token;
pub mod markdown;
pub mod page_cache;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod settings;
pub mod slug;
pub mod tool;
pub mod user;
pub mod validation;

pub use chat::{ChatError, ChatEvent, ChatService};
pub use contact::{ContactError, ContactService, SubmitOutcome};
pub use email::EmailService;
pub use fingerprint::client_fingerprint;
pub use form_token::{FormTokenError, FormTokenSigner};
pub use markdown::MarkdownRenderer;
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use rate_limiter::{LoginRateLimiter, SlidingWindowLimiter};
pub use settings::{SettingsService, SettingsServiceError, SiteSettings};
pub use slug::generate_slug;
pub use tool::{ToolService, ToolServiceError};
pub use user::{LoginInput, UserService, UserServiceError};
pub use validation::{FieldRule, FormData, FormState, FormValidator};
