pub mod errors;
pub mod events;
pub mod id;
pub mod types;

pub use errors::{ChatViewError, ConfigError, ThemeError};
pub use events::{EventBus, ThemeEvent};
pub use id::{new_id, SessionId};
pub use types::{Color, PresenceStatus};

pub type Result<T> = std::result::Result<T, ChatViewError>;
