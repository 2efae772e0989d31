pub mod chat;
pub mod message;
pub mod settings;

pub use chat::PgChatRepository;
pub use message::PgMessageRepository;
pub use settings::PgSettingsRepository;
