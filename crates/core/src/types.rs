/// Identifier of an external conversation (e.g. a WhatsApp thread id).
pub type ChatId = String;

/// Identifier of an agent account.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
