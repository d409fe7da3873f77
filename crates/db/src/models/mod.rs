pub mod chat_lock;
