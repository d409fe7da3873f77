pub mod chat_lock_repo;

pub use chat_lock_repo::ChatLockRepo;
