//! Stateless repositories, one per table.

pub mod conversation_repo;
pub mod job_repo;
pub mod message_repo;
pub mod resource_repo;

pub use conversation_repo::ConversationRepo;
pub use job_repo::JobRepo;
pub use message_repo::MessageRepo;
pub use resource_repo::ResourceRepo;
