pub mod db;
pub mod embeddings;
pub mod notifications;

pub use db::DbAdapter;
pub use embeddings::OpenAiEmbeddingAdapter;
pub use notifications::LogNotifier;
