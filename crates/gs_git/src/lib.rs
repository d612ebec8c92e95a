pub mod object;
pub mod repository;

pub use object::{commit_id, CommitObject, HeaderField, ObjectError};
pub use repository::Repository;
