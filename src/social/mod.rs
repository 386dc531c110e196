pub mod comments;
pub mod follows;
pub mod likes;
pub mod profiles;
pub mod stories;
