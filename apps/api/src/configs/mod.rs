// Endpoint configurations: CRUD plus the current pointer, portable
// export/import documents, and pre-import backups.

pub mod export;
pub mod handlers;
pub mod import;
pub mod store;
pub mod validation;
