pub mod document_store;
pub mod lobby;
pub mod models;
pub mod profile;
pub mod storage;
