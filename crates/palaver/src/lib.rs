pub mod agent;
pub mod continuation;
pub mod errors;
pub mod models;
pub mod providers;
pub mod schema;
pub mod storage;
pub mod text_editor;
pub mod tool;
pub mod transport;
