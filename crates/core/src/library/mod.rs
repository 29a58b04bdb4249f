//! The user's album library and snatch history.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteLibrary;
pub use store::{AlbumFilter, AlbumStore, HistoryStore, LibraryError};
pub use types::*;
