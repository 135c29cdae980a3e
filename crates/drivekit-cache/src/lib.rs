//! Local persistence for Drivekit.
//!
//! Media records and stored account sessions live in a small SQLite database;
//! a hot in-memory tier sits in front of the media table so repeated lookups
//! avoid the database entirely. The whole store is disposable: switching
//! accounts clears it and the next reads repopulate from the API.

pub mod backend;
pub mod memory;
pub mod read_through;
pub mod sqlite;

pub use backend::CacheBackend;
pub use memory::MemoryCache;
pub use read_through::MediaCache;
pub use sqlite::SqliteCache;
