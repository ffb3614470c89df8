mod memory;
mod models;
mod postgres;
pub mod schema;
mod store;

pub use self::{
    memory::{MemorySession, MemoryStorage},
    models::{ArticleRow, ListRow, NewArticle, NewVersion, VersionRow},
    postgres::{Db, PgSession, PgStorage, Tables, new_db_pool},
    store::{Session, Storage},
};
