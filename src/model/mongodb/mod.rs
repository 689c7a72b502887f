mod bson;
mod collection;
mod errors;
mod transaction;

pub use bson::{ids_filter, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::is_duplicate_key_error;
pub use transaction::finish_attempt;
