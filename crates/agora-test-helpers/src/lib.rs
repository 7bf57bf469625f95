mod sqlite;

pub use sqlite::*;

use std::borrow::Cow;

pub trait TestDb {
    fn db_uri(&self) -> Cow<'_, str>;
}
