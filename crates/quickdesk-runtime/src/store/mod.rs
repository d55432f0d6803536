mod postgres;
mod sql;

pub use postgres::PgStore;
