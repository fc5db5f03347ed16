pub mod database;

pub use database::{ClientError, MockDatabase, Row, SqlClient, TracedClient};
