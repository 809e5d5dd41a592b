/// A row type with a single-column `BIGINT` primary key.
pub trait Model: Default + From<tokio_postgres::Row> {
    fn table_name() -> &'static str;
    fn id_column() -> &'static str;
}
