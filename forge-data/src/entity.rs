/// Maps a Rust struct to a SQL table: table name, id column, column
/// list. Intended to be implemented by hand or by a derive macro; the
/// query builder's schema operations and `Repository` both lean on it.
pub trait Entity: Send + Sync + Unpin + 'static {
    type Id: Send + Sync + ToString + 'static;

    fn table_name() -> &'static str;
    fn id_column() -> &'static str;
    fn columns() -> &'static [&'static str];
    fn id(&self) -> &Self::Id;
}
