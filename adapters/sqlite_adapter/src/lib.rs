use insight_core::domain::{Record, COLUMNS};
use insight_core::error::InsightError;
use insight_core::ports::{RecordRepository, Result};
use rusqlite::{Connection, Row};
use tracing::{debug, info, warn};

const TABLE: &str = "records";

/// SQLite implementation of the RecordRepository trait.
/// Rows live in a single table whose columns mirror the record layout.
pub struct SqliteRecordRepository {
    db_path: String,
}

impl SqliteRecordRepository {
    /// Creates a new SqliteRecordRepository with the given database path
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    /// Opens the database, creating the table on first use and
    /// rejecting a table whose columns do not match the record layout
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| InsightError::Connectivity(format!("{}: {e}", self.db_path)))?;

        let found = Self::table_columns(&conn)?;
        if found.is_empty() {
            debug!("creating table {TABLE} in {}", self.db_path);
            conn.execute_batch(&create_table_sql())
                .map_err(InsightError::storage)?;
        } else if found.iter().map(String::as_str).ne(COLUMNS.iter().copied()) {
            warn!("table {TABLE} in {} has unexpected columns", self.db_path);
            return Err(InsightError::schema(&COLUMNS, &found));
        }

        Ok(conn)
    }

    /// Data columns of the table in declaration order, without the row id
    fn table_columns(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({TABLE})"))
            .map_err(InsightError::storage)?;
        let names = stmt
            .query_map([], |row: &Row| row.get::<_, String>(1))
            .map_err(InsightError::storage)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(InsightError::storage)?;
        Ok(names.into_iter().filter(|name| name != "id").collect())
    }
}

fn create_table_sql() -> String {
    let columns = COLUMNS
        .iter()
        .map(|c| format!("{c} TEXT NOT NULL DEFAULT ''"))
        .collect::<Vec<_>>()
        .join(",\n    ");
    format!("CREATE TABLE {TABLE} (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    {columns}\n)")
}

impl RecordRepository for SqliteRecordRepository {
    fn fetch_all_records(&self) -> Result<Vec<Record>> {
        let conn = self.connect()?;

        let sql = format!("SELECT {} FROM {TABLE} ORDER BY id ASC", COLUMNS.join(", "));
        let mut stmt = conn.prepare(&sql).map_err(InsightError::storage)?;

        let records = stmt
            .query_map([], |row: &Row| {
                let cells = (0..COLUMNS.len())
                    .map(|i| row.get::<_, String>(i))
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(Record::from_row(&cells))
            })
            .map_err(InsightError::storage)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(InsightError::storage)?;

        debug!("loaded {} records from {}", records.len(), self.db_path);
        Ok(records)
    }

    fn append_record(&self, record: &Record) -> Result<()> {
        let conn = self.connect()?;

        let placeholders = (1..=COLUMNS.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {TABLE} ({}) VALUES ({placeholders})",
            COLUMNS.join(", ")
        );

        conn.execute(&sql, rusqlite::params_from_iter(record.to_row()))
            .map_err(InsightError::storage)?;

        info!("appended record '{}' to {}", record.title, self.db_path);
        Ok(())
    }
}
