//! Google Sheets implementation of the record store.
//!
//! The first row of the sheet is the header and must match the configured
//! labels column for column; every following row is one record.

use std::process::Command;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use insight_core::domain::{Record, COLUMNS};
use insight_core::error::InsightError;
use insight_core::ports::{RecordRepository, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// Supplies OAuth bearer tokens for the Sheets API
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Result<String>;
}

/// A token handed over as-is, e.g. from the environment
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Runs a shell command and uses its trimmed stdout as the token,
/// e.g. `gcloud auth print-access-token`
pub struct CommandToken {
    command: String,
}

impl CommandToken {
    pub fn new(command: String) -> Self {
        Self { command }
    }
}

impl TokenSource for CommandToken {
    fn access_token(&self) -> Result<String> {
        debug!("requesting access token via `{}`", self.command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .map_err(|e| InsightError::Connectivity(format!("token command failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InsightError::Connectivity(format!(
                "token command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(InsightError::Connectivity(
                "token command printed nothing".to_string(),
            ));
        }
        Ok(token)
    }
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Expected header labels, one per record column
    pub headers: Vec<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl SheetsConfig {
    pub fn new(spreadsheet_id: String, sheet_name: String) -> Self {
        Self {
            spreadsheet_id,
            sheet_name,
            headers: COLUMNS.iter().map(|c| c.to_string()).collect(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Token and header check cached between calls; dropped after every write
#[derive(Debug, Default)]
struct SheetSession {
    token: Option<String>,
    header_verified: bool,
}

pub struct SheetsRecordRepository {
    config: SheetsConfig,
    client: Client,
    token_source: Box<dyn TokenSource>,
    session: Mutex<SheetSession>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsRecordRepository {
    pub fn new(config: SheetsConfig, token_source: Box<dyn TokenSource>) -> Result<Self> {
        if config.headers.len() != COLUMNS.len() {
            return Err(InsightError::schema(&COLUMNS, &config.headers));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InsightError::Connectivity(e.to_string()))?;

        Ok(Self {
            config,
            client,
            token_source,
            session: Mutex::new(SheetSession::default()),
        })
    }

    fn session(&self) -> MutexGuard<'_, SheetSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn token(&self) -> Result<String> {
        if let Some(token) = self.session().token.clone() {
            return Ok(token);
        }
        let token = self.token_source.access_token()?;
        self.session().token = Some(token.clone());
        Ok(token)
    }

    /// Forgets the cached token and header check
    pub fn invalidate(&self) {
        *self.session() = SheetSession::default();
    }

    fn range(&self, rows: Option<usize>) -> String {
        sheet_range(&self.config.sheet_name, rows)
    }

    fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = values_url(&self.config.base_url, &self.config.spreadsheet_id, range);
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .map_err(|e| InsightError::Connectivity(e.to_string()))?;
        let response = self.check_status(response)?;

        let body: ValueRange = response
            .json()
            .map_err(|e| InsightError::Connectivity(format!("unreadable sheet data: {e}")))?;
        Ok(body.values.iter().map(|row| cells_to_strings(row)).collect())
    }

    fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate();
        }
        let body = response.text().unwrap_or_default();
        warn!("sheets API returned {status}");
        Err(InsightError::Connectivity(format!(
            "sheets API returned {status}: {}",
            api_error_message(&body)
        )))
    }

    fn ensure_header(&self) -> Result<()> {
        if self.session().header_verified {
            return Ok(());
        }
        let rows = self.get_values(&self.range(Some(1)))?;
        verify_header(&self.config.headers, rows.first())?;
        self.session().header_verified = true;
        Ok(())
    }
}

impl RecordRepository for SheetsRecordRepository {
    fn fetch_all_records(&self) -> Result<Vec<Record>> {
        let rows = self.get_values(&self.range(None))?;
        let records = records_from_rows(&self.config.headers, &rows)?;
        self.session().header_verified = true;
        debug!("loaded {} records from sheet", records.len());
        Ok(records)
    }

    fn append_record(&self, record: &Record) -> Result<()> {
        self.ensure_header()?;

        let url = append_url(
            &self.config.base_url,
            &self.config.spreadsheet_id,
            &self.range(None),
        );
        debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token()?)
            .json(&append_body(record))
            .send()
            .map_err(|e| InsightError::Connectivity(e.to_string()))?;
        self.check_status(response)?;

        // the next read must see the new row, so drop everything cached
        self.invalidate();
        info!("appended record '{}' to sheet {}", record.title, self.config.sheet_name);
        Ok(())
    }
}

fn last_column() -> char {
    (b'A' + COLUMNS.len() as u8 - 1) as char
}

/// A1 range covering all record columns, optionally limited to the first rows
pub fn sheet_range(sheet_name: &str, rows: Option<usize>) -> String {
    let sheet = if sheet_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet_name.to_string()
    } else {
        format!("'{}'", sheet_name.replace('\'', "''"))
    };
    let last = last_column();
    match rows {
        Some(n) => format!("{sheet}!A1:{last}{n}"),
        None => format!("{sheet}!A:{last}"),
    }
}

pub fn values_url(base_url: &str, spreadsheet_id: &str, range: &str) -> String {
    format!(
        "{}/v4/spreadsheets/{}/values/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(spreadsheet_id),
        urlencoding::encode(range)
    )
}

pub fn append_url(base_url: &str, spreadsheet_id: &str, range: &str) -> String {
    format!(
        "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
        values_url(base_url, spreadsheet_id, range)
    )
}

pub fn append_body(record: &Record) -> Value {
    json!({ "values": [record.to_row()] })
}

fn cells_to_strings(row: &[Value]) -> Vec<String> {
    row.iter()
        .map(|cell| match cell {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect()
}

/// Checks the sheet's first row against the expected labels.
/// Surrounding whitespace in the sheet is ignored.
pub fn verify_header(expected: &[String], header: Option<&Vec<String>>) -> Result<()> {
    let found: Vec<String> = header
        .map(|row| row.iter().map(|c| c.trim().to_string()).collect())
        .unwrap_or_default();
    if found != expected {
        let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
        return Err(InsightError::schema(&expected, &found));
    }
    Ok(())
}

/// Converts sheet rows (header first) into records
pub fn records_from_rows(expected: &[String], rows: &[Vec<String>]) -> Result<Vec<Record>> {
    verify_header(expected, rows.first())?;
    Ok(rows.iter().skip(1).map(|row| Record::from_row(row)).collect())
}

/// Pulls `error.message` out of a Google API error body, falling back to the raw text
pub fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn headers() -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_sheet_range_plain_name() {
        assert_eq!(sheet_range("Sheet1", None), "Sheet1!A:N");
        assert_eq!(sheet_range("Sheet1", Some(1)), "Sheet1!A1:N1");
    }

    #[test]
    fn test_sheet_range_quotes_names_with_spaces() {
        assert_eq!(sheet_range("Video data", None), "'Video data'!A:N");
        assert_eq!(sheet_range("Bob's", None), "'Bob''s'!A:N");
    }

    #[test]
    fn test_values_url_encodes_range() {
        assert_eq!(
            values_url("https://sheets.googleapis.com/", "abc", "'My Sheet'!A:N"),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/%27My%20Sheet%27%21A%3AN"
        );
    }

    #[test]
    fn test_append_url_uses_raw_insert() {
        let url = append_url(DEFAULT_BASE_URL, "abc", "Sheet1!A:N");
        assert!(url.ends_with("/values/Sheet1%21A%3AN:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS"));
    }

    #[test]
    fn test_append_body_is_single_ordered_row() {
        let record = Record {
            title: "Gold outlook".to_string(),
            ..Record::default()
        };
        let body = append_body(&record);
        let row = body["values"][0].as_array().unwrap();
        assert_eq!(row.len(), COLUMNS.len());
        assert_eq!(row[3], "Gold outlook");
    }

    #[test]
    fn test_records_from_rows_pads_short_rows() {
        let rows = vec![
            headers(),
            vec!["2025-12-16 10:30:00".to_string(), "".to_string(), "v1".to_string(), "Fed".to_string()],
        ];
        let records = records_from_rows(&headers(), &rows).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Fed");
        assert_eq!(records[0].url, "");
    }

    #[test]
    fn test_header_only_sheet_is_empty_store() {
        assert!(records_from_rows(&headers(), &[headers()]).unwrap().is_empty());
    }

    #[test]
    fn test_empty_sheet_is_schema_error() {
        assert!(matches!(
            records_from_rows(&headers(), &[]),
            Err(InsightError::Schema { .. })
        ));
    }

    #[test]
    fn test_reordered_header_is_schema_error() {
        let mut header = headers();
        header.swap(2, 3);
        assert!(matches!(
            verify_header(&headers(), Some(&header)),
            Err(InsightError::Schema { .. })
        ));
    }

    #[test]
    fn test_header_whitespace_is_ignored() {
        let header: Vec<String> = headers().iter().map(|h| format!(" {h} ")).collect();
        assert!(verify_header(&headers(), Some(&header)).is_ok());
    }

    #[test]
    fn test_cells_to_strings_stringifies_numbers() {
        let row = vec![json!("a"), json!(12), Value::Null];
        assert_eq!(cells_to_strings(&row), vec!["a", "12", ""]);
    }

    #[test]
    fn test_api_error_message_extracts_message() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission"}}"#;
        assert_eq!(api_error_message(body), "The caller does not have permission");
        assert_eq!(api_error_message("  bad gateway "), "bad gateway");
    }

    #[test]
    fn test_repository_rejects_wrong_header_count() {
        let mut config = SheetsConfig::new("abc".to_string(), "Sheet1".to_string());
        config.headers.pop();
        let result = SheetsRecordRepository::new(config, Box::new(StaticToken("t".to_string())));
        assert!(matches!(result, Err(InsightError::Schema { .. })));
    }

    struct CountingToken(AtomicUsize);

    impl TokenSource for Arc<CountingToken> {
        fn access_token(&self) -> Result<String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("tok-{n}"))
        }
    }

    fn counting_repository(base_url: &str) -> SheetsRecordRepository {
        let mut config = SheetsConfig::new("sheet-1".to_string(), "Sheet1".to_string());
        config.base_url = base_url.to_string();
        config.timeout = Duration::from_secs(5);
        let tokens = Arc::new(CountingToken(AtomicUsize::new(0)));
        SheetsRecordRepository::new(config, Box::new(tokens)).unwrap()
    }

    #[derive(Debug)]
    struct SeenRequest {
        line: String,
        authorization: String,
        body: String,
    }

    /// Answers one scripted response per connection and records what it was sent
    fn serve(responses: Vec<(u16, String)>) -> (String, thread::JoinHandle<Vec<SeenRequest>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let mut authorization = String::new();
                let mut content_length = 0;
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    let header = header.trim_end();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        match name.to_ascii_lowercase().as_str() {
                            "authorization" => authorization = value.trim().to_string(),
                            "content-length" => content_length = value.trim().parse().unwrap(),
                            _ => {}
                        }
                    }
                }
                let mut request_body = vec![0u8; content_length];
                reader.read_exact(&mut request_body).unwrap();

                seen.push(SeenRequest {
                    line: line.trim_end().to_string(),
                    authorization,
                    body: String::from_utf8_lossy(&request_body).into_owned(),
                });

                let reason = if status == 200 { "OK" } else { "Unauthorized" };
                write!(
                    stream,
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
            }
            seen
        });

        (base_url, handle)
    }

    #[test]
    fn test_token_is_cached_until_invalidated() {
        let repo = counting_repository(DEFAULT_BASE_URL);

        assert_eq!(repo.token().unwrap(), "tok-0");
        assert_eq!(repo.token().unwrap(), "tok-0");
        repo.invalidate();
        assert_eq!(repo.token().unwrap(), "tok-1");
    }

    #[test]
    fn test_append_and_unauthorized_drop_cached_token() {
        let header_row = json!({ "values": [headers()] }).to_string();
        let mut data_row = headers();
        data_row.iter_mut().for_each(|cell| cell.clear());
        data_row[3] = "Gold outlook".to_string();
        let full_sheet = json!({ "values": [headers(), data_row] }).to_string();
        let expired = json!({ "error": { "code": 401, "message": "expired" } }).to_string();

        let (base_url, server) = serve(vec![
            (200, header_row),
            (200, "{}".to_string()),
            (401, expired),
            (200, full_sheet),
        ]);
        let repo = counting_repository(&base_url);
        let record = Record {
            title: "Gold outlook".to_string(),
            ..Record::default()
        };

        repo.append_record(&record).unwrap();
        let err = repo.fetch_all_records().unwrap_err();
        let records = repo.fetch_all_records().unwrap();
        let seen = server.join().unwrap();

        assert_eq!(
            seen[0].line,
            "GET /v4/spreadsheets/sheet-1/values/Sheet1%21A1%3AN1 HTTP/1.1"
        );
        assert_eq!(seen[0].authorization, "Bearer tok-0");

        assert_eq!(
            seen[1].line,
            "POST /v4/spreadsheets/sheet-1/values/Sheet1%21A%3AN:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS HTTP/1.1"
        );
        assert_eq!(seen[1].authorization, "Bearer tok-0");
        let posted: Value = serde_json::from_str(&seen[1].body).unwrap();
        assert_eq!(posted, append_body(&record));

        assert_eq!(seen[2].line, "GET /v4/spreadsheets/sheet-1/values/Sheet1%21A%3AN HTTP/1.1");
        assert_eq!(seen[2].authorization, "Bearer tok-1");
        match err {
            InsightError::Connectivity(message) => {
                assert_eq!(message, "sheets API returned 401 Unauthorized: expired")
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(seen[3].authorization, "Bearer tok-2");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Gold outlook");
    }

    #[test]
    fn test_command_token_trims_output() {
        let source = CommandToken::new("echo '  ya29.token  '".to_string());
        assert_eq!(source.access_token().unwrap(), "ya29.token");
    }

    #[test]
    fn test_failing_command_token_is_connectivity_error() {
        let source = CommandToken::new("exit 3".to_string());
        assert!(matches!(
            source.access_token(),
            Err(InsightError::Connectivity(_))
        ));
    }
}
