#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde_json::{Value as JsonValue, json};
use soda_pull::{
    discover,
    error::{FetchError, FetchResult},
    transport::Transport,
};
use tempfile::{TempDir, tempdir};

pub const COLLECTION_URL: &str = "https://data.example.org/resource/abcd-1234.json";
pub const METADATA_URL: &str = "https://data.example.org/api/views/abcd-1234.json";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// One request as the collection saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn offset(&self) -> usize {
        self.param("$offset")
            .and_then(|v| v.parse().ok())
            .expect("data request carries $offset")
    }
}

/// In-memory SODA collection serving metadata and offset pages.
pub struct SimulatedCollection {
    fields: Vec<String>,
    records: Vec<JsonValue>,
    fail_offset: Option<(usize, u16)>,
    fail_metadata: Option<u16>,
    page_cap: Option<usize>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl SimulatedCollection {
    pub fn new(fields: &[&str], records: Vec<JsonValue>) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            records,
            fail_offset: None,
            fail_metadata: None,
            page_cap: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `n` permit-like records dated one day apart from 2026-01-01.
    pub fn permits(n: usize) -> Self {
        Self::new(
            &["borough", "issued_date", "permit_status", "work_type"],
            (0..n).map(permit_record).collect(),
        )
    }

    pub fn failing_at_offset(mut self, offset: usize, status: u16) -> Self {
        self.fail_offset = Some((offset, status));
        self
    }

    /// Serves at most `cap` records per page whatever `$limit` asks for.
    pub fn capping_pages_at(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    pub fn failing_metadata(mut self, status: u16) -> Self {
        self.fail_metadata = Some(status);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log").clone()
    }

    pub fn data_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !r.url.contains("/api/views/"))
            .collect()
    }

    pub fn offsets(&self) -> Vec<usize> {
        self.data_requests().iter().map(|r| r.offset()).collect()
    }

    fn status_error(url: &str, status: u16) -> FetchError {
        let dataset =
            discover::referenced_dataset_id(url).unwrap_or_else(|| "unknown".to_string());
        FetchError::Status {
            url: url.to_string(),
            dataset,
            status,
        }
    }

    fn page(&self, url: &str, query: &[(String, String)]) -> FetchResult<JsonValue> {
        let lookup = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        let offset: usize = lookup("$offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let limit: usize = lookup("$limit").and_then(|v| v.parse().ok()).unwrap_or(1000);
        let limit = self.page_cap.map_or(limit, |cap| limit.min(cap));
        if let Some((fail, status)) = self.fail_offset
            && fail == offset
        {
            return Err(Self::status_error(url, status));
        }
        let selected: Option<Vec<String>> =
            lookup("$select").map(|s| s.split(", ").map(str::to_string).collect());
        let page = self
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .map(|record| match (&selected, record) {
                (Some(columns), JsonValue::Object(map)) => JsonValue::Object(
                    map.iter()
                        .filter(|(k, _)| columns.contains(k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                ),
                _ => record.clone(),
            })
            .collect();
        Ok(JsonValue::Array(page))
    }
}

impl Transport for SimulatedCollection {
    fn get_json(&self, url: &str, query: &[(String, String)]) -> FetchResult<JsonValue> {
        self.requests
            .lock()
            .expect("request log")
            .push(RecordedRequest {
                url: url.to_string(),
                query: query.to_vec(),
            });
        if url.contains("/api/views/") {
            if let Some(status) = self.fail_metadata {
                return Err(Self::status_error(url, status));
            }
            let columns: Vec<JsonValue> = self
                .fields
                .iter()
                .map(|f| json!({ "fieldName": f, "dataTypeName": "text" }))
                .collect();
            return Ok(json!({ "id": "abcd-1234", "columns": columns }));
        }
        self.page(url, query)
    }
}

pub fn issued_on(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .and_then(|d| d.checked_add_days(Days::new(i as u64)))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid date")
}

pub fn permit_record(i: usize) -> JsonValue {
    let statuses = ["ISSUED", "APPROVED", "PENDING"];
    json!({
        "borough": ((i % 5) + 1).to_string(),
        "issued_date": issued_on(i).format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        "permit_status": statuses[i % statuses.len()],
        "work_type": if i % 2 == 0 { "PLUMBING" } else { "GENERAL" },
        "sequence": i,
    })
}
