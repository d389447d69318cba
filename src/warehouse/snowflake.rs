//! Snowflake connector over the session-token HTTPS API
//!
//! Login exchanges username/password for a session token; every statement is
//! one `query-request` round-trip with positional bindings; close deletes the
//! server-side session. Results larger than one response are split into
//! chunks that are fetched from the URLs the first response lists.

use super::{Connector, QueryResult, WarehouseSession};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::sql::evaluator::parse_bool;
use crate::statement::Statement;
use crate::types::Value;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

const CLIENT_APP_ID: &str = "tablegate";
const CLIENT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Connector holding the account endpoint, credentials and session context.
#[derive(Clone)]
pub struct SnowflakeConnector {
    http: reqwest::Client,
    base_url: String,
    account_name: String,
    username: String,
    password: String,
    database: String,
    schema: String,
    warehouse: String,
    role: Option<String>,
}

impl fmt::Debug for SnowflakeConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConnector")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("warehouse", &self.warehouse)
            .finish()
    }
}

impl SnowflakeConnector {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{}/{}", CLIENT_APP_ID, CLIENT_APP_VERSION))
            .connect_timeout(Duration::from_secs(30))
            .gzip(true)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url(&config.account),
            account_name: account_name(&config.account),
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.context.database.clone(),
            schema: config.context.schema_or_default().to_string(),
            warehouse: config.context.warehouse.clone(),
            role: config.role.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    async fn connect(&self) -> Result<Box<dyn WarehouseSession>> {
        let url = format!("{}/session/v1/login-request", self.base_url);
        let mut params = vec![
            ("databaseName", self.database.as_str()),
            ("schemaName", self.schema.as_str()),
            ("warehouse", self.warehouse.as_str()),
        ];
        if let Some(role) = &self.role {
            params.push(("roleName", role.as_str()));
        }
        let request_id = Uuid::new_v4().to_string();
        params.push(("requestId", request_id.as_str()));

        let body = LoginRequest {
            data: LoginData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: CLIENT_APP_VERSION,
                account_name: &self.account_name,
                login_name: &self.username,
                password: &self.password,
            },
        };

        let started = Instant::now();
        let request = self
            .http
            .post(&url)
            .query(&params)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body);
        let envelope: Envelope<LoginResponseData> =
            send_json(request).await.map_err(GatewayError::into_connection)?;

        let token = envelope
            .into_data()
            .map_err(GatewayError::into_connection)?
            .token
            .ok_or_else(|| GatewayError::Connection("login response carried no session token".to_string()))?;

        debug!(
            user = %self.username,
            duration_ms = started.elapsed().as_millis() as u64,
            "snowflake session opened"
        );

        Ok(Box::new(SnowflakeSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token,
            sequence_id: 0,
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "snowflake"
    }
}

/// One authenticated Snowflake session.
struct SnowflakeSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
    sequence_id: u64,
    closed: bool,
}

impl SnowflakeSession {
    fn authorization(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }

    async fn fetch_chunk(&self, chunk: &Chunk, headers: &HashMap<String, String>) -> Result<Vec<Vec<Option<String>>>> {
        let mut request = self.http.get(&chunk.url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = send(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Execution(format!("result chunk download failed with status {}", status)));
        }
        let body = response.text().await?;
        parse_chunk(&body)
    }
}

#[async_trait]
impl WarehouseSession for SnowflakeSession {
    async fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
        if self.closed {
            return Err(GatewayError::Connection("session is closed".to_string()));
        }
        self.sequence_id += 1;

        let request_id = Uuid::new_v4().to_string();
        let url = format!("{}/queries/v1/query-request", self.base_url);
        let body = QueryRequest {
            sql_text: &statement.sql,
            async_exec: false,
            sequence_id: self.sequence_id,
            bindings: encode_bindings(&statement.binds),
        };

        let started = Instant::now();
        let request = self
            .http
            .post(&url)
            .query(&[("requestId", request_id.as_str())])
            .header(reqwest::header::ACCEPT, "application/snowflake")
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .json(&body);
        let envelope: Envelope<QueryResponseData> = send_json(request).await?;
        let mut data = envelope.into_data()?;

        let headers = chunk_headers(&data);
        for chunk in std::mem::take(&mut data.chunks) {
            let rows = self.fetch_chunk(&chunk, &headers).await?;
            data.rowset.extend(rows);
        }

        let result = into_result(data)?;
        debug!(
            sequence_id = self.sequence_id,
            rows = result.row_count(),
            duration_ms = started.elapsed().as_millis() as u64,
            "snowflake statement finished"
        );
        Ok(result)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(GatewayError::Connection("session is already closed".to_string()));
        }
        let url = format!("{}/session", self.base_url);
        let request = self
            .http
            .post(&url)
            .query(&[("delete", "true")])
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::AUTHORIZATION, self.authorization());
        let response = send(request).await?;

        if !response.status().is_success() {
            return Err(GatewayError::Connection(format!(
                "session delete failed with status {}",
                response.status()
            )));
        }
        self.closed = true;
        debug!("snowflake session closed");
        Ok(())
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    data: LoginData<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: &'a str,
    login_name: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponseData {
    token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    bindings: Option<BTreeMap<String, Binding>>,
}

/// Positional binding; the value travels as text (or null) with a type tag
#[derive(Debug, Serialize, PartialEq)]
struct Binding {
    #[serde(rename = "type")]
    kind: &'static str,
    value: Option<String>,
}

/// Common response wrapper
#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if !self.success {
            let message = self.message.unwrap_or_else(|| "request failed".to_string());
            return Err(GatewayError::Execution(match self.code {
                Some(code) => format!("{} (code {})", message, code),
                None => message,
            }));
        }
        self.data
            .ok_or_else(|| GatewayError::Execution("response carried no data".to_string()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponseData {
    #[serde(default)]
    rowtype: Vec<RowType>,
    #[serde(default)]
    rowset: Vec<Vec<Option<String>>>,
    #[serde(default)]
    chunks: Vec<Chunk>,
    #[serde(default)]
    chunk_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    qrmk: Option<String>,
}

#[derive(Deserialize)]
struct RowType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    scale: Option<i64>,
}

#[derive(Deserialize)]
struct Chunk {
    url: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// `https://<account>.snowflakecomputing.com`, or the account verbatim when it
/// is already a URL
fn base_url(account: &str) -> String {
    let account = account.trim().trim_end_matches('/');
    if account.contains("://") {
        account.to_string()
    } else {
        format!("https://{}.snowflakecomputing.com", account)
    }
}

/// Account locator without region or cloud suffix
fn account_name(account: &str) -> String {
    let host = account
        .split("://")
        .nth(1)
        .unwrap_or(account)
        .trim();
    host.split('.').next().unwrap_or(host).to_uppercase()
}

fn encode_bindings(binds: &[Value]) -> Option<BTreeMap<String, Binding>> {
    if binds.is_empty() {
        return None;
    }
    Some(
        binds
            .iter()
            .enumerate()
            .map(|(i, value)| ((i + 1).to_string(), encode_binding(value)))
            .collect(),
    )
}

fn encode_binding(value: &Value) -> Binding {
    match value {
        Value::Null => Binding { kind: "TEXT", value: None },
        Value::Bool(b) => Binding { kind: "BOOLEAN", value: Some(b.to_string()) },
        Value::Integer(i) => Binding { kind: "FIXED", value: Some(i.to_string()) },
        Value::Float(f) => Binding { kind: "REAL", value: Some(f.to_string()) },
        Value::Text(s) => Binding { kind: "TEXT", value: Some(s.clone()) },
    }
}

/// Decode one rowset cell according to its column's rowtype
fn decode_cell(raw: Option<String>, column: &RowType) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    match column.kind.to_ascii_lowercase().as_str() {
        "fixed" if column.scale.unwrap_or(0) == 0 => match raw.parse::<i64>() {
            Ok(i) => Value::Integer(i),
            // Wider than i64: keep the exact digits
            Err(_) => Value::Text(raw),
        },
        "fixed" | "real" => match raw.parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => Value::Text(raw),
        },
        "boolean" => match parse_bool(&raw) {
            Some(b) => Value::Bool(b),
            None => Value::Text(raw),
        },
        kind @ ("date" | "time" | "timestamp_ntz" | "timestamp_ltz" | "timestamp_tz") => {
            match decode_temporal(&raw, kind, column.scale) {
                Some(text) => Value::Text(text),
                None => Value::Text(raw),
            }
        }
        _ => Value::Text(raw),
    }
}

/// Render an epoch-encoded DATE/TIME/TIMESTAMP cell as ISO-8601 text.
///
/// Result sets carry days since 1970-01-01 for DATE, `<seconds>.<fraction>`
/// for TIME and TIMESTAMP, plus `<offset minutes + 1440>` for TIMESTAMP_TZ.
/// The text form casts back to the same value when bound as TEXT.
fn decode_temporal(raw: &str, kind: &str, scale: Option<i64>) -> Option<String> {
    let digits = scale
        .and_then(|s| usize::try_from(s).ok())
        .unwrap_or(9)
        .min(9);

    match kind {
        "date" => {
            let days: i64 = raw.trim().parse().ok()?;
            let from_ce = i32::try_from(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?).ok()?;
            NaiveDate::from_num_days_from_ce_opt(from_ce).map(|d| d.format("%Y-%m-%d").to_string())
        }
        "time" => {
            let (secs, nanos) = split_epoch(raw.trim())?;
            let time = NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(secs).ok()?, nanos)?;
            Some(format!("{}{}", time.format("%H:%M:%S"), fraction(nanos, digits)))
        }
        "timestamp_ntz" => {
            let (secs, nanos) = split_epoch(raw.trim())?;
            let ts = DateTime::from_timestamp(secs, nanos)?.naive_utc();
            Some(format!("{}{}", ts.format("%Y-%m-%d %H:%M:%S"), fraction(nanos, digits)))
        }
        "timestamp_ltz" => {
            let (secs, nanos) = split_epoch(raw.trim())?;
            let ts = DateTime::from_timestamp(secs, nanos)?;
            Some(format!("{}{} +00:00", ts.format("%Y-%m-%d %H:%M:%S"), fraction(nanos, digits)))
        }
        "timestamp_tz" => {
            let mut parts = raw.split_whitespace();
            let (secs, nanos) = split_epoch(parts.next()?)?;
            let offset_minutes = match parts.next() {
                Some(code) => code.parse::<i32>().ok()?.checked_sub(1440)?,
                None => 0,
            };
            let offset = FixedOffset::east_opt(offset_minutes.checked_mul(60)?)?;
            let ts = DateTime::from_timestamp(secs, nanos)?.with_timezone(&offset);
            Some(format!(
                "{}{} {}",
                ts.format("%Y-%m-%d %H:%M:%S"),
                fraction(nanos, digits),
                ts.format("%:z")
            ))
        }
        _ => None,
    }
}

/// Days from 0001-01-01 (day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// `"-1.25"` -> `(-2, 750_000_000)`: whole seconds floored, nanoseconds non-negative
fn split_epoch(raw: &str) -> Option<(i64, u32)> {
    let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let mut secs: i64 = whole.parse().ok()?;
    if frac.is_empty() {
        return Some((secs, 0));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{:0<9}", &frac[..frac.len().min(9)]);
    let mut nanos: u32 = padded.parse().ok()?;
    if whole.starts_with('-') && nanos > 0 {
        secs = secs.checked_sub(1)?;
        nanos = 1_000_000_000 - nanos;
    }
    Some((secs, nanos))
}

fn fraction(nanos: u32, digits: usize) -> String {
    if digits == 0 {
        return String::new();
    }
    let full = format!("{:09}", nanos);
    format!(".{}", &full[..digits])
}

/// Chunk bodies are comma-separated row arrays without the enclosing brackets
fn parse_chunk(body: &str) -> Result<Vec<Vec<Option<String>>>> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let wrapped = format!("[{}]", trimmed);
    serde_json::from_str(&wrapped)
        .map_err(|e| GatewayError::Execution(format!("undecodable result chunk: {}", e)))
}

fn chunk_headers(data: &QueryResponseData) -> HashMap<String, String> {
    if let Some(headers) = &data.chunk_headers {
        return headers.clone();
    }
    let mut headers = HashMap::new();
    if let Some(qrmk) = &data.qrmk {
        headers.insert("x-amz-server-side-encryption-customer-algorithm".to_string(), "AES256".to_string());
        headers.insert("x-amz-server-side-encryption-customer-key".to_string(), qrmk.clone());
    }
    headers
}

fn into_result(data: QueryResponseData) -> Result<QueryResult> {
    let width = data.rowtype.len();
    let mut rows = Vec::with_capacity(data.rowset.len());
    for raw_row in data.rowset {
        if raw_row.len() != width {
            return Err(GatewayError::Execution(format!(
                "result row has {} cells but {} columns were described",
                raw_row.len(),
                width
            )));
        }
        rows.push(
            raw_row
                .into_iter()
                .zip(&data.rowtype)
                .map(|(cell, column)| decode_cell(cell, column))
                .collect(),
        );
    }
    let columns = data.rowtype.into_iter().map(|c| c.name).collect();
    Ok(QueryResult::Select { columns, rows })
}

/// Send one request and log its round-trip time. Failed round-trips are
/// never repeated: a statement may have reached the warehouse already.
async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let started = Instant::now();
    match request.send().await {
        Ok(response) => {
            debug!(
                status = response.status().as_u16(),
                duration_ms = started.elapsed().as_millis() as u64,
                "snowflake response received"
            );
            Ok(response)
        }
        Err(e) => {
            warn!(
                error = %e,
                duration_ms = started.elapsed().as_millis() as u64,
                "snowflake request failed"
            );
            Err(e.into())
        }
    }
}

async fn send_json<T>(request: reqwest::RequestBuilder) -> Result<Envelope<T>>
where
    T: DeserializeOwned,
{
    let response = send(request).await?;
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<Envelope<T>>(&body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => Err(GatewayError::Connection(format!(
            "warehouse returned status {}",
            status
        ))),
        Err(e) => Err(GatewayError::Execution(format!("undecodable warehouse response: {}", e))),
    }
}
