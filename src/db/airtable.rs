use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use super::{AvatarRecord, AvatarStore, DatabaseError};
use crate::config::AvatarStoreConfig;

const AIRTABLE_API_BASE: &str = "https://api.airtable.com/v0/";
const HANDLE_FIELD: &str = "Handle";
const AVATAR_URL_FIELD: &str = "AvatarUrl";

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    records: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    id: String,
    #[serde(default)]
    fields: RecordFields,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RecordFields {
    #[serde(rename = "Handle", default, skip_serializing_if = "Option::is_none")]
    handle: Option<String>,
    #[serde(rename = "AvatarUrl", default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
}

impl RawRecord {
    fn into_record(self) -> AvatarRecord {
        AvatarRecord {
            id: self.id,
            handle: self.fields.handle.unwrap_or_default(),
            avatar_url: self.fields.avatar_url.unwrap_or_default(),
        }
    }
}

/// Airtable-backed avatar table with one row per IRC handle.
pub struct AirtableStore {
    http: reqwest::Client,
    table_url: Url,
    api_key: SecretString,
}

impl AirtableStore {
    pub fn new(config: &AvatarStoreConfig) -> Result<Self, DatabaseError> {
        Self::connect(config, AIRTABLE_API_BASE)
    }

    fn connect(config: &AvatarStoreConfig, api_base: &str) -> Result<Self, DatabaseError> {
        let http = reqwest::Client::builder()
            .user_agent("irc-bridge-slack")
            .build()
            .map_err(|err| DatabaseError::Connection(err.to_string()))?;

        Ok(Self {
            http,
            table_url: table_url(api_base, &config.base_id, &config.table)?,
            api_key: SecretString::from(config.api_key.clone()),
        })
    }

    fn record_url(&self, record_id: &str) -> Result<Url, DatabaseError> {
        let mut url = self.table_url.clone();
        url.path_segments_mut()
            .map_err(|_| DatabaseError::Connection("airtable url cannot be a base".to_string()))?
            .push(record_id);
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Value, DatabaseError> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(self.api_key.expose_secret());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DatabaseError::Query(format!(
                "airtable {} failed status={} body={}",
                method, status, body
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AvatarStore for AirtableStore {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<AvatarRecord>, DatabaseError> {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("filterByFormula", &handle_formula(handle))
            .append_pair("maxRecords", "1");

        let value = self.request(Method::GET, url, None).await?;
        let list: RecordList = serde_json::from_value(value)
            .map_err(|err| DatabaseError::Query(format!("malformed record list: {err}")))?;
        debug!("airtable lookup handle={} hits={}", handle, list.records.len());
        Ok(list.records.into_iter().next().map(RawRecord::into_record))
    }

    async fn create(&self, handle: &str, avatar_url: &str) -> Result<AvatarRecord, DatabaseError> {
        let value = self
            .request(
                Method::POST,
                self.table_url.clone(),
                Some(fields_body(Some(handle), avatar_url)),
            )
            .await?;
        parse_record(value)
    }

    async fn update(
        &self,
        record_id: &str,
        avatar_url: &str,
    ) -> Result<AvatarRecord, DatabaseError> {
        let value = self
            .request(
                Method::PATCH,
                self.record_url(record_id)?,
                Some(fields_body(None, avatar_url)),
            )
            .await?;
        parse_record(value)
    }

    async fn upsert(&self, handle: &str, avatar_url: &str) -> Result<AvatarRecord, DatabaseError> {
        let value = self
            .request(
                Method::PATCH,
                self.table_url.clone(),
                Some(upsert_body(handle, avatar_url)),
            )
            .await?;
        let list: RecordList = serde_json::from_value(value)
            .map_err(|err| DatabaseError::Query(format!("malformed upsert response: {err}")))?;
        list.records
            .into_iter()
            .next()
            .map(RawRecord::into_record)
            .ok_or_else(|| DatabaseError::NotFound(format!("upsert returned no record for {handle}")))
    }
}

fn table_url(api_base: &str, base_id: &str, table: &str) -> Result<Url, DatabaseError> {
    let mut url = Url::parse(api_base)
        .map_err(|err| DatabaseError::Connection(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| DatabaseError::Connection("airtable url cannot be a base".to_string()))?
        .pop_if_empty()
        .push(base_id.trim())
        .push(table.trim());
    Ok(url)
}

fn handle_formula(handle: &str) -> String {
    let escaped = handle.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{{{HANDLE_FIELD}}} = \"{escaped}\"")
}

fn fields_body(handle: Option<&str>, avatar_url: &str) -> Value {
    let fields = RecordFields {
        handle: handle.map(ToOwned::to_owned),
        avatar_url: Some(avatar_url.to_string()),
    };
    json!({ "fields": fields })
}

fn upsert_body(handle: &str, avatar_url: &str) -> Value {
    json!({
        "performUpsert": { "fieldsToMergeOn": [HANDLE_FIELD] },
        "records": [{
            "fields": {
                HANDLE_FIELD: handle,
                AVATAR_URL_FIELD: avatar_url,
            }
        }]
    })
}

fn parse_record(value: Value) -> Result<AvatarRecord, DatabaseError> {
    serde_json::from_value::<RawRecord>(value)
        .map(RawRecord::into_record)
        .map_err(|err| DatabaseError::Query(format!("malformed record: {err}")))
}
