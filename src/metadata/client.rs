//! HTTP client wrapper for the document database holding file and chat metadata.
//!
//! Speaks the CouchDB REST dialect: documents are upserted with their
//! revision, and filtered/ordered reads go through Mango `_find` queries.
//! Indexes backing those queries are ensured once at startup, mirroring how
//! the vector store prepares its payload indexes.

use crate::config::get_config;
use crate::metadata::types::{
    ChatMessageRecord, ChatRole, DocumentRevision, FileRecord, FindResponse, MetadataError,
    current_timestamp_rfc3339,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

const TYPE_FILE: &str = "file";
const TYPE_CHAT_MESSAGE: &str = "chat_message";

/// Lightweight HTTP client for metadata store operations.
pub struct MetadataService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) database: String,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
}

impl MetadataService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, MetadataError> {
        let config = get_config();
        let client = Client::builder().user_agent("studymentor/0.1").build()?;
        let base_url =
            normalize_base_url(&config.couchdb_url).map_err(MetadataError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            database = %config.couchdb_database,
            "Initialized metadata store client"
        );

        Ok(Self {
            client,
            base_url,
            database: config.couchdb_database.clone(),
            username: config.couchdb_username.clone(),
            password: config.couchdb_password.clone(),
        })
    }

    /// Create the backing database when it does not exist yet.
    pub async fn ensure_database(&self) -> Result<(), MetadataError> {
        let response = self.request(Method::PUT, &self.database).send().await?;
        match response.status() {
            status if status.is_success() => {
                tracing::debug!(database = %self.database, "Database created");
                Ok(())
            }
            StatusCode::PRECONDITION_FAILED => {
                tracing::debug!(database = %self.database, "Database already exists");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MetadataError::UnexpectedStatus { status, body })
            }
        }
    }

    /// Ensure the Mango indexes backing filtered and ordered reads exist.
    pub async fn ensure_indexes(&self) -> Result<(), MetadataError> {
        let indexes: [(&str, Vec<&str>); 2] = [
            ("files-by-user", vec!["type", "user_id"]),
            ("chats-by-user-time", vec!["type", "user_id", "timestamp"]),
        ];

        for (name, fields) in indexes {
            let body = json!({
                "index": { "fields": fields },
                "name": name,
                "type": "json",
            });
            let response = self
                .request(Method::POST, &format!("{}/_index", self.database))
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                tracing::debug!(database = %self.database, index = name, "Index ensured");
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = MetadataError::UnexpectedStatus { status, body };
                tracing::warn!(database = %self.database, index = name, error = %error, "Failed to ensure index");
            }
        }

        Ok(())
    }

    /// Write a file record under the document id `file_id`.
    ///
    /// Fetches the current revision first so that reprocessing a file
    /// replaces its record instead of conflicting.
    pub async fn put_file_record(&self, record: &FileRecord) -> Result<(), MetadataError> {
        let path = format!("{}/{}", self.database, record.file_id);
        let mut request = self.request(Method::PUT, &path);
        if let Some(rev) = self.fetch_revision(&record.file_id).await? {
            request = request.query(&[("rev", rev)]);
        }

        let mut document = serde_json::to_value(record)
            .expect("file record serializes to a JSON object");
        tag_document(&mut document, TYPE_FILE);

        let response = request.json(&document).send().await?;
        self.ensure_success(response, || {
            tracing::debug!(file_id = %record.file_id, "File record stored");
        })
        .await
    }

    /// Append one chat log entry stamped with the current time.
    pub async fn append_chat_message(
        &self,
        user_id: &str,
        role: ChatRole,
        text: &str,
    ) -> Result<ChatMessageRecord, MetadataError> {
        let record = ChatMessageRecord {
            id: None,
            user_id: user_id.to_string(),
            role,
            text: text.to_string(),
            timestamp: current_timestamp_rfc3339(),
        };
        let mut document = serde_json::to_value(&record)
            .expect("chat record serializes to a JSON object");
        tag_document(&mut document, TYPE_CHAT_MESSAGE);

        let response = self
            .request(Method::POST, &self.database)
            .json(&document)
            .send()
            .await?;
        self.ensure_success(response, || {
            tracing::debug!(user_id, role = ?record.role, "Chat message stored");
        })
        .await?;

        Ok(record)
    }

    /// List the file records owned by a user.
    pub async fn list_files(&self, user_id: &str) -> Result<Vec<FileRecord>, MetadataError> {
        let body = json!({
            "selector": { "type": TYPE_FILE, "user_id": user_id },
        });
        self.find(body).await
    }

    /// List a user's chat log ordered by timestamp.
    pub async fn list_chat_messages(
        &self,
        user_id: &str,
    ) -> Result<Vec<ChatMessageRecord>, MetadataError> {
        let body = json!({
            "selector": { "type": TYPE_CHAT_MESSAGE, "user_id": user_id },
            "sort": [{ "timestamp": "asc" }],
        });
        self.find(body).await
    }

    async fn find<T: serde::de::DeserializeOwned>(
        &self,
        body: Value,
    ) -> Result<Vec<T>, MetadataError> {
        let response = self
            .request(Method::POST, &format!("{}/_find", self.database))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = MetadataError::UnexpectedStatus { status, body };
            tracing::error!(database = %self.database, error = %error, "Metadata query failed");
            return Err(error);
        }

        let payload: FindResponse<T> = response.json().await?;
        Ok(payload.docs)
    }

    async fn fetch_revision(&self, document_id: &str) -> Result<Option<String>, MetadataError> {
        let response = self
            .request(Method::GET, &format!("{}/{}", self.database, document_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let document: DocumentRevision = response.json().await?;
                Ok(Some(document.rev))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MetadataError::UnexpectedStatus { status, body })
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(username) = &self.username {
            req = req.basic_auth(username, self.password.as_deref());
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), MetadataError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = MetadataError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Metadata store request failed");
            Err(error)
        }
    }
}

fn tag_document(document: &mut Value, document_type: &str) {
    if let Value::Object(map) = document {
        map.insert("type".into(), Value::String(document_type.to_string()));
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
