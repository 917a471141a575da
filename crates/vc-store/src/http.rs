//! Client for a document store exposing a Cosmos-style REST surface.
//!
//! Routes, relative to the configured endpoint:
//!
//! ```text
//! GET  /dbs/{db}/colls/{container}/docs/{id}    read       200 | 404
//! POST /dbs/{db}/colls/{container}/docs         create     201 | 409
//! PUT  /dbs/{db}/colls/{container}/docs/{id}    replace    200 | 404 | 412  (with If-Match)
//! PUT  /dbs/{db}/colls/{container}/docs/{id}    upsert     200              (without If-Match)
//! ```
//!
//! The credential is sent verbatim in the `authorization` header. Documents
//! carry their version token in the `_etag` property; the `ETag` response
//! header is used when the body omits it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use tracing::debug;
use vc_types::{CounterKey, CounterRecord, VersionToken};

use crate::error::{StoreError, StoreResult};
use crate::traits::CounterStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body sent on replace and upsert. System properties are assigned by the
/// store, never by the client.
#[derive(Serialize)]
struct DocumentBody<'a> {
    id: &'a CounterKey,
    count: u64,
}

/// A [`CounterStore`] backed by a remote document database.
#[derive(Clone, Debug)]
pub struct HttpCounterStore {
    client: Client,
    endpoint: Url,
    key: String,
    database: String,
    container: String,
}

impl HttpCounterStore {
    /// Build a client. Fails with [`StoreError::Config`] if the endpoint is
    /// not an http(s) URL or the key is empty; no request is made.
    pub fn new(
        endpoint: &str,
        key: impl Into<String>,
        database: impl Into<String>,
        container: impl Into<String>,
    ) -> StoreResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StoreError::Config(format!("invalid store endpoint {endpoint:?}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StoreError::Config(format!(
                "store endpoint must be http or https, got {}",
                endpoint.scheme()
            )));
        }
        let key = key.into();
        if key.is_empty() {
            return Err(StoreError::Config("store key is empty".into()));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            key,
            database: database.into(),
            container: container.into(),
        })
    }

    fn docs_url(&self) -> StoreResult<Url> {
        self.url(&[])
    }

    fn doc_url(&self, key: &CounterKey) -> StoreResult<Url> {
        self.url(&[key.as_str()])
    }

    fn url(&self, extra: &[&str]) -> StoreResult<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Config("store endpoint cannot be a base URL".into()))?;
            segments.pop_if_empty();
            segments.extend([
                "dbs",
                self.database.as_str(),
                "colls",
                self.container.as_str(),
                "docs",
            ]);
            segments.extend(extra);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, &self.key)
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
        builder
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn decode(response: Response) -> StoreResult<CounterRecord> {
        let header_etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(VersionToken::new);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut record: CounterRecord = serde_json::from_slice(&bytes)?;
        if record.version.is_none() {
            record.version = header_etag;
        }
        Ok(record)
    }

    fn unexpected(status: StatusCode, operation: &str) -> StoreError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                StoreError::Unauthorized(format!("{operation} returned {status}"))
            }
            _ => StoreError::Unavailable(format!("{operation} returned {status}")),
        }
    }
}

#[async_trait]
impl CounterStore for HttpCounterStore {
    async fn read_item(&self, key: &CounterKey) -> StoreResult<Option<CounterRecord>> {
        let response = self.send(self.request(Method::GET, self.doc_url(key)?)).await?;
        debug!(%key, status = %response.status(), "read item");
        match response.status() {
            StatusCode::OK => Ok(Some(Self::decode(response).await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Self::unexpected(status, "read")),
        }
    }

    async fn create_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
        let body = DocumentBody {
            id: &record.id,
            count: record.count,
        };
        let response = self
            .send(self.request(Method::POST, self.docs_url()?).json(&body))
            .await?;
        debug!(key = %record.id, status = %response.status(), "create item");
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Self::decode(response).await,
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists {
                key: record.id.clone(),
            }),
            status => Err(Self::unexpected(status, "create")),
        }
    }

    async fn conditional_replace(
        &self,
        key: &CounterKey,
        new_count: u64,
        expected: &VersionToken,
    ) -> StoreResult<CounterRecord> {
        let body = DocumentBody {
            id: key,
            count: new_count,
        };
        let response = self
            .send(
                self.request(Method::PUT, self.doc_url(key)?)
                    .header(IF_MATCH, expected.as_str())
                    .json(&body),
            )
            .await?;
        debug!(%key, new_count, status = %response.status(), "conditional replace");
        match response.status() {
            StatusCode::OK => Self::decode(response).await,
            StatusCode::PRECONDITION_FAILED => Err(StoreError::Conflict { key: key.clone() }),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound { key: key.clone() }),
            status => Err(Self::unexpected(status, "replace")),
        }
    }

    async fn upsert_item(&self, record: &CounterRecord) -> StoreResult<CounterRecord> {
        let body = DocumentBody {
            id: &record.id,
            count: record.count,
        };
        let response = self
            .send(self.request(Method::PUT, self.doc_url(&record.id)?).json(&body))
            .await?;
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Self::decode(response).await,
            status => Err(Self::unexpected(status, "upsert")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCounterStore;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde::Deserialize;
    use std::sync::Arc;

    const KEY: &str = "dGVzdC1rZXk=";

    /// Minimal document-store emulator over the in-memory store.
    struct Emulator {
        store: InMemoryCounterStore,
    }

    #[derive(Deserialize)]
    struct Doc {
        id: CounterKey,
        #[serde(default)]
        count: u64,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(KEY)
    }

    /// The document as the database returns it: system properties included,
    /// `_ts` in epoch seconds, `_etag` quoted.
    fn wire(rec: &CounterRecord) -> serde_json::Value {
        serde_json::json!({
            "id": rec.id.as_str(),
            "count": rec.count,
            "_rid": "AAAAAA==",
            "_self": format!("dbs/AAAA==/colls/AAAAAA==/docs/{}", rec.id),
            "_etag": rec.version.as_ref().map(|v| v.as_str()),
            "_attachments": "attachments/",
            "_ts": rec.updated_at.map(|t| t.timestamp()),
        })
    }

    fn respond(result: StoreResult<CounterRecord>, ok: AxumStatus) -> AxumResponse {
        match result {
            Ok(rec) => (ok, Json(wire(&rec))).into_response(),
            Err(StoreError::AlreadyExists { .. }) => AxumStatus::CONFLICT.into_response(),
            Err(StoreError::Conflict { .. }) => AxumStatus::PRECONDITION_FAILED.into_response(),
            Err(StoreError::NotFound { .. }) => AxumStatus::NOT_FOUND.into_response(),
            Err(_) => AxumStatus::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    async fn read_doc(
        State(emu): State<Arc<Emulator>>,
        Path((_db, _coll, id)): Path<(String, String, String)>,
        headers: HeaderMap,
    ) -> AxumResponse {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        let Ok(key) = CounterKey::new(id) else {
            return AxumStatus::BAD_REQUEST.into_response();
        };
        match emu.store.read_item(&key).await {
            Ok(Some(rec)) => Json(wire(&rec)).into_response(),
            Ok(None) => AxumStatus::NOT_FOUND.into_response(),
            Err(_) => AxumStatus::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    async fn create_doc(
        State(emu): State<Arc<Emulator>>,
        headers: HeaderMap,
        Json(doc): Json<Doc>,
    ) -> AxumResponse {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        let record = CounterRecord::with_count(doc.id, doc.count);
        respond(emu.store.create_item(&record).await, AxumStatus::CREATED)
    }

    async fn replace_doc(
        State(emu): State<Arc<Emulator>>,
        Path((_db, _coll, id)): Path<(String, String, String)>,
        headers: HeaderMap,
        Json(doc): Json<Doc>,
    ) -> AxumResponse {
        if !authorized(&headers) {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        let Ok(key) = CounterKey::new(id) else {
            return AxumStatus::BAD_REQUEST.into_response();
        };
        let result = match headers.get("if-match").and_then(|v| v.to_str().ok()) {
            Some(etag) => {
                emu.store
                    .conditional_replace(&key, doc.count, &VersionToken::new(etag))
                    .await
            }
            None => {
                emu.store
                    .upsert_item(&CounterRecord::with_count(key, doc.count))
                    .await
            }
        };
        respond(result, AxumStatus::OK)
    }

    async fn spawn_emulator() -> String {
        let emu = Arc::new(Emulator {
            store: InMemoryCounterStore::new(),
        });
        let app = Router::new()
            .route("/dbs/:db/colls/:coll/docs", post(create_doc))
            .route("/dbs/:db/colls/:coll/docs/:id", get(read_doc).put(replace_doc))
            .with_state(emu);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(endpoint: &str, key: &str) -> HttpCounterStore {
        HttpCounterStore::new(endpoint, key, "testDb", "testContainer").unwrap()
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = HttpCounterStore::new("ftp://store", KEY, "db", "c").unwrap_err();
        assert!(err.is_config());
        let err = HttpCounterStore::new("not a url", KEY, "db", "c").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn rejects_empty_key() {
        let err = HttpCounterStore::new("https://store.example", "", "db", "c").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn builds_document_urls() {
        let store = client("https://store.example:8081/", KEY);
        assert_eq!(
            store.doc_url(&CounterKey::default()).unwrap().as_str(),
            "https://store.example:8081/dbs/testDb/colls/testContainer/docs/global"
        );
        assert_eq!(
            store.docs_url().unwrap().as_str(),
            "https://store.example:8081/dbs/testDb/colls/testContainer/docs"
        );
    }

    #[tokio::test]
    async fn get_or_create_then_replace() {
        let endpoint = spawn_emulator().await;
        let store = client(&endpoint, KEY);
        let key = CounterKey::default();

        let rec = store.get_or_create(&key).await.unwrap();
        assert_eq!(rec.count, 0);
        let token = rec.version.unwrap();

        let written = store.conditional_replace(&key, 1, &token).await.unwrap();
        assert_eq!(written.count, 1);
        assert_eq!(store.read_item(&key).await.unwrap().unwrap().count, 1);
    }

    #[tokio::test]
    async fn decodes_documents_with_system_properties() {
        let endpoint = spawn_emulator().await;
        let store = client(&endpoint, KEY);
        let key = CounterKey::default();
        let created = store.get_or_create(&key).await.unwrap();
        assert!(created.updated_at.is_some());

        let raw: serde_json::Value = reqwest::Client::new()
            .get(store.doc_url(&key).unwrap())
            .header(AUTHORIZATION, KEY)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(raw["_ts"].is_i64());
        assert!(raw["_rid"].is_string());

        let read = store.read_item(&key).await.unwrap().unwrap();
        assert_eq!(read.version, created.version);
        assert_eq!(
            read.updated_at.unwrap().timestamp(),
            raw["_ts"].as_i64().unwrap()
        );
    }

    #[tokio::test]
    async fn stale_etag_maps_to_conflict() {
        let endpoint = spawn_emulator().await;
        let store = client(&endpoint, KEY);
        let key = CounterKey::default();
        let stale = store.get_or_create(&key).await.unwrap().version.unwrap();
        store.conditional_replace(&key, 1, &stale).await.unwrap();

        let err = store.conditional_replace(&key, 2, &stale).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.read_item(&key).await.unwrap().unwrap().count, 1);
    }

    #[tokio::test]
    async fn duplicate_create_maps_to_already_exists() {
        let endpoint = spawn_emulator().await;
        let store = client(&endpoint, KEY);
        let rec = CounterRecord::zero(CounterKey::default());
        store.create_item(&rec).await.unwrap();
        let err = store.create_item(&rec).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized() {
        let endpoint = spawn_emulator().await;
        let store = client(&endpoint, "wrong");
        let err = store.read_item(&CounterKey::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn upsert_resets_count() {
        let endpoint = spawn_emulator().await;
        let store = client(&endpoint, KEY);
        let key = CounterKey::default();
        let token = store.get_or_create(&key).await.unwrap().version.unwrap();
        store.conditional_replace(&key, 8, &token).await.unwrap();

        let reset = store.upsert_item(&CounterRecord::zero(key.clone())).await.unwrap();
        assert_eq!(reset.count, 0);
        assert_eq!(store.read_item(&key).await.unwrap().unwrap().count, 0);
    }

    #[tokio::test]
    async fn unreachable_store_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = client(&format!("http://{addr}"), KEY);
        let err = store.read_item(&CounterKey::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
