//! HTTP transport for the upload service.
//!
//! API calls are `GET {api}upload/<endpoint>.php` with the session token,
//! `response_format=json` and a trailing cache-busting timestamp. Unit
//! uploads are `POST {upload}upload/resumable.php` with the unit bytes as
//! an `application/octet-stream` body.

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Url;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;
use uplink_protocol::constants::{
    ENDPOINT_CHECK, ENDPOINT_INSTANT, ENDPOINT_POLL_UPLOAD, ENDPOINT_RESUMABLE,
};
use uplink_protocol::messages::Query;
use uplink_protocol::{
    CheckRequest, CheckResponse, InstantRequest, InstantResponse, PollRequest, PollResponse,
    UnitUploadRequest, UnitUploadResponse, parse_response,
};

use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::transport::{ProgressFn, Transport, TransportFuture};

/// Size of the body pieces handed to the HTTP client; progress is
/// reported once per piece.
const BODY_PIECE_SIZE: usize = 64 * 1024;

/// `reqwest`-based [`Transport`].
pub struct HttpTransport {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
    session_token: String,
}

impl HttpTransport {
    /// Creates a transport with a default HTTP client.
    pub fn new(config: &UploaderConfig) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, config))
    }

    /// Creates a transport sharing an existing HTTP client.
    pub fn with_client(http: reqwest::Client, config: &UploaderConfig) -> Self {
        Self {
            http,
            api_base: config.api_base(),
            upload_base: config.upload_base(),
            session_token: config.session_token.clone(),
        }
    }

    fn url(&self, base: &str, endpoint: &str, query: &Query) -> Result<Url, UploadError> {
        let mut url = Url::parse(&format!("{base}upload/{endpoint}.php"))
            .map_err(|e| UploadError::Transport(format!("invalid URL {base}: {e}")))?;

        url.query_pairs_mut()
            .append_pair("session_token", &self.session_token)
            .append_pair("response_format", "json")
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));

        let stamped = format!("{}&{}", url.query().unwrap_or_default(), timestamp_millis());
        url.set_query(Some(&stamped));
        Ok(url)
    }

    /// Performs an authenticated GET against an API endpoint.
    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: Query) -> Result<T, UploadError> {
        let url = self.url(&self.api_base, endpoint, &query)?;
        debug!(endpoint, "api request");
        let resp = self.http.get(url).send().await?;
        read_reply(resp).await
    }
}

async fn read_reply<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, UploadError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(UploadError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body = resp.bytes().await?;
    Ok(parse_response(&body)?)
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

impl Transport for HttpTransport {
    fn check(&self, req: CheckRequest) -> TransportFuture<'_, CheckResponse> {
        Box::pin(async move { self.get(ENDPOINT_CHECK, req.query()).await })
    }

    fn instant(&self, req: InstantRequest) -> TransportFuture<'_, InstantResponse> {
        Box::pin(async move { self.get(ENDPOINT_INSTANT, req.query()).await })
    }

    fn upload_unit(
        &self,
        req: UnitUploadRequest,
        body: Vec<u8>,
        progress: ProgressFn,
    ) -> TransportFuture<'_, UnitUploadResponse> {
        Box::pin(async move {
            let url = self.url(&self.upload_base, ENDPOINT_RESUMABLE, &req.query())?;
            let len = body.len();

            let pieces: Vec<Vec<u8>> = body.chunks(BODY_PIECE_SIZE).map(<[u8]>::to_vec).collect();
            let mut sent = 0u64;
            let stream = futures_util::stream::iter(pieces.into_iter().map(move |piece| {
                sent += piece.len() as u64;
                progress(sent);
                Ok::<_, std::io::Error>(piece)
            }));

            let mut builder = self
                .http
                .post(url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_LENGTH, len);
            for (name, value) in req.headers() {
                builder = builder.header(name, value);
            }

            debug!(unit = req.unit_id, bytes = len, "unit upload");
            let resp = builder
                .body(reqwest::Body::wrap_stream(stream))
                .send()
                .await?;
            read_reply(resp).await
        })
    }

    fn poll_upload(&self, req: PollRequest) -> TransportFuture<'_, PollResponse> {
        Box::pin(async move { self.get(ENDPOINT_POLL_UPLOAD, req.query()).await })
    }
}
