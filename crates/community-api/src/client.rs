// Community platform HTTP client
//
// Wraps `reqwest::Client` with base-URL joining and the two response
// envelopes the backend uses: bare JSON arrays for list resources and
// `{ "result": ... }` objects for single resources and actions. Endpoint
// methods live in `resources.rs`; this module keeps to transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Async client for the Community platform API.
///
/// Stateless apart from the connection pool: session tokens are passed
/// into each call that needs them rather than stored on the client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Build a client from a base URL and transport config.
    ///
    /// The base URL may carry a path prefix (e.g. `https://host/api`);
    /// endpoint paths are joined beneath it.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    /// The normalized base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"reviews/12"`) onto the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// `GET` a list resource whose body is a bare JSON array.
    pub(crate) async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let body = read_success(resp).await?;
        decode_list(body)
    }

    /// `POST` a `{params}` body and unwrap the `result` field of the reply.
    pub(crate) async fn post_result<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        decode_result(self.post_body(path, body).await?)
    }

    /// `POST` a `{params}` body for one resource, accepting either reply shape.
    pub(crate) async fn post_single<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        decode_single(self.post_body(path, body).await?)
    }

    async fn post_body<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        read_success(resp).await
    }

    /// `POST` a `{params}` body where only the status matters.
    pub(crate) async fn post_status<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        read_success(resp).await.map(drop)
    }
}

/// Ensure the base URL ends with `/` so `Url::join` appends instead of replacing.
fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    let path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{path}/"));
    Ok(url)
}

/// Read the body of a 2xx response, or turn the status into [`Error::Server`].
async fn read_success(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::Server {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        })
    }
}

fn parse_json(body: &str) -> Result<Value, Error> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    })
}

fn decode_value<T: DeserializeOwned>(value: Value, body: String) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

/// Decode a bare JSON array into items.
pub(crate) fn decode_list<T: DeserializeOwned>(body: String) -> Result<Vec<T>, Error> {
    let value = parse_json(&body)?;
    if !value.is_array() {
        return Err(Error::UnexpectedShape {
            expected: "a JSON array",
            body,
        });
    }
    decode_value(value, body)
}

/// Decode the non-null `result` field of a JSON object.
pub(crate) fn decode_result<T: DeserializeOwned>(body: String) -> Result<T, Error> {
    let value = parse_json(&body)?;
    match value {
        Value::Object(mut map) => match map.remove("result") {
            Some(result) if !result.is_null() => decode_value(result, body),
            _ => Err(Error::UnexpectedShape {
                expected: "an object with a `result` field",
                body,
            }),
        },
        _ => Err(Error::UnexpectedShape {
            expected: "an object with a `result` field",
            body,
        }),
    }
}

/// Decode one resource sent as `{"result": ...}` or as the first element
/// of a JSON array.
pub(crate) fn decode_single<T: DeserializeOwned>(body: String) -> Result<T, Error> {
    let value = parse_json(&body)?;
    let item = match value {
        Value::Object(mut map) => map.remove("result").filter(|result| !result.is_null()),
        Value::Array(items) => items.into_iter().next(),
        _ => None,
    };
    match item {
        Some(item) => decode_value(item, body),
        None => Err(Error::UnexpectedShape {
            expected: "an object with a `result` field or a non-empty array",
            body,
        }),
    }
}
