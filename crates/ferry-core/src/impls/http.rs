//! HttpTransport - reqwest による multipart アップロード

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use tracing::debug;

use crate::config::HttpConfig;
use crate::domain::{RemoteFileId, UploadFailure};
use crate::ports::{ProgressReporter, Transport, UploadRequest};

/// メディア endpoint への multipart POST
///
/// ファイルは `chunk_size` ごとにディスクから読みながら送り、reqwest が
/// chunk を取り出すたびに進捗を報告します。destination の folder と
/// metadata は追加のフォームフィールドとして送ります。
///
/// # レスポンスの解釈
/// - 2xx: JSON の `id` フィールド、なければ `Location` ヘッダーを file id とする
/// - 4xx: サーバーがファイルを拒否した（`Rejected`）
/// - それ以外、またはレスポンスなし: `Transport`
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    file_field: String,
    chunk_size: usize,
    headers: BTreeMap<String, String>,
}

impl HttpTransport {
    pub fn from_config(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            file_field: config.file_field.clone(),
            chunk_size: config.chunk_size.max(1),
            headers: config.headers.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> Result<RemoteFileId, UploadFailure> {
        let file = &request.file;
        let chunks = file
            .open_stream(self.chunk_size)
            .await
            .map_err(|e| UploadFailure::transport(format!("cannot read {}: {e}", file.name)))?;
        let total = file.size;

        // reqwest が送信のために chunk を取り出した分だけ進捗を進める
        let mut sent = 0u64;
        let body = chunks.inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                sent += chunk.len() as u64;
                progress.report_bytes(sent, total);
            }
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| UploadFailure::rejected(format!("invalid MIME type {}: {e}", file.mime_type)))?;

        let mut form = Form::new().part(self.file_field.clone(), part);
        if let Some(folder) = &request.destination.folder {
            form = form.text("folder", folder.clone());
        }
        for (key, value) in &request.destination.metadata {
            form = form.text(key.clone(), value.clone());
        }

        let mut builder = self.client.post(&self.endpoint).multipart(form);
        for (key, value) in &self.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        debug!(upload_id = %request.id, attempt = request.attempt, endpoint = %self.endpoint, "sending multipart upload");
        let response = builder
            .send()
            .await
            .map_err(|e| UploadFailure::transport(e.to_string()))?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .text()
            .await
            .map_err(|e| UploadFailure::transport(format!("reading response: {e}")))?;

        interpret_response(status, location, &body)
    }
}

fn interpret_response(
    status: StatusCode,
    location: Option<String>,
    body: &str,
) -> Result<RemoteFileId, UploadFailure> {
    let json: Option<serde_json::Value> = serde_json::from_str(body).ok();

    if status.is_client_error() {
        let message = json
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| format!("server declined the file ({status})"));
        return Err(UploadFailure::rejected(message));
    }
    if !status.is_success() {
        let message = json
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| format!("server error ({status})"));
        return Err(UploadFailure::transport(message));
    }

    let id = json.as_ref().and_then(|v| match v.get("id") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    });
    id.or(location)
        .map(RemoteFileId::new)
        .ok_or_else(|| UploadFailure::transport("response carried no file id"))
}

fn server_message(json: &serde_json::Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(|v| v.as_str()))
        .map(String::from)
}
