use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use openpackage_core::{
    ArchiveCodec, Credentials, Encoding, Error, PackageFile, PackageManifest, PullRequest, PullResponse,
    RegistryTransport, Result,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;

/// `reqwest`-backed [`RegistryTransport`] against the hosted openpackage
/// registry. One client per CLI invocation; `base_url` is the profile's
/// configured `registry-url`. Transient failures (connection resets, 5xx,
/// 429) are retried with exponential backoff.
pub struct HttpTransport {
    client: ClientWithMiddleware,
    base_url: url::Url,
}

impl HttpTransport {
    pub fn new(base_url: url::Url, timeout: Duration) -> anyhow::Result<Self> {
        let user_agent = format!("openpackage/{}", env!("CARGO_PKG_VERSION"));
        let inner = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = reqwest_middleware::ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(Self { client, base_url })
    }

    fn auth_headers(&self, creds: &Credentials) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = match creds {
            Credentials::ApiKey(key) => format!("ApiKey {key}"),
            Credentials::Bearer(token) => format!("Bearer {token}"),
            Credentials::None => return Ok(headers),
        };
        let mut header: HeaderValue = value
            .parse()
            .map_err(|_| Error::Config("credentials contain characters invalid in an HTTP header".into()))?;
        header.set_sensitive(true);
        headers.insert(AUTHORIZATION, header);
        Ok(headers)
    }

    fn url(&self, path: &str) -> Result<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid registry URL segment `{path}`: {e}")))
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(&self, request: reqwest_middleware::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(map_reqwest_err)?;
        let response = check_status(response).await?;
        response.json().await.map_err(|e| Error::Network(e.to_string()))
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn metadata(&self, name: &str, version: &str, creds: &Credentials) -> Result<PackageManifest> {
        let url = self.url(&format!("packages/{name}/{version}"))?;
        let headers = self.auth_headers(creds)?;
        self.send_json(self.client.get(url).headers(headers)).await
    }

    async fn pull(&self, name: &str, version: &str, req: &PullRequest, creds: &Credentials) -> Result<PullResponse> {
        let url = self.url(&format!("packages/{name}/{version}/pull"))?;
        let headers = self.auth_headers(creds)?;
        let mut request = self.client.get(url).headers(headers).query(&[
            ("recursive", req.recursive.to_string()),
            ("include_manifest", req.include_manifest.to_string()),
        ]);
        if let Some(paths) = &req.paths {
            request = request.query(&[("paths", paths.join(","))]);
        }
        self.send_json(request).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_err)?;
        let response = check_status(response).await?;
        Ok(response.bytes().await.map_err(|e| Error::Network(e.to_string()))?.to_vec())
    }

    async fn push(&self, tarball: &[u8], manifest_name: &str, partial: bool, creds: &Credentials) -> Result<()> {
        let url = self.url(&format!("packages/{manifest_name}/push"))?;
        let headers = self.auth_headers(creds)?;
        let request = self
            .client
            .post(url)
            .headers(headers)
            .query(&[("partial", partial.to_string())])
            .header("content-type", "application/gzip")
            .body(tarball.to_vec());
        let response = request.send().await.map_err(map_reqwest_err)?;
        check_status(response).await?;
        Ok(())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<(String, String)> {
        #[derive(Deserialize)]
        struct RefreshResponse {
            access_token: String,
            refresh_token: String,
        }
        let url = self.url("auth/refresh")?;
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response: RefreshResponse = self.send_json(self.client.post(url).json(&body)).await?;
        Ok((response.access_token, response.refresh_token))
    }

    async fn versions(&self, name: &str, creds: &Credentials) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct VersionsResponse {
            versions: Vec<String>,
        }
        let url = self.url(&format!("packages/{name}/versions"))?;
        let headers = self.auth_headers(creds)?;
        let response: VersionsResponse = self.send_json(self.client.get(url).headers(headers)).await?;
        Ok(response.versions)
    }
}

fn map_reqwest_err(e: reqwest_middleware::Error) -> Error {
    Error::Network(e.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => Err(Error::AccessDenied(body)),
        404 => Err(Error::RemoteNotFound(body)),
        _ => Err(Error::RemoteUnknown(format!("{status}: {body}"))),
    }
}

/// `tar`+`flate2` gzip archive codec, the wire format for `push`/download
/// bodies. Binary files round-trip base64-decoded back to raw bytes before
/// being written into the archive; decoding re-encodes them as base64 to
/// match [`PackageFile::binary_base64`].
pub struct TarGzCodec;

impl ArchiveCodec for TarGzCodec {
    fn encode(&self, files: &[PackageFile]) -> Result<Vec<u8>> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for file in files {
            let bytes = file.bytes()?;
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, &file.path, bytes.as_slice())
                .map_err(|e| Error::Integrity(format!("failed to archive `{}`: {e}", file.path)))?;
        }
        let encoder = builder
            .into_inner()
            .map_err(|e| Error::Integrity(format!("failed to finish tar archive: {e}")))?;
        encoder
            .finish()
            .map_err(|e| Error::Integrity(format!("failed to finish gzip stream: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<PackageFile>> {
        let decoder = flate2::read::GzDecoder::new(bytes);
        let mut archive = tar::Archive::new(decoder);
        let mut files = Vec::new();
        let entries = archive
            .entries()
            .map_err(|e| Error::Integrity(format!("invalid gzip stream: {e}")))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| Error::Integrity(format!("invalid tar entry: {e}")))?;
            let path = entry
                .path()
                .map_err(|e| Error::Integrity(format!("invalid tar entry path: {e}")))?
                .to_string_lossy()
                .into_owned();
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| Error::Integrity(format!("failed to read `{path}`: {e}")))?;
            let file = match std::str::from_utf8(&buf) {
                Ok(text) => PackageFile { path, content: text.to_string(), encoding: Encoding::Utf8 },
                Err(_) => PackageFile::binary_base64(path, base64_encode(&buf)),
            };
            files.push(file);
        }
        Ok(files)
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_round_trips_text_and_binary_files() {
        let codec = TarGzCodec;
        let files = vec![
            PackageFile::text("rules/a.md", "hello"),
            PackageFile::binary_base64("icon.png", base64_encode(&[0xff, 0xd8, 0xff])),
        ];
        let bytes = codec.encode(&files).unwrap();
        let mut decoded = codec.decode(&bytes).unwrap();
        decoded.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(decoded[0].bytes().unwrap(), b"hello");
        assert_eq!(decoded[1].bytes().unwrap(), vec![0xff, 0xd8, 0xff]);
    }
}
