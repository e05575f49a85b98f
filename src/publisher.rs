use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;
use serde_json::json;
use sha1::Sha1;
use tracing::{info, warn};

use crate::config::TwitterConfig;

type HmacSha1 = Hmac<Sha1>;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

/// Twitter/X publisher: v2 create-tweet plus v1.1 media upload, both
/// signed with OAuth 1.0a user context.
pub struct TwitterClient {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
    creds: TwitterConfig,
}

impl TwitterClient {
    pub fn new(api_base: &str, upload_base: &str, creds: TwitterConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .build()
            .context("failed to build Twitter HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
            creds,
        })
    }

    /// Post `text`, attaching the image at `image` when one is given.
    /// A failed media upload degrades to a text-only post. Returns the
    /// created post id.
    pub async fn post(&self, text: &str, image: Option<&Path>) -> Result<String> {
        let media_id = match image {
            Some(path) => match self.upload_media(path).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Media upload failed: {e:#} — posting without image");
                    None
                }
            },
            None => None,
        };

        let url = format!("{}/2/tweets", self.api_base);
        let body = match &media_id {
            Some(id) => json!({"text": text, "media": {"media_ids": [id]}}),
            None => json!({"text": text}),
        };

        // JSON bodies don't participate in the OAuth 1.0a signature
        let auth = self.authorization_header("POST", &url, &[]);
        let response = self
            .http
            .post(&url)
            .header("Authorization", auth)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!(
                "tweet create returned HTTP {status}: {}",
                response.text().await.unwrap_or_default()
            );
        }
        let tweet: TweetResponse = response
            .json()
            .await
            .context("failed to decode tweet response")?;
        info!("Posted to Twitter with id {}", tweet.data.id);
        Ok(tweet.data.id)
    }

    async fn upload_media(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media.jpg".to_string());

        let url = format!("{}/1.1/media/upload.json", self.upload_base);
        // multipart bodies are excluded from the signature as well
        let auth = self.authorization_header("POST", &url, &[]);
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("media", part);

        let response = self
            .http
            .post(&url)
            .header("Authorization", auth)
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            bail!(
                "media upload returned HTTP {status}: {}",
                response.text().await.unwrap_or_default()
            );
        }
        let upload: MediaUploadResponse = response
            .json()
            .await
            .context("failed to decode media upload response")?;
        Ok(upload.media_id_string)
    }

    fn authorization_header(&self, method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
            .to_string();
        build_oauth_header(&self.creds, method, url, params, &nonce, &timestamp)
    }
}

/// RFC 3986 percent encoding, as OAuth 1.0a requires everywhere.
fn percent_encode(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

fn build_oauth_header(
    creds: &TwitterConfig,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> String {
    let oauth_params = [
        ("oauth_consumer_key", creds.api_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", creds.access_token.as_str()),
        ("oauth_version", "1.0"),
    ];
    let signature = oauth_signature(creds, method, url, params, &oauth_params);

    let mut header_params: Vec<(&str, String)> = oauth_params
        .iter()
        .map(|(key, value)| (*key, value.to_string()))
        .collect();
    header_params.push(("oauth_signature", signature));
    header_params.sort();

    let fields: Vec<String> = header_params
        .iter()
        .map(|(key, value)| format!("{key}=\"{}\"", percent_encode(value)))
        .collect();
    format!("OAuth {}", fields.join(", "))
}

/// HMAC-SHA1 request signature over the sorted, percent-encoded parameter
/// set (request params + oauth params), per OAuth 1.0a.
fn oauth_signature(
    creds: &TwitterConfig,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    oauth_params: &[(&str, &str)],
) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .chain(oauth_params.iter())
        .map(|(key, value)| (percent_encode(key), percent_encode(value)))
        .collect();
    pairs.sort();
    let param_string = pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    );
    let signing_key = format!(
        "{}&{}",
        percent_encode(&creds.api_secret),
        percent_encode(&creds.access_token_secret)
    );

    let mut mac =
        HmacSha1::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base_string.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference credentials and request from the OAuth 1.0a signing
    /// documentation, with a known-good signature.
    fn reference_creds() -> TwitterConfig {
        TwitterConfig {
            api_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            api_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            access_token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        }
    }

    #[test]
    fn reference_signature_matches() {
        let creds = reference_creds();
        let params = [
            ("include_entities", "true"),
            (
                "status",
                "Hello Ladies + Gentlemen, a signed OAuth request!",
            ),
        ];
        let oauth_params = [
            ("oauth_consumer_key", "xvz1evFS4wEEPTGEFPHBog"),
            ("oauth_nonce", "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1318622958"),
            (
                "oauth_token",
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            ),
            ("oauth_version", "1.0"),
        ];
        let signature = oauth_signature(
            &creds,
            "post",
            "https://api.twitter.com/1.1/statuses/update.json",
            &params,
            &oauth_params,
        );
        assert_eq!(signature, "tnnArxj06cWHq44gCs1OSKk/jLY=");
    }

    #[test]
    fn header_contains_all_oauth_fields() {
        let creds = reference_creds();
        let header = build_oauth_header(
            &creds,
            "POST",
            "https://api.twitter.com/2/tweets",
            &[],
            "abcdef",
            "1318622958",
        );
        assert!(header.starts_with("OAuth "));
        for field in [
            "oauth_consumer_key=",
            "oauth_nonce=",
            "oauth_signature=",
            "oauth_signature_method=\"HMAC-SHA1\"",
            "oauth_timestamp=\"1318622958\"",
            "oauth_token=",
            "oauth_version=\"1.0\"",
        ] {
            assert!(header.contains(field), "missing {field} in {header}");
        }
    }

    #[test]
    fn percent_encoding_is_rfc3986() {
        assert_eq!(
            percent_encode("Hello Ladies + Gentlemen, a signed OAuth request!"),
            "Hello%20Ladies%20%2B%20Gentlemen%2C%20a%20signed%20OAuth%20request%21"
        );
        assert_eq!(percent_encode("an_unreserved-string.~"), "an_unreserved-string.~");
    }
}
