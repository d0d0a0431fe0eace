use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;
use wordlens_core::{
    DefinitionSource, DictionaryConfig, DictionaryEntry, LookupError, SourceResponse,
};

/// Dictionary client for `GET {endpoint}/{word}` services returning a JSON
/// array of entries.
pub struct HttpDictionary {
    client: Client,
    endpoint: Url,
}

impl HttpDictionary {
    pub fn new(config: &DictionaryConfig) -> Result<Self> {
        let endpoint = parse_endpoint(&config.endpoint)?;
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone());
        if is_loopback(&endpoint) {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .context("failed to build dictionary HTTP client")?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Appends `word` as a single percent-encoded path segment.
    pub fn entry_url(&self, word: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(word);
        }
        url
    }
}

#[async_trait]
impl DefinitionSource for HttpDictionary {
    #[instrument(skip(self))]
    async fn fetch(&self, word: &str) -> Result<SourceResponse, LookupError> {
        let url = self.entry_url(word);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| {
                warn!(%url, ?err, "dictionary request failed");
                LookupError::Transport(describe_transport_error(&err))
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(%url, %status, "dictionary has no entry");
            return Ok(SourceResponse::NotFound);
        }

        let body = response
            .text()
            .await
            .map_err(|err| LookupError::Transport(describe_transport_error(&err)))?;
        parse_entries(&body).map(SourceResponse::Entries)
    }
}

pub fn parse_entries(body: &str) -> Result<Vec<DictionaryEntry>, LookupError> {
    serde_json::from_str(body).map_err(|err| LookupError::Parse(err.to_string()))
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid dictionary endpoint {raw:?}"))?;
    if url.cannot_be_a_base() {
        return Err(anyhow!("dictionary endpoint {raw:?} cannot take a path"));
    }
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("unsupported dictionary endpoint scheme {other:?}")),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "could not reach the dictionary service".to_string()
    } else if err.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        "dictionary service is rate limiting requests".to_string()
    } else {
        "failed to fetch definition".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use wordlens_core::{DefinitionLookup, DefinitionResult};

    fn config(endpoint: &str) -> DictionaryConfig {
        DictionaryConfig {
            endpoint: endpoint.to_string(),
            timeout: Duration::from_secs(5),
            ..DictionaryConfig::default()
        }
    }

    /// Serves one canned HTTP response and hands back the request line.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let read = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..read]);
                if read == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            let text = String::from_utf8_lossy(&request).into_owned();
            text.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}/api/v2/entries/en"), handle)
    }

    #[test]
    fn entry_url_encodes_word_as_one_segment() {
        let dictionary = HttpDictionary::new(&config(
            "https://api.dictionaryapi.dev/api/v2/entries/en/",
        ))
        .unwrap();
        assert_eq!(
            dictionary.entry_url("hello").as_str(),
            "https://api.dictionaryapi.dev/api/v2/entries/en/hello"
        );
        assert_eq!(
            dictionary.entry_url("a/b c").as_str(),
            "https://api.dictionaryapi.dev/api/v2/entries/en/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_unusable_endpoints() {
        assert!(HttpDictionary::new(&config("not a url")).is_err());
        assert!(HttpDictionary::new(&config("ftp://example.com/en")).is_err());
        assert!(HttpDictionary::new(&config("mailto:someone@example.com")).is_err());
    }

    #[test]
    fn loopback_hosts_are_detected() {
        assert!(is_loopback(&Url::parse("http://127.0.0.1:8080/x").unwrap()));
        assert!(is_loopback(&Url::parse("http://localhost/x").unwrap()));
        assert!(is_loopback(&Url::parse("http://[::1]/x").unwrap()));
        assert!(!is_loopback(&Url::parse("https://api.dictionaryapi.dev/x").unwrap()));
    }

    #[test]
    fn parse_entries_rejects_non_array_bodies() {
        let err = parse_entries(r#"{"title":"No Definitions Found"}"#).unwrap_err();
        assert!(matches!(err, LookupError::Parse(_)));
        assert!(parse_entries("[]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn found_response_is_condensed_to_first_definition() {
        let body = r#"[{"word":"cat","meanings":[{"partOfSpeech":"noun","definitions":[{"definition":"A feline.","example":"The cat sat."},{"definition":"Other."}]}]}]"#;
        let (endpoint, server) = serve_once("200 OK", body).await;
        let lookup = DefinitionLookup::new(HttpDictionary::new(&config(&endpoint)).unwrap());

        let result = lookup.lookup("Cat").await;

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /api/v2/entries/en/cat "));
        let summary = result.summary().unwrap();
        assert_eq!(summary.definition, "A feline.");
        assert_eq!(summary.example.as_deref(), Some("The cat sat."));
    }

    #[tokio::test]
    async fn not_found_status_maps_to_not_found() {
        let body = r#"{"title":"No Definitions Found"}"#;
        let (endpoint, server) = serve_once("404 Not Found", body).await;
        let lookup = DefinitionLookup::new(HttpDictionary::new(&config(&endpoint)).unwrap());

        assert_eq!(lookup.lookup("xyzzy123").await, DefinitionResult::NotFound);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn empty_array_maps_to_not_found() {
        let (endpoint, server) = serve_once("200 OK", "[]").await;
        let lookup = DefinitionLookup::new(HttpDictionary::new(&config(&endpoint)).unwrap());

        assert_eq!(lookup.lookup("xyzzy123").await, DefinitionResult::NotFound);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_service_maps_to_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = format!("http://{addr}/en");
        let lookup = DefinitionLookup::new(HttpDictionary::new(&config(&endpoint)).unwrap());

        match lookup.lookup("cat").await {
            DefinitionResult::Error(message) => assert!(!message.is_empty()),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
