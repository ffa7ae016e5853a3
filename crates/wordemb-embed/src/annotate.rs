//! Sentence splitting and tokenization through an external annotation service.
//!
//! The production client talks to a Stanford CoreNLP server over HTTP and, if
//! asked to, starts one from a local CoreNLP installation on first use.
use std::env;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};
use wordemb_core::config::resolve_with_base;
use wordemb_core::error::{Error, Result};

/// Environment variable naming the CoreNLP installation directory.
pub const CORENLP_HOME_VAR: &str = "CORENLP_HOME";
const DEFAULT_HOME: &str = "third_party/stanford-corenlp-full-2018-10-05";
const SERVER_CLASS: &str = "edu.stanford.nlp.pipeline.StanfordCoreNLPServer";

/// Splits text into sentences of word tokens.
pub trait Annotator: Send {
    fn annotate(&mut self, text: &str) -> Result<Vec<Vec<String>>>;
}

/// Builds an annotator on first use.
pub type AnnotatorFactory = Box<dyn Fn() -> Result<Box<dyn Annotator>> + Send>;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreNlpConfig {
    pub endpoint: String,
    /// CoreNLP install directory; falls back to `$CORENLP_HOME`, then the bundled third-party path.
    pub home: Option<String>,
    pub start_server: bool,
    pub memory: String,
    pub timeout_ms: u64,
    pub startup_timeout_secs: u64,
}

impl Default for CoreNlpConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            home: None,
            start_server: true,
            memory: "4G".to_string(),
            timeout_ms: 15_000,
            startup_timeout_secs: 60,
        }
    }
}

impl CoreNlpConfig {
    /// A factory that starts a [`CoreNlpClient`] with this configuration.
    pub fn factory(&self) -> AnnotatorFactory {
        let config = self.clone();
        Box::new(move || {
            let client = CoreNlpClient::start(config.clone())?;
            Ok(Box::new(client) as Box<dyn Annotator>)
        })
    }
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    sentences: Vec<Sentence>,
}

#[derive(Deserialize)]
struct Sentence {
    #[serde(default)]
    tokens: Vec<Token>,
}

#[derive(Deserialize)]
struct Token {
    word: String,
}

/// HTTP client for a CoreNLP server running the `tokenize,ssplit` annotators.
pub struct CoreNlpClient {
    config: CoreNlpConfig,
    endpoint: Url,
    http: Client,
    server: Option<Child>,
}

impl CoreNlpClient {
    /// Connect to the configured endpoint, spawning a local server if needed.
    pub fn start(config: CoreNlpConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| Error::InvalidConfig(format!("annotator endpoint '{}': {}", config.endpoint, e)))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.saturating_add(5_000)))
            .build()
            .map_err(|e| Error::Annotation(e.to_string()))?;
        let mut client = Self { config, endpoint, http, server: None };

        if client.is_alive() {
            info!(endpoint = %client.endpoint, "reusing running CoreNLP server");
        } else if client.config.start_server {
            client.spawn_server()?;
            client.wait_until_alive()?;
        } else {
            return Err(Error::Annotation(format!("no CoreNLP server at {}", client.endpoint)));
        }
        Ok(client)
    }

    fn is_alive(&self) -> bool {
        self.endpoint
            .join("ping")
            .ok()
            .and_then(|url| self.http.get(url).timeout(Duration::from_secs(2)).send().ok())
            .is_some_and(|resp| resp.status().is_success())
    }

    fn home(&self) -> Result<std::path::PathBuf> {
        let raw = match &self.config.home {
            Some(home) => home.clone(),
            None => env::var(CORENLP_HOME_VAR).unwrap_or_else(|_| DEFAULT_HOME.to_string()),
        };
        Ok(resolve_with_base(&env::current_dir()?, raw))
    }

    fn spawn_server(&mut self) -> Result<()> {
        let home = self.home()?;
        if !home.is_dir() {
            return Err(Error::NotFound(format!("CoreNLP installation {}", home.display())));
        }
        let port = self.endpoint.port_or_known_default().unwrap_or(9000);
        info!(home = %home.display(), port, "starting CoreNLP server");
        let child = Command::new("java")
            .env(CORENLP_HOME_VAR, &home)
            .arg(format!("-Xmx{}", self.config.memory))
            .arg("-cp")
            .arg(format!("{}/*", home.display()))
            .arg(SERVER_CLASS)
            .args(["-port", &port.to_string(), "-timeout", &self.config.timeout_ms.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Annotation(format!("failed to launch java: {e}")))?;
        self.server = Some(child);
        Ok(())
    }

    fn wait_until_alive(&mut self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.startup_timeout_secs);
        while Instant::now() < deadline {
            if self.is_alive() {
                info!(endpoint = %self.endpoint, "CoreNLP server is up");
                return Ok(());
            }
            if let Some(child) = self.server.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(Error::Annotation(format!("CoreNLP server exited early ({status})")));
                }
            }
            thread::sleep(Duration::from_millis(500));
        }
        Err(Error::Annotation(format!(
            "CoreNLP server did not come up within {}s",
            self.config.startup_timeout_secs
        )))
    }
}

impl Annotator for CoreNlpClient {
    fn annotate(&mut self, text: &str) -> Result<Vec<Vec<String>>> {
        let properties = serde_json::json!({
            "annotators": "tokenize,ssplit",
            "outputFormat": "json",
        })
        .to_string();
        debug!(chars = text.len(), "annotating");
        let doc: Document = self
            .http
            .post(self.endpoint.clone())
            .query(&[("properties", properties)])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(text.to_owned())
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json())
            .map_err(|e| Error::Annotation(e.to_string()))?;
        Ok(doc
            .sentences
            .into_iter()
            .map(|s| s.tokens.into_iter().map(|t| t.word).collect())
            .collect())
    }
}

impl Drop for CoreNlpClient {
    fn drop(&mut self) {
        if let Some(mut child) = self.server.take() {
            info!("stopping CoreNLP server");
            if let Err(e) = child.kill() {
                warn!(error = %e, "failed to stop CoreNLP server");
            }
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: CoreNlpConfig = serde_json::from_value(serde_json::json!({ "start_server": false })).unwrap();
        assert!(!cfg.start_server);
        assert_eq!(cfg.endpoint, "http://localhost:9000");
        assert_eq!(cfg.timeout_ms, 15_000);
    }

    #[test]
    fn response_sentences_flatten_to_words() {
        let doc: Document = serde_json::from_str(
            r#"{"sentences":[{"index":0,"tokens":[{"word":"Hello","index":1},{"word":"!"}]},{"tokens":[{"word":"Bye"}]}]}"#,
        )
        .unwrap();
        let words: Vec<String> = doc.sentences.into_iter().flat_map(|s| s.tokens).map(|t| t.word).collect();
        assert_eq!(words, vec!["Hello", "!", "Bye"]);
    }
}
