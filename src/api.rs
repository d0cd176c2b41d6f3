use crate::error::{BibliotecaError, Result};
use crate::models::{Book, NewBook, RecordId, Registro, RegistroPayload};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub(crate) const HTTP_USER_AGENT: &str = "MinhaBiblioteca/0.1";
const BODY_EXCERPT_CHARS: usize = 200;

/// The remote store holding books (`/livros`) and reading records
/// (`/registros`).
pub trait LibraryBackend {
    fn list_books(&self) -> Result<Vec<Book>>;
    fn create_book(&self, book: &NewBook) -> Result<Book>;
    fn delete_book(&self, id: &RecordId) -> Result<()>;
    fn list_registros(&self) -> Result<Vec<Registro>>;
    /// Create-or-update keyed by (user, book).
    fn upsert_registro(&self, payload: &RegistroPayload) -> Result<Registro>;
}

pub struct RemoteLibrary {
    client: Client,
    base_url: String,
}

impl RemoteLibrary {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(HTTP_USER_AGENT)
            .build()?;
        Ok(RemoteLibrary {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        log::debug!("[api] GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;
        read_json(response, &url)
    }

    fn post_json<B: serde::Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.endpoint(path);
        log::debug!("[api] POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()?;
        read_json(response, &url)
    }
}

impl LibraryBackend for RemoteLibrary {
    fn list_books(&self) -> Result<Vec<Book>> {
        self.get_json("livros")
    }

    fn create_book(&self, book: &NewBook) -> Result<Book> {
        let created: Book = self.post_json("livros", book)?;
        log::info!("[api] book created id={} titulo=\"{}\"", created.id, created.titulo);
        Ok(created)
    }

    fn delete_book(&self, id: &RecordId) -> Result<()> {
        let url = self.endpoint(&format!("livros/{}", urlencoding::encode(id.as_str())));
        log::debug!("[api] DELETE {}", url);
        let response = self.client.delete(&url).send()?;
        let status = response.status();
        if status.is_success() {
            log::info!("[api] book deleted id={}", id);
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(status_error(status, &body, &url))
    }

    fn list_registros(&self) -> Result<Vec<Registro>> {
        self.get_json("registros")
    }

    fn upsert_registro(&self, payload: &RegistroPayload) -> Result<Registro> {
        self.post_json("registros", payload)
    }
}

fn read_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        return Err(status_error(status, &body, url));
    }
    serde_json::from_str(&body).map_err(|err| {
        log::error!(
            "[api] malformed response url={} error={} body=\"{}\"",
            url,
            err,
            excerpt(&body)
        );
        BibliotecaError::MalformedResponse {
            message: err.to_string(),
        }
    })
}

fn status_error(status: reqwest::StatusCode, body: &str, url: &str) -> BibliotecaError {
    log::warn!("[api] http status url={} status={}", url, status);
    let message = server_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Erro desconhecido")
            .to_string()
    });
    BibliotecaError::HttpStatus {
        status: status.as_u16(),
        message,
    }
}

/// The backend reports failures as `{"mensagem": ...}` or `{"erro": ...}`.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["mensagem", "erro"].iter().find_map(|key| {
        value
            .get(*key)
            .and_then(|value| value.as_str())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
    })
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
