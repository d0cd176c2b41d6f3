use crate::api::HTTP_USER_AGENT;
use crate::error::{BibliotecaError, Result};
use crate::models::{NewBook, ReadingStatus};
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::Regex;
use reqwest::blocking::Client;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_SEARCH_URL: &str = "https://www.googleapis.com/books/v1/volumes";
pub const PLACEHOLDER_THUMBNAIL: &str = "https://via.placeholder.com/150x200?text=Sem+Imagem";

static LEADING_YEAR_RE: OnceLock<Regex> = OnceLock::new();
static HTML_TAG_RE: OnceLock<Regex> = OnceLock::new();
static HTML_BREAK_RE: OnceLock<Regex> = OnceLock::new();

/// Read-only book search.
pub trait SearchProvider {
    fn search(&self, query: &str) -> Result<Vec<Volume>>;
}

/// Volume metadata as returned by the search provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Volume {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i32>,
    pub categories: Vec<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub thumbnail: Option<String>,
    pub identifiers: Vec<(String, String)>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i64>,
}

impl Volume {
    pub fn from_item(item: &Value) -> Self {
        let info = item.get("volumeInfo").cloned().unwrap_or(Value::Null);
        let text = |key: &str| {
            info.get(key)
                .and_then(|value| value.as_str())
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string())
        };
        let strings = |key: &str| -> Vec<String> {
            info.get(key)
                .and_then(|value| value.as_array())
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|value| value.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default()
        };
        let identifiers = info
            .get("industryIdentifiers")
            .and_then(|value| value.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|entry| {
                        let identifier = entry.get("identifier").and_then(|value| value.as_str())?;
                        let kind = entry
                            .get("type")
                            .and_then(|value| value.as_str())
                            .unwrap_or("OTHER");
                        Some((kind.to_string(), identifier.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let thumbnail = info
            .get("imageLinks")
            .and_then(|value| value.get("thumbnail").or_else(|| value.get("smallThumbnail")))
            .and_then(|value| value.as_str())
            .map(|value| value.replace("http://", "https://"));

        Volume {
            title: text("title"),
            authors: strings("authors"),
            publisher: text("publisher"),
            published_date: text("publishedDate"),
            page_count: info
                .get("pageCount")
                .and_then(|value| value.as_i64())
                .and_then(|value| i32::try_from(value).ok())
                .filter(|value| *value > 0),
            categories: strings("categories"),
            description: text("description"),
            language: text("language"),
            thumbnail,
            identifiers,
            average_rating: info.get("averageRating").and_then(|value| value.as_f64()),
            ratings_count: info.get("ratingsCount").and_then(|value| value.as_i64()),
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Sem título")
    }

    pub fn display_authors(&self) -> String {
        if self.authors.is_empty() {
            "Autor desconhecido".to_string()
        } else {
            self.authors.join(", ")
        }
    }

    pub fn display_published(&self) -> &str {
        self.published_date.as_deref().unwrap_or("Data desconhecida")
    }

    pub fn display_thumbnail(&self) -> &str {
        self.thumbnail.as_deref().unwrap_or(PLACEHOLDER_THUMBNAIL)
    }

    pub fn display_categories(&self) -> String {
        if self.categories.is_empty() {
            "Categorias não informadas".to_string()
        } else {
            self.categories.join(", ")
        }
    }

    pub fn display_description(&self) -> String {
        self.description
            .as_deref()
            .and_then(clean_description)
            .unwrap_or_else(|| "Descrição não disponível.".to_string())
    }

    pub fn display_rating(&self) -> String {
        let rating = self
            .average_rating
            .map(|value| value.to_string())
            .unwrap_or_else(|| "Não avaliado".to_string());
        let count = self
            .ratings_count
            .map(|value| value.to_string())
            .unwrap_or_else(|| "Sem avaliações".to_string());
        format!("{} ({})", rating, count)
    }

    /// Prefers ISBN-13, then any identifier, then a timestamp placeholder.
    pub fn pick_isbn(&self, now_ms: i64) -> String {
        self.identifiers
            .iter()
            .find(|(kind, _)| kind == "ISBN_13")
            .or_else(|| self.identifiers.first())
            .map(|(_, identifier)| identifier.clone())
            .unwrap_or_else(|| format!("SEMISBN-{}", now_ms))
    }

    /// The record sent to the library when the user adds this result.
    pub fn to_new_book(&self, now_ms: i64) -> NewBook {
        NewBook {
            titulo: self.display_title().to_string(),
            autor: self.display_authors(),
            isbn: self.pick_isbn(now_ms),
            editora: self
                .publisher
                .clone()
                .unwrap_or_else(|| "Editora desconhecida".to_string()),
            ano_publicacao: self.published_date.as_deref().map(leading_year).unwrap_or(0),
            genero: self.display_categories(),
            sinopse: self.display_description(),
            paginas: self.page_count.unwrap_or(0),
            idioma: self
                .language
                .clone()
                .unwrap_or_else(|| "desconhecido".to_string()),
            capa: self.thumbnail.clone().unwrap_or_default(),
            status: ReadingStatus::QueroLer.ui().to_string(),
        }
    }
}

pub fn parse_volumes(data: &Value) -> Vec<Volume> {
    data.get("items")
        .and_then(|value| value.as_array())
        .map(|items| items.iter().map(Volume::from_item).collect())
        .unwrap_or_default()
}

/// Year from the leading digits of the first four characters, else 0.
fn leading_year(published: &str) -> i32 {
    let prefix: String = published.trim().chars().take(4).collect();
    let regex = LEADING_YEAR_RE.get_or_init(|| Regex::new(r"^\d+").expect("valid year regex"));
    regex
        .find(&prefix)
        .and_then(|found| found.as_str().parse().ok())
        .unwrap_or(0)
}

fn clean_description(raw: &str) -> Option<String> {
    let decoded = unescape_with(raw, resolve_html5_entity)
        .map(|text| text.into_owned())
        .unwrap_or_else(|_| raw.to_string())
        .replace('\u{00a0}', " ");
    let break_re = HTML_BREAK_RE
        .get_or_init(|| Regex::new(r"(?is)<br\s*/?>|</(p|div|li|ul|ol|h[1-6])>").expect("valid break regex"));
    let tag_re = HTML_TAG_RE.get_or_init(|| Regex::new(r"(?is)<\s*/?\s*[a-z][^>]*>").expect("valid tag regex"));
    let with_breaks = break_re.replace_all(&decoded, "\n");
    let stripped = tag_re.replace_all(&with_breaks, "");

    let lines: Vec<&str> = stripped
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

pub struct GoogleBooks {
    client: Client,
    search_url: String,
    max_results: u32,
}

impl GoogleBooks {
    pub fn new(search_url: &str, max_results: u32, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(HTTP_USER_AGENT)
            .build()?;
        Ok(GoogleBooks {
            client,
            search_url: search_url.trim().to_string(),
            max_results,
        })
    }

    fn query_url(&self, query: &str) -> String {
        format!(
            "{}?q={}&maxResults={}",
            self.search_url,
            urlencoding::encode(query),
            self.max_results
        )
    }
}

impl SearchProvider for GoogleBooks {
    fn search(&self, query: &str) -> Result<Vec<Volume>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BibliotecaError::EmptyQuery);
        }
        let url = self.query_url(query);
        log::info!("[search] query=\"{}\"", query);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("[search] http status url={} status={}", url, status);
            return Err(BibliotecaError::HttpStatus {
                status: status.as_u16(),
                message: "Erro na requisição à API".to_string(),
            });
        }
        let body = response.text()?;
        let data: Value = serde_json::from_str(&body).map_err(|err| {
            log::error!("[search] malformed response url={} error={}", url, err);
            BibliotecaError::MalformedResponse {
                message: err.to_string(),
            }
        })?;
        let volumes = parse_volumes(&data);
        log::info!("[search] results={}", volumes.len());
        Ok(volumes)
    }
}
