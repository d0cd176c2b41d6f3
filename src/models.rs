use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Backend identifiers are opaque: numeric ids stay numeric on the wire,
/// anything else is sent back as a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        RecordId(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId(value.to_string())
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::new(value)
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let id = RecordId::new(value);
        if id.is_empty() {
            return Err("id vazio".to_string());
        }
        Ok(id)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<i64>() {
            Ok(number) if number.to_string() == self.0 => serializer.serialize_i64(number),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(value) => RecordId::from(value),
            RawId::Text(value) => RecordId::new(value),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadingStatus {
    #[default]
    QueroLer,
    Lendo,
    Lido,
    Relendo,
    Abandonado,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 5] = [
        ReadingStatus::QueroLer,
        ReadingStatus::Lendo,
        ReadingStatus::Lido,
        ReadingStatus::Relendo,
        ReadingStatus::Abandonado,
    ];

    /// Lower-kebab-case vocabulary used by the screens and filters.
    pub fn ui(self) -> &'static str {
        match self {
            ReadingStatus::QueroLer => "quero-ler",
            ReadingStatus::Lendo => "lendo",
            ReadingStatus::Lido => "lido",
            ReadingStatus::Relendo => "relendo",
            ReadingStatus::Abandonado => "abandonado",
        }
    }

    /// Upper-snake-case vocabulary stored by the backend.
    pub fn wire(self) -> &'static str {
        match self {
            ReadingStatus::QueroLer => "QUERO_LER",
            ReadingStatus::Lendo => "LENDO",
            ReadingStatus::Lido => "LIDO",
            ReadingStatus::Relendo => "RELENDO",
            ReadingStatus::Abandonado => "ABANDONADO",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadingStatus::QueroLer => "Quero Ler",
            ReadingStatus::Lendo => "Lendo",
            ReadingStatus::Lido => "Lido",
            ReadingStatus::Relendo => "Relendo",
            ReadingStatus::Abandonado => "Abandonado",
        }
    }

    /// Accepts either vocabulary, in any casing, with `_`, `-` or spaces as
    /// separators.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .to_lowercase()
            .replace(['_', ' '], "-");
        ReadingStatus::ALL
            .into_iter()
            .find(|status| status.ui() == normalized)
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ui())
    }
}

impl FromStr for ReadingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ReadingStatus::parse(value).ok_or_else(|| format!("status de leitura desconhecido: {}", value))
    }
}

impl Serialize for ReadingStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.ui())
    }
}

impl<'de> Deserialize<'de> for ReadingStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ReadingStatus::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown status {}", raw)))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dates travel as ISO-8601 timestamps but only the calendar date matters.
mod wire_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&super::date_to_wire(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_wire_date))
    }
}

pub fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            log::debug!("[models] ignoring unparseable date value={}", raw);
            None
        }
    }
}

/// Midnight UTC of the given day as a full ISO-8601 timestamp.
pub fn date_to_wire(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: RecordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub titulo: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub autor: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub editora: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub isbn: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genero: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sinopse: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub idioma: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ano_publicacao: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub paginas: i32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub capa: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Some backend versions embed the reading record in the book itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registro: Option<Registro>,
}

/// Body of `POST /livros`.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub titulo: String,
    pub autor: String,
    pub isbn: String,
    pub editora: String,
    pub ano_publicacao: i32,
    pub genero: String,
    pub sinopse: String,
    pub paginas: i32,
    pub idioma: String,
    pub capa: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Registro {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub livro_id: RecordId,
    #[serde(default)]
    pub usuario_id: Option<RecordId>,
    #[serde(default)]
    pub status_leitura: Option<String>,
    #[serde(default)]
    pub pagina_atual: Option<i32>,
    #[serde(default)]
    pub total_paginas: Option<i32>,
    #[serde(default)]
    pub comentario: Option<String>,
    #[serde(default, with = "wire_date")]
    pub data_atualizacao: Option<NaiveDate>,
}

/// Body of `POST /registros` (create-or-update for the user/book pair).
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistroPayload {
    pub livro_id: RecordId,
    pub usuario_id: RecordId,
    pub pagina_atual: i32,
    pub total_paginas: i32,
    pub status_leitura: String,
    pub comentario: String,
    pub data_atualizacao: String,
}

/// A book merged with the current user's reading record.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub id: RecordId,
    pub titulo: String,
    pub autor: String,
    pub editora: String,
    pub isbn: String,
    pub genero: String,
    pub sinopse: String,
    pub idioma: String,
    pub ano_publicacao: i32,
    pub paginas: i32,
    pub capa: String,
    pub status_leitura: ReadingStatus,
    pub pagina_atual: i32,
    pub total_paginas: i32,
    pub comentario: Option<String>,
    pub data_atualizacao: Option<NaiveDate>,
    pub progress_percent: u8,
}

/// The logged-in user record left in local storage by the login page.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
}

impl SessionUser {
    pub fn with_id(id: RecordId) -> Self {
        SessionUser {
            user_id: Some(id),
            id: None,
            nome: None,
        }
    }

    pub fn resolved_id(&self) -> Option<&RecordId> {
        self.user_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.id.as_ref().filter(|id| !id.is_empty()))
    }
}

/// "A book was just added" signal shared between screens.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookAddedMarker {
    pub id: RecordId,
    pub titulo: String,
    pub timestamp: i64,
}

impl BookAddedMarker {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp)
    }

    pub fn is_fresh(&self, now_ms: i64, window_ms: i64) -> bool {
        self.age_ms(now_ms) < window_ms
    }
}
