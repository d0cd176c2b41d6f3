use thiserror::Error;

#[derive(Error, Debug)]
pub enum BibliotecaError {
    #[error("Falha de rede: {message}")]
    NetworkFailure { message: String },
    #[error("Resposta HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("Resposta inválida: {message}")]
    MalformedResponse { message: String },
    #[error("Usuário não encontrado. Faça login novamente.")]
    MissingUser,
    #[error("Selecione um livro antes de registrar a leitura.")]
    MissingSelection,
    #[error("Digite algo para buscar")]
    EmptyQuery,
    #[error("Resultado de busca inexistente: {index}")]
    NoSuchResult { index: usize },
    #[error("Livro não encontrado: {id}")]
    BookNotFound { id: String },
    #[error("Armazenamento local: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Configuração inválida: {message}")]
    Config { message: String },
}

impl BibliotecaError {
    /// Transport failures, non-2xx answers and unparseable bodies all mean
    /// "the operation was not applied" to callers.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            BibliotecaError::NetworkFailure { .. }
                | BibliotecaError::HttpStatus { .. }
                | BibliotecaError::MalformedResponse { .. }
        )
    }
}

impl From<reqwest::Error> for BibliotecaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BibliotecaError::MalformedResponse {
                message: err.to_string(),
            }
        } else {
            BibliotecaError::NetworkFailure {
                message: err.to_string(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BibliotecaError>;
