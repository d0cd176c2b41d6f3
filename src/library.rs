use crate::models::{BookView, ReadingStatus, RecordId};
use std::fmt;
use std::str::FromStr;

const PROGRESS_BAR_WIDTH: usize = 20;

/// Blocking yes/no question asked before destructive actions.
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ReadingStatus),
}

impl StatusFilter {
    pub fn tag(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Only(status) => status.ui(),
        }
    }

    pub fn matches(self, status: ReadingStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        value.parse::<ReadingStatus>().map(StatusFilter::Only)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    EmptyLibrary,
    NoMatches,
    LoadError(String),
}

impl Placeholder {
    pub fn message(&self) -> String {
        match self {
            Placeholder::EmptyLibrary => "Nenhum livro adicionado à biblioteca".to_string(),
            Placeholder::NoMatches => "Nenhum livro encontrado com este filtro".to_string(),
            Placeholder::LoadError(detail) => format!("Erro ao carregar livros. ({})", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookCard {
    pub id: RecordId,
    pub status: ReadingStatus,
    pub titulo: String,
    pub autor: String,
    pub capa: String,
    pub pagina_atual: i32,
    pub total_paginas: i32,
    pub progress_percent: u8,
    pub comentario: Option<String>,
    pub visible: bool,
}

impl BookCard {
    fn from_view(view: &BookView) -> Self {
        BookCard {
            id: view.id.clone(),
            status: view.status_leitura,
            titulo: view.titulo.clone(),
            autor: view.autor.clone(),
            capa: view.capa.clone(),
            pagina_atual: view.pagina_atual,
            total_paginas: view.total_paginas,
            progress_percent: view.progress_percent,
            comentario: view.comentario.clone(),
            visible: true,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let filled = PROGRESS_BAR_WIDTH * usize::from(self.progress_percent) / 100;
        let mut lines = vec![
            format!("[{}] {} - {}", self.id, self.titulo, self.autor),
            format!("    Status: {}", self.status.label()),
            format!(
                "    Progresso: {}/{} páginas ({}%)",
                self.pagina_atual, self.total_paginas, self.progress_percent
            ),
            format!(
                "    [{}{}]",
                "#".repeat(filled),
                ".".repeat(PROGRESS_BAR_WIDTH - filled)
            ),
        ];
        if let Some(comentario) = &self.comentario {
            lines.push(format!("    Comentário: {}", comentario));
        }
        lines
    }
}

/// The card list of the profile screen.
#[derive(Debug, Default)]
pub struct LibraryView {
    cards: Vec<BookCard>,
    filter: StatusFilter,
    placeholder: Option<Placeholder>,
}

impl LibraryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, views: &[BookView]) {
        self.cards = views.iter().map(BookCard::from_view).collect();
        self.placeholder = if self.cards.is_empty() {
            Some(Placeholder::EmptyLibrary)
        } else {
            None
        };
        if !self.cards.is_empty() {
            self.apply_filter(self.filter);
        }
    }

    pub fn show_error(&mut self, detail: &str) {
        self.cards.clear();
        self.placeholder = Some(Placeholder::LoadError(detail.to_string()));
    }

    /// Returns how many cards remain visible. At most one placeholder is
    /// ever shown: a previous one is removed before a new one is added.
    pub fn apply_filter(&mut self, filter: StatusFilter) -> usize {
        self.filter = filter;
        let mut visible = 0;
        for card in &mut self.cards {
            card.visible = filter.matches(card.status);
            if card.visible {
                visible += 1;
            }
        }
        self.placeholder = None;
        if visible == 0 {
            self.placeholder = Some(Placeholder::NoMatches);
        }
        visible
    }

    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    pub fn cards(&self) -> &[BookCard] {
        &self.cards
    }

    pub fn visible_cards(&self) -> impl Iterator<Item = &BookCard> {
        self.cards.iter().filter(|card| card.visible)
    }

    pub fn placeholder(&self) -> Option<&Placeholder> {
        self.placeholder.as_ref()
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.visible_cards().flat_map(BookCard::lines).collect();
        if let Some(placeholder) = &self.placeholder {
            lines.push(placeholder.message());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::{LibraryView, Placeholder, StatusFilter};
    use crate::models::{Book, ReadingStatus, RecordId, Registro};
    use crate::reconcile::reconcile;

    fn views() -> Vec<crate::models::BookView> {
        let books: Vec<Book> = (1..=3)
            .map(|id| Book {
                id: RecordId::from(id),
                titulo: format!("Livro {}", id),
                paginas: 100,
                ..Book::default()
            })
            .collect();
        let registros = vec![
            Registro {
                livro_id: RecordId::from(1),
                status_leitura: Some("LIDO".to_string()),
                pagina_atual: Some(100),
                ..Registro::default()
            },
            Registro {
                livro_id: RecordId::from(2),
                status_leitura: Some("LENDO".to_string()),
                ..Registro::default()
            },
        ];
        reconcile(&books, &registros, None)
    }

    #[test]
    fn filter_all_shows_every_card() {
        let mut view = LibraryView::new();
        view.render(&views());
        assert_eq!(view.apply_filter(StatusFilter::All), 3);
        assert!(view.placeholder().is_none());
    }

    #[test]
    fn status_filter_shows_exactly_matching_cards() {
        let mut view = LibraryView::new();
        view.render(&views());
        assert_eq!(view.apply_filter(StatusFilter::Only(ReadingStatus::Lido)), 1);
        let visible: Vec<&str> = view.visible_cards().map(|card| card.id.as_str()).collect();
        assert_eq!(visible, vec!["1"]);
        assert!(view
            .visible_cards()
            .all(|card| card.status == ReadingStatus::Lido));
    }

    #[test]
    fn zero_matches_shows_a_single_placeholder() {
        let mut view = LibraryView::new();
        view.render(&views());
        assert_eq!(view.apply_filter(StatusFilter::Only(ReadingStatus::Abandonado)), 0);
        assert_eq!(view.apply_filter(StatusFilter::Only(ReadingStatus::Relendo)), 0);
        assert_eq!(view.placeholder(), Some(&Placeholder::NoMatches));
        let placeholders = view
            .lines()
            .iter()
            .filter(|line| line.contains("Nenhum livro encontrado"))
            .count();
        assert_eq!(placeholders, 1);

        view.apply_filter(StatusFilter::All);
        assert!(view.placeholder().is_none());
    }

    #[test]
    fn rerender_keeps_the_active_filter() {
        let mut view = LibraryView::new();
        view.render(&views());
        view.apply_filter(StatusFilter::Only(ReadingStatus::Lendo));
        view.render(&views());
        assert_eq!(view.visible_cards().count(), 1);
        assert_eq!(view.filter().tag(), "lendo");
    }

    #[test]
    fn empty_library_and_errors_use_their_own_placeholder() {
        let mut view = LibraryView::new();
        view.render(&[]);
        assert_eq!(view.placeholder(), Some(&Placeholder::EmptyLibrary));
        view.show_error("timeout");
        assert_eq!(view.lines(), vec!["Erro ao carregar livros. (timeout)".to_string()]);
    }

    #[test]
    fn filter_tags_parse_from_either_vocabulary() {
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!(
            "QUERO_LER".parse::<StatusFilter>(),
            Ok(StatusFilter::Only(ReadingStatus::QueroLer))
        );
        assert!("favoritos".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn card_lines_show_progress_and_comment() {
        let mut books = views();
        books[0].comentario = Some("Excelente".to_string());
        let mut view = LibraryView::new();
        view.render(&books[..1]);
        let lines = view.lines();
        assert_eq!(lines[1], "    Status: Lido");
        assert_eq!(lines[2], "    Progresso: 100/100 páginas (100%)");
        assert_eq!(lines[3], format!("    [{}]", "#".repeat(20)));
        assert_eq!(lines[4], "    Comentário: Excelente");
    }
}
