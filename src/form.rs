use crate::error::{BibliotecaError, Result};
use crate::models::{date_to_wire, BookView, ReadingStatus, RecordId, RegistroPayload, SessionUser};
use crate::reconcile::progress_percent;
use chrono::NaiveDate;

/// One entry of the form's book picker.
#[derive(Debug, Clone, PartialEq)]
pub struct BookOption {
    pub id: RecordId,
    pub label: String,
    pub paginas: i32,
}

pub fn book_options(views: &[BookView]) -> Vec<BookOption> {
    views
        .iter()
        .map(|view| BookOption {
            id: view.id.clone(),
            label: format!("{} - {}", view.titulo, view.autor),
            paginas: view.paginas,
        })
        .collect()
}

/// Reading-progress form bound to at most one selected book.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationForm {
    selected: Option<RecordId>,
    pub current_page: i32,
    pub total_pages: i32,
    pub status: ReadingStatus,
    pub comment: String,
    pub date: NaiveDate,
}

impl RegistrationForm {
    pub fn new(today: NaiveDate) -> Self {
        RegistrationForm {
            selected: None,
            current_page: 0,
            total_pages: 0,
            status: ReadingStatus::default(),
            comment: String::new(),
            date: today,
        }
    }

    pub fn reset(&mut self, today: NaiveDate) {
        *self = RegistrationForm::new(today);
    }

    pub fn selected(&self) -> Option<&RecordId> {
        self.selected.as_ref()
    }

    /// Pre-fills from the cached view of `id`; an unknown id resets the form.
    pub fn select_book(&mut self, id: &RecordId, views: &[BookView], today: NaiveDate) -> bool {
        let Some(view) = views.iter().find(|view| &view.id == id) else {
            log::debug!("[form] no cached book for id={}, resetting", id);
            self.reset(today);
            return false;
        };
        self.selected = Some(view.id.clone());
        self.total_pages = if view.total_paginas > 0 {
            view.total_paginas
        } else {
            view.paginas
        };
        self.current_page = view.pagina_atual;
        self.comment = view.comentario.clone().unwrap_or_default();
        self.status = view.status_leitura;
        self.date = view.data_atualizacao.unwrap_or(today);
        true
    }

    /// Updates the page fields and returns the live progress.
    pub fn on_progress_input(&mut self, current_page: Option<i32>, total_pages: Option<i32>) -> u8 {
        if let Some(current_page) = current_page {
            self.current_page = current_page;
        }
        if let Some(total_pages) = total_pages {
            self.total_pages = total_pages;
        }
        self.progress_percent()
    }

    pub fn progress_percent(&self) -> u8 {
        progress_percent(self.current_page, self.total_pages)
    }

    /// Validates session and selection before anything touches the network.
    pub fn build_payload(&self, session: Option<&SessionUser>) -> Result<RegistroPayload> {
        let usuario_id = session
            .and_then(SessionUser::resolved_id)
            .cloned()
            .ok_or(BibliotecaError::MissingUser)?;
        let livro_id = self
            .selected
            .clone()
            .ok_or(BibliotecaError::MissingSelection)?;

        Ok(RegistroPayload {
            livro_id,
            usuario_id,
            pagina_atual: self.current_page.max(0),
            total_paginas: self.total_pages.max(0),
            status_leitura: self.status.wire().to_string(),
            comentario: self.comment.trim().to_string(),
            data_atualizacao: date_to_wire(self.date),
        })
    }
}
