use crate::models::{Book, BookView, ReadingStatus, RecordId, Registro};
use std::collections::HashMap;

/// Percentage of `current` over `total`, rounded and clamped to 0..=100.
/// Non-positive totals always yield 0.
pub fn progress_percent(current: i32, total: i32) -> u8 {
    if total <= 0 {
        return 0;
    }
    let ratio = f64::from(current.max(0)) / f64::from(total);
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Merges books with the reading records of `current_user` into one view per
/// book, in the books' order. Without a known user any record for a book is
/// accepted; that is a display fallback, not an access check.
pub fn reconcile(books: &[Book], registros: &[Registro], current_user: Option<&RecordId>) -> Vec<BookView> {
    let index = index_registros(registros, current_user);
    books
        .iter()
        .map(|book| {
            let registro = index.get(&book.id).copied().or_else(|| {
                book.registro
                    .as_ref()
                    .filter(|embedded| belongs_to(embedded, current_user))
            });
            build_view(book, registro)
        })
        .collect()
}

fn belongs_to(registro: &Registro, current_user: Option<&RecordId>) -> bool {
    match current_user {
        Some(user) => registro.usuario_id.as_ref() == Some(user),
        None => true,
    }
}

/// Latest `dataAtualizacao` wins per book; equal dates keep the later entry.
fn index_registros<'a>(
    registros: &'a [Registro],
    current_user: Option<&RecordId>,
) -> HashMap<&'a RecordId, &'a Registro> {
    let mut index: HashMap<&RecordId, &Registro> = HashMap::new();
    for registro in registros
        .iter()
        .filter(|registro| !registro.livro_id.is_empty() && belongs_to(registro, current_user))
    {
        index
            .entry(&registro.livro_id)
            .and_modify(|current| {
                if registro.data_atualizacao >= current.data_atualizacao {
                    *current = registro;
                }
            })
            .or_insert(registro);
    }
    index
}

fn build_view(book: &Book, registro: Option<&Registro>) -> BookView {
    let mut status_leitura = ReadingStatus::default();
    let mut pagina_atual = 0;
    let mut total_paginas = book.paginas;
    let mut comentario = None;
    let mut data_atualizacao = None;

    if let Some(registro) = registro {
        if let Some(raw) = registro
            .status_leitura
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
        {
            match ReadingStatus::parse(raw) {
                Some(status) => status_leitura = status,
                None => log::warn!(
                    "[reconcile] unknown status book={} status={}",
                    book.id,
                    raw
                ),
            }
        }
        if let Some(text) = registro
            .comentario
            .as_deref()
            .filter(|text| !text.trim().is_empty())
        {
            comentario = Some(text.to_string());
        }
        if let Some(page) = registro.pagina_atual.filter(|page| *page > 0) {
            pagina_atual = page;
        }
        if let Some(total) = registro.total_paginas.filter(|total| *total > 0) {
            total_paginas = total;
        }
        if registro.data_atualizacao.is_some() {
            data_atualizacao = registro.data_atualizacao;
        }
    }

    BookView {
        id: book.id.clone(),
        titulo: book.titulo.clone(),
        autor: book.autor.clone(),
        editora: book.editora.clone(),
        isbn: book.isbn.clone(),
        genero: book.genero.clone(),
        sinopse: book.sinopse.clone(),
        idioma: book.idioma.clone(),
        ano_publicacao: book.ano_publicacao,
        paginas: book.paginas,
        capa: book.capa.clone(),
        status_leitura,
        pagina_atual,
        total_paginas,
        comentario,
        data_atualizacao,
        progress_percent: progress_percent(pagina_atual, total_paginas),
    }
}
