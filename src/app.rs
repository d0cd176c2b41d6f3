use crate::api::LibraryBackend;
use crate::db::LocalStore;
use crate::error::{BibliotecaError, Result};
use crate::form::{book_options, BookOption, RegistrationForm};
use crate::google_books::{SearchProvider, Volume};
use crate::library::{Confirmation, LibraryView, StatusFilter};
use crate::models::{Book, BookAddedMarker, BookView, RecordId, Registro, SessionUser};
use crate::reconcile::reconcile;
use crate::state::{AppState, ReloadTicket};
use crate::sync::BookAddedNotifier;
use chrono::NaiveDate;
use std::rc::Rc;
use std::sync::Arc;

pub trait Clock {
    fn now_ms(&self) -> i64;
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Owns the screen state (cache, library cards, registration form) and runs
/// every user action against the backend.
pub struct Biblioteca<B: LibraryBackend> {
    backend: B,
    search: Box<dyn SearchProvider>,
    notifier: Box<dyn BookAddedNotifier>,
    store: Rc<LocalStore>,
    clock: Box<dyn Clock>,
    state: AppState,
    library: LibraryView,
    form: RegistrationForm,
    results: Vec<Volume>,
}

impl<B: LibraryBackend> Biblioteca<B> {
    pub fn new(
        backend: B,
        search: Box<dyn SearchProvider>,
        notifier: Box<dyn BookAddedNotifier>,
        store: Rc<LocalStore>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let today = clock.today();
        Biblioteca {
            backend,
            search,
            notifier,
            store,
            clock,
            state: AppState::new(),
            library: LibraryView::new(),
            form: RegistrationForm::new(today),
            results: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn library(&self) -> &LibraryView {
        &self.library
    }

    pub fn form(&self) -> &RegistrationForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut RegistrationForm {
        &mut self.form
    }

    pub fn views(&self) -> Arc<Vec<BookView>> {
        self.state.views()
    }

    pub fn book_options(&self) -> Vec<BookOption> {
        book_options(&self.state.views())
    }

    pub fn results(&self) -> &[Volume] {
        &self.results
    }

    /// Session problems read as "no user"; submission reports them.
    pub fn current_user(&self) -> Option<SessionUser> {
        match self.store.session_user() {
            Ok(user) => user.filter(|user| user.resolved_id().is_some()),
            Err(err) => {
                log::warn!("[app] session unavailable error={}", err);
                None
            }
        }
    }

    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.state.begin_reload()
    }

    /// Books are required; reading records are optional and their failure
    /// only costs the overlay.
    pub fn fetch_views(&self) -> Result<Vec<BookView>> {
        let books = self.backend.list_books()?;
        let registros = match self.backend.list_registros() {
            Ok(registros) => registros,
            Err(err) => {
                log::warn!("[app] registros unavailable, showing books only error={}", err);
                Vec::new()
            }
        };
        let user = self.current_user();
        let user_id = user.as_ref().and_then(SessionUser::resolved_id);
        if user_id.is_none() {
            log::debug!("[app] no session, records are not scoped to a user");
        }
        Ok(reconcile(&books, &registros, user_id))
    }

    /// Commits a finished reload unless a newer one already landed. A failure
    /// is only shown when no newer reload has committed.
    pub fn finish_reload(&mut self, ticket: ReloadTicket, outcome: Result<Vec<BookView>>) -> Result<bool> {
        match outcome {
            Ok(views) => {
                let count = views.len();
                if !self.state.commit(ticket, views) {
                    return Ok(false);
                }
                log::info!("[app] library reloaded books={}", count);
                let views = self.state.views();
                self.library.render(&views);
                Ok(true)
            }
            Err(err) if !self.state.is_current(ticket) => {
                log::warn!("[app] ignoring failed reload superseded by a newer one error={}", err);
                Ok(false)
            }
            Err(err) => {
                log::error!("[app] failed to load books error={}", err);
                self.library.show_error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Refreshes both the library cards and the form's book list.
    pub fn reload(&mut self) -> Result<bool> {
        let ticket = self.begin_reload();
        let outcome = self.fetch_views();
        self.finish_reload(ticket, outcome)
    }

    pub fn apply_filter(&mut self, filter: StatusFilter) -> usize {
        self.library.apply_filter(filter)
    }

    /// Returns false when the user declined. A failed delete leaves the
    /// visible state untouched and skips the reload; a failed reload after a
    /// successful delete is logged and the removal still reports success.
    pub fn remove_book(&mut self, id: &RecordId, confirmation: &dyn Confirmation) -> Result<bool> {
        if !confirmation.confirm("Deseja remover este livro?") {
            return Ok(false);
        }
        if let Err(err) = self.backend.delete_book(id) {
            log::error!("[app] failed to remove book id={} error={}", id, err);
            return Err(err);
        }
        log::info!("[app] book removed id={}", id);
        if let Err(err) = self.reload() {
            log::warn!("[app] reload after removal failed error={}", err);
        }
        Ok(true)
    }

    pub fn select_book(&mut self, id: &RecordId) -> bool {
        let views = self.state.views();
        let today = self.clock.today();
        self.form.select_book(id, &views, today)
    }

    pub fn progress_input(&mut self, current_page: Option<i32>, total_pages: Option<i32>) -> u8 {
        self.form.on_progress_input(current_page, total_pages)
    }

    /// On failure the form keeps the user's input.
    pub fn submit_registration(&mut self) -> Result<Registro> {
        let user = self.current_user();
        let payload = self.form.build_payload(user.as_ref())?;
        let saved = match self.backend.upsert_registro(&payload) {
            Ok(saved) => saved,
            Err(err) => {
                log::error!(
                    "[app] failed to save registro book={} error={}",
                    payload.livro_id,
                    err
                );
                return Err(err);
            }
        };
        log::info!(
            "[app] registro saved book={} status={}",
            payload.livro_id,
            payload.status_leitura
        );
        self.form.reset(self.clock.today());
        if let Err(err) = self.reload() {
            log::warn!("[app] reload after save failed error={}", err);
        }
        Ok(saved)
    }

    pub fn search(&mut self, query: &str) -> Result<&[Volume]> {
        self.results = self.search.search(query)?;
        Ok(&self.results)
    }

    pub fn add_result(&mut self, index: usize) -> Result<Book> {
        let volume = self
            .results
            .get(index)
            .cloned()
            .ok_or(BibliotecaError::NoSuchResult { index })?;
        self.add_from_search(&volume)
    }

    /// Creates the book and leaves a marker so other screens refresh.
    pub fn add_from_search(&mut self, volume: &Volume) -> Result<Book> {
        let now = self.clock.now_ms();
        let created = self.backend.create_book(&volume.to_new_book(now))?;
        let marker = BookAddedMarker {
            id: created.id.clone(),
            titulo: created.titulo.clone(),
            timestamp: now,
        };
        if let Err(err) = self.notifier.publish(&marker) {
            log::warn!("[app] could not publish book-added marker error={}", err);
        }
        Ok(created)
    }

    /// One tick of the cross-screen sync. Returns true when it reloaded.
    pub fn poll_sync(&mut self) -> Result<bool> {
        let now = self.clock.now_ms();
        if self.notifier.take_fresh(now)?.is_none() {
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Biblioteca, Clock};
    use crate::api::LibraryBackend;
    use crate::db::{LocalStore, BOOK_ADDED_KEY};
    use crate::error::{BibliotecaError, Result};
    use crate::google_books::{SearchProvider, Volume};
    use crate::library::{Confirmation, Placeholder, StatusFilter};
    use crate::models::{
        Book, BookAddedMarker, NewBook, ReadingStatus, RecordId, Registro, RegistroPayload, SessionUser,
    };
    use crate::sync::{StorageNotifier, DEFAULT_FRESHNESS_MS};
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub books: RefCell<Vec<Book>>,
        pub registros: RefCell<Vec<Registro>>,
        pub payloads: RefCell<Vec<RegistroPayload>>,
        pub created: RefCell<Vec<NewBook>>,
        pub fail_books: Cell<bool>,
        pub fail_registros: Cell<bool>,
        pub fail_writes: Cell<bool>,
        pub calls: Cell<usize>,
    }

    impl FakeBackend {
        fn outage() -> BibliotecaError {
            BibliotecaError::NetworkFailure {
                message: "offline".to_string(),
            }
        }

        fn touch(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    impl LibraryBackend for FakeBackend {
        fn list_books(&self) -> Result<Vec<Book>> {
            self.touch();
            if self.fail_books.get() {
                return Err(Self::outage());
            }
            Ok(self.books.borrow().clone())
        }

        fn create_book(&self, book: &NewBook) -> Result<Book> {
            self.touch();
            if self.fail_writes.get() {
                return Err(Self::outage());
            }
            self.created.borrow_mut().push(book.clone());
            let created = Book {
                id: RecordId::from(100 + self.created.borrow().len() as i64),
                titulo: book.titulo.clone(),
                autor: book.autor.clone(),
                paginas: book.paginas,
                ..Book::default()
            };
            self.books.borrow_mut().push(created.clone());
            Ok(created)
        }

        fn delete_book(&self, id: &RecordId) -> Result<()> {
            self.touch();
            if self.fail_writes.get() {
                return Err(Self::outage());
            }
            self.books.borrow_mut().retain(|book| &book.id != id);
            Ok(())
        }

        fn list_registros(&self) -> Result<Vec<Registro>> {
            self.touch();
            if self.fail_registros.get() {
                return Err(BibliotecaError::MalformedResponse {
                    message: "expected array".to_string(),
                });
            }
            Ok(self.registros.borrow().clone())
        }

        fn upsert_registro(&self, payload: &RegistroPayload) -> Result<Registro> {
            self.touch();
            if self.fail_writes.get() {
                return Err(Self::outage());
            }
            self.payloads.borrow_mut().push(payload.clone());
            let saved = Registro {
                id: None,
                livro_id: payload.livro_id.clone(),
                usuario_id: Some(payload.usuario_id.clone()),
                status_leitura: Some(payload.status_leitura.clone()),
                pagina_atual: Some(payload.pagina_atual),
                total_paginas: Some(payload.total_paginas),
                comentario: Some(payload.comentario.clone()),
                data_atualizacao: crate::models::parse_wire_date(&payload.data_atualizacao),
            };
            let mut registros = self.registros.borrow_mut();
            registros.retain(|existing| {
                !(existing.livro_id == saved.livro_id && existing.usuario_id == saved.usuario_id)
            });
            registros.push(saved.clone());
            Ok(saved)
        }
    }

    struct NoSearch;

    impl SearchProvider for NoSearch {
        fn search(&self, _query: &str) -> Result<Vec<Volume>> {
            Ok(vec![Volume {
                title: Some("Emma".to_string()),
                authors: vec!["Jane Austen".to_string()],
                page_count: Some(474),
                ..Volume::default()
            }])
        }
    }

    struct FixedClock(Rc<Cell<i64>>);

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0.get()
        }

        fn today(&self) -> NaiveDate {
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        }
    }

    struct Answer(bool);

    impl Confirmation for Answer {
        fn confirm(&self, _prompt: &str) -> bool {
            self.0
        }
    }

    fn dune() -> Book {
        Book {
            id: RecordId::from(1),
            titulo: "Dune".to_string(),
            autor: "Frank Herbert".to_string(),
            paginas: 400,
            ..Book::default()
        }
    }

    fn app_with(backend: FakeBackend) -> (Biblioteca<FakeBackend>, Rc<LocalStore>, Rc<Cell<i64>>) {
        let store = Rc::new(LocalStore::open_in_memory().expect("store"));
        let now = Rc::new(Cell::new(1_000_000));
        let app = Biblioteca::new(
            backend,
            Box::new(NoSearch),
            Box::new(StorageNotifier::new(Rc::clone(&store), DEFAULT_FRESHNESS_MS)),
            Rc::clone(&store),
            Box::new(FixedClock(Rc::clone(&now))),
        );
        (app, store, now)
    }

    fn logged_in(store: &LocalStore, id: i64) {
        store
            .set_session_user(&SessionUser::with_id(RecordId::from(id)))
            .unwrap();
    }

    #[test]
    fn reload_merges_the_session_users_registro() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        backend.registros.borrow_mut().push(Registro {
            livro_id: RecordId::from(1),
            usuario_id: Some(RecordId::from(7)),
            pagina_atual: Some(200),
            total_paginas: Some(400),
            status_leitura: Some("LENDO".to_string()),
            ..Registro::default()
        });
        let (mut app, store, _) = app_with(backend);
        logged_in(&store, 7);

        assert!(app.reload().unwrap());
        let views = app.views();
        assert_eq!(views[0].status_leitura, ReadingStatus::Lendo);
        assert_eq!(views[0].progress_percent, 50);
        assert_eq!(app.book_options()[0].label, "Dune - Frank Herbert");
    }

    #[test]
    fn registro_failure_degrades_to_books_only() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        backend.fail_registros.set(true);
        let (mut app, _, _) = app_with(backend);

        assert!(app.reload().unwrap());
        assert_eq!(app.views()[0].status_leitura, ReadingStatus::QueroLer);
        assert_eq!(app.library().cards().len(), 1);
    }

    #[test]
    fn book_failure_shows_an_error_placeholder() {
        let backend = FakeBackend::default();
        backend.fail_books.set(true);
        let (mut app, _, _) = app_with(backend);

        let err = app.reload().unwrap_err();
        assert!(err.is_network_failure());
        assert!(matches!(app.library().placeholder(), Some(Placeholder::LoadError(_))));
    }

    #[test]
    fn stale_reload_does_not_overwrite_a_newer_one() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, _, _) = app_with(backend);

        let manual = app.begin_reload();
        let manual_result = app.fetch_views();
        app.backend().books.borrow_mut().clear();
        let polling = app.begin_reload();
        let polling_result = app.fetch_views();

        assert!(app.finish_reload(polling, polling_result).unwrap());
        assert!(!app.finish_reload(manual, manual_result).unwrap());
        assert!(app.views().is_empty());
    }

    #[test]
    fn superseded_failed_reload_keeps_the_newer_cards() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        backend.fail_books.set(true);
        let (mut app, _, _) = app_with(backend);

        let manual = app.begin_reload();
        let manual_result = app.fetch_views();
        app.backend().fail_books.set(false);
        let polling = app.begin_reload();
        let polling_result = app.fetch_views();

        assert!(app.finish_reload(polling, polling_result).unwrap());
        assert!(!app.finish_reload(manual, manual_result).unwrap());
        assert_eq!(app.views().len(), 1);
        assert_eq!(app.library().cards().len(), 1);
        assert_eq!(app.library().placeholder(), None);
    }

    #[test]
    fn submit_without_session_makes_no_network_call() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, _, _) = app_with(backend);
        app.reload().unwrap();
        app.select_book(&RecordId::from(1));
        let calls_before = app.backend().calls.get();

        let err = app.submit_registration().unwrap_err();
        assert!(matches!(err, BibliotecaError::MissingUser));
        assert_eq!(app.backend().calls.get(), calls_before);
    }

    #[test]
    fn submit_without_selection_fails_fast() {
        let (mut app, store, _) = app_with(FakeBackend::default());
        logged_in(&store, 7);
        assert!(matches!(
            app.submit_registration(),
            Err(BibliotecaError::MissingSelection)
        ));
        assert_eq!(app.backend().calls.get(), 0);
    }

    #[test]
    fn successful_submit_resets_form_and_reloads() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, store, _) = app_with(backend);
        logged_in(&store, 7);
        app.reload().unwrap();

        assert!(app.select_book(&RecordId::from(1)));
        app.form_mut().status = ReadingStatus::Lendo;
        assert_eq!(app.progress_input(Some(100), None), 25);
        app.submit_registration().unwrap();

        let payload = app.backend().payloads.borrow()[0].clone();
        assert_eq!(payload.status_leitura, "LENDO");
        assert_eq!(payload.data_atualizacao, "2026-10-19T00:00:00.000Z");
        assert!(app.form().selected().is_none());
        assert_eq!(app.form().progress_percent(), 0);
        assert_eq!(app.views()[0].pagina_atual, 100);
        assert_eq!(app.views()[0].status_leitura, ReadingStatus::Lendo);
    }

    #[test]
    fn second_submit_updates_instead_of_duplicating() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, store, _) = app_with(backend);
        logged_in(&store, 7);
        app.reload().unwrap();

        for page in [50, 120] {
            app.select_book(&RecordId::from(1));
            app.progress_input(Some(page), None);
            app.submit_registration().unwrap();
        }
        assert_eq!(app.backend().registros.borrow().len(), 1);
        assert_eq!(app.views()[0].pagina_atual, 120);
    }

    #[test]
    fn failed_submit_keeps_the_users_input() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, store, _) = app_with(backend);
        logged_in(&store, 7);
        app.reload().unwrap();
        app.select_book(&RecordId::from(1));
        app.progress_input(Some(321), None);
        app.form_mut().comment = "quase lá".to_string();
        app.backend().fail_writes.set(true);

        let before = app.form().clone();
        assert!(app.submit_registration().unwrap_err().is_network_failure());
        assert_eq!(app.form(), &before);
    }

    #[test]
    fn declined_removal_does_nothing() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, _, _) = app_with(backend);
        app.reload().unwrap();
        let calls_before = app.backend().calls.get();

        assert!(!app.remove_book(&RecordId::from(1), &Answer(false)).unwrap());
        assert_eq!(app.backend().calls.get(), calls_before);
    }

    #[test]
    fn confirmed_removal_deletes_and_reloads() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, _, _) = app_with(backend);
        app.reload().unwrap();

        assert!(app.remove_book(&RecordId::from(1), &Answer(true)).unwrap());
        assert!(app.views().is_empty());
        assert_eq!(app.library().placeholder(), Some(&Placeholder::EmptyLibrary));
    }

    #[test]
    fn removal_succeeds_even_if_the_following_reload_fails() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, _, _) = app_with(backend);
        app.reload().unwrap();
        app.backend().fail_books.set(true);

        assert!(app.remove_book(&RecordId::from(1), &Answer(true)).unwrap());
        assert!(app.backend().books.borrow().is_empty());
        assert!(matches!(app.library().placeholder(), Some(Placeholder::LoadError(_))));
    }

    #[test]
    fn failed_removal_keeps_visible_state_and_skips_reload() {
        let backend = FakeBackend::default();
        backend.books.borrow_mut().push(dune());
        let (mut app, _, _) = app_with(backend);
        app.reload().unwrap();
        app.apply_filter(StatusFilter::All);
        app.backend().fail_writes.set(true);
        let calls_before = app.backend().calls.get();

        assert!(app.remove_book(&RecordId::from(1), &Answer(true)).is_err());
        assert_eq!(app.backend().calls.get(), calls_before + 1);
        assert_eq!(app.library().cards().len(), 1);
    }

    #[test]
    fn adding_a_result_leaves_a_marker_that_triggers_one_reload() {
        let (mut app, store, now) = app_with(FakeBackend::default());
        app.search("emma").unwrap();
        let created = app.add_result(0).unwrap();
        assert_eq!(created.titulo, "Emma");
        assert!(store.get_raw(BOOK_ADDED_KEY).unwrap().is_some());

        now.set(now.get() + 3_000);
        assert!(app.poll_sync().unwrap());
        assert_eq!(app.views().len(), 1);
        assert!(!app.poll_sync().unwrap());
    }

    #[test]
    fn stale_marker_does_not_reload_and_is_cleared() {
        let (mut app, store, now) = app_with(FakeBackend::default());
        store
            .set_json(
                BOOK_ADDED_KEY,
                &BookAddedMarker {
                    id: RecordId::from(1),
                    titulo: "Dune".to_string(),
                    timestamp: now.get() - 6_000,
                },
            )
            .unwrap();

        assert!(!app.poll_sync().unwrap());
        assert_eq!(app.backend().calls.get(), 0);
        assert!(store.get_raw(BOOK_ADDED_KEY).unwrap().is_none());
    }

    #[test]
    fn adding_an_unknown_result_index_fails() {
        let (mut app, _, _) = app_with(FakeBackend::default());
        assert!(matches!(
            app.add_result(3),
            Err(BibliotecaError::NoSuchResult { index: 3 })
        ));
    }
}
