use crate::api::{LibraryBackend, RemoteLibrary};
use crate::app::{Biblioteca, SystemClock};
use crate::config::Config;
use crate::db::LocalStore;
use crate::error::BibliotecaError;
use crate::google_books::{GoogleBooks, Volume};
use crate::library::{Confirmation, StatusFilter};
use crate::models::{ReadingStatus, RecordId, SessionUser};
use crate::sync::StorageNotifier;
use chrono::NaiveDate;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

#[derive(clap::Parser, Debug)]
#[command(version, about = "Minha Biblioteca: acompanhe suas leituras")]
pub struct Flags {
    /// Configuration file (defaults to the user config dir)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the backend base URL
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Mirror log output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Search Google Books
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Show the details of one search result
    Details {
        #[arg(required = true)]
        query: Vec<String>,
        /// 1-based position in the result list
        #[arg(short, long, default_value_t = 1)]
        index: usize,
    },
    /// Add one search result to the library
    Add {
        #[arg(required = true)]
        query: Vec<String>,
        /// 1-based position in the result list
        #[arg(short, long, default_value_t = 1)]
        index: usize,
    },
    /// List the library, optionally filtered by reading status
    List {
        #[arg(short, long, default_value = "all")]
        filter: StatusFilter,
    },
    /// Remove a book from the library
    Remove {
        id: RecordId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Record reading progress for a book
    Register {
        #[arg(long, value_name = "ID")]
        book: RecordId,
        #[arg(long, value_name = "PAGE")]
        current: Option<i32>,
        #[arg(long, value_name = "PAGES")]
        total: Option<i32>,
        #[arg(long)]
        status: Option<ReadingStatus>,
        #[arg(long)]
        comment: Option<String>,
        /// Reading date, YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Store the logged-in user
    Login {
        user_id: RecordId,
        #[arg(long)]
        nome: Option<String>,
    },
    /// Forget the logged-in user
    Logout,
    /// Keep the library on screen and refresh when a book is added elsewhere
    Watch,
}

struct PromptConfirmation {
    assume_yes: bool,
}

impl Confirmation for PromptConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

fn build_app(config: &Config, store: Rc<LocalStore>) -> anyhow::Result<Biblioteca<RemoteLibrary>> {
    let backend = RemoteLibrary::new(&config.api_base_url, config.http_timeout_secs)?;
    let search = GoogleBooks::new(
        &config.search_url,
        config.search_max_results,
        config.http_timeout_secs,
    )?;
    let notifier = StorageNotifier::new(Rc::clone(&store), config.marker_freshness_ms);
    Ok(Biblioteca::new(
        backend,
        Box::new(search),
        Box::new(notifier),
        store,
        Box::new(SystemClock),
    ))
}

pub fn run_command(flags: Flags, mut config: Config) -> anyhow::Result<()> {
    if let Some(api_url) = flags.api_url {
        config.api_base_url = api_url;
    }
    let store = Rc::new(LocalStore::open(&config.storage_path()?)?);

    match flags.command {
        Command::Login { user_id, nome } => {
            let user = SessionUser {
                nome,
                ..SessionUser::with_id(user_id.clone())
            };
            store.set_session_user(&user)?;
            println!("{} Sessão iniciada para o usuário {}", style("✔").green(), user_id);
        }
        Command::Logout => {
            store.clear_session_user()?;
            println!("{} Sessão encerrada", style("✔").green());
        }
        Command::Search { query } => {
            let mut app = build_app(&config, store)?;
            let volumes = app.search(&query.join(" "))?;
            print_results(volumes);
        }
        Command::Details { query, index } => {
            let mut app = build_app(&config, store)?;
            app.search(&query.join(" "))?;
            let volume = result_at(app.results(), index)?;
            print_details(volume);
        }
        Command::Add { query, index } => {
            let mut app = build_app(&config, store)?;
            app.search(&query.join(" "))?;
            result_at(app.results(), index)?;
            let created = app.add_result(index - 1)?;
            println!(
                "{} Livro \"{}\" adicionado com sucesso!",
                style("✔").green(),
                created.titulo
            );
        }
        Command::List { filter } => {
            let mut app = build_app(&config, store)?;
            app.reload()?;
            app.apply_filter(filter);
            print_library(&app);
        }
        Command::Remove { id, yes } => {
            let mut app = build_app(&config, store)?;
            app.reload()?;
            let confirmation = PromptConfirmation { assume_yes: yes };
            if app.remove_book(&id, &confirmation)? {
                println!("{} Livro removido", style("✔").green());
                print_library(&app);
            }
        }
        Command::Register {
            book,
            current,
            total,
            status,
            comment,
            date,
        } => {
            let mut app = build_app(&config, store)?;
            register(&mut app, &book, current, total, status, comment, date)?;
        }
        Command::Watch => {
            let mut app = build_app(&config, store)?;
            watch(&mut app, config.poll_interval_ms)?;
        }
    }
    Ok(())
}

fn register<B: LibraryBackend>(
    app: &mut Biblioteca<B>,
    book: &RecordId,
    current: Option<i32>,
    total: Option<i32>,
    status: Option<ReadingStatus>,
    comment: Option<String>,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    app.reload()?;
    if !app.select_book(book) {
        return Err(BibliotecaError::BookNotFound {
            id: book.to_string(),
        }
        .into());
    }
    if let Some(status) = status {
        app.form_mut().status = status;
    }
    if let Some(comment) = comment {
        app.form_mut().comment = comment;
    }
    if let Some(date) = date {
        app.form_mut().date = date;
    }
    let progress = app.progress_input(current, total);
    let form = app.form();
    println!(
        "Progresso: {}/{} páginas ({}%) - {}",
        form.current_page,
        form.total_pages,
        progress,
        form.status.label()
    );
    app.submit_registration()?;
    println!("{} Leitura registrada com sucesso!", style("✔").green());
    print_library(app);
    Ok(())
}

fn watch<B: LibraryBackend>(app: &mut Biblioteca<B>, interval_ms: u64) -> anyhow::Result<()> {
    app.reload()?;
    print_library(app);
    loop {
        std::thread::sleep(Duration::from_millis(interval_ms));
        match app.poll_sync() {
            Ok(true) => {
                println!("{}", style("Biblioteca atualizada").dim());
                print_library(app);
            }
            Ok(false) => {}
            Err(err) => eprintln!("{} {}", style("✘").red(), err),
        }
    }
}

fn result_at(results: &[Volume], index: usize) -> anyhow::Result<&Volume> {
    if results.is_empty() {
        anyhow::bail!("Nenhum livro encontrado. Tente usar outros termos de busca.");
    }
    index
        .checked_sub(1)
        .and_then(|position| results.get(position))
        .ok_or_else(|| BibliotecaError::NoSuchResult { index }.into())
}

fn print_results(volumes: &[Volume]) {
    if volumes.is_empty() {
        println!(
            "{} Nenhum livro encontrado. Tente usar outros termos de busca.",
            style("✘").red()
        );
        return;
    }
    for (position, volume) in volumes.iter().enumerate() {
        println!(
            "{:2}. {} - {} (Publicado: {})",
            position + 1,
            style(volume.display_title()).bold(),
            volume.display_authors(),
            volume.display_published()
        );
    }
}

fn print_details(volume: &Volume) {
    println!("{}", style(volume.display_title()).bold());
    println!("Por: {}", volume.display_authors());
    println!(
        "{} | {} | {} páginas | {}",
        volume.published_date.as_deref().unwrap_or("0000"),
        volume.publisher.as_deref().unwrap_or("Editora desconhecida"),
        volume.page_count.unwrap_or(0),
        volume.display_rating()
    );
    println!("Categorias: {}", volume.display_categories());
    println!("Capa: {}", style(volume.display_thumbnail()).underlined().blue());
    println!();
    println!("{}", volume.display_description());
}

fn print_library<B: LibraryBackend>(app: &Biblioteca<B>) {
    let library = app.library();
    println!(
        "{}",
        style(format!("Minha Biblioteca (filtro: {})", library.filter())).bold()
    );
    for line in library.lines() {
        println!("{}", line);
    }
}
