mod backend;
mod ui;

use backend::cache::CacheStats;
use backend::config::GalleryConfig;
use backend::gallery::{FetchPhase, Gallery, GalleryEvent};
use backend::picsum::PicsumClient;
use image::DynamicImage;
use ui::ui::{App, ui};

use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use env_logger::{Builder, Target};
use futures::StreamExt;
use log::LevelFilter;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{error::Error, fs, io, path::PathBuf, sync::Arc};
use tokio::sync::mpsc;

enum BackgroundTask {
    ImageLoaded { page: u32, index: usize, image: Arc<DynamicImage> },
    ImageMissing { page: u32, index: usize },
    CacheCleared { stats: CacheStats },
}

fn log_file_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("picsum-gallery")
        .join("gallery.log")
}

fn init_logger() {
    let mut builder = if std::env::var("RUST_LOG").is_ok() {
        Builder::from_default_env()
    } else {
        let mut builder = Builder::new();
        builder
            .filter_level(LevelFilter::Warn)
            .filter_module("picsum_gallery", LevelFilter::Debug);
        builder
    };

    // Anything written to stderr would land on top of the UI
    let path = log_file_path();
    let file = path
        .parent()
        .map(fs::create_dir_all)
        .transpose()
        .and_then(|_| fs::OpenOptions::new().create(true).append(true).open(&path));
    match file {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.filter_level(LevelFilter::Off);
        }
    }

    let _ = builder.try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logger();

    let client = PicsumClient::new(GalleryConfig::default())?;
    let (gallery, mut gallery_rx) = Gallery::new(client);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();

    app.set_loading("Fetching images from Picsum...");
    terminal.draw(|f| ui(f, &mut app))?;

    gallery.update_images();

    let res = run_app(&mut terminal, &mut app, &gallery, &mut gallery_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{err}");
    }
    Ok(())
}

fn spawn_image_loaders(
    gallery: &Gallery,
    page: u32,
    count: usize,
    tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    for index in 0..count {
        let gallery = gallery.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let task = match gallery.get_image(index).await {
                Some(image) => BackgroundTask::ImageLoaded { page, index, image },
                None => BackgroundTask::ImageMissing { page, index },
            };
            let _ = tx.send(task);
        });
    }
}

fn spawn_memory_pressure(gallery: &Gallery, tx: &mpsc::UnboundedSender<BackgroundTask>) {
    let gallery = gallery.clone();
    let tx = tx.clone();

    tokio::spawn(async move {
        gallery.handle_memory_pressure().await;
        let stats = gallery.cache().stats().await;
        let _ = tx.send(BackgroundTask::CacheCleared { stats });
    });
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    gallery: &Gallery,
    gallery_rx: &mut mpsc::UnboundedReceiver<GalleryEvent>,
) -> io::Result<()> {
    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();
    let mut event_stream = EventStream::new();

    loop {
        app.fetching = match gallery.phase() {
            FetchPhase::Fetching => Some(gallery.page_count().await),
            FetchPhase::Idle => None,
        };
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            // Redraw tick for the spinner and shimmer
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(50)) => {}

            Some(Ok(event)) = event_stream.next() => {
                if let Event::Key(key) = event
                    && key.kind == KeyEventKind::Press
                {
                    if key.code == KeyCode::Char('q') {
                        return Ok(());
                    }
                    handle_input(app, key.code, gallery, &task_tx);
                }
            }

            Some(event) = gallery_rx.recv() => {
                match event {
                    GalleryEvent::DataChanged { page, count } => {
                        log::debug!("Page {} changed, {} images", page, count);
                        // Page label and records must come from the same read
                        let snapshot = gallery.snapshot().await;
                        app.set_records(snapshot.records, snapshot.page);
                        app.status = format!("{} images loaded", app.records.len());
                        spawn_image_loaders(gallery, app.page, app.records.len(), &task_tx);
                    }
                    GalleryEvent::CacheWarmed { page, cached } => {
                        app.status = format!("page {} prefetched ({} images)", page, cached);
                    }
                }
            }

            Some(task) = task_rx.recv() => {
                match task {
                    BackgroundTask::ImageLoaded { page, index, image } => {
                        // Late arrivals from a replaced page are dropped
                        if let Some(id) = app.record_id(page, index) {
                            app.add_image(&id, image);
                        }
                    }
                    BackgroundTask::ImageMissing { page, index } => {
                        if let Some(id) = app.record_id(page, index) {
                            app.mark_missing(&id);
                        }
                    }
                    BackgroundTask::CacheCleared { stats } => {
                        app.status = format!("cache cleared, {}", stats);
                    }
                }
            }
        }
    }
}

fn handle_input(
    app: &mut App,
    key: KeyCode,
    gallery: &Gallery,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match key {
        KeyCode::Char('u') | KeyCode::Char('r') => {
            gallery.update_images();
        }
        KeyCode::Char('c') => {
            spawn_memory_pressure(gallery, task_tx);
        }
        KeyCode::Left => app.move_selection(-1, 0),
        KeyCode::Right => app.move_selection(1, 0),
        KeyCode::Up => app.move_selection(0, -1),
        KeyCode::Down => app.move_selection(0, 1),
        KeyCode::Enter => app.strip_selected_author(),
        KeyCode::Char('s') => app.toggle_shimmer(),
        _ => {}
    }
}
