use taskboard::config::StoreConfig;

/// Journal logger that lets this crate through at info/debug (per config)
/// and everything else at warn.
struct FilteredJournal {
    inner: systemd_journal_logger::JournalLog,
}

impl log::Log for FilteredJournal {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        if metadata.target().starts_with("taskboard") || metadata.target().starts_with("store_check") {
            let max = if taskboard::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            metadata.level() <= max
        } else {
            metadata.level() <= log::LevelFilter::Warn
        }
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(StoreConfig::default_path);
    let config = StoreConfig::load(&config_path);

    // Logs go to the user journal (`journalctl --user -t taskboard-store-check -f`).
    let journal = systemd_journal_logger::JournalLog::new()?
        .with_syslog_identifier("taskboard-store-check".to_string());
    taskboard::set_debug_logging(config.debug_logging);
    log::set_boxed_logger(Box::new(FilteredJournal { inner: journal }))?;
    log::set_max_level(log::LevelFilter::Debug);

    println!("=== Project store check ===\n");
    println!("Config: {}", config_path.display());
    println!("Slot:   {}\n", config.slot_path().display());

    if !config.slot_path().exists() {
        println!("No saved projects yet.");
        return Ok(());
    }

    let store = config.open_store();
    println!("Projects: {} (next id {})\n", store.len(), store.next_id());

    let today = chrono::Local::now().date_naive();
    let mut overdue = Vec::new();
    let mut due_today = Vec::new();

    for project in store.list() {
        let (done, total) = project.completion_ratio();
        println!("  [{}] {} ({}/{} done)", project.id, project.title, done, total);
        for task in &project.tasks {
            if task.is_overdue(today) {
                overdue.push((project.title.clone(), task.text.clone()));
            } else if !task.completed && task.is_due_on(today) {
                due_today.push((project.title.clone(), task.text.clone()));
            }
        }
    }

    if !due_today.is_empty() {
        println!("\n  DUE TODAY ({}):", due_today.len());
        for (project, text) in &due_today {
            println!("    {}: {}", project, text);
        }
    }

    if !overdue.is_empty() {
        println!("\n  OVERDUE ({}):", overdue.len());
        for (project, text) in &overdue {
            println!("    {}: {}", project, text);
        }
    }

    println!("\n=== Done ===");
    Ok(())
}
