use nlx_importer::{inspect, FileKind, Session};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <session_directory>", args[0]);
        std::process::exit(1);
    }

    let dir = PathBuf::from(&args[1]);
    println!("Loading session from: {}", dir.display());

    let mut files: Vec<PathBuf> = match fs::read_dir(&dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(e) => {
            eprintln!("✗ Cannot read directory: {}", e);
            std::process::exit(1);
        }
    };
    files.sort();

    // Summaries of every Neuralynx file, including spike files
    for path in &files {
        if let Ok(summary) = inspect(path) {
            println!(
                "  {} [{}]: {} records{}",
                path.display(),
                summary.kind,
                summary.record_count.records,
                if summary.record_count.has_partial() {
                    " (+partial)"
                } else {
                    ""
                }
            );
        }
    }

    let session = match Session::open(dir.join("Events.nev")) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("\n✗ Error loading events: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n{} events", session.events().len());
    let exposures = session.exposures();
    println!("Exposures: {}", exposures.join(", "));

    let channels = files
        .iter()
        .filter(|p| FileKind::from_path(p).ok() == Some(FileKind::Continuous));

    for result in session.load_channels(channels) {
        match result {
            Ok(channel) => {
                println!(
                    "\n✓ {} ({} Hz, {:.2} seconds, {} gaps)",
                    channel.path().display(),
                    channel.sampling_rate(),
                    channel.duration(),
                    channel.gaps().len()
                );
                for exposure in &exposures {
                    if let Some(window) = session.exposure_window(&channel, exposure) {
                        println!("    {}: samples {}..{}", exposure, window.start, window.end);
                    }
                }
            }
            Err(e) => eprintln!("\n✗ {}", e),
        }
    }
}
