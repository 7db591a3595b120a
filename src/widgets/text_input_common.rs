use color_eyre::Result;
use std::fs;
use std::io::{BufRead, BufReader, Write};

use crate::cache::CacheManager;

/// Shared history persistence for text input widgets
/// Load history from a cache file
pub fn load_history_impl(cache: &CacheManager, history_id: &str) -> Result<Vec<String>> {
    let history_file = cache.cache_file(&format!("{}_history.txt", history_id));

    if !history_file.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(&history_file)?;
    let reader = BufReader::new(file);
    let mut history = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            history.push(line);
        }
    }

    Ok(history)
}

/// Save history to a cache file, keeping the most recent `limit` entries
pub fn save_history_impl(
    cache: &CacheManager,
    history_id: &str,
    history: &[String],
    limit: usize,
) -> Result<()> {
    cache.ensure_cache_dir()?;
    let history_file = cache.cache_file(&format!("{}_history.txt", history_id));

    let mut file = fs::File::create(&history_file)?;
    if let Err(e) = fs2::FileExt::try_lock_exclusive(&file) {
        eprintln!("Warning: Could not lock history file: {}", e);
    }

    let start = history.len().saturating_sub(limit);
    for entry in history.iter().skip(start) {
        writeln!(file, "{}", entry)?;
    }

    Ok(())
}

/// Add entry to history with deduplication
/// Only consecutive duplicate entries are skipped
pub fn add_to_history(history: &mut Vec<String>, entry: String) {
    if let Some(last) = history.last() {
        if last == &entry {
            return;
        }
    }
    history.push(entry);
}
