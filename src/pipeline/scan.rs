//! Parallel source scanning
//!
//! PHP files are parsed on a rayon pool into [`FileOutline`]s. Results come
//! back in input (locator) order regardless of worker interleaving, so the
//! raw edges built from them are deterministic.

use super::discover::DiscoveredFile;
use crate::cache::OutlineCache;
use crate::errors::{Extraction, Warning};
use crate::parsers::{parse_bytes, FileOutline};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(super) fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .expect("valid template")
        .progress_chars("█▓▒░  ")
}

enum Parsed {
    Outline(FileOutline),
    Failed(Warning),
}

/// Parse `files`, consulting `cache` when given.
///
/// A file that cannot be read or parsed is omitted with a `parse_failure`
/// warning.
pub fn scan_sources(
    files: &[DiscoveredFile],
    cache: Option<&OutlineCache>,
    multi: &MultiProgress,
) -> Extraction<Vec<FileOutline>> {
    let parse_bar = multi.add(ProgressBar::new(files.len() as u64));
    parse_bar.set_style(create_bar_style());
    parse_bar.set_message("Parsing PHP sources...");

    let counter = AtomicUsize::new(0);
    let parsed: Vec<Parsed> = files
        .par_iter()
        .map(|file| {
            let count = counter.fetch_add(1, Ordering::Relaxed);
            if count % 100 == 0 {
                parse_bar.set_position(count as u64);
            }
            parse_one(file, cache)
        })
        .collect();

    let mut out = Extraction::new(Vec::with_capacity(parsed.len()));
    for result in parsed {
        match result {
            Parsed::Outline(outline) => out.value.push(outline),
            Parsed::Failed(warning) => out.warn(warning),
        }
    }

    let types: usize = out.value.iter().map(|o| o.types.len()).sum();
    let cached = cache
        .map(|c| c.stats().hits)
        .filter(|hits| *hits > 0)
        .map(|hits| format!(" ({} cached)", hits))
        .unwrap_or_default();
    parse_bar.finish_with_message(format!(
        "{}Parsed {} files ({} types){}",
        style("✓ ").green(),
        style(out.value.len()).cyan(),
        style(types).cyan(),
        style(cached).dim(),
    ));
    out
}

fn parse_one(file: &DiscoveredFile, cache: Option<&OutlineCache>) -> Parsed {
    let bytes = match std::fs::read(&file.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Parsed::Failed(Warning::parse_failure(
                file.locator.clone(),
                format!("cannot read file: {}", e),
            ))
        }
    };

    let key = OutlineCache::key(&file.locator, &bytes);
    if let Some(outline) = cache.and_then(|c| c.get(key)) {
        return Parsed::Outline(outline);
    }

    match parse_bytes(&bytes, &file.locator) {
        Ok(outline) => {
            if let Some(cache) = cache {
                cache.insert(key, outline.clone());
            }
            Parsed::Outline(outline)
        }
        Err(e) => Parsed::Failed(Warning::parse_failure(file.locator.clone(), format!("{:#}", e))),
    }
}
