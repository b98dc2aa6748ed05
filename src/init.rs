//! Project scaffolding for concertina
//!
//! `concertina init` writes a starter collection file and a commented
//! config template into the current directory.

use colored::Colorize;
use std::fs;
use std::path::Path;

/// Templates embedded at compile time
const SAMPLE_COLLECTION: &str = r#"{
  "type": "faq",
  "items": [
    {
      "title": "What is concertina?",
      "body": "<p>A collapsible content engine: items, animated open/close state, and URL-fragment sync.</p>"
    },
    {
      "title": "How do items get their ids?",
      "subtitle": "stable anchors",
      "body": "<p>Titles are slugified; duplicates get <code>-1</code>, <code>-2</code>, ... suffixes.</p>"
    },
    {
      "title": "Can the open item live in the URL?",
      "body": "<p>Yes. Enable url-sync and the open item id becomes the fragment, both directions.</p>"
    }
  ]
}
"#;

const CONFIG_TEMPLATE: &str = r#"# concertina configuration
#
# Copy this file to ~/.config/concertina/config.toml to apply it to every
# instance. Per-instance attributes (data-mode, data-initial-open, ...)
# override these values.

[accordion]
# mode = "single"            # or "multiple"
# initial-open = "first"     # false, "first", "all", a 1-based index, or an item id
# limit = false              # false for unlimited, or a maximum item count
# icon-style = "plus"        # "plus", "arrow", or a custom style token
# icon-placement = "right"   # "left" or "right"
# url-sync = false           # reflect the open item in the URL fragment
# title-alignment = "left"   # "left", "center", or "right"

# [accordion.dividers]
# enabled = true
# show-first = true
# show-last = true
"#;

/// Write the starter files, skipping anything that already exists.
pub fn init_project() -> anyhow::Result<()> {
    write_if_missing(Path::new("concertina-items.json"), SAMPLE_COLLECTION)?;
    write_if_missing(Path::new("config.example.toml"), CONFIG_TEMPLATE)?;

    println!();
    println!("Try it:");
    println!("  {} items concertina-items.json", "concertina".cyan());
    println!("  {} preview concertina-items.json", "concertina".cyan());
    Ok(())
}

fn write_if_missing(path: &Path, contents: &str) -> anyhow::Result<()> {
    if path.exists() {
        println!("{} {} (already exists)", "Skipped".yellow(), path.display());
        return Ok(());
    }
    fs::write(path, contents)?;
    println!("{} {}", "Created".green(), path.display());
    Ok(())
}
