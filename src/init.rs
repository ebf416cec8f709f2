//! Project initialization for slidetags
//!
//! `slidetags init` creates the config, a sample slide catalog and keeps the
//! local cache (which holds the gist token) out of git.

use crate::config::STATE_DIR;
use colored::Colorize;
use std::fs;
use std::path::Path;

/// Written to .slidetags/config.toml
const CONFIG_TOML: &str = r#"# slidetags configuration

[site]
# Heading of the generated index page
title = "Slide Presentations"
description = ""
# Slide catalog, relative to the project root
slides_file = "slides.toml"
# Where `slidetags build` writes index.html
out_dir = "dist"
# repository_url = "https://github.com/<user>/<repo>"

[sync]
# Quiet period (ms) before edits are written to the cache and the gist
debounce_ms = 1500
# Timeout (s) for each GitHub API request
timeout_secs = 10
api_base = "https://api.github.com"
# File name inside the gist
filename = "slidetags-tags.json"
description = "Slide Tags - Tag Management Data"
# Newly created gists are secret unless this is true
public = false
"#;

/// Sample catalog, written only when none exists
const SLIDES_TOML: &str = r#"# One [[slide]] per deck. `name` is the deck directory and URL segment
# (lowercase letters, numbers and hyphens) and the id tags attach to.

[[slide]]
name = "getting-started"
title = "Getting Started"
description = "A first deck"
date = "2025-01-01"
author = ""
category = "general"
"#;

const GITIGNORE_ENTRY: &str = ".slidetags/local/";

/// Initialize slidetags in the current directory
pub fn init_project() -> Result<(), String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Could not get current directory: {}", e))?;
    init_project_in(&cwd)
}

/// Initialize slidetags in `root`; safe to run again
pub fn init_project_in(root: &Path) -> Result<(), String> {
    println!("\n{}", "Initializing slidetags...".cyan().bold());
    println!("   Directory: {}\n", root.display());

    let state_dir = root.join(STATE_DIR);
    create_dir_if_missing(&state_dir)?;
    create_dir_if_missing(&state_dir.join("local"))?;

    write_file_if_missing(
        &state_dir.join("config.toml"),
        CONFIG_TOML,
        ".slidetags/config.toml",
    )?;
    write_file_if_missing(&root.join("slides.toml"), SLIDES_TOML, "slides.toml")?;
    add_to_gitignore(root)?;

    println!("\n{}", "slidetags initialized!".green().bold());
    println!("\nNext steps:");
    println!("  1. List your decks in {}", "slides.toml".cyan());
    println!("  2. Run {} to write the index page", "slidetags build".cyan());
    println!(
        "  3. Run {} to sync tags to a gist",
        "slidetags gist configure --token <TOKEN>".cyan()
    );
    println!("  4. Run {} to tag slides in the browser", "slidetags serve".cyan());
    println!();

    Ok(())
}

fn create_dir_if_missing(path: &Path) -> Result<(), String> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| format!("Could not create {}: {}", path.display(), e))?;
        println!("   {} {}", "Creating".green(), path.display());
    }
    Ok(())
}

fn write_file_if_missing(path: &Path, content: &str, display_name: &str) -> Result<(), String> {
    if path.exists() {
        println!("   {} {} (already exists)", "Skipping".yellow(), display_name);
    } else {
        fs::write(path, content)
            .map_err(|e| format!("Could not write {}: {}", display_name, e))?;
        println!("   {} {}", "Creating".green(), display_name);
    }
    Ok(())
}

fn add_to_gitignore(root: &Path) -> Result<(), String> {
    let gitignore_path = root.join(".gitignore");

    if gitignore_path.exists() {
        let existing = fs::read_to_string(&gitignore_path)
            .map_err(|e| format!("Could not read .gitignore: {}", e))?;

        let covered = [GITIGNORE_ENTRY, ".slidetags/local", ".slidetags/", ".slidetags"];
        if existing.lines().any(|line| covered.contains(&line.trim())) {
            return Ok(());
        }

        let new_content = format!(
            "{}\n\n# slidetags local cache (holds the gist token)\n{}\n",
            existing.trim_end(),
            GITIGNORE_ENTRY
        );
        fs::write(&gitignore_path, new_content)
            .map_err(|e| format!("Could not update .gitignore: {}", e))?;
        println!("   {} .gitignore (added {})", "Updated".green(), GITIGNORE_ENTRY);
    } else {
        let content = format!(
            "# slidetags local cache (holds the gist token)\n{}\n",
            GITIGNORE_ENTRY
        );
        fs::write(&gitignore_path, content)
            .map_err(|e| format!("Could not create .gitignore: {}", e))?;
        println!("   {} .gitignore", "Creating".green());
    }

    Ok(())
}
