//! index.html generation for the slide collection
//!
//! One card per slide with its tags pre-rendered, a search box and a tag
//! filter strip. In live mode (served by `slidetags serve`) the page can also
//! edit tags through the JSON API.

use crate::config::SiteConfig;
use crate::filter::search_text;
use crate::model::Store;
use crate::slides::{SlideCatalog, SlideMeta};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Static file or the page served with the editing API behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Static,
    Live,
}

/// Write `<out_dir>/index.html`, returning its path
pub fn generate(
    out_dir: &Path,
    site: &SiteConfig,
    catalog: &SlideCatalog,
    store: &Store,
) -> io::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join("index.html");
    let mut file = io::BufWriter::new(std::fs::File::create(&path)?);
    write(&mut file, site, catalog, store, PageMode::Static)?;
    file.flush()?;
    Ok(path)
}

pub fn render(site: &SiteConfig, catalog: &SlideCatalog, store: &Store, mode: PageMode) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail
    let _ = write(&mut buf, site, catalog, store, mode);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn write<W: Write>(
    writer: &mut W,
    site: &SiteConfig,
    catalog: &SlideCatalog,
    store: &Store,
    mode: PageMode,
) -> io::Result<()> {
    let cards: String = catalog
        .slides
        .iter()
        .map(|slide| slide_card(slide, store, mode))
        .collect();

    let repo_link = site
        .repository_url
        .as_deref()
        .map(|url| {
            format!(
                r#"<a href="{}" class="header-link" target="_blank" rel="noopener">Repository</a>"#,
                escape_html(url)
            )
        })
        .unwrap_or_default();

    let editor = if mode == PageMode::Live {
        r#"<section class="panel">
            <h2>Tag Management</h2>
            <div class="tag-editor">
                <input type="text" id="newTagName" placeholder="New tag name...">
                <button id="addTag">Add Tag</button>
            </div>
            <div id="tagsContainer">"#
            .to_string()
            + &tag_management_list(store)
            + "</div>\n        </section>"
    } else {
        String::new()
    };

    write!(
        writer,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <meta name="description" content="{description}">
    <link href="https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css" rel="stylesheet">
    <style>
        body {{ background: #f9fafb; min-height: 100vh; }}
        .gradient-bg {{ background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; }}
        .header {{ max-width: 72rem; margin: 0 auto; padding: 2rem 1rem; text-align: center; }}
        .header h1 {{ font-size: 2.5rem; font-weight: 700; }}
        .header-link {{ display: inline-block; margin-top: 1rem; background: white; color: #7c3aed; padding: 0.5rem 1.25rem; border-radius: 0.5rem; font-weight: 600; }}
        main {{ max-width: 72rem; margin: 0 auto; padding: 2rem 1rem; }}
        .panel {{ background: white; border: 1px solid #e5e7eb; border-radius: 0.75rem; padding: 1.5rem; margin-bottom: 2rem; }}
        .panel h2 {{ font-size: 1.25rem; font-weight: 700; margin-bottom: 1rem; }}
        #searchInput, #newTagName {{ width: 100%; padding: 0.5rem 1rem; border: 1px solid #d1d5db; border-radius: 0.5rem; margin-bottom: 1rem; }}
        .tag-editor {{ display: flex; gap: 0.5rem; }}
        .slides {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(22rem, 1fr)); gap: 2rem; }}
        .slide-card {{ background: white; border: 1px solid #e5e7eb; border-radius: 0.75rem; overflow: hidden; transition: transform 0.3s ease, box-shadow 0.3s ease; }}
        .slide-card:hover {{ transform: translateY(-4px); box-shadow: 0 20px 25px -5px rgba(0, 0, 0, 0.1); }}
        .slide-card.hidden {{ display: none; }}
        .preview {{ height: 12rem; position: relative; background: linear-gradient(135deg, #60a5fa, #7c3aed); }}
        .preview img {{ width: 100%; height: 100%; object-fit: cover; }}
        .date-badge {{ position: absolute; top: 1rem; right: 1rem; background: rgba(255,255,255,0.9); padding: 0.25rem 0.75rem; border-radius: 9999px; font-size: 0.875rem; }}
        .card-body {{ padding: 1.5rem; }}
        .card-body h3 {{ font-size: 1.25rem; font-weight: 700; margin-bottom: 0.75rem; }}
        .card-links {{ display: flex; gap: 0.75rem; margin-top: 1rem; }}
        .card-links a {{ padding: 0.5rem 1rem; border: 1px solid #d1d5db; border-radius: 0.5rem; font-weight: 600; }}
        .card-links a.primary {{ flex: 1; background: #2563eb; color: white; text-align: center; border-color: #2563eb; }}
        .slide-tag, .filter-tag, .tag-toggle, .tag-chip {{ padding: 4px 8px; border-radius: 12px; font-size: 0.75rem; font-weight: 500; cursor: pointer; border: 1px solid; transition: all 0.2s ease; }}
        .slide-tags {{ display: flex; flex-wrap: wrap; gap: 0.5rem; margin-bottom: 0.5rem; }}
        .filter-tag {{ border-style: dashed; opacity: 0.7; }}
        .filter-tag.active {{ border-style: solid; opacity: 1; transform: scale(1.05); }}
        .tag-toggle {{ opacity: 0.5; }}
        .tag-toggle.assigned {{ opacity: 1; }}
        .tag-chip {{ cursor: default; }}
        .no-tags {{ color: #9ca3af; font-size: 0.875rem; }}
        #noResults {{ text-align: center; padding: 3rem 0; }}
        #noResults.hidden {{ display: none; }}
    </style>
</head>
<body>
    <header class="gradient-bg">
        <div class="header">
            <h1>{title}</h1>
            <p>{description}</p>
            {repo_link}
        </div>
    </header>

    <main>
        {editor}

        <section class="panel">
            <h2>Filter &amp; Search</h2>
            <input type="text" id="searchInput" placeholder="Search presentations by title or description...">
            <div id="tagFilters" class="slide-tags">{filters}</div>
            <button id="clearFilters" class="no-tags">Clear All Filters</button>
        </section>

        <section id="slidesSection">
            <div id="resultsCounter">Showing {count} of {count} presentations</div>
            <div class="slides" id="slidesContainer">{cards}
            </div>
            <div id="noResults" class="hidden">
                <h3>No presentations found</h3>
                <p>Try adjusting your search terms or filters.</p>
            </div>
        </section>
    </main>

    <script>
    const LIVE = {live};
    const activeFilters = new Set();
    const cards = Array.from(document.querySelectorAll('.slide-card'));

    function applyFilters() {{
        const query = document.getElementById('searchInput').value.trim().toLowerCase();
        let visible = 0;
        cards.forEach(card => {{
            const tags = (card.dataset.tags || '').split(' ').filter(Boolean);
            const textOk = !query || (card.dataset.search || '').includes(query);
            const tagOk = activeFilters.size === 0 || tags.some(t => activeFilters.has(t));
            const show = textOk && tagOk;
            card.classList.toggle('hidden', !show);
            if (show) visible++;
        }});
        document.getElementById('resultsCounter').textContent =
            `Showing ${{visible}} of ${{cards.length}} presentations`;
        document.getElementById('noResults').classList.toggle('hidden', visible > 0);
    }}

    function setFilter(tagId, on) {{
        if (on) activeFilters.add(tagId); else activeFilters.delete(tagId);
        document.querySelectorAll(`.filter-tag[data-tag="${{tagId}}"]`)
            .forEach(el => el.classList.toggle('active', on));
        applyFilters();
    }}

    async function api(method, path, body) {{
        const res = await fetch(path, {{
            method,
            headers: {{ 'Content-Type': 'application/json' }},
            body: body ? JSON.stringify(body) : undefined,
        }});
        const json = await res.json();
        if (!json.ok) alert(json.error);
        return json.ok;
    }}

    document.getElementById('searchInput').addEventListener('input', applyFilters);
    document.getElementById('clearFilters').addEventListener('click', () => {{
        activeFilters.clear();
        document.getElementById('searchInput').value = '';
        document.querySelectorAll('.filter-tag.active').forEach(el => el.classList.remove('active'));
        applyFilters();
    }});
    document.addEventListener('click', async (e) => {{
        const el = e.target;
        if (el.classList.contains('filter-tag')) {{
            setFilter(el.dataset.tag, !activeFilters.has(el.dataset.tag));
        }} else if (el.classList.contains('slide-tag')) {{
            setFilter(el.dataset.tag, true);
        }} else if (LIVE && el.classList.contains('tag-toggle')) {{
            if (await api('POST', '/api/assignments/toggle', {{ slideId: el.dataset.slide, tagId: el.dataset.tag }})) location.reload();
        }} else if (LIVE && el.classList.contains('tag-remove')) {{
            if (confirm(`Remove tag "${{el.dataset.name}}"?`) &&
                await api('DELETE', `/api/tags/${{encodeURIComponent(el.dataset.tag)}}`)) location.reload();
        }}
    }});
    if (LIVE) {{
        const add = async () => {{
            const input = document.getElementById('newTagName');
            if (input.value.trim() && await api('POST', '/api/tags', {{ name: input.value }})) location.reload();
        }};
        document.getElementById('addTag').addEventListener('click', add);
        document.getElementById('newTagName').addEventListener('keypress', e => {{ if (e.key === 'Enter') add(); }});
        window.addEventListener('pagehide', () => navigator.sendBeacon('/api/flush'));
    }}
    </script>
</body>
</html>
"#,
        title = escape_html(&site.title),
        description = escape_html(&site.description),
        repo_link = repo_link,
        editor = editor,
        filters = filter_strip(store),
        count = catalog.len(),
        cards = cards,
        live = mode == PageMode::Live,
    )?;

    Ok(())
}

fn filter_strip(store: &Store) -> String {
    store
        .tags
        .values()
        .map(|tag| {
            format!(
                r#"<button class="filter-tag {}" data-tag="{}">{}</button>"#,
                tag.color.css_class(),
                escape_html(&tag.id),
                escape_html(&tag.name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n                ")
}

fn tag_management_list(store: &Store) -> String {
    if store.tags.is_empty() {
        return r#"<p class="no-tags">No tags created yet</p>"#.to_string();
    }
    let mut out = String::new();
    for tag in store.tags.values() {
        let count = store
            .assignments
            .values()
            .filter(|ids| ids.contains(&tag.id))
            .count();
        let _ = write!(
            out,
            r#"<span class="tag-chip {class}">{name} <small>{count} slides</small> <button class="tag-remove" data-tag="{id}" data-name="{name}">&times;</button></span>"#,
            class = tag.color.css_class(),
            name = escape_html(&tag.name),
            id = escape_html(&tag.id),
            count = count,
        );
    }
    out
}

fn slide_card(slide: &SlideMeta, store: &Store, mode: PageMode) -> String {
    let name = escape_html(&slide.name);
    let assigned = store.resolved_tags(&slide.name);

    let chips = if assigned.is_empty() {
        r#"<span class="no-tags">No tags</span>"#.to_string()
    } else {
        assigned
            .iter()
            .map(|tag| {
                format!(
                    r#"<span class="slide-tag {}" data-tag="{}" title="Click to filter">{}</span>"#,
                    tag.color.css_class(),
                    escape_html(&tag.id),
                    escape_html(&tag.name)
                )
            })
            .collect::<Vec<_>>()
            .join("")
    };

    let toggles = if mode == PageMode::Live {
        let buttons: String = store
            .tags
            .values()
            .map(|tag| {
                let on = assigned.iter().any(|t| t.id == tag.id);
                format!(
                    r#"<button class="tag-toggle {}{}" data-slide="{}" data-tag="{}">{}</button>"#,
                    tag.color.css_class(),
                    if on { " assigned" } else { "" },
                    name,
                    escape_html(&tag.id),
                    escape_html(&tag.name)
                )
            })
            .collect();
        format!(r#"<div class="slide-tags">{}</div>"#, buttons)
    } else {
        String::new()
    };

    let data_tags = store
        .assignments
        .get(&slide.name)
        .map(|ids| ids.join(" "))
        .unwrap_or_default();

    format!(
        r#"
                <div class="slide-card" data-slide="{name}" data-tags="{data_tags}" data-search="{search}">
                    <a href="/{name}/">
                        <div class="preview">
                            <img src="/previews/{name}.png" alt="{title} - Preview" loading="lazy" onerror="this.style.display='none'">
                            <div class="date-badge">{date}</div>
                        </div>
                    </a>
                    <div class="card-body">
                        <h3>{title}</h3>
                        <p>{description}</p>
                        <div class="slide-tags" id="slide-tags-{name}">{chips}</div>
                        {toggles}
                        <div class="card-links">
                            <a href="/{name}/" class="primary">View Slide</a>
                            <a href="/{name}/presenter/" title="Presenter Mode">Presenter</a>
                            <a href="/{name}/overview/" title="Overview Mode">Overview</a>
                        </div>
                    </div>
                </div>"#,
        name = name,
        data_tags = escape_html(&data_tags),
        search = escape_html(&search_text(slide, store)),
        title = escape_html(&slide.title),
        description = escape_html(&slide.description),
        date = escape_html(&display_date(&slide.date)),
        chips = chips,
        toggles = toggles,
    )
}

/// "2025-07-17" -> "7/17/2025"; anything unparseable is shown as-is
fn display_date(date: &str) -> String {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%-m/%-d/%Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
