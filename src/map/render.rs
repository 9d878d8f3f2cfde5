//! HTML rendering of map documents

use super::layers::MapDocument;
use crate::Result;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::{info, warn};

const MAP_TEMPLATE_NAME: &str = "map.html";
const MAP_TEMPLATE: &str = include_str!("../../templates/map.html.tera");

/// Tera-backed renderer for the embedded Leaflet page
#[derive(Debug)]
pub struct MapRenderer {
    tera: Tera,
}

impl MapRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);
        tera.add_raw_template(MAP_TEMPLATE_NAME, MAP_TEMPLATE)?;
        Ok(Self { tera })
    }

    /// Render a document to a standalone HTML page
    pub fn render(&self, doc: &MapDocument) -> Result<String> {
        let mut context = Context::new();
        context.insert("title", &doc.title);
        context.insert("version", crate::VERSION);
        context.insert("legend", &doc.legend);
        context.insert("map_json", &script_json(doc)?);

        Ok(self.tera.render(MAP_TEMPLATE_NAME, &context)?)
    }
}

/// JSON safe to place inside a `<script>` element
pub fn script_json(doc: &MapDocument) -> Result<String> {
    Ok(serde_json::to_string(doc)?.replace("</", "<\\/"))
}

/// Render `doc`, write it to `path` and optionally open it in the default browser.
///
/// Returns the absolute path of the written file.
pub fn save_map(doc: &MapDocument, path: &Path, auto_open: bool) -> Result<PathBuf> {
    let html = MapRenderer::new()?.render(doc)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;

    let abs_path = std::fs::canonicalize(path)?;
    info!("Map saved to {}", abs_path.display());

    if auto_open {
        let url = format!("file://{}", abs_path.display());
        match webbrowser::open(&url) {
            Ok(()) => info!("Map opened in browser: {}", abs_path.display()),
            Err(e) => warn!("Could not open browser: {}", e),
        }
    }

    Ok(abs_path)
}
