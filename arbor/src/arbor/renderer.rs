use std::path::{Path, PathBuf};
use std::sync::RwLock;

use actix_web::web::Bytes;
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use handlebars::Handlebars;
use serde::Serialize;

use crate::arbor::config::{Mode, SiteConfig};
use crate::arbor::styles::StyleSheets;
use crate::arbor::templates::{self, INDEX_TEMPLATE};

/// Owns everything the index route needs: configuration, the compile
/// strategy for the template set, the rendered-page cache slot, and the
/// stylesheet cache.
pub struct ArborEngine {
    pub config: SiteConfig,
    base_dir: PathBuf,
    strategy: Strategy,
    styles: StyleSheets,
    cache: RwLock<Option<Bytes>>,
}

/// How the template set reaches the renderer, chosen once by mode.
enum Strategy {
    /// Production: compiled at startup; the rendered page is reused for the
    /// process lifetime.
    CompileOnce(Handlebars<'static>),
    /// Development: recompiled on every request so template edits show up
    /// without a restart.
    CompilePerRequest,
}

impl ArborEngine {
    /// In production this compiles the template set eagerly, and a broken
    /// template keeps the engine (and therefore the server) from coming up.
    pub fn new(config: SiteConfig) -> Result<Self> {
        let base_dir = config.base_dir();
        Self::with_base_dir(config, base_dir)
    }

    pub fn with_base_dir(config: SiteConfig, base_dir: PathBuf) -> Result<Self> {
        let strategy = match config.mode() {
            Mode::Production => {
                Strategy::CompileOnce(templates::compile_templates(&base_dir)?)
            }
            Mode::Development => Strategy::CompilePerRequest,
        };

        Ok(Self {
            config,
            styles: StyleSheets::new(&base_dir),
            strategy,
            base_dir,
            cache: RwLock::new(None),
        })
    }

    pub fn mode(&self) -> Mode {
        self.config.mode()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn assets_root(&self) -> PathBuf {
        self.base_dir.join("assets")
    }

    /// Render the index page, reusing the cached buffer in production.
    ///
    /// Failures propagate without touching the cache slot, so an existing
    /// buffer keeps serving while a broken template is being fixed.
    pub fn render_index(&self) -> Result<Bytes> {
        if let Strategy::CompileOnce(template_set) = &self.strategy {
            if let Some(cached) = self.cached() {
                return Ok(cached);
            }
            let html = self.render_with(template_set)?;
            self.store(html.clone());
            return Ok(html);
        }

        let template_set = templates::compile_templates(&self.base_dir)?;
        let html = self.render_with(&template_set)?;
        self.store(html.clone());
        Ok(html)
    }

    fn render_with(&self, template_set: &Handlebars<'_>) -> Result<Bytes> {
        let html = template_set
            .render(INDEX_TEMPLATE, &self.context())
            .context("rendering index template")?;
        Ok(Bytes::from(html))
    }

    fn context(&self) -> IndexContext<'_> {
        IndexContext {
            site: SiteContext {
                name: &self.config.page_title,
                tagline: self.config.tagline.as_deref(),
            },
            mode: self.config.mode().as_str(),
            styles: self.styles.compiled(),
            footer: FooterContext {
                year: Utc::now().year(),
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }

    fn cached(&self) -> Option<Bytes> {
        self.cache.read().ok().and_then(|guard| guard.clone())
    }

    // The guard is held only for the swap, never across a render. Concurrent
    // cold-cache requests may each render; every store is a complete
    // immutable buffer and the last writer wins. Rendering is idempotent, so
    // the redundant render costs less than serializing requests behind a lock.
    fn store(&self, html: Bytes) {
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(html);
        }
    }
}

#[derive(Serialize)]
struct IndexContext<'a> {
    site: SiteContext<'a>,
    mode: &'static str,
    styles: String,
    footer: FooterContext,
}

#[derive(Serialize)]
struct SiteContext<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tagline: Option<&'a str>,
}

#[derive(Serialize)]
struct FooterContext {
    year: i32,
    version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_template(dir: &Path, body: &str) {
        fs::create_dir_all(dir.join("templates")).unwrap();
        fs::write(dir.join("templates/index.hbs"), body).unwrap();
    }

    fn engine(dir: &Path, app_env: &str) -> Result<ArborEngine> {
        let config = SiteConfig {
            app_env: app_env.into(),
            ..SiteConfig::default()
        };
        ArborEngine::with_base_dir(config, dir.to_path_buf())
    }

    #[test]
    fn production_reuses_the_first_render() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "<h1>{{site.name}} v1</h1>");

        let engine = engine(dir.path(), "production").unwrap();
        let first = engine.render_index().unwrap();

        // A template edit after startup must not leak into responses.
        write_template(dir.path(), "<h1>{{site.name}} v2</h1>");
        let second = engine.render_index().unwrap();

        assert_eq!(first, second);
        assert!(String::from_utf8_lossy(&first).contains("v1"));
    }

    #[test]
    fn development_rerenders_every_request() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "<h1>v1</h1>");

        let engine = engine(dir.path(), "development").unwrap();
        assert!(String::from_utf8_lossy(&engine.render_index().unwrap()).contains("v1"));

        write_template(dir.path(), "<h1>v2</h1>");
        assert!(String::from_utf8_lossy(&engine.render_index().unwrap()).contains("v2"));
    }

    #[test]
    fn production_startup_fails_on_a_broken_template() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "{{#if open}}never closed");

        assert!(engine(dir.path(), "production").is_err());
    }

    #[test]
    fn development_startup_tolerates_a_broken_template() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "{{#if open}}never closed");

        let engine = engine(dir.path(), "development").unwrap();
        assert!(engine.render_index().is_err());

        // Once the template is fixed the same engine serves again.
        write_template(dir.path(), "<h1>fixed</h1>");
        assert!(String::from_utf8_lossy(&engine.render_index().unwrap()).contains("fixed"));
    }

    #[test]
    fn context_reaches_the_template() {
        let dir = tempfile::tempdir().unwrap();
        write_template(
            dir.path(),
            "{{site.name}}|{{mode}}|{{footer.version}}",
        );

        let config = SiteConfig {
            page_title: "Front Door".into(),
            ..SiteConfig::default()
        };
        let engine = ArborEngine::with_base_dir(config, dir.path().to_path_buf()).unwrap();

        let html = engine.render_index().unwrap();
        let html = String::from_utf8_lossy(&html);
        assert!(html.contains("Front Door|development|"));
    }

    #[test]
    fn styles_are_inlined_into_the_page() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "<style>{{styles}}</style>");
        fs::create_dir_all(dir.path().join("styles")).unwrap();
        fs::write(dir.path().join("styles/app.scss"), "body { margin: 0; }").unwrap();

        let engine = engine(dir.path(), "development").unwrap();
        let html = engine.render_index().unwrap();
        assert!(String::from_utf8_lossy(&html).contains("body{margin:0}"));
    }
}
