use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use handlebars::Handlebars;
use walkdir::WalkDir;

use crate::arbor::fingerprint::AssetUrl;

/// Name of the template rendered for `/`.
pub const INDEX_TEMPLATE: &str = "index";

const TEMPLATE_EXT: &str = "hbs";

/// Build the template set from every `.hbs` file under `<base>/templates`.
///
/// Top-level files register under their stem (e.g. `index`), nested files
/// become partials named by their relative path (e.g. `components/head`).
/// The `asset` fingerprint helper is registered on every set so templates can
/// emit cache-busted asset URLs.
pub fn compile_templates(base_dir: &Path) -> Result<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();
    handlebars.register_helper("asset", Box::new(AssetUrl::new(base_dir.to_path_buf())));

    let templates_dir = base_dir.join("templates");

    for entry in WalkDir::new(&templates_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file() && e.path().extension() == Some(OsStr::new(TEMPLATE_EXT)))
    {
        let path = entry.path();
        let rel = path.strip_prefix(&templates_dir).unwrap_or(path);
        let name = rel.with_extension("").to_string_lossy().replace('\\', "/");

        if rel.parent().map(|p| p == Path::new("")).unwrap_or(true) {
            handlebars
                .register_template_file(&name, path)
                .with_context(|| format!("registering template {name}"))?;
        } else {
            let partial_src = fs::read_to_string(path)
                .with_context(|| format!("reading partial {name}"))?;
            handlebars
                .register_partial(&name, partial_src)
                .with_context(|| format!("registering partial {name}"))?;
        }
    }

    if !handlebars.has_template(INDEX_TEMPLATE) {
        bail!(
            "no {INDEX_TEMPLATE}.{TEMPLATE_EXT} found under {}",
            templates_dir.display()
        );
    }

    Ok(handlebars)
}
