use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use log::warn;
use walkdir::WalkDir;

/// Compiled CSS for inlining into the page head, sourced from
/// `<base>/styles/app.scss`. Recompiles only when a stylesheet changes on
/// disk; a site without a styles directory simply gets empty styles.
pub struct StyleSheets {
    root: PathBuf,
    cache: RwLock<StylesCache>,
}

struct StylesCache {
    css: String,
    mtime: SystemTime,
}

impl StyleSheets {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            root: base_dir.join("styles"),
            cache: RwLock::new(StylesCache {
                css: String::new(),
                mtime: SystemTime::UNIX_EPOCH,
            }),
        }
    }

    pub fn compiled(&self) -> String {
        let scss_mtime = latest_scss_mtime(&self.root);

        if let Ok(guard) = self.cache.read() {
            if guard.mtime >= scss_mtime {
                return guard.css.clone();
            }
        }

        if let Ok(mut guard) = self.cache.write() {
            if guard.mtime < scss_mtime {
                guard.css = compile_scss(&self.root);
                guard.mtime = scss_mtime;
            }
            return guard.css.clone();
        }

        // Fallback in case the lock is poisoned.
        compile_scss(&self.root)
    }
}

fn compile_scss(root: &Path) -> String {
    let entry = root.join("app.scss");
    if !entry.exists() {
        return String::new();
    }

    match grass::from_path(
        &entry,
        &grass::Options::default()
            .load_path(root)
            .style(grass::OutputStyle::Compressed),
    ) {
        Ok(css) => css,
        Err(err) => {
            warn!("Failed to compile SCSS at {:?}: {err}", entry);
            String::new()
        }
    }
}

fn latest_scss_mtime(root: &Path) -> SystemTime {
    let mut newest = SystemTime::UNIX_EPOCH;

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
    {
        let is_scss = entry.path().extension().map(|e| e == "scss").unwrap_or(false);
        if !is_scss {
            continue;
        }

        if let Ok(meta) = entry.metadata() {
            if let Ok(modified) = meta.modified() {
                if modified > newest {
                    newest = modified;
                }
            }
        }
    }

    newest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn compiles_scss_with_variables() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("styles")).unwrap();
        fs::write(
            dir.path().join("styles/app.scss"),
            "$fg: #333;\nbody { color: $fg; }",
        )
        .unwrap();

        let styles = StyleSheets::new(dir.path());
        assert!(styles.compiled().contains("color:#333"));
    }

    #[test]
    fn partials_resolve_from_the_styles_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("styles")).unwrap();
        fs::write(dir.path().join("styles/_palette.scss"), "$bg: #fff;").unwrap();
        fs::write(
            dir.path().join("styles/app.scss"),
            "@import \"palette\";\nbody { background: $bg; }",
        )
        .unwrap();

        let styles = StyleSheets::new(dir.path());
        assert!(styles.compiled().contains("background:#fff"));
    }

    #[test]
    fn missing_styles_dir_yields_empty_css() {
        let dir = tempfile::tempdir().unwrap();
        let styles = StyleSheets::new(dir.path());
        assert_eq!(styles.compiled(), "");
    }

    #[test]
    fn repeated_calls_reuse_the_cached_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("styles")).unwrap();
        fs::write(dir.path().join("styles/app.scss"), "body { margin: 0; }").unwrap();

        let styles = StyleSheets::new(dir.path());
        let first = styles.compiled();
        assert_eq!(styles.compiled(), first);
    }

    #[test]
    fn invalid_scss_degrades_to_empty_css() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("styles")).unwrap();
        fs::write(dir.path().join("styles/app.scss"), "body { color: ; }").unwrap();

        let styles = StyleSheets::new(dir.path());
        assert_eq!(styles.compiled(), "");
    }
}
