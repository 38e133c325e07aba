use std::fs;
use std::path::{Path, PathBuf};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    RenderErrorReason,
};
use log::debug;

/// Hex md5 digest of the file at `asset_path` resolved against `base_dir`,
/// or `None` when the file cannot be read.
pub fn fingerprint(base_dir: &Path, asset_path: &str) -> Option<String> {
    let full = base_dir.join(asset_path.trim_start_matches('/'));
    let bytes = fs::read(full).ok()?;
    Some(format!("{:x}", md5::compute(bytes)))
}

/// The `asset` template helper: `{{asset "assets/css/app.css"}}` writes the
/// path with a `?v=<digest>` suffix derived from the file's current content,
/// so browsers refetch an asset exactly when its bytes change. An asset that
/// cannot be read keeps its bare path rather than failing the page render.
pub struct AssetUrl {
    base_dir: PathBuf,
}

impl AssetUrl {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

impl HelperDef for AssetUrl {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let path = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("asset", 0))?;

        match fingerprint(&self.base_dir, path) {
            Some(digest) => out.write(&format!("{path}?v={digest}"))?,
            None => {
                debug!("no fingerprint for asset {path}");
                out.write(path)?;
            }
        }

        Ok(())
    }
}
