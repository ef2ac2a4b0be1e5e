// src/actions/pipeline.rs

//! File-transform actions: read inputs, apply one transformation, write to a
//! destination. All filesystem work runs on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use tracing::{debug, info};

use crate::actions::ActionContext;
use crate::less;
use crate::watch::patterns::{collect_matching_files, compile_glob, glob_base};

/// Compile one LESS file into `dest/<stem>.css`. Nothing is written when
/// compilation fails.
pub async fn compile_less(ctx: &ActionContext, src: &str, dest: &str) -> Result<PathBuf> {
    let fs = Arc::clone(ctx.fs());
    let src_path = ctx.resolve(src);
    let out_path = compiled_path(&ctx.resolve(dest), Path::new(src))?;

    let written = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        let css = less::compile_file(fs.as_ref(), &src_path)
            .with_context(|| format!("compiling {}", src_path.display()))?;
        fs.write(&out_path, css.as_bytes())?;
        Ok(out_path)
    })
    .await
    .context("LESS compile worker panicked")??;

    info!(output = %written.display(), "compiled stylesheet");
    Ok(written)
}

fn compiled_path(dest_dir: &Path, src: &Path) -> Result<PathBuf> {
    let stem = src
        .file_stem()
        .with_context(|| format!("source {} has no file name", src.display()))?;
    let mut name = stem.to_os_string();
    name.push(".css");
    Ok(dest_dir.join(name))
}

/// Copy every file matching `src_glob` into `dest`, keeping its path below
/// the glob base. Returns the number of files copied.
pub async fn copy_files(ctx: &ActionContext, src_glob: &str, dest: &str) -> Result<usize> {
    let matcher = compile_glob(src_glob)?;
    let base = glob_base(src_glob);
    let fs = Arc::clone(ctx.fs());
    let root = ctx.root().to_path_buf();
    let dest_dir = ctx.resolve(dest);

    let copied = tokio::task::spawn_blocking(move || -> Result<usize> {
        let files = collect_matching_files(fs.as_ref(), &root, &base, &matcher)?;
        let base_dir = root.join(&base);

        for file in &files {
            let rel = file
                .strip_prefix(&base_dir)
                .with_context(|| format!("{} is outside {}", file.display(), base_dir.display()))?;
            let target = dest_dir.join(rel);
            let bytes = fs.read(file)?;
            fs.write(&target, &bytes)?;
            debug!(from = %file.display(), to = %target.display(), "copied");
        }
        Ok(files.len())
    })
    .await
    .context("copy worker panicked")??;

    info!(pattern = src_glob, files = copied, "copied files");
    Ok(copied)
}

/// Minify one CSS file into `dest/<file name>`.
pub async fn minify_css(ctx: &ActionContext, src: &str, dest: &str) -> Result<PathBuf> {
    let fs = Arc::clone(ctx.fs());
    let src_path = ctx.resolve(src);
    let file_name = Path::new(src)
        .file_name()
        .with_context(|| format!("source {src} has no file name"))?;
    let out_path = ctx.resolve(dest).join(file_name);

    let written = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        let css = fs
            .read_to_string(&src_path)
            .with_context(|| format!("minify input {} is missing", src_path.display()))?;
        let minified = minify_stylesheet(&css)
            .with_context(|| format!("minifying {}", src_path.display()))?;
        fs.write(&out_path, minified.as_bytes())?;
        Ok(out_path)
    })
    .await
    .context("minify worker panicked")??;

    info!(output = %written.display(), "minified stylesheet");
    Ok(written)
}

/// Minify CSS text with lightningcss.
pub fn minify_stylesheet(css: &str) -> Result<String> {
    let mut sheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| anyhow!("parsing CSS: {e}"))?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| anyhow!("minifying CSS: {e}"))?;
    let out = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("printing CSS: {e}"))?;
    Ok(out.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use tokio::sync::mpsc;

    fn mock_ctx() -> (ActionContext, MockFileSystem) {
        let fs = MockFileSystem::new();
        let (tx, _rx) = mpsc::channel(8);
        (ActionContext::new("", Arc::new(fs.clone()), tx), fs)
    }

    #[tokio::test]
    async fn compile_writes_css_next_to_stem() {
        let (ctx, fs) = mock_ctx();
        fs.add_file("app/less/style.less", ".a{.b{color:red;}}");

        let out = compile_less(&ctx, "app/less/style.less", "app/css").await.unwrap();
        assert_eq!(out, PathBuf::from("app/css/style.css"));
        assert_eq!(
            fs.contents("app/css/style.css").unwrap(),
            b".a .b {\n  color: red;\n}\n".to_vec()
        );
    }

    #[tokio::test]
    async fn failed_compile_writes_nothing() {
        let (ctx, fs) = mock_ctx();
        fs.add_file("app/less/style.less", ".a { color: red;");

        let err = compile_less(&ctx, "app/less/style.less", "app/css").await.unwrap_err();
        assert!(format!("{err:#}").contains("missing closing"));
        assert!(fs.contents("app/css/style.css").is_none());
    }

    #[tokio::test]
    async fn copy_mirrors_paths_below_glob_base() {
        let (ctx, fs) = mock_ctx();
        fs.add_file("app/a.html", "<p>a</p>");
        fs.add_file("app/sub/b.html", "<p>b</p>");
        fs.add_file("app/css/style.css", "a{}");

        let copied = copy_files(&ctx, "app/**/*.html", "dist").await.unwrap();
        assert_eq!(copied, 2);
        assert_eq!(fs.contents("dist/a.html").unwrap(), b"<p>a</p>".to_vec());
        assert_eq!(fs.contents("dist/sub/b.html").unwrap(), b"<p>b</p>".to_vec());
        assert!(fs.contents("dist/css/style.css").is_none());
    }

    #[tokio::test]
    async fn copy_with_no_matches_succeeds() {
        let (ctx, _fs) = mock_ctx();
        assert_eq!(copy_files(&ctx, "app/**/*.html", "dist").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn copy_into_unwritable_destination_fails() {
        let (ctx, fs) = mock_ctx();
        fs.add_file("app/a.html", "<p>a</p>");
        fs.deny_writes_under("dist");

        assert!(copy_files(&ctx, "app/**/*.html", "dist").await.is_err());
    }

    #[tokio::test]
    async fn minify_missing_input_fails() {
        let (ctx, _fs) = mock_ctx();
        let err = minify_css(&ctx, "app/css/style.css", "dist/css").await.unwrap_err();
        assert!(format!("{err:#}").contains("missing"));
    }

    #[test]
    fn minify_output_is_compact() {
        let css = ".a .b {\n  color: red;\n}\n";
        let min = minify_stylesheet(css).unwrap();
        assert_eq!(min, ".a .b{color:red}");
        assert!(min.len() <= css.len());
    }
}
