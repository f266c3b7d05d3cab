//! Style sheet stages: SCSS compilation and CSS printing.
//!
//! Compilation is delegated to `grass`; vendor prefixing, minification and
//! source map generation to `lightningcss`. The printed source map embeds
//! the compiled CSS as source content, under the compiled file's name.

use super::{artifact_text, Stage, StageError};
use crate::pipeline::Artifact;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::path::PathBuf;

/// Encode a browser version as lightningcss expects (`major << 16`).
fn version(major: u32) -> Option<u32> {
    Some(major << 16)
}

/// Browser versions prefixes are generated for.
///
/// A deliberately conservative set; anything older gets the prefixed
/// declarations it needs, anything newer ignores them.
pub fn default_browsers() -> Browsers {
    Browsers {
        android: version(90),
        chrome: version(90),
        edge: version(90),
        firefox: version(88),
        ios_saf: version(14),
        opera: version(76),
        safari: version(14),
        samsung: version(14),
        ..Browsers::default()
    }
}

/// Compile SCSS text to expanded CSS.
///
/// `@use`/`@import` lookups resolve against the configured load path (the
/// styles source root). The artifact's extension is rewritten to `.css`.
pub struct ScssCompile {
    load_path: PathBuf,
}

impl ScssCompile {
    /// Create a compile stage resolving imports against `load_path`.
    pub fn new(load_path: PathBuf) -> Self {
        Self { load_path }
    }
}

impl Stage for ScssCompile {
    fn name(&self) -> &'static str {
        "scss-compile"
    }

    fn apply(&self, artifact: Artifact) -> Result<Artifact, StageError> {
        let source = artifact_text(&artifact)?.to_string();
        let options = grass::Options::default()
            .style(grass::OutputStyle::Expanded)
            .load_path(&self.load_path);

        let css = grass::from_string(source, &options)
            .map_err(|e| StageError::Syntax(e.to_string()))?;

        let mut artifact = artifact.with_extension("css");
        artifact.bytes = css.into_bytes();
        artifact.map = None;
        Ok(artifact)
    }
}

/// Print CSS with vendor prefixes for the target browsers, optionally
/// minified, and attach a source map aligned with the printed output.
pub struct CssPrint {
    minify: bool,
    browsers: Browsers,
}

impl CssPrint {
    /// Plain (expanded) printing with prefixes.
    pub fn expanded() -> Self {
        Self { minify: false, browsers: default_browsers() }
    }

    /// Minified printing with prefixes.
    pub fn minified() -> Self {
        Self { minify: true, browsers: default_browsers() }
    }

    /// Override the browser targets.
    pub fn with_browsers(mut self, browsers: Browsers) -> Self {
        self.browsers = browsers;
        self
    }

    fn targets(&self) -> Targets {
        Targets { browsers: Some(self.browsers.clone()), ..Targets::default() }
    }
}

impl Stage for CssPrint {
    fn name(&self) -> &'static str {
        if self.minify {
            "css-minify"
        } else {
            "css-print"
        }
    }

    fn apply(&self, artifact: Artifact) -> Result<Artifact, StageError> {
        let css = artifact_text(&artifact)?.to_string();
        let filename = artifact.rel_path.to_string_lossy().into_owned();

        let mut sheet = StyleSheet::parse(
            &css,
            ParserOptions { filename: filename.clone(), ..ParserOptions::default() },
        )
        .map_err(|e| StageError::Syntax(e.to_string()))?;

        sheet
            .minify(MinifyOptions { targets: self.targets(), ..MinifyOptions::default() })
            .map_err(|e| StageError::Transform(e.to_string()))?;

        let mut map = SourceMap::new("/");
        map.add_source(&filename);
        map.set_source_content(0, &css)
            .map_err(|e| StageError::Transform(format!("source map: {}", e)))?;

        let printed = sheet
            .to_css(PrinterOptions {
                minify: self.minify,
                source_map: Some(&mut map),
                targets: self.targets(),
                ..PrinterOptions::default()
            })
            .map_err(|e| StageError::Transform(e.to_string()))?;

        let json = map
            .to_json(None)
            .map_err(|e| StageError::Transform(format!("source map: {}", e)))?;

        let mut artifact = artifact;
        artifact.bytes = printed.code.into_bytes();
        artifact.map = Some(json);
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn scss_artifact(content: &str) -> Artifact {
        Artifact::new(PathBuf::from("main.scss"), content.as_bytes().to_vec())
    }

    #[test]
    fn test_scss_compile_nesting() {
        let temp = TempDir::new().unwrap();
        let stage = ScssCompile::new(temp.path().to_path_buf());

        let artifact = scss_artifact(".nav { a { color: red; } }");
        let out = stage.apply(artifact).unwrap();

        assert_eq!(out.rel_path, PathBuf::from("main.css"));
        let css = String::from_utf8(out.bytes).unwrap();
        assert!(css.contains(".nav a"));
        assert!(css.contains("color: red"));
    }

    #[test]
    fn test_scss_compile_variables() {
        let temp = TempDir::new().unwrap();
        let stage = ScssCompile::new(temp.path().to_path_buf());

        let artifact = scss_artifact("$c: #336699;\nbody { color: $c; }");
        let out = stage.apply(artifact).unwrap();
        let css = String::from_utf8(out.bytes).unwrap();
        assert!(css.contains("#336699") || css.contains("#369"));
    }

    #[test]
    fn test_scss_compile_syntax_error() {
        let temp = TempDir::new().unwrap();
        let stage = ScssCompile::new(temp.path().to_path_buf());

        let artifact = scss_artifact("body { color: ");
        let err = stage.apply(artifact).unwrap_err();
        assert!(matches!(err, StageError::Syntax(_)));
    }

    #[test]
    fn test_css_print_minifies() {
        let stage = CssPrint::minified();
        let artifact = Artifact::new(
            PathBuf::from("main.css"),
            b"body {\n  color: #ffffff;\n}\n".to_vec(),
        );
        let out = stage.apply(artifact).unwrap();
        let css = String::from_utf8(out.bytes).unwrap();
        assert!(!css.contains('\n') || css.trim().lines().count() == 1);
        assert!(css.contains("#fff"));
        assert!(out.map.is_some());
    }

    #[test]
    fn test_css_print_expanded_keeps_map() {
        let stage = CssPrint::expanded();
        let artifact = Artifact::new(PathBuf::from("main.css"), b"a { color: red; }".to_vec());
        let out = stage.apply(artifact).unwrap();
        let map = out.map.unwrap();
        assert!(map.contains("main.css"));
        assert!(map.contains("\"mappings\""));
    }

    #[test]
    fn test_css_print_rejects_invalid_css() {
        let stage = CssPrint::minified();
        let artifact = Artifact::new(PathBuf::from("bad.css"), b"a { color }".to_vec());
        assert!(stage.apply(artifact).is_err());
    }

    #[test]
    fn test_css_print_idempotent() {
        let stage = CssPrint::minified();
        let input = Artifact::new(
            PathBuf::from("main.css"),
            b".a { margin: 0px; } .b { color: #aabbcc; }".to_vec(),
        );
        let once = stage.apply(input.clone()).unwrap();
        let twice = stage.apply(input).unwrap();
        assert_eq!(once.bytes, twice.bytes);
    }
}
