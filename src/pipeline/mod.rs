//! Pipeline execution.
//!
//! A pipeline applies an ordered list of transform stages to every file
//! matched by its source set and writes the results to a destination
//! directory under a naming policy. Source sets are re-evaluated on every
//! run, so added or removed files are picked up without restart. Each run is
//! a full rebuild of its source set; failures are isolated per file.

mod result;

pub use result::{FileResult, FileStatus, TaskResult};

use crate::context::TaskContext;
use crate::stages::Stage;
use parcel_sourcemap::{OriginalLocation, SourceMap};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Error while setting up or resolving a pipeline.
///
/// Per-file transform failures are not represented here; they land in the
/// [`TaskResult`] so the rest of the batch keeps building.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Invalid glob pattern in a source set
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    /// I/O error outside per-file processing
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One unit of content flowing through a pipeline.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Output-relative path; stages may rewrite the extension
    pub rel_path: PathBuf,
    /// Current content bytes
    pub bytes: Vec<u8>,
    /// Source map JSON aligned with `bytes`, if a stage produced one
    pub map: Option<String>,
}

impl Artifact {
    /// Create a new artifact with no source map.
    pub fn new(rel_path: PathBuf, bytes: Vec<u8>) -> Self {
        Self { rel_path, bytes, map: None }
    }

    /// Return the artifact with its extension rewritten.
    pub fn with_extension(mut self, ext: &str) -> Self {
        self.rel_path.set_extension(ext);
        self
    }
}

/// The files feeding one pipeline run.
///
/// Globs are re-evaluated on every call to [`SourceSet::resolve`]; explicit
/// lists keep their given order (concatenation order for script bundles).
#[derive(Debug, Clone)]
pub enum SourceSet {
    /// A glob pattern relative to a base directory
    Glob { base: PathBuf, pattern: String },
    /// An explicit ordered list of absolute paths
    List(Vec<PathBuf>),
}

impl SourceSet {
    /// Create a glob source set.
    pub fn glob(base: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        SourceSet::Glob { base: base.into(), pattern: pattern.into() }
    }

    /// Resolve to (absolute, relative) path pairs.
    ///
    /// An empty result is not an error; the pipeline run becomes a no-op.
    /// For explicit lists, paths are returned in list order and no existence
    /// check is made here; a missing file fails when the pipeline reads it.
    pub fn resolve(&self) -> Result<Vec<(PathBuf, PathBuf)>, PipelineError> {
        match self {
            SourceSet::Glob { base, pattern } => {
                let full = base.join(pattern);
                let full = full.to_string_lossy().into_owned();
                let entries = glob::glob(&full)
                    .map_err(|e| PipelineError::Pattern { pattern: full.clone(), source: e })?;

                let mut files = Vec::new();
                for path in entries.flatten() {
                    if !path.is_file() {
                        continue;
                    }
                    let rel = path
                        .strip_prefix(base)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| file_name_of(&path));
                    files.push((path, rel));
                }
                Ok(files)
            }
            SourceSet::List(paths) => Ok(paths
                .iter()
                .map(|p| (p.clone(), file_name_of(p)))
                .collect()),
        }
    }
}

fn file_name_of(path: &Path) -> PathBuf {
    path.file_name().map(PathBuf::from).unwrap_or_else(|| path.to_path_buf())
}

/// How output paths are derived from input paths.
#[derive(Debug, Clone, Default)]
pub struct NamingPolicy {
    /// Suffix inserted before the extension (`app.js` -> `app.min.js`)
    pub suffix: Option<String>,
    /// Drop subdirectories, keeping the file name only
    pub flatten: bool,
    /// Write a sibling `.map` file and a sourceMappingURL footer
    pub source_map: bool,
}

impl NamingPolicy {
    /// Compute the output-relative path for an artifact-relative path.
    pub fn output_path(&self, rel: &Path) -> PathBuf {
        let rel = if self.flatten { file_name_of(rel) } else { rel.to_path_buf() };
        match &self.suffix {
            None => rel,
            Some(suffix) => {
                let stem = rel.file_stem().unwrap_or_default().to_string_lossy();
                let named = match rel.extension() {
                    Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
                    None => format!("{}{}", stem, suffix),
                };
                rel.with_file_name(named)
            }
        }
    }
}

/// An ordered chain of transform stages over a source set.
pub struct Pipeline {
    name: String,
    source: SourceSet,
    stages: Vec<Box<dyn Stage>>,
    dest: PathBuf,
    naming: NamingPolicy,
    /// When set, all inputs are concatenated into one artifact of this name
    /// (with a line-based source map) before the stages run.
    bundle: Option<String>,
}

impl Pipeline {
    /// Create a pipeline with no stages and default naming.
    pub fn new(name: impl Into<String>, source: SourceSet, dest: PathBuf) -> Self {
        Self {
            name: name.into(),
            source,
            stages: Vec::new(),
            dest,
            naming: NamingPolicy::default(),
            bundle: None,
        }
    }

    /// Append a transform stage. Order is execution order.
    pub fn stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Set the naming policy.
    pub fn naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    /// Concatenate all inputs into a single bundle of the given name.
    pub fn bundle(mut self, name: impl Into<String>) -> Self {
        self.bundle = Some(name.into());
        self
    }

    /// Pipeline name, used in logs and results.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the pipeline: resolve sources, apply stages in order to each
    /// matched file (in parallel across files), write outputs.
    ///
    /// An empty source set completes successfully with zero outputs.
    pub fn run(&self, ctx: &TaskContext) -> Result<TaskResult, PipelineError> {
        let start = Instant::now();
        let inputs = self.source.resolve()?;

        let mut result = TaskResult::new(self.name.clone());
        if inputs.is_empty() {
            result.total_duration = start.elapsed();
            return Ok(result);
        }

        if let Some(bundle_name) = &self.bundle {
            result.add(self.run_bundle(ctx, &inputs, bundle_name));
        } else {
            let mut files: Vec<FileResult> = inputs
                .par_iter()
                .map(|(abs, rel)| self.run_file(ctx, abs, rel))
                .collect();
            for file in files.drain(..) {
                result.add(file);
            }
        }

        result.total_duration = start.elapsed();
        Ok(result)
    }

    /// Process one input file through the stage chain.
    fn run_file(&self, ctx: &TaskContext, abs: &Path, rel: &Path) -> FileResult {
        let start = Instant::now();

        let bytes = match fs::read(abs) {
            Ok(bytes) => bytes,
            Err(e) => {
                return FileResult::failed(
                    abs.to_path_buf(),
                    format!("read: {}", e),
                    start.elapsed(),
                )
            }
        };

        self.finish(ctx, abs, Artifact::new(rel.to_path_buf(), bytes), start)
    }

    /// Concatenate all inputs into one artifact with a line-based source
    /// map, then run the stage chain once over the bundle.
    ///
    /// A missing module fails the whole bundle; the enumerated list is
    /// explicit, so a hole in it is never silently skipped.
    fn run_bundle(&self, ctx: &TaskContext, inputs: &[(PathBuf, PathBuf)], name: &str) -> FileResult {
        let start = Instant::now();

        let artifact = match concat_with_map(inputs, name) {
            Ok(artifact) => artifact,
            Err(e) => return FileResult::failed(PathBuf::from(name), e, start.elapsed()),
        };

        self.finish(ctx, Path::new(name), artifact, start)
    }

    /// Apply stages and write outputs for an already-loaded artifact.
    fn finish(&self, ctx: &TaskContext, input: &Path, artifact: Artifact, start: Instant) -> FileResult {
        let mut artifact = artifact;
        for stage in &self.stages {
            artifact = match stage.apply(artifact) {
                Ok(next) => next,
                Err(e) => {
                    return FileResult::failed(
                        input.to_path_buf(),
                        format!("{}: {}", stage.name(), e),
                        start.elapsed(),
                    )
                }
            };
        }

        let out_rel = self.naming.output_path(&artifact.rel_path);
        let out_path = self.dest.join(&out_rel);

        if ctx.is_dry_run() {
            let mut outputs = vec![out_path.clone()];
            if self.naming.source_map && artifact.map.is_some() {
                outputs.push(map_path(&out_path));
            }
            return FileResult::skipped(input.to_path_buf(), outputs);
        }

        match self.write(&out_path, artifact) {
            Ok(outputs) => FileResult::built(input.to_path_buf(), outputs, start.elapsed()),
            Err(e) => FileResult::failed(
                input.to_path_buf(),
                format!("write {}: {}", out_path.display(), e),
                start.elapsed(),
            ),
        }
    }

    /// Write the artifact (and its source map, if requested) to disk.
    fn write(&self, out_path: &Path, artifact: Artifact) -> std::io::Result<Vec<PathBuf>> {
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outputs = Vec::new();
        let mut bytes = artifact.bytes;

        if self.naming.source_map {
            if let Some(map) = artifact.map {
                let map_file = map_path(out_path);
                if let Some(footer) = map_footer(out_path) {
                    bytes.extend_from_slice(footer.as_bytes());
                }
                fs::write(&map_file, map)?;
                outputs.push(map_file);
            }
        }

        fs::write(out_path, bytes)?;
        outputs.insert(0, out_path.to_path_buf());
        Ok(outputs)
    }
}

/// Sibling source map path for an output file (`a.min.css` -> `a.min.css.map`).
fn map_path(out_path: &Path) -> PathBuf {
    let mut name = out_path.as_os_str().to_os_string();
    name.push(".map");
    PathBuf::from(name)
}

/// sourceMappingURL footer comment for the output file type.
fn map_footer(out_path: &Path) -> Option<String> {
    let map_name = map_path(out_path);
    let map_name = map_name.file_name()?.to_string_lossy().into_owned();
    match out_path.extension().and_then(|e| e.to_str()) {
        Some("css") => Some(format!("\n/*# sourceMappingURL={} */\n", map_name)),
        Some("js") => Some(format!("\n//# sourceMappingURL={}\n", map_name)),
        _ => None,
    }
}

/// Concatenate text inputs in order, building a line-based source map that
/// points every output line back to its originating file and line.
fn concat_with_map(inputs: &[(PathBuf, PathBuf)], bundle_name: &str) -> Result<Artifact, String> {
    let mut map = SourceMap::new("/");
    let mut out = String::new();
    let mut out_line: u32 = 0;

    for (abs, rel) in inputs {
        let text = fs::read_to_string(abs)
            .map_err(|e| format!("concat: failed to read {}: {}", abs.display(), e))?;

        let source_name = rel.to_string_lossy().into_owned();
        let source_id = map.add_source(&source_name);
        map.set_source_content(source_id as usize, &text)
            .map_err(|e| format!("concat: source map: {}", e))?;

        for (line_idx, line) in text.lines().enumerate() {
            map.add_mapping(
                out_line,
                0,
                Some(OriginalLocation {
                    original_line: line_idx as u32,
                    original_column: 0,
                    source: source_id,
                    name: None,
                }),
            );
            out.push_str(line);
            out.push('\n');
            out_line += 1;
        }
    }

    let json = map
        .to_json(None)
        .map_err(|e| format!("concat: source map: {}", e))?;

    Ok(Artifact {
        rel_path: PathBuf::from(bundle_name),
        bytes: out.into_bytes(),
        map: Some(json),
    })
}
