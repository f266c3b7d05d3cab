//! Named tasks and their pipeline definitions.
//!
//! A task is a fixed list of pipelines run strictly left-to-right; a
//! composite run executes tasks in sequence, and every pipeline's writes are
//! fully flushed before the next one starts. Pipelines are constructed fresh
//! on every run so the module list and glob matches are always current.

use crate::context::TaskContext;
use crate::modules::{self, ModuleListError};
use crate::pipeline::{FileResult, NamingPolicy, Pipeline, PipelineError, SourceSet, TaskResult};
use crate::stages::{CssPrint, ImageCompress, JsMinify, ScssCompile};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error while preparing or running a task.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// Pipeline setup failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The script module list could not be loaded
    #[error(transparent)]
    Modules(#[from] ModuleListError),
}

/// The independently invocable tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Compile the top-level style sheets (plain + minified, with maps)
    Styles,
    /// Compile the style module subtree (minified, flattened)
    StyleModules,
    /// Concatenate and minify the script bundle
    Scripts,
    /// Compress images into the distribution tree
    Images,
}

impl Task {
    /// Every task, in composite build order.
    pub const ALL: [Task; 4] = [Task::Styles, Task::StyleModules, Task::Scripts, Task::Images];

    /// Task name used in logs and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Task::Styles => "styles",
            Task::StyleModules => "style-modules",
            Task::Scripts => "scripts",
            Task::Images => "images",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the pipelines for one task.
///
/// The scripts task re-reads the module list here, at the start of every
/// run; nothing caches the previous read.
pub fn pipelines(ctx: &TaskContext, task: Task) -> Result<Vec<Pipeline>, TaskError> {
    match task {
        Task::Styles => {
            let src = ctx.styles_src();
            let dest = ctx.styles_out();
            // underscore partials are compile-time includes, never outputs
            Ok(vec![
                Pipeline::new("styles", SourceSet::glob(&src, "[!_]*.scss"), dest.clone())
                    .stage(Box::new(ScssCompile::new(src.clone())))
                    .stage(Box::new(CssPrint::expanded()))
                    .naming(NamingPolicy { source_map: true, ..Default::default() }),
                Pipeline::new("styles:min", SourceSet::glob(&src, "[!_]*.scss"), dest)
                    .stage(Box::new(ScssCompile::new(src)))
                    .stage(Box::new(CssPrint::minified()))
                    .naming(NamingPolicy {
                        suffix: Some(".min".into()),
                        source_map: true,
                        ..Default::default()
                    }),
            ])
        }
        Task::StyleModules => {
            let src = ctx.styles_src();
            let dest = ctx.styles_out().join("modules");
            Ok(vec![Pipeline::new(
                "style-modules",
                SourceSet::glob(&src, "**/modules/**/[!_]*.scss"),
                dest,
            )
            .stage(Box::new(ScssCompile::new(src)))
            .stage(Box::new(CssPrint::minified()))
            .naming(NamingPolicy {
                suffix: Some(".min".into()),
                flatten: true,
                source_map: true,
            })])
        }
        Task::Scripts => {
            let list = modules::load(&ctx.modules_file())?;
            let bundle = ctx.config().scripts.bundle.clone();
            let dest = ctx.scripts_out();
            Ok(vec![
                Pipeline::new("scripts", SourceSet::List(list.clone()), dest.clone())
                    .bundle(bundle.clone())
                    .naming(NamingPolicy { source_map: true, ..Default::default() }),
                // The strip-minified bundle carries no map; blank-line
                // removal would misalign the concat map.
                Pipeline::new("scripts:min", SourceSet::List(list), dest)
                    .bundle(bundle)
                    .stage(Box::new(JsMinify))
                    .naming(NamingPolicy {
                        suffix: Some(".min".into()),
                        ..Default::default()
                    }),
            ])
        }
        Task::Images => Ok(vec![Pipeline::new(
            "images",
            SourceSet::glob(ctx.images_src(), "**/*"),
            ctx.images_out(),
        )
        .stage(Box::new(ImageCompress::new()))]),
    }
}

/// Run one task: every pipeline in order, each to completion.
pub fn run_task(ctx: &TaskContext, task: Task) -> Result<Vec<TaskResult>, TaskError> {
    let pipelines = pipelines(ctx, task)?;
    let mut results = Vec::with_capacity(pipelines.len());

    for pipeline in &pipelines {
        if ctx.is_verbose() {
            println!("Running pipeline: {}", pipeline.name());
        }
        results.push(pipeline.run(ctx)?);
    }

    Ok(results)
}

/// Run several tasks strictly in sequence.
///
/// A task that fails to even start (e.g. an unreadable module list) is
/// recorded as a failed result; the remaining tasks still run.
pub fn run_many(ctx: &TaskContext, tasks: &[Task]) -> Vec<TaskResult> {
    let mut results = Vec::new();
    for task in tasks {
        match run_task(ctx, *task) {
            Ok(task_results) => results.extend(task_results),
            Err(e) => {
                let mut result = TaskResult::new(task.name());
                result.add(FileResult::failed(
                    PathBuf::from(task.name()),
                    e.to_string(),
                    Duration::ZERO,
                ));
                results.push(result);
            }
        }
    }
    results
}
