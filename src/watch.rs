//! Watch mode for automatic rebuilds on file changes.
//!
//! Watches the source roots with debouncing; a change triggers the tasks
//! bound to its root, then signals the reload channel. Events arriving while
//! a build runs are drained afterwards and collapsed into at most one
//! trailing rebuild, so runs over the same outputs never interleave.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use crate::context::TaskContext;
use crate::pipeline::TaskResult;
use crate::serve::ReloadChannel;
use crate::tasks::{self, Task};
use thiserror::Error;

/// Error during watch mode setup.
///
/// Task failures inside the loop are not errors at this level; they are
/// logged and the loop keeps running so the developer can fix the source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize the file watcher
    #[error("failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add a watch path
    #[error("failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Event channel closed unexpectedly
    #[error("watch channel error: {0}")]
    Channel(String),
    /// No configured source root exists
    #[error("no watchable source directory found")]
    NoWatchRoots,
}

/// Association between a watched root and the tasks to run on change.
///
/// Created once at startup and never mutated for the life of the watch.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    /// Binding name for logs
    pub name: &'static str,
    /// Directory watched recursively
    pub root: PathBuf,
    /// File extensions that trigger this binding (empty = any file)
    pub extensions: &'static [&'static str],
    /// Tasks to run, in order
    pub tasks: &'static [Task],
}

impl WatchBinding {
    /// Whether a changed path belongs to this binding.
    fn matches(&self, path: &Path) -> bool {
        if !path.starts_with(&self.root) {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}

/// The standard bindings: style tree, script tree, image tree.
pub fn default_bindings(ctx: &TaskContext) -> Vec<WatchBinding> {
    let scripts_root = ctx
        .modules_file()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.project_root().to_path_buf());

    vec![
        WatchBinding {
            name: "styles",
            root: ctx.styles_src(),
            extensions: &["scss"],
            tasks: &[Task::Styles, Task::StyleModules],
        },
        WatchBinding {
            name: "scripts",
            root: scripts_root,
            extensions: &["js", "toml"],
            tasks: &[Task::Scripts],
        },
        WatchBinding {
            name: "images",
            root: ctx.images_src(),
            extensions: &[],
            tasks: &[Task::Images],
        },
    ]
}

/// Tracks files with errors across build iterations for recovery detection.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    files_with_errors: HashSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the tracker with a new batch of results, returning the files
    /// that had errors before and no longer do.
    pub fn update(&mut self, results: &[TaskResult]) -> Vec<PathBuf> {
        let current: HashSet<PathBuf> = results
            .iter()
            .flat_map(|r| r.failures().map(|(path, _)| path.clone()))
            .collect();

        let fixed: Vec<PathBuf> = self.files_with_errors.difference(&current).cloned().collect();
        self.files_with_errors = current;
        fixed
    }

    /// Check if there are any tracked errors.
    pub fn has_errors(&self) -> bool {
        !self.files_with_errors.is_empty()
    }

    /// Number of files currently failing.
    pub fn error_count(&self) -> usize {
        self.files_with_errors.len()
    }
}

/// Map a debounced event batch to the tasks it triggers, deduplicated and
/// in binding order. A burst of events over one tree collapses to a single
/// entry per task.
pub fn triggered_tasks(events: &[DebouncedEvent], bindings: &[WatchBinding]) -> Vec<Task> {
    let mut tasks = Vec::new();
    for binding in bindings {
        let hit = events.iter().any(|e| {
            matches!(e.kind, DebouncedEventKind::Any) && binding.matches(&e.path)
        });
        if hit {
            for task in binding.tasks {
                if !tasks.contains(task) {
                    tasks.push(*task);
                }
            }
        }
    }
    tasks
}

/// Clear the terminal screen
fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Print a batch of task results with fixed-file notifications.
fn print_results(results: &[TaskResult], fixed_files: &[PathBuf]) {
    for fixed in fixed_files {
        if let Some(name) = fixed.file_name() {
            println!("[{}] Fixed: {}", timestamp(), name.to_string_lossy());
        }
    }

    for result in results {
        let errors = result.error_count();
        if errors == 0 {
            println!(
                "[{}] {}: {} file{} ({})",
                timestamp(),
                result.pipeline,
                result.built_count(),
                if result.built_count() == 1 { "" } else { "s" },
                format_duration(result.total_duration),
            );
        } else {
            println!(
                "[{}] {}: {} error{} ({})",
                timestamp(),
                result.pipeline,
                errors,
                if errors == 1 { "" } else { "s" },
                format_duration(result.total_duration),
            );
            for (path, message) in result.failures() {
                eprintln!("[{}] Error in {}: {}", timestamp(), path.display(), message);
            }
        }
    }
}

/// Run a batch of tasks, logging results and tracking recoveries.
fn run_batch(
    ctx: &TaskContext,
    batch: &[Task],
    tracker: &mut ErrorTracker,
    reload: Option<&ReloadChannel>,
) {
    if ctx.config().watch.clear_screen {
        clear_screen();
    }
    println!("[{}] Building: {}", timestamp(), join_names(batch));

    let results = tasks::run_many(ctx, batch);
    let fixed = tracker.update(&results);
    print_results(&results, &fixed);
    if let Some(reload) = reload {
        reload.notify();
    }
}

fn join_names(batch: &[Task]) -> String {
    batch.iter().map(Task::name).collect::<Vec<_>>().join(", ")
}

/// Drain events that arrived while a build was running, collapsing them
/// into at most one pending batch.
fn drain_pending(
    rx: &Receiver<notify_debouncer_mini::DebounceEventResult>,
    bindings: &[WatchBinding],
) -> Result<Vec<Task>, WatchError> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(Ok(batch)) => events.extend(batch),
            Ok(Err(error)) => {
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                return Err(WatchError::Channel("event channel disconnected".into()))
            }
        }
    }
    Ok(triggered_tasks(&events, bindings))
}

/// Watch the bound source roots and rebuild on change.
///
/// Runs a full initial build, then blocks until interrupted. When a reload
/// channel is given, every completed rebuild pushes one reload signal.
pub fn watch_and_rebuild(
    ctx: &TaskContext,
    bindings: &[WatchBinding],
    reload: Option<&ReloadChannel>,
) -> Result<(), WatchError> {
    let watched: Vec<&WatchBinding> = bindings.iter().filter(|b| b.root.exists()).collect();
    if watched.is_empty() {
        return Err(WatchError::NoWatchRoots);
    }

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;

    for binding in &watched {
        debouncer
            .watcher()
            .watch(&binding.root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: binding.root.clone(), source })?;
    }

    let mut tracker = ErrorTracker::new();

    // Initial full build
    let start = Instant::now();
    println!("[{}] Building all tasks...", timestamp());
    let results = tasks::run_many(ctx, &Task::ALL);
    tracker.update(&results);
    print_results(&results, &[]);
    println!("[{}] Initial build done ({})", timestamp(), format_duration(start.elapsed()));
    for binding in &watched {
        println!("[{}] Watching {} ({})", timestamp(), binding.root.display(), binding.name);
    }

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                for event in &events {
                    if let Some(name) = event.path.file_name() {
                        if ctx.is_verbose() {
                            println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
                        }
                    }
                }

                let mut batch = triggered_tasks(&events, bindings);
                // Serialize re-triggers: run, then fold anything that
                // changed meanwhile into a single trailing run.
                while !batch.is_empty() {
                    run_batch(ctx, &batch, &mut tracker, reload);
                    batch = drain_pending(&rx, bindings)?;
                }
            }
            Ok(Err(error)) => {
                // non-fatal watcher error
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
            }
            Err(e) => return Err(WatchError::Channel(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::pipeline::FileResult;
    use tempfile::TempDir;

    fn event(path: &str) -> DebouncedEvent {
        DebouncedEvent { path: PathBuf::from(path), kind: DebouncedEventKind::Any }
    }

    fn test_bindings() -> Vec<WatchBinding> {
        vec![
            WatchBinding {
                name: "styles",
                root: PathBuf::from("/proj/scss"),
                extensions: &["scss"],
                tasks: &[Task::Styles, Task::StyleModules],
            },
            WatchBinding {
                name: "scripts",
                root: PathBuf::from("/proj/js"),
                extensions: &["js", "toml"],
                tasks: &[Task::Scripts],
            },
            WatchBinding {
                name: "images",
                root: PathBuf::from("/proj/img"),
                extensions: &[],
                tasks: &[Task::Images],
            },
        ]
    }

    #[test]
    fn test_binding_matches_extension() {
        let bindings = test_bindings();
        assert!(bindings[0].matches(Path::new("/proj/scss/site.scss")));
        assert!(!bindings[0].matches(Path::new("/proj/scss/readme.md")));
        assert!(!bindings[0].matches(Path::new("/proj/js/site.scss")));
    }

    #[test]
    fn test_binding_empty_extensions_match_all() {
        let bindings = test_bindings();
        assert!(bindings[2].matches(Path::new("/proj/img/logo.png")));
        assert!(bindings[2].matches(Path::new("/proj/img/noext")));
    }

    #[test]
    fn test_burst_collapses_to_one_task_batch() {
        let bindings = test_bindings();
        let events = vec![
            event("/proj/scss/a.scss"),
            event("/proj/scss/a.scss"),
            event("/proj/scss/b.scss"),
        ];
        let tasks = triggered_tasks(&events, &bindings);
        assert_eq!(tasks, vec![Task::Styles, Task::StyleModules]);
    }

    #[test]
    fn test_multiple_trees_trigger_in_binding_order() {
        let bindings = test_bindings();
        let events = vec![event("/proj/js/app.js"), event("/proj/scss/a.scss")];
        let tasks = triggered_tasks(&events, &bindings);
        assert_eq!(tasks, vec![Task::Styles, Task::StyleModules, Task::Scripts]);
    }

    #[test]
    fn test_irrelevant_events_trigger_nothing() {
        let bindings = test_bindings();
        let events = vec![event("/proj/scss/notes.txt"), event("/elsewhere/x.scss")];
        assert!(triggered_tasks(&events, &bindings).is_empty());
    }

    #[test]
    fn test_module_list_edit_triggers_scripts() {
        let bindings = test_bindings();
        let events = vec![event("/proj/js/modules.toml")];
        assert_eq!(triggered_tasks(&events, &bindings), vec![Task::Scripts]);
    }

    #[test]
    fn test_error_tracker_detects_fixed_files() {
        let mut tracker = ErrorTracker::new();

        let mut first = TaskResult::new("styles");
        first.add(FileResult::failed(PathBuf::from("a.scss"), "boom".into(), Duration::ZERO));
        first.add(FileResult::failed(PathBuf::from("b.scss"), "boom".into(), Duration::ZERO));
        assert!(tracker.update(&[first]).is_empty());
        assert_eq!(tracker.error_count(), 2);

        let mut second = TaskResult::new("styles");
        second.add(FileResult::failed(PathBuf::from("b.scss"), "boom".into(), Duration::ZERO));
        let fixed = tracker.update(&[second]);
        assert_eq!(fixed, vec![PathBuf::from("a.scss")]);
        assert!(tracker.has_errors());

        let fixed = tracker.update(&[TaskResult::new("styles")]);
        assert_eq!(fixed, vec![PathBuf::from("b.scss")]);
        assert!(!tracker.has_errors());
    }

    #[test]
    fn test_default_bindings_cover_all_tasks() {
        let temp = TempDir::new().unwrap();
        let ctx = TaskContext::new(default_config(), temp.path().to_path_buf());
        let bindings = default_bindings(&ctx);
        assert_eq!(bindings.len(), 3);

        let all: HashSet<Task> =
            bindings.iter().flat_map(|b| b.tasks.iter().copied()).collect();
        assert_eq!(all.len(), Task::ALL.len());
    }

    #[test]
    fn test_watch_without_roots_errors() {
        let temp = TempDir::new().unwrap();
        let ctx = TaskContext::new(default_config(), temp.path().join("nothing-here"));
        let bindings = default_bindings(&ctx);
        let result = watch_and_rebuild(&ctx, &bindings, None);
        assert!(matches!(result, Err(WatchError::NoWatchRoots)));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
