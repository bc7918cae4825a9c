use crate::events::{EventBus, VFS_WRITE};
use crate::traits::Vfs;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SKIPPED_DIRS: [&str; 3] = ["target", "node_modules", "__pycache__"];

/// Local-disk [`Vfs`]. Accepts plain paths and `file://` URIs; relative
/// paths resolve against `root`.
pub struct LocalVfs {
    root: PathBuf,
    bus: Option<Arc<EventBus>>,
}

impl LocalVfs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

impl Vfs for LocalVfs {
    fn read(&self, path: &str) -> Option<String> {
        let full_path = self.resolve(path);
        match std::fs::read_to_string(&full_path) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!(path = %full_path.display(), error = %e, "vfs read failed");
                None
            }
        }
    }

    fn write(&self, path: &str, content: &str) -> bool {
        let full_path = self.resolve(path);

        let result = full_path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&full_path, content));

        match result {
            Ok(()) => {
                if let Some(bus) = &self.bus {
                    bus.publish(VFS_WRITE, Value::String(path.to_string()));
                }
                true
            }
            Err(e) => {
                tracing::warn!(path = %full_path.display(), error = %e, "vfs write failed");
                false
            }
        }
    }

    /// Directory entries sorted with directories first; directories carry a
    /// trailing `/`.
    fn list(&self, path: &str) -> Vec<String> {
        let Ok(read_dir) = std::fs::read_dir(self.resolve(path)) else {
            return Vec::new();
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in read_dir.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                dirs.push(format!("{name}/"));
            } else {
                files.push(name);
            }
        }
        dirs.sort();
        files.sort();
        dirs.extend(files);
        dirs
    }

    fn walk(&self, path: &str, max_depth: usize) -> Vec<String> {
        let base = self.resolve(path);
        if !base.is_dir() {
            return Vec::new();
        }

        let mut paths: Vec<String> = walkdir::WalkDir::new(&base)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| !is_hidden(&e.file_name().to_string_lossy()))
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let relative = e.path().strip_prefix(&base).ok()?;
                let mut rendered = relative.to_string_lossy().replace('\\', "/");
                if e.file_type().is_dir() {
                    rendered.push('/');
                }
                Some(rendered)
            })
            .collect();
        paths.sort();
        paths
    }
}
