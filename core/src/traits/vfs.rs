/// File access used by the file tools.
///
/// Mirrors the editor's file service: reads return `None` when the file is
/// missing or unreadable, writes report success as a flag, listings of a
/// non-directory are empty.
pub trait Vfs: Send + Sync {
    fn read(&self, path: &str) -> Option<String>;

    fn write(&self, path: &str, content: &str) -> bool;

    fn list(&self, path: &str) -> Vec<String>;

    /// Recursive listing up to `max_depth` levels, paths relative to `path`.
    fn walk(&self, path: &str, max_depth: usize) -> Vec<String>;
}
