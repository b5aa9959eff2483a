use log::warn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Counter file used when none is configured
pub const DEFAULT_VIEWS_FILE: &str = "public/views.csv";

/// Page view counter persisted as a single number in a flat file
///
/// The first line of the file holds the count. A missing or unreadable count
/// restarts from zero.
pub struct ViewCounter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ViewCounter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current count without incrementing it
    pub fn current(&self) -> io::Result<u64> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        read_count(&self.path)
    }

    /// Increment the stored count and return the new value
    ///
    /// # Returns
    /// * `io::Result<u64>` - The count after this view
    ///
    /// # Examples
    /// ```no_run
    /// use pkm2pred::views::ViewCounter;
    ///
    /// let counter = ViewCounter::new("public/views.csv");
    /// let views = counter.increment().unwrap();
    /// println!("{} views", views);
    /// ```
    pub fn increment(&self) -> io::Result<u64> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let count = read_count(&self.path)?.saturating_add(1);
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(&self.path, count.to_string())?;

        Ok(count)
    }
}

fn read_count(path: &Path) -> io::Result<u64> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("{} not found. Will be created with count 1.", path.display());
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    let first_line = content.trim().lines().next().unwrap_or_default().trim();
    match first_line.parse() {
        Ok(count) => Ok(count),
        Err(_) => {
            warn!(
                "Content of {} is not a valid number. Starting from 0 for increment.",
                path.display()
            );
            Ok(0)
        }
    }
}
