//! In-memory collaborators for development and tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::core::collaborators::{AssetIndex, NameResolver, PreloadHandle, PreloadProvider};

/// Package files keyed by mount point, plus an optional asset index view.
#[derive(Debug)]
pub struct InMemoryContentStore {
    mounts: Vec<(String, String)>,
    extension: String,
    files: RwLock<HashMap<String, String>>,
    indexed: RwLock<HashMap<String, String>>,
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContentStore {
    /// Empty store with no mount points and a `.pkg` extension.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mounts: Vec::new(),
            extension: ".pkg".to_owned(),
            files: RwLock::new(HashMap::new()),
            indexed: RwLock::new(HashMap::new()),
        }
    }

    /// Map package names under `package_root` to files under `content_dir`.
    #[must_use]
    pub fn with_mount(mut self, package_root: impl Into<String>, content_dir: impl Into<String>) -> Self {
        self.mounts.push((package_root.into(), content_dir.into()));
        self
    }

    /// Override the package file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn file_for(&self, package_name: &str) -> String {
        self.mounted_file_name(package_name)
            .unwrap_or_else(|| format!("{package_name}{}", self.extension))
    }

    /// Put a package on disk and in the asset index. Returns its file name.
    pub fn add_package(&self, package_name: &str) -> String {
        let file_name = self.add_unindexed_package(package_name);
        self.indexed
            .write()
            .insert(package_name.to_owned(), file_name.clone());
        file_name
    }

    /// Put a package on disk only, as if the asset index were stale.
    pub fn add_unindexed_package(&self, package_name: &str) -> String {
        let file_name = self.file_for(package_name);
        self.files
            .write()
            .insert(file_name.clone(), package_name.to_owned());
        file_name
    }

    /// Delete a package from disk and index.
    pub fn remove_package(&self, package_name: &str) -> bool {
        self.indexed.write().remove(package_name);
        let file_name = self.file_for(package_name);
        self.files.write().remove(&file_name).is_some()
    }

    /// Files currently on disk.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }
}

impl NameResolver for InMemoryContentStore {
    fn lookup_file_name_on_disk(&self, package_name: &str) -> Option<String> {
        let file_name = self.file_for(package_name);
        self.files.read().contains_key(&file_name).then_some(file_name)
    }

    fn lookup_package_name_on_disk(&self, file_name: &str) -> Option<String> {
        self.files.read().get(file_name).cloned()
    }

    fn mounted_file_name(&self, package_name: &str) -> Option<String> {
        self.mounts.iter().find_map(|(root, dir)| {
            package_name
                .strip_prefix(root.as_str())
                .map(|rest| format!("{dir}{rest}{}", self.extension))
        })
    }

    fn file_exists(&self, file_name: &str) -> bool {
        self.files.read().contains_key(file_name)
    }
}

impl AssetIndex for InMemoryContentStore {
    fn lookup_file_name(&self, package_name: &str) -> Option<String> {
        self.indexed.read().get(package_name).cloned()
    }
}

#[derive(Debug, Default)]
struct PreloadState {
    polls_to_complete: u32,
    missing: HashSet<String>,
    reject_registration: bool,
    registered: HashSet<String>,
    opened: usize,
    registrations: usize,
    unregistrations: usize,
    sync_waits: usize,
}

/// Preloads that complete after a fixed number of polls. Clones share state,
/// so a test can keep one to observe what the scheduler did.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPreloadProvider {
    state: Arc<Mutex<PreloadState>>,
}

struct InMemoryPreloadHandle {
    remaining: u32,
    state: Arc<Mutex<PreloadState>>,
}

impl PreloadHandle for InMemoryPreloadHandle {
    fn poll_is_complete(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        false
    }

    fn wait_until_complete(&mut self) {
        if self.remaining > 0 {
            self.remaining = 0;
            self.state.lock().sync_waits += 1;
        }
    }
}

impl InMemoryPreloadProvider {
    /// Provider whose preloads complete on the first poll.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloads report incomplete for the first `polls` polls.
    #[must_use]
    pub fn with_poll_latency(self, polls: u32) -> Self {
        self.state.lock().polls_to_complete = polls;
        self
    }

    /// Make `file_name` unopenable.
    pub fn set_missing(&self, file_name: impl Into<String>) {
        self.state.lock().missing.insert(file_name.into());
    }

    /// Refuse every registration.
    pub fn reject_registrations(&self, reject: bool) {
        self.state.lock().reject_registration = reject;
    }

    /// Preloads opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }

    /// Archives currently registered.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.state.lock().registered.len()
    }

    /// Successful registrations so far.
    #[must_use]
    pub fn registrations(&self) -> usize {
        self.state.lock().registrations
    }

    /// Unregistrations so far.
    #[must_use]
    pub fn unregistrations(&self) -> usize {
        self.state.lock().unregistrations
    }

    /// Blocking waits that actually had to wait.
    #[must_use]
    pub fn sync_waits(&self) -> usize {
        self.state.lock().sync_waits
    }
}

impl PreloadProvider for InMemoryPreloadProvider {
    fn open_read_package(&mut self, file_name: &str) -> Option<Box<dyn PreloadHandle>> {
        let mut state = self.state.lock();
        if state.missing.contains(file_name) {
            return None;
        }
        state.opened += 1;
        Some(Box::new(InMemoryPreloadHandle {
            remaining: state.polls_to_complete,
            state: Arc::clone(&self.state),
        }))
    }

    fn try_register_preloadable_archive(&mut self, file_name: &str, _handle: &dyn PreloadHandle) -> bool {
        let mut state = self.state.lock();
        if state.reject_registration {
            return false;
        }
        state.registrations += 1;
        state.registered.insert(file_name.to_owned())
    }

    fn unregister_preloadable_archive(&mut self, file_name: &str) {
        let mut state = self.state.lock();
        if state.registered.remove(file_name) {
            state.unregistrations += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mounts_map_names_to_files_and_back() {
        let store = InMemoryContentStore::new().with_mount("/Game/", "Content/");
        assert_eq!(store.mounted_file_name("/Game/Maps/A").as_deref(), Some("Content/Maps/A.pkg"));
        assert_eq!(store.mounted_file_name("/Engine/A"), None);
        assert_eq!(store.lookup_file_name_on_disk("/Game/Maps/A"), None);

        let file = store.add_package("/Game/Maps/A");
        assert!(store.file_exists(&file));
        assert_eq!(store.lookup_package_name_on_disk(&file).as_deref(), Some("/Game/Maps/A"));
        assert!(store.remove_package("/Game/Maps/A"));
        assert_eq!(store.file_count(), 0);
    }

    #[test]
    fn unindexed_packages_are_only_on_disk() {
        let store = InMemoryContentStore::new().with_mount("/Game/", "Content/");
        store.add_unindexed_package("/Game/A");
        assert_eq!(store.lookup_file_name("/Game/A"), None);
        assert!(store.lookup_file_name_on_disk("/Game/A").is_some());
    }

    #[test]
    fn preload_latency_and_waits() {
        let mut provider = InMemoryPreloadProvider::new().with_poll_latency(2);
        let observer = provider.clone();
        let mut handle = provider.open_read_package("Content/A.pkg").unwrap();
        assert!(!handle.poll_is_complete());
        handle.wait_until_complete();
        assert!(handle.poll_is_complete());
        assert_eq!(observer.sync_waits(), 1);

        assert!(provider.try_register_preloadable_archive("Content/A.pkg", handle.as_ref()));
        provider.unregister_preloadable_archive("Content/A.pkg");
        assert_eq!(observer.registrations(), 1);
        assert_eq!(observer.unregistrations(), 1);
        assert_eq!(observer.registered(), 0);
    }

    #[test]
    fn missing_files_do_not_open() {
        let mut provider = InMemoryPreloadProvider::new();
        provider.set_missing("Content/A.pkg");
        assert!(provider.open_read_package("Content/A.pkg").is_none());
        assert_eq!(provider.opened(), 0);
    }
}
