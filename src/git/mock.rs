use crate::error::{BumpError, Result};
use crate::git::Repository;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const ROOT_COMMIT: &str = "c0";

/// Refs visible to a test: checked-out branch, branch histories and tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSnapshot {
    pub branch: String,
    pub branches: BTreeMap<String, Vec<String>>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug)]
struct MockState {
    current_branch: String,
    branches: BTreeMap<String, Vec<String>>,
    tags: BTreeMap<String, String>,
    messages: BTreeMap<String, String>,
    next_commit: usize,
    staged: Vec<PathBuf>,
    dirty: bool,
    remote_url: String,
    remote_branches: BTreeMap<String, Vec<String>>,
    remote_tags: BTreeMap<String, String>,
    // Committed content of files the test cares about; None means absent
    tracked: BTreeMap<PathBuf, Option<String>>,
}

/// In-memory repository for testing without actual git operations
///
/// Branches are plain lists of commit ids, so merges and pushes can be
/// asserted on directly. Every mutating call is appended to an operation log,
/// and any call can be made to fail with [`MockRepository::fail_on`].
#[derive(Debug)]
pub struct MockRepository {
    state: RefCell<MockState>,
    operations: RefCell<Vec<String>>,
    fail_on: Option<String>,
}

impl MockRepository {
    /// Repository with `main` and `dev` at a single root commit, `dev` checked out
    pub fn new() -> Self {
        let mut branches = BTreeMap::new();
        branches.insert("main".to_string(), vec![ROOT_COMMIT.to_string()]);
        branches.insert("dev".to_string(), vec![ROOT_COMMIT.to_string()]);

        let mut messages = BTreeMap::new();
        messages.insert(ROOT_COMMIT.to_string(), "Initial commit".to_string());

        MockRepository {
            state: RefCell::new(MockState {
                current_branch: "dev".to_string(),
                branches,
                tags: BTreeMap::new(),
                messages,
                next_commit: 1,
                staged: Vec::new(),
                dirty: false,
                remote_url: "git@gitlab.example.com:acme/widgets.git".to_string(),
                remote_branches: BTreeMap::new(),
                remote_tags: BTreeMap::new(),
                tracked: BTreeMap::new(),
            }),
            operations: RefCell::new(Vec::new()),
            fail_on: None,
        }
    }

    /// Check out `name`, creating it at the current head if it does not exist
    pub fn on_branch(self, name: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            if !state.branches.contains_key(name) {
                let history = state.head_history().to_vec();
                state.branches.insert(name.to_string(), history);
            }
            state.current_branch = name.to_string();
        }
        self
    }

    /// Tag the current head
    pub fn with_tag(self, name: &str) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let head = state.head_commit();
            state.tags.insert(name.to_string(), head);
        }
        self
    }

    pub fn with_remote_url(self, url: &str) -> Self {
        self.state.borrow_mut().remote_url = url.to_string();
        self
    }

    /// Mark the working tree as having modifications outside tracked files
    pub fn with_dirty_tree(self) -> Self {
        self.state.borrow_mut().dirty = true;
        self
    }

    /// Record the current content of `path` as committed
    pub fn track_file(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).ok();
        self.state.borrow_mut().tracked.insert(path, content);
        self
    }

    /// Make every call of `operation` (e.g. "push", "merge branch") fail
    pub fn fail_on(mut self, operation: &str) -> Self {
        self.fail_on = Some(operation.to_string());
        self
    }

    pub fn snapshot(&self) -> MockSnapshot {
        let state = self.state.borrow();
        MockSnapshot {
            branch: state.current_branch.clone(),
            branches: state.branches.clone(),
            tags: state.tags.clone(),
        }
    }

    /// Mutating calls in the order they were made, e.g. "checkout branch main"
    pub fn operations(&self) -> Vec<String> {
        self.operations.borrow().clone()
    }

    pub fn staged(&self) -> Vec<PathBuf> {
        self.state.borrow().staged.clone()
    }

    pub fn branch_names(&self) -> Vec<String> {
        self.state.borrow().branches.keys().cloned().collect()
    }

    pub fn history(&self, branch: &str) -> Option<Vec<String>> {
        self.state.borrow().branches.get(branch).cloned()
    }

    pub fn tag_target(&self, tag: &str) -> Option<String> {
        self.state.borrow().tags.get(tag).cloned()
    }

    /// Commit message at the tip of `branch`
    pub fn head_message(&self, branch: &str) -> Option<String> {
        let state = self.state.borrow();
        let head = state.branches.get(branch)?.last()?;
        state.messages.get(head).cloned()
    }

    pub fn remote_history(&self, branch: &str) -> Option<Vec<String>> {
        self.state.borrow().remote_branches.get(branch).cloned()
    }

    pub fn remote_tags(&self) -> Vec<String> {
        self.state.borrow().remote_tags.keys().cloned().collect()
    }

    fn check(&self, operation: &str) -> Result<()> {
        match &self.fail_on {
            Some(failing) if failing == operation => {
                Err(BumpError::external(operation, "injected failure"))
            }
            _ => Ok(()),
        }
    }

    fn record(&self, operation: &str, detail: &str) -> Result<()> {
        let entry = if detail.is_empty() {
            operation.to_string()
        } else {
            format!("{} {}", operation, detail)
        };
        self.operations.borrow_mut().push(entry);
        self.check(operation)
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn head_history(&self) -> &[String] {
        self.branches
            .get(&self.current_branch)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn head_commit(&self) -> String {
        self.head_history()
            .last()
            .cloned()
            .unwrap_or_else(|| ROOT_COMMIT.to_string())
    }

    fn new_commit(&mut self, message: String) -> String {
        let id = format!("c{}", self.next_commit);
        self.next_commit += 1;
        self.messages.insert(id.clone(), message);
        id
    }

    fn modified_tracked_files(&self) -> Vec<PathBuf> {
        self.tracked
            .iter()
            .filter(|(path, committed)| fs::read_to_string(path).ok() != **committed)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

fn simple_diff(path: &Path, old: &str, new: &str) -> String {
    let name = path.display();
    let mut out = format!("diff --git a/{name} b/{name}\n--- a/{name}\n+++ b/{name}\n");
    for line in old.lines().filter(|line| !new.lines().any(|l| l == *line)) {
        out.push_str(&format!("-{}\n", line));
    }
    for line in new.lines().filter(|line| !old.lines().any(|l| l == *line)) {
        out.push_str(&format!("+{}\n", line));
    }
    out
}

impl Repository for MockRepository {
    fn current_branch(&self) -> Result<String> {
        self.check("current branch")?;
        Ok(self.state.borrow().current_branch.clone())
    }

    fn latest_tag(&self) -> Result<String> {
        self.check("latest tag")?;
        let state = self.state.borrow();

        state
            .head_history()
            .iter()
            .rev()
            .find_map(|commit| {
                state
                    .tags
                    .iter()
                    .filter(|(_, target)| *target == commit)
                    .map(|(name, _)| name.clone())
                    .last()
            })
            .ok_or_else(|| BumpError::external("latest tag", "no names found"))
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        self.record("create branch", name)?;
        let mut state = self.state.borrow_mut();

        if state.branches.contains_key(name) {
            return Err(BumpError::external(
                "create branch",
                format!("a branch named '{}' already exists", name),
            ));
        }

        let history = state.head_history().to_vec();
        state.branches.insert(name.to_string(), history);
        state.current_branch = name.to_string();
        Ok(())
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        self.record("checkout branch", name)?;
        let mut state = self.state.borrow_mut();

        if !state.branches.contains_key(name) {
            return Err(BumpError::external(
                "checkout branch",
                format!("no branch named '{}'", name),
            ));
        }
        state.current_branch = name.to_string();
        Ok(())
    }

    fn merge_branch(&self, name: &str) -> Result<()> {
        self.record("merge branch", name)?;
        let mut state = self.state.borrow_mut();

        let theirs = state.branches.get(name).cloned().ok_or_else(|| {
            BumpError::external("merge branch", format!("no branch named '{}'", name))
        })?;
        let ours = state.head_history().to_vec();

        let missing: Vec<String> = theirs
            .into_iter()
            .filter(|commit| !ours.contains(commit))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let current = state.current_branch.clone();
        let merge = state.new_commit(format!("Merge branch '{}' into {}", name, current));
        if let Some(history) = state.branches.get_mut(&current) {
            history.extend(missing);
            history.push(merge);
        }
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        self.record("delete branch", name)?;
        let mut state = self.state.borrow_mut();

        if state.current_branch == name {
            return Err(BumpError::external(
                "delete branch",
                format!("cannot delete checked-out branch '{}'", name),
            ));
        }
        state.branches.remove(name).map(|_| ()).ok_or_else(|| {
            BumpError::external("delete branch", format!("no branch named '{}'", name))
        })
    }

    fn create_tag(&self, name: &str) -> Result<()> {
        self.record("create tag", name)?;
        let mut state = self.state.borrow_mut();

        if state.tags.contains_key(name) {
            return Err(BumpError::external(
                "create tag",
                format!("tag '{}' already exists", name),
            ));
        }
        let head = state.head_commit();
        state.tags.insert(name.to_string(), head);
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        self.record("commit", message)?;
        let mut state = self.state.borrow_mut();

        let commit = state.new_commit(message.to_string());
        let current = state.current_branch.clone();
        if let Some(history) = state.branches.get_mut(&current) {
            history.push(commit);
        }

        for (path, committed) in state.tracked.iter_mut() {
            *committed = fs::read_to_string(path).ok();
        }
        state.staged.clear();
        state.dirty = false;
        Ok(())
    }

    fn stage(&self, path: &Path) -> Result<()> {
        self.record("stage", &path.display().to_string())?;
        let mut state = self.state.borrow_mut();

        if !state.staged.iter().any(|staged| staged == path) {
            state.staged.push(path.to_path_buf());
        }
        Ok(())
    }

    fn push(&self) -> Result<()> {
        let branch = self.state.borrow().current_branch.clone();
        self.record("push", &branch)?;

        let mut state = self.state.borrow_mut();
        let history = state.head_history().to_vec();
        state.remote_branches.insert(branch, history);
        Ok(())
    }

    fn push_tags(&self) -> Result<()> {
        self.record("push tags", "")?;
        let mut state = self.state.borrow_mut();

        let tags = state.tags.clone();
        state.remote_tags.extend(tags);
        Ok(())
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        self.check("status")?;
        let state = self.state.borrow();

        Ok(state.dirty || !state.staged.is_empty() || !state.modified_tracked_files().is_empty())
    }

    fn show_diff(&self, staged: bool) -> Result<String> {
        self.check("diff")?;
        let state = self.state.borrow();

        let paths: Vec<PathBuf> = if staged {
            state.staged.clone()
        } else {
            state
                .modified_tracked_files()
                .into_iter()
                .filter(|path| !state.staged.contains(path))
                .collect()
        };

        let diff = paths
            .iter()
            .map(|path| {
                let old = state.tracked.get(path).cloned().flatten().unwrap_or_default();
                let new = fs::read_to_string(path).unwrap_or_default();
                simple_diff(path, &old, &new)
            })
            .collect();
        Ok(diff)
    }

    fn discard_changes(&self) -> Result<()> {
        self.record("discard changes", "")?;
        let mut state = self.state.borrow_mut();

        for (path, committed) in &state.tracked {
            match committed {
                Some(content) => fs::write(path, content)?,
                None if path.exists() => fs::remove_file(path)?,
                None => {}
            }
        }
        state.staged.clear();
        state.dirty = false;
        Ok(())
    }

    fn origin_remote_url(&self) -> Result<String> {
        self.check("origin remote url")?;
        Ok(self.state.borrow().remote_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_tag_walks_history() {
        let repo = MockRepository::new().with_tag("v1.0.0");
        repo.commit_all("work").unwrap();
        assert_eq!(repo.latest_tag().unwrap(), "v1.0.0");

        repo.create_tag("v1.1.0").unwrap();
        assert_eq!(repo.latest_tag().unwrap(), "v1.1.0");
    }

    #[test]
    fn test_latest_tag_without_tags_fails() {
        let repo = MockRepository::new();
        assert!(matches!(
            repo.latest_tag(),
            Err(BumpError::ExternalCall { .. })
        ));
    }

    #[test]
    fn test_merge_creates_merge_commit() {
        let repo = MockRepository::new();
        repo.create_branch("release/v1.0.0").unwrap();
        repo.commit_all("Bump version to v1.0.0").unwrap();
        repo.checkout_branch("main").unwrap();
        repo.merge_branch("release/v1.0.0").unwrap();

        let main = repo.history("main").unwrap();
        assert_eq!(main.len(), 3);
        assert!(repo.head_message("main").unwrap().starts_with("Merge branch"));
    }

    #[test]
    fn test_merge_up_to_date_is_noop() {
        let repo = MockRepository::new();
        let before = repo.snapshot();
        repo.merge_branch("main").unwrap();
        assert_eq!(repo.snapshot(), before);
    }

    #[test]
    fn test_delete_checked_out_branch_fails() {
        let repo = MockRepository::new();
        assert!(repo.delete_branch("dev").is_err());
    }

    #[test]
    fn test_fail_on_injects_error() {
        let repo = MockRepository::new().fail_on("push");
        let err = repo.push().unwrap_err();
        assert_eq!(err.to_string(), "push failed: injected failure");
        assert_eq!(repo.operations(), vec!["push dev"]);
    }

    #[test]
    fn test_discard_restores_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("CHANGELOG.md");
        fs::write(&file, "before\n").unwrap();

        let repo = MockRepository::new().track_file(&file);
        fs::write(&file, "after\n").unwrap();
        repo.stage(&file).unwrap();
        assert!(repo.has_uncommitted_changes().unwrap());
        assert!(repo.show_diff(true).unwrap().contains("+after"));

        repo.discard_changes().unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "before\n");
        assert!(!repo.has_uncommitted_changes().unwrap());
    }

    #[test]
    fn test_push_records_remote_state() {
        let repo = MockRepository::new().with_tag("v0.1.0");
        repo.push().unwrap();
        repo.push_tags().unwrap();

        assert_eq!(repo.remote_history("dev"), repo.history("dev"));
        assert_eq!(repo.remote_tags(), vec!["v0.1.0"]);
    }
}
