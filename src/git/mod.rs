//! Version-control gateway
//!
//! This module provides a trait-based abstraction over the fixed set of git
//! operations the release workflow needs, so the orchestrator can run against
//! a real repository or an in-memory fake.
//!
//! # Overview
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: An in-memory repository for testing
//!
//! Every operation is synchronous. A failing operation surfaces as
//! [crate::error::BumpError::ExternalCall] naming the attempted operation;
//! nothing is retried.
//!
//! ```rust
//! # use bumper::git::Repository;
//! # fn example<R: Repository>(repo: &R) -> bumper::Result<()> {
//! if repo.current_branch()? == "dev" && !repo.has_uncommitted_changes()? {
//!     println!("latest tag: {}", repo.latest_tag()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;
use std::path::Path;

/// Common git operation trait for abstraction
///
/// ## Implementations
///
/// - [Git2Repository](repository::Git2Repository): Real Git implementation using the `git2` crate
/// - [MockRepository](mock::MockRepository): Test implementation recording every call
pub trait Repository {
    /// Name of the checked-out branch
    ///
    /// # Returns
    /// * `Ok(String)` - Short branch name (e.g., "dev")
    /// * `Err` - If HEAD is detached or unborn
    fn current_branch(&self) -> Result<String>;

    /// Most recently created tag reachable from HEAD (`git describe --tags --abbrev=0`)
    fn latest_tag(&self) -> Result<String>;

    /// Create a branch at HEAD and check it out
    fn create_branch(&self, name: &str) -> Result<()>;

    /// Check out an existing local branch
    fn checkout_branch(&self, name: &str) -> Result<()>;

    /// Merge a local branch into the current one, always creating a merge commit
    fn merge_branch(&self, name: &str) -> Result<()>;

    /// Delete a local branch
    fn delete_branch(&self, name: &str) -> Result<()>;

    /// Create a tag at HEAD
    fn create_tag(&self, name: &str) -> Result<()>;

    /// Commit every modification to a tracked file (`git commit -a`)
    fn commit_all(&self, message: &str) -> Result<()>;

    /// Stage a single path
    ///
    /// # Arguments
    /// * `path` - File to stage, absolute or relative to the working tree root
    fn stage(&self, path: &Path) -> Result<()>;

    /// Push the current branch to origin
    fn push(&self) -> Result<()>;

    /// Push every local tag to origin
    fn push_tags(&self) -> Result<()>;

    /// Whether the working tree has staged, unstaged or untracked changes
    fn has_uncommitted_changes(&self) -> Result<bool>;

    /// Patch text of staged (`staged = true`) or unstaged changes
    fn show_diff(&self, staged: bool) -> Result<String>;

    /// Throw away staged and unstaged modifications to tracked files (`git reset --hard`)
    fn discard_changes(&self) -> Result<()>;

    /// URL of the origin remote
    fn origin_remote_url(&self) -> Result<String>;
}

/// Snapshot of the repository taken once when a run starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    pub branch: String,
    pub latest_tag: String,
    pub dirty: bool,
}

impl RepositoryState {
    pub fn capture(repo: &dyn Repository) -> Result<Self> {
        Ok(RepositoryState {
            latest_tag: repo.latest_tag()?,
            branch: repo.current_branch()?,
            dirty: repo.has_uncommitted_changes()?,
        })
    }
}
