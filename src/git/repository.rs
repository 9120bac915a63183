use crate::error::{BumpError, OperationContext, Result};
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Cred, CredentialType, DescribeFormatOptions, DescribeOptions, DiffFormat,
    ObjectType, PushOptions, RemoteCallbacks, Repository as Git2Repo, ResetType, StatusOptions,
};
use std::path::{Path, PathBuf};

const DEFAULT_REMOTE: &str = "origin";

/// Wrapper around git2::Repository with our trait interface
pub struct Git2Repository {
    repo: Git2Repo,
    remote: String,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path).operation("open repository")?;

        Ok(Git2Repository::from_git2(repo))
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository {
            repo,
            remote: DEFAULT_REMOTE.to_string(),
        }
    }

    /// Use a remote other than "origin" for pushes and URL lookups
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    fn head_commit(&self, operation: &str) -> Result<git2::Commit<'_>> {
        self.repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .operation(operation)
    }

    fn push_refspecs(&self, refspecs: &[String], operation: &str) -> Result<()> {
        if refspecs.is_empty() {
            return Ok(());
        }

        let mut remote = self.repo.find_remote(&self.remote).operation(operation)?;
        let config = self.repo.config().operation(operation)?;

        let mut callbacks = remote_callbacks(&config);
        // Rejected refs are reported here rather than as a push error
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => Err(git2::Error::from_str(&format!(
                "remote rejected {}: {}",
                refname, status
            ))),
            None => Ok(()),
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        remote
            .push(refspecs, Some(&mut push_options))
            .operation(operation)
    }
}

/// Credential callbacks: SSH agent first, then key files from ~/.ssh, then
/// the configured credential helper for HTTPS remotes.
fn remote_callbacks(config: &git2::Config) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0usize;

    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempts += 1;
        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(CredentialType::SSH_KEY) {
            if attempts == 1 {
                return Cred::ssh_key_from_agent(username);
            }
            return match ssh_key_candidates().get(attempts - 2) {
                Some(key_path) => Cred::ssh_key(username, None, key_path, None),
                None => Err(git2::Error::from_str("no usable SSH credentials")),
            };
        }

        if attempts > 1 {
            return Err(git2::Error::from_str("authentication failed"));
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            return Cred::credential_helper(config, url, username_from_url);
        }

        Cred::default()
    });

    callbacks
}

fn ssh_key_candidates() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };

    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .filter(|path| path.exists())
        .collect()
}

/// Path relative to the working tree, as the index expects
fn relative_to(workdir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        return path.to_path_buf();
    }

    let canonical_workdir = workdir
        .canonicalize()
        .unwrap_or_else(|_| workdir.to_path_buf());
    let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    canonical_path
        .strip_prefix(&canonical_workdir)
        .or_else(|_| path.strip_prefix(workdir))
        .map(Path::to_path_buf)
        .unwrap_or(canonical_path)
}

impl super::Repository for Git2Repository {
    fn current_branch(&self) -> Result<String> {
        let head = self.repo.head().operation("current branch")?;

        if !head.is_branch() {
            return Err(BumpError::external("current branch", "HEAD is detached"));
        }

        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| BumpError::external("current branch", "branch name is not UTF-8"))
    }

    fn latest_tag(&self) -> Result<String> {
        let mut options = DescribeOptions::new();
        options.describe_tags();

        let describe = self.repo.describe(&options).operation("latest tag")?;

        let mut format = DescribeFormatOptions::new();
        format.abbreviated_size(0);

        describe.format(Some(&format)).operation("latest tag")
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        let head = self.head_commit("create branch")?;
        self.repo
            .branch(name, &head, false)
            .operation("create branch")?;

        self.checkout_branch(name)
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        let refname = format!("refs/heads/{}", name);
        let target = self
            .repo
            .revparse_single(&refname)
            .operation("checkout branch")?;

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();

        self.repo
            .checkout_tree(&target, Some(&mut checkout))
            .operation("checkout branch")?;
        self.repo.set_head(&refname).operation("checkout branch")
    }

    fn merge_branch(&self, name: &str) -> Result<()> {
        let op = "merge branch";

        let reference = self
            .repo
            .find_reference(&format!("refs/heads/{}", name))
            .operation(op)?;
        let their_head = self
            .repo
            .reference_to_annotated_commit(&reference)
            .operation(op)?;

        let (analysis, _) = self.repo.merge_analysis(&[&their_head]).operation(op)?;
        if analysis.is_up_to_date() {
            log::debug!("Branch '{}' is already merged", name);
            return Ok(());
        }

        // Even when a fast-forward is possible, record an explicit merge commit
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        self.repo
            .merge(&[&their_head], None, Some(&mut checkout))
            .operation(op)?;

        let mut index = self.repo.index().operation(op)?;
        if index.has_conflicts() {
            return Err(BumpError::external(
                op,
                format!("conflicts while merging '{}' - resolve them manually", name),
            ));
        }

        let tree_id = index.write_tree().operation(op)?;
        let tree = self.repo.find_tree(tree_id).operation(op)?;
        let signature = self.repo.signature().operation(op)?;
        let ours = self.head_commit(op)?;
        let theirs = self.repo.find_commit(their_head.id()).operation(op)?;
        let current = self.current_branch()?;

        let message = format!("Merge branch '{}' into {}", name, current);
        self.repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                &message,
                &tree,
                &[&ours, &theirs],
            )
            .operation(op)?;

        self.repo.cleanup_state().operation(op)
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        let mut branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .operation("delete branch")?;

        branch.delete().operation("delete branch")
    }

    fn create_tag(&self, name: &str) -> Result<()> {
        let head = self.head_commit("create tag")?;
        self.repo
            .tag_lightweight(name, head.as_object(), false)
            .operation("create tag")?;
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        let op = "commit";

        let mut index = self.repo.index().operation(op)?;
        // Tracked files only; untracked files are never swept in
        index.update_all(["*"], None).operation(op)?;
        index.write().operation(op)?;

        let tree_id = index.write_tree().operation(op)?;
        let tree = self.repo.find_tree(tree_id).operation(op)?;
        let signature = self.repo.signature().operation(op)?;
        let parent = self.head_commit(op)?;

        self.repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
            .operation(op)?;
        Ok(())
    }

    fn stage(&self, path: &Path) -> Result<()> {
        let op = "stage";

        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| BumpError::external(op, "repository has no working tree"))?;
        let relative = relative_to(workdir, path);

        let mut index = self.repo.index().operation(op)?;
        index.add_path(&relative).operation(op)?;
        index.write().operation(op)
    }

    fn push(&self) -> Result<()> {
        let branch = self.current_branch()?;
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);

        self.push_refspecs(&[refspec], "push")
    }

    fn push_tags(&self) -> Result<()> {
        let tags = self.repo.tag_names(None).operation("push tags")?;
        let refspecs: Vec<String> = tags
            .iter()
            .flatten()
            .map(|tag| format!("refs/tags/{}:refs/tags/{}", tag, tag))
            .collect();

        self.push_refspecs(&refspecs, "push tags")
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut options))
            .operation("status")?;

        Ok(!statuses.is_empty())
    }

    fn show_diff(&self, staged: bool) -> Result<String> {
        let op = "diff";

        let diff = if staged {
            let head_tree = self
                .repo
                .head()
                .and_then(|head| head.peel_to_tree())
                .operation(op)?;
            self.repo.diff_tree_to_index(Some(&head_tree), None, None)
        } else {
            self.repo.diff_index_to_workdir(None, None)
        }
        .operation(op)?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .operation(op)?;

        Ok(patch)
    }

    fn discard_changes(&self) -> Result<()> {
        let head = self
            .repo
            .head()
            .and_then(|head| head.peel(ObjectType::Commit))
            .operation("discard changes")?;

        self.repo
            .reset(&head, ResetType::Hard, None)
            .operation("discard changes")
    }

    fn origin_remote_url(&self) -> Result<String> {
        let remote = self
            .repo
            .find_remote(&self.remote)
            .operation("origin remote url")?;

        remote.url().map(str::to_string).ok_or_else(|| {
            BumpError::external("origin remote url", "remote URL is not UTF-8")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_is_kept() {
        let rel = relative_to(Path::new("/work/project"), Path::new("CHANGELOG.md"));
        assert_eq!(rel, PathBuf::from("CHANGELOG.md"));
    }

    #[test]
    fn test_absolute_path_is_made_relative() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("package.json");
        std::fs::write(&file, "{}").unwrap();

        assert_eq!(relative_to(dir.path(), &file), PathBuf::from("package.json"));
    }

    #[test]
    fn test_open_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Git2Repository::open(dir.path());
        // A temp dir may live inside a checkout on some machines; only check the error shape
        if let Err(err) = result {
            assert!(err.to_string().contains("open repository"));
        }
    }
}
