//! Main workflow orchestration logic
//!
//! [`Bumper`] drives one release from the development branch:
//!
//! 1. Validate: right branch, clean tree, manifest agrees with the latest tag,
//!    changelog has an unreleased section
//! 2. Select the bump and compute the new tag
//! 3. Stage manifest and changelog edits on a fresh release branch
//! 4. Confirmation gate; declining rolls everything back
//! 5. Commit, merge into trunk, tag, push, merge back, publish
//!
//! Nothing is mutated before step 3. Past the gate there is no automatic
//! compensation: a failure is reported as [`BumpError::PartiallyCompleted`]
//! naming the last step that went through.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::changelog::ChangelogEditor;
use crate::config::Config;
use crate::domain::version::tag_prefix;
use crate::domain::{BumpKind, RemoteEndpoint, Version};
use crate::error::{BumpError, Result};
use crate::git::{Git2Repository, Repository, RepositoryState};
use crate::manifest::{self, ProjectManifest};
use crate::readme;
use crate::release::{HostedResolver, PublisherResolver, ReleaseDraft, ReleasePublisher};
use crate::ui::{Operator, TerminalOperator};

/// Arguments for the bump workflow
///
/// Mirrors the CLI Args but in a format suitable for orchestration logic.
/// This decoupling allows the workflow to be called programmatically
/// without depending on clap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BumpWorkflowArgs {
    /// "major", "minor" or "patch"; asks the operator when absent
    pub bump_type: Option<String>,

    /// Skip the confirmation gate
    pub force: bool,

    /// Project root holding the manifest, changelog and README
    pub project_dir: PathBuf,
}

/// Result of a completed bump
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    pub previous_tag: String,
    pub new_tag: String,
    pub bump: BumpKind,
    /// Name of the service the release was published to
    pub publisher: String,
    pub release_url: String,
}

/// Workflow stage, advanced strictly in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Validated,
    VersionSelected,
    Staged,
    Confirmed,
    Published,
    Done,
    Cancelled,
    RolledBack,
}

/// Everything learned during validation
struct Prepared {
    state: RepositoryState,
    manifest: Option<ProjectManifest>,
    project_name: String,
    publisher: Box<dyn ReleasePublisher>,
}

/// Tracks the irreversible steps after the confirmation gate
#[derive(Default)]
struct Progress {
    completed: Option<String>,
}

impl Progress {
    fn step<T>(&mut self, name: &str, action: impl FnOnce() -> Result<T>) -> Result<T> {
        log::debug!("Release step: {}", name);

        match action() {
            Ok(value) => {
                self.completed = Some(name.to_string());
                Ok(value)
            }
            Err(e) => Err(BumpError::PartiallyCompleted {
                stage: self
                    .completed
                    .clone()
                    .unwrap_or_else(|| "confirmation".to_string()),
                source: Box::new(e),
            }),
        }
    }
}

/// Version bump orchestrator
pub struct Bumper<'a> {
    repo: &'a dyn Repository,
    operator: &'a dyn Operator,
    resolver: &'a mut dyn PublisherResolver,
    config: &'a Config,
    args: BumpWorkflowArgs,
    release_date: Option<NaiveDate>,
    stage: Stage,
}

impl<'a> Bumper<'a> {
    pub fn new(
        repo: &'a dyn Repository,
        operator: &'a dyn Operator,
        resolver: &'a mut dyn PublisherResolver,
        config: &'a Config,
        args: BumpWorkflowArgs,
    ) -> Self {
        Bumper {
            repo,
            operator,
            resolver,
            config,
            args,
            release_date: None,
            stage: Stage::Init,
        }
    }

    /// Date the changelog heading with `date` instead of today
    pub fn with_release_date(mut self, date: NaiveDate) -> Self {
        self.release_date = Some(date);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, next: Stage) {
        log::debug!("Bump stage {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    /// Run the whole workflow
    ///
    /// # Returns
    /// * `Ok(WorkflowResult)` - The release was tagged, pushed and published
    /// * `Err(BumpError::Cancelled)` - The operator declined; the repository is back where it started
    /// * `Err` - Any other failure
    pub fn run(&mut self) -> Result<WorkflowResult> {
        let requested = self
            .args
            .bump_type
            .as_deref()
            .map(str::parse::<BumpKind>)
            .transpose()?;

        let prepared = self.validate()?;
        let previous_tag = prepared.state.latest_tag.clone();

        let (bump, new_tag) = self.select_version(&previous_tag, requested)?;
        let release_branch = format!("{}{}", self.config.branches.release_prefix, new_tag);

        let notes = self.stage_release(&release_branch, &new_tag, prepared.manifest.as_ref())?;

        if self.args.force {
            log::debug!("Skipping confirmation");
        } else {
            self.confirmation_gate(&release_branch, &new_tag)?;
        }
        self.advance(Stage::Confirmed);

        let draft = ReleaseDraft::new(&prepared.project_name, &new_tag, &notes);
        let release_url =
            self.complete_release(&release_branch, &new_tag, &draft, prepared.publisher.as_ref())?;
        self.advance(Stage::Published);

        log::info!(
            "Created {} release: {}",
            prepared.publisher.name(),
            release_url
        );
        log::info!(
            "Successfully bumped version from {} to {}",
            previous_tag,
            new_tag
        );
        self.advance(Stage::Done);

        Ok(WorkflowResult {
            previous_tag,
            new_tag,
            bump,
            publisher: prepared.publisher.name().to_string(),
            release_url,
        })
    }

    /// Init -> Validated. Local checks come before anything that talks to the
    /// network or the operator, so a rejected run has no side effects.
    fn validate(&mut self) -> Result<Prepared> {
        let state = RepositoryState::capture(self.repo)?;
        let development = &self.config.branches.development;

        let manifest = manifest::detect(&self.args.project_dir);
        match &manifest {
            Some(found) if !found.matches_tag(&state.latest_tag) => {
                return Err(BumpError::validation(format!(
                    "latest tag {} does not match {} version {}",
                    state.latest_tag,
                    found.kind().name(),
                    found.current_version().unwrap_or_default()
                )));
            }
            Some(found) => log::debug!("Detected {} manifest", found.kind().name()),
            None => log::warn!("No supported package file found - package version will not be bumped"),
        }

        if &state.branch != development {
            return Err(BumpError::validation(format!(
                "expected current branch to be '{}', got '{}'",
                development, state.branch
            )));
        }

        if state.dirty {
            return Err(BumpError::validation(
                "uncommitted changes found - commit / stash changes before bumping version",
            ));
        }

        ChangelogEditor::new(&self.args.project_dir, &self.config.files.changelog)
            .ensure_releasable()?;

        let project_name =
            readme::resolve_project_name(&self.args.project_dir.join(&self.config.files.readme))?;

        let endpoint = RemoteEndpoint::parse(&self.repo.origin_remote_url()?)?;
        let publisher = self.resolver.resolve(&endpoint)?;

        log::debug!(
            "Project info: name={}, current version={}, server={}, packager={}",
            project_name,
            state.latest_tag,
            publisher.name(),
            manifest.as_ref().map_or("none", |m| m.kind().name())
        );

        self.advance(Stage::Validated);
        Ok(Prepared {
            state,
            manifest,
            project_name,
            publisher,
        })
    }

    /// Validated -> VersionSelected
    fn select_version(
        &mut self,
        latest_tag: &str,
        requested: Option<BumpKind>,
    ) -> Result<(BumpKind, String)> {
        let current = Version::parse(latest_tag)?;
        let prefix = tag_prefix(latest_tag);

        let bump = match requested {
            Some(kind) => kind,
            None => {
                let labels = current.candidates()?.labels(prefix);
                let index = self.operator.select_bump(latest_tag, &labels)?;
                BumpKind::from_index(index)?
            }
        };

        let new_tag = format!("{}{}", prefix, current.bump(bump)?);
        log::info!(
            "Bumping {} version from {} to {}",
            bump,
            latest_tag,
            new_tag
        );

        self.advance(Stage::VersionSelected);
        Ok((bump, new_tag))
    }

    /// VersionSelected -> Staged. Returns the release notes for `new_tag`.
    fn stage_release(
        &mut self,
        release_branch: &str,
        new_tag: &str,
        manifest: Option<&ProjectManifest>,
    ) -> Result<String> {
        log::debug!("Creating branch {}", release_branch);
        self.repo.create_branch(release_branch)?;

        match manifest {
            Some(manifest) if manifest.is_versioned() => {
                manifest.bump_version(new_tag)?;
                self.repo.stage(manifest.path())?;
            }
            _ => log::debug!("No package version to bump"),
        }

        let changelog = ChangelogEditor::new(&self.args.project_dir, &self.config.files.changelog);
        log::debug!("Shifting unreleased changelog notes to {}", new_tag);
        match self.release_date {
            Some(date) => changelog.update_on(new_tag, date)?,
            None => changelog.update(new_tag)?,
        }
        self.repo.stage(changelog.path())?;

        let notes = changelog.version_notes(new_tag)?;

        self.advance(Stage::Staged);
        Ok(notes)
    }

    fn confirmation_gate(&mut self, release_branch: &str, new_tag: &str) -> Result<()> {
        let diff = self.repo.show_diff(true)?;
        self.operator.show_diff(&diff);

        let prompt = format!("About to bump version to {} - continue?", new_tag);
        match self.operator.confirm(&prompt) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.roll_back(release_branch)?;
                Err(BumpError::Cancelled("version bump cancelled".to_string()))
            }
            Err(e) => {
                // An aborted prompt counts as declining
                if let Err(cleanup) = self.roll_back(release_branch) {
                    log::error!("Rolling back after failed prompt: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    /// Cancelled -> RolledBack: put the repository back exactly as it was
    fn roll_back(&mut self, release_branch: &str) -> Result<()> {
        self.advance(Stage::Cancelled);
        log::debug!("Cancelling bump");

        self.repo.discard_changes()?;
        self.repo.checkout_branch(&self.config.branches.development)?;
        self.repo.delete_branch(release_branch)?;

        self.advance(Stage::RolledBack);
        Ok(())
    }

    fn complete_release(
        &self,
        release_branch: &str,
        new_tag: &str,
        draft: &ReleaseDraft,
        publisher: &dyn ReleasePublisher,
    ) -> Result<String> {
        let repo = self.repo;
        let trunk = &self.config.branches.trunk;
        let development = &self.config.branches.development;
        let mut progress = Progress::default();

        progress.step("commit version bump", || {
            repo.commit_all(&format!("Bump version to {}", new_tag))
        })?;
        progress.step(&format!("checkout {}", trunk), || repo.checkout_branch(trunk))?;
        progress.step(&format!("merge {} into {}", release_branch, trunk), || {
            repo.merge_branch(release_branch)
        })?;
        progress.step(&format!("delete {}", release_branch), || {
            repo.delete_branch(release_branch)
        })?;
        progress.step(&format!("tag {}", new_tag), || repo.create_tag(new_tag))?;
        progress.step(&format!("push {}", trunk), || repo.push())?;
        progress.step("push tags", || repo.push_tags())?;
        progress.step(&format!("checkout {}", development), || {
            repo.checkout_branch(development)
        })?;
        progress.step(&format!("merge {} into {}", trunk, development), || {
            repo.merge_branch(trunk)
        })?;
        progress.step(&format!("push {}", development), || repo.push())?;

        progress.step(&format!("publish {} release", publisher.name()), || {
            publisher.publish(draft)
        })
    }
}

/// Main bump workflow
///
/// Wires the real collaborators (git2 repository, terminal prompts, hosted
/// release services) around [`Bumper`].
///
/// # Arguments
///
/// * `args` - Workflow arguments (bump type, force, project directory)
/// * `config` - Loaded configuration; newly entered credentials are saved through it
///
/// # Returns
///
/// Result containing the released version info or error
pub fn run_bump_workflow(args: BumpWorkflowArgs, config: Config) -> Result<WorkflowResult> {
    let project_dir = args.project_dir.canonicalize().map_err(|e| {
        BumpError::validation(format!(
            "cannot use project directory {}: {}",
            args.project_dir.display(),
            e
        ))
    })?;

    let repo = Git2Repository::open(&project_dir)?.with_remote(config.remote.clone());
    let operator = TerminalOperator::new();

    let mut credentials = config.clone();
    let mut resolver = HostedResolver::new(&mut credentials, &operator)?;

    let mut bumper = Bumper::new(
        &repo,
        &operator,
        &mut resolver,
        &config,
        BumpWorkflowArgs {
            project_dir,
            ..args
        },
    );
    bumper.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reports_last_completed_step() {
        let mut progress = Progress::default();
        progress.step("first", || Ok(())).unwrap();
        progress.step("second", || Ok(())).unwrap();

        let err = progress
            .step("third", || -> Result<()> {
                Err(BumpError::external("push", "rejected"))
            })
            .unwrap_err();

        match err {
            BumpError::PartiallyCompleted { stage, source } => {
                assert_eq!(stage, "second");
                assert!(matches!(*source, BumpError::ExternalCall { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_progress_failure_on_first_step() {
        let mut progress = Progress::default();
        let err = progress
            .step("commit", || -> Result<()> { Err(BumpError::external("commit", "x")) })
            .unwrap_err();

        assert!(matches!(
            err,
            BumpError::PartiallyCompleted { ref stage, .. } if stage == "confirmation"
        ));
    }
}
