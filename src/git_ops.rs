use anyhow::{Context, Result, anyhow};
use git2::{Repository, ResetType, Signature, Time};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Git working copy used to carry the shared ledger row between devices
///
/// Pulls are fast-forward when possible; when local history has diverged the
/// working copy is reset to the remote branch, so the last pushed row wins.
/// Without an `origin` remote, pull and push are no-ops and only local
/// commits are made.
pub struct GitChannel {
    repo: Option<Mutex<Repository>>,
}

impl GitChannel {
    /// Open the repository containing `file_path`, if there is one
    pub fn new(file_path: &Path) -> Self {
        let file_dir = if file_path.is_dir() {
            file_path.to_path_buf()
        } else {
            file_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        };

        let repo = Repository::discover(&file_dir).ok().map(Mutex::new);
        Self { repo }
    }

    /// Check if the file is under git version control
    pub fn is_git_managed(&self) -> bool {
        self.repo.is_some()
    }

    fn lock(&self) -> Result<Option<MutexGuard<'_, Repository>>> {
        match &self.repo {
            Some(r) => r
                .lock()
                .map(Some)
                .map_err(|_| anyhow!("Git repository lock poisoned")),
            None => Ok(None),
        }
    }

    /// Bring the current branch up to date with `origin`
    pub fn pull(&self) -> Result<()> {
        let Some(repo) = self.lock()? else {
            return Ok(());
        };
        let Ok(mut remote) = repo.find_remote("origin") else {
            return Ok(());
        };

        let refname = Self::branch_ref(&repo)?;
        let branch_name = refname.trim_start_matches("refs/heads/").to_string();

        remote
            .fetch(&[&branch_name], None, None)
            .context("Failed to fetch from origin")?;

        let Ok(fetch_head) = repo.find_reference("FETCH_HEAD") else {
            // Nothing published on the remote yet
            return Ok(());
        };
        let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

        if analysis.is_up_to_date() {
            return Ok(());
        }

        if analysis.is_unborn() || analysis.is_fast_forward() {
            match repo.find_reference(&refname) {
                Ok(mut reference) => {
                    reference.set_target(fetch_commit.id(), "Fast-forward")?;
                }
                Err(_) => {
                    repo.reference(&refname, fetch_commit.id(), true, "Initial pull")?;
                }
            }
            repo.set_head(&refname)?;
            repo.checkout_head(Some(git2::build::CheckoutBuilder::default().force()))?;
        } else {
            tracing::warn!(branch = %branch_name, "Local history diverged, taking remote state");
            let target = repo.find_object(fetch_commit.id(), None)?;
            repo.reset(&target, ResetType::Hard, None)?;
        }

        Ok(())
    }

    /// Commit `file_path` if its content changed
    ///
    /// # Returns
    /// `true` when a commit was created
    pub fn commit(&self, file_path: &Path, message: &str) -> Result<bool> {
        let Some(repo) = self.lock()? else {
            return Ok(false);
        };

        let relative_path = Self::relative_path(&repo, file_path)?;

        let mut index = repo.index()?;
        index.add_path(&relative_path)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        let parent_commit = match repo.head() {
            Ok(head) => {
                let oid = head.target().context("HEAD has no target")?;
                Some(repo.find_commit(oid)?)
            }
            Err(_) => None, // Initial commit
        };

        if parent_commit
            .as_ref()
            .is_some_and(|parent| parent.tree_id() == tree_id)
        {
            return Ok(false);
        }

        let signature = Self::get_signature(&repo)?;
        let parents: Vec<_> = parent_commit.iter().collect();

        repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;

        Ok(true)
    }

    /// Push the current branch to `origin`
    pub fn push(&self) -> Result<()> {
        let Some(repo) = self.lock()? else {
            return Ok(());
        };
        let Ok(mut remote) = repo.find_remote("origin") else {
            return Ok(());
        };

        let refspec = Self::branch_ref(&repo)?;
        remote
            .push(&[&refspec], None)
            .context("Failed to push to origin")?;

        Ok(())
    }

    /// Name of the branch HEAD points at, even before the first commit
    fn branch_ref(repo: &Repository) -> Result<String> {
        let head = repo.find_reference("HEAD").context("Failed to get HEAD")?;
        match head.symbolic_target() {
            Some(target) => Ok(target.to_string()),
            None => Err(anyhow!("HEAD is detached")),
        }
    }

    fn relative_path(repo: &Repository, file_path: &Path) -> Result<PathBuf> {
        let workdir = repo
            .workdir()
            .context("Repository has no working directory")?;
        let workdir = fs::canonicalize(workdir)?;

        let file_name = file_path.file_name().context("Path has no file name")?;
        let parent = match file_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let absolute = fs::canonicalize(parent)?.join(file_name);

        absolute
            .strip_prefix(&workdir)
            .map(Path::to_path_buf)
            .context("File is not in repository")
    }

    fn get_signature(repo: &Repository) -> Result<Signature<'_>> {
        let config = repo.config()?;

        let name = config
            .get_string("user.name")
            .unwrap_or_else(|_| "custody-day".to_string());

        let email = config
            .get_string("user.email")
            .unwrap_or_else(|_| "custody-day@localhost".to_string());

        match Signature::now(&name, &email) {
            Ok(sig) => Ok(sig),
            Err(_) => {
                let time = Time::new(1_700_000_000, 0);
                Signature::new(&name, &email, &time)
                    .context("Failed to create signature with fixed time")
            }
        }
    }
}
