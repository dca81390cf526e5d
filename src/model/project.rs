//! the Project entity

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset};
use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::model::{sha_list, string_list, Author, Commit, IGNORED_AUTHORS};
use crate::objects::Sha1;
use crate::storage::{relation_keys, settings, Relation};

/// platforms that show up as project name prefixes; everything else is
/// assumed to live on github
const URL_PREFIXES: &[(&str, &str)] = &[
    ("bitbucket.org", "bitbucket.org"),
    ("gitlab.com", "gitlab.com"),
    ("android.googlesource.com", "android.googlesource.com"),
    ("bioconductor.org", "bioconductor.org"),
    ("drupal.com", "git.drupal.org"),
    ("git.eclipse.org", "git.eclipse.org"),
    ("git.kernel.org", "git.kernel.org"),
    ("git.postgresql.org", "git.postgresql.org"),
    ("git.savannah.gnu.org", "git.savannah.gnu.org"),
    ("git.zx2c4.com", "git.zx2c4.com"),
    ("gitlab.gnome.org", "gitlab.gnome.org"),
    ("kde.org", "anongit.kde.org"),
    ("repo.or.cz", "repo.or.cz"),
    ("salsa.debian.org", "salsa.debian.org"),
    ("sourceforge.net", "git.code.sf.net/p"),
];

/// a project, addressed by its `<platform_>user_repo` URI bytes
///
/// commit iteration drops ignored authors and unretrievable commits, and
/// sanitizes authored dates against the project's root commits
#[derive(Debug, Clone)]
pub struct Project {
    name: Vec<u8>,
    loaded: OnceCell<Vec<(Commit, Option<DateTime<FixedOffset>>)>>,
}

impl Project {
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        Project {
            name: name.into(),
            loaded: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// raw relation: every commit SHA recorded for this project
    pub fn commit_shas(&self) -> Result<Vec<Sha1>> {
        sha_list(Relation::ProjectCommits, "project", &self.name)
    }

    /// author strings recorded for this project
    pub fn author_names(&self) -> Result<Vec<Vec<u8>>> {
        string_list(Relation::ProjectAuthors, "project", &self.name)
    }

    pub fn authors(&self) -> Result<Vec<Author>> {
        Ok(self.author_names()?.into_iter().map(Author::new).collect())
    }

    /// the project's commits, filtered and date-sanitized
    pub fn commits(&self) -> Result<Vec<Commit>> {
        Ok(self.loaded()?.iter().map(|(c, _)| c.clone()).collect())
    }

    /// membership by commit
    pub fn contains(&self, commit: &Commit) -> Result<bool> {
        self.contains_sha(commit.sha().hex())
    }

    /// membership by hex or raw SHA
    pub fn contains_sha(&self, sha: impl AsRef<[u8]>) -> Result<bool> {
        let sha = Sha1::parse(sha.as_ref())?;
        Ok(self.commit_shas()?.contains(&sha))
    }

    /// the filtered commit set with sanitized authored dates
    ///
    /// dates earlier than the oldest dated tail are treated as absent;
    /// commit clocks in the wild are not to be trusted
    fn loaded(&self) -> Result<&[(Commit, Option<DateTime<FixedOffset>>)]> {
        self.loaded
            .get_or_try_init(|| {
                let mut commits = Vec::new();
                for sha in self.commit_shas()? {
                    let commit = Commit::from_sha(sha);
                    if !commit.is_retrievable() {
                        continue;
                    }
                    if IGNORED_AUTHORS.contains(&commit.author()?) {
                        continue;
                    }
                    let authored_at = commit.authored_at()?;
                    commits.push((commit, authored_at));
                }

                // the floor comes from the tails only: parentless commits
                // that some commit follows as its first parent
                let mut first_parents: HashSet<Sha1> = HashSet::new();
                for (commit, _) in &commits {
                    first_parents.extend(commit.parent_shas()?.first().copied());
                }
                let floor = commits
                    .iter()
                    .filter(|(c, _)| {
                        matches!(c.parent_shas(), Ok(p) if p.is_empty())
                            && first_parents.contains(&c.sha())
                    })
                    .filter_map(|(_, date)| *date)
                    .min();
                if let Some(floor) = floor {
                    for (_, date) in commits.iter_mut() {
                        if matches!(date, Some(d) if *d < floor) {
                            *date = None;
                        }
                    }
                }
                Ok(commits)
            })
            .map(Vec::as_slice)
    }

    /// the head commit: a parentless-from-the-top root of the child
    /// relation, i.e. a commit of the project nothing in the project
    /// descends from, latest authored date first
    ///
    /// commit dates are sometimes wrong, so "no children inside the
    /// project" beats "newest commit"
    pub fn head(&self) -> Result<Commit> {
        let loaded = self.loaded()?;
        let mut parents: HashSet<Sha1> = HashSet::new();
        for (commit, _) in loaded {
            parents.extend(commit.parent_shas()?.iter().copied());
        }
        let mut head: Option<(&Commit, DateTime<FixedOffset>)> = None;
        let epoch = epoch();
        for (commit, date) in loaded {
            if parents.contains(&commit.sha()) {
                continue;
            }
            let date = date.unwrap_or(epoch);
            // strict comparison keeps the first of equals
            if head.as_ref().map_or(true, |(_, best)| date > *best) {
                head = Some((commit, date));
            }
        }
        head.map(|(c, _)| c.clone())
            .ok_or_else(|| Error::not_found("project head", String::from_utf8_lossy(&self.name)))
    }

    /// the tail commit: the parentless root the first-parent chain
    /// bottoms out at
    pub fn tail(&self) -> Result<Commit> {
        let loaded = self.loaded()?;
        let mut first_parents: HashSet<Sha1> = HashSet::new();
        for (commit, _) in loaded {
            first_parents.extend(commit.parent_shas()?.first().copied());
        }
        let epoch = epoch();
        let mut tail: Option<(&Commit, DateTime<FixedOffset>)> = None;
        for (commit, date) in loaded {
            if !commit.parent_shas()?.is_empty() || !first_parents.contains(&commit.sha()) {
                continue;
            }
            let date = date.unwrap_or(epoch);
            if tail.as_ref().map_or(true, |(_, best)| date < *best) {
                tail = Some((commit, date));
            }
        }
        tail.map(|(c, _)| c.clone())
            .ok_or_else(|| Error::not_found("project tail", String::from_utf8_lossy(&self.name)))
    }

    /// walk the first-parent chain from the latest-authored commit down
    ///
    /// stops on a missing parent or on the first unretrievable hop
    pub fn commits_fp(&self) -> Result<CommitsFp> {
        let loaded = self.loaded()?;
        let epoch = epoch();
        let start = loaded
            .iter()
            .max_by_key(|(_, date)| date.unwrap_or(epoch))
            .map(|(c, _)| c.clone());
        Ok(CommitsFp { current: start })
    }

    /// guess the project's browsable URL from its key
    pub fn url(&self) -> String {
        let key = String::from_utf8_lossy(&self.name);
        let (prefix, body) = key.split_once('_').unwrap_or((key.as_ref(), ""));
        let platform = URL_PREFIXES
            .iter()
            .find(|(known, _)| *known == prefix)
            .map(|(_, platform)| *platform);
        match platform {
            Some(platform) if prefix == "sourceforge.net" => {
                format!("https://{}/{}", platform, body)
            }
            Some(platform) if body.contains('_') => {
                format!("https://{}/{}", platform, body.replacen('_', "/", 1))
            }
            _ => format!("https://github.com/{}", key.replacen('_', "/", 1)),
        }
    }

    /// every project name the dataset knows
    pub fn all() -> Result<impl Iterator<Item = Result<Project>>> {
        let keys = relation_keys(settings()?, Relation::ProjectCommits);
        Ok(keys.map(|item| item.map(Project::new)))
    }
}

fn epoch() -> DateTime<FixedOffset> {
    DateTime::<chrono::Utc>::UNIX_EPOCH.fixed_offset()
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Project {}

impl Hash for Project {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "project".hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.name))
    }
}

/// iterator over the first-parent chain
pub struct CommitsFp {
    current: Option<Commit>,
}

impl Iterator for CommitsFp {
    type Item = Commit;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        self.current = match current.parent_shas() {
            Ok(parents) => parents.first().map(|&sha| Commit::from_sha(sha)),
            Err(_) => None,
        }
        .filter(Commit::is_retrievable);
        Some(current)
    }
}
