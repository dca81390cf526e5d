//! the Author entity

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;
use crate::model::{sha_list, string_list, Commit, Project};
use crate::objects::Sha1;
use crate::storage::{relation_keys, settings, Relation};

/// an author, addressed by raw `Name <email>` bytes
#[derive(Debug, Clone)]
pub struct Author {
    name: Vec<u8>,
}

impl Author {
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        Author { name: name.into() }
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// SHAs of every commit authored by this person
    pub fn commit_shas(&self) -> Result<Vec<Sha1>> {
        sha_list(Relation::AuthorCommits, "author", &self.name)
    }

    pub fn commits(&self) -> Result<Vec<Commit>> {
        Ok(self.commit_shas()?.into_iter().map(Commit::from_sha).collect())
    }

    /// names of the files this author has touched
    pub fn file_names(&self) -> Result<Vec<Vec<u8>>> {
        string_list(Relation::AuthorFiles, "author", &self.name)
    }

    /// names of the projects this author has contributed to
    pub fn project_names(&self) -> Result<Vec<Vec<u8>>> {
        string_list(Relation::AuthorProjects, "author", &self.name)
    }

    pub fn projects(&self) -> Result<Vec<Project>> {
        Ok(self.project_names()?.into_iter().map(Project::new).collect())
    }

    /// every author string the dataset knows
    pub fn all() -> Result<impl Iterator<Item = Result<Author>>> {
        let keys = relation_keys(settings()?, Relation::AuthorCommits);
        Ok(keys.map(|item| item.map(Author::new)))
    }
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Author {}

impl Hash for Author {
    fn hash<H: Hasher>(&self, state: &mut H) {
        "author".hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.name))
    }
}
