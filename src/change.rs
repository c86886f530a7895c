use std::collections::{HashMap, HashSet};

use crate::{
    error::{Error, Result},
    scanner::ScannedFile,
};

/// What a single indexing run is allowed to do.
///
/// Each variant selects exactly which classifications produce engine
/// mutations; everything else is left alone. Notably `All` never
/// deletes orphans and `Missing` never reads file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Add unseen files and update stale ones.
    All,
    /// Add unseen files only.
    New,
    /// Update stale files only.
    Changed,
    /// Delete indexed identities no longer present in the corpus.
    Missing,
}

impl std::str::FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Mode::All),
            "new" => Ok(Mode::New),
            "changed" => Ok(Mode::Changed),
            "missing" => Ok(Mode::Missing),
            other => {
                Err(Error::Config(format!("unknown index mode: {other}")))
            }
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::All => "all",
            Mode::New => "new",
            Mode::Changed => "changed",
            Mode::Missing => "missing",
        };
        f.write_str(name)
    }
}

/// How one identity relates to the engine snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// In the corpus, not in the snapshot.
    Unseen,
    /// In both; corpus fingerprint strictly newer.
    Stale,
    /// In both; corpus fingerprint not newer.
    Current,
    /// In the snapshot, absent from the corpus.
    Orphan,
}

/// The kind of engine mutation a policy decision selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Add,
    Update,
    Delete,
}

impl Mode {
    /// The full mode policy table. Everything not listed is a no-op.
    pub fn mutation_for(
        self,
        classification: Classification,
    ) -> Option<MutationKind> {
        match (self, classification) {
            (Mode::All, Classification::Unseen) => Some(MutationKind::Add),
            (Mode::All, Classification::Stale) => Some(MutationKind::Update),
            (Mode::New, Classification::Unseen) => Some(MutationKind::Add),
            (Mode::Changed, Classification::Stale) => {
                Some(MutationKind::Update)
            }
            (Mode::Missing, Classification::Orphan) => {
                Some(MutationKind::Delete)
            }
            _ => None,
        }
    }
}

/// Classify one scanned corpus entry against the snapshot.
///
/// Orphans are not reachable from here; they are found by walking the
/// snapshot for identities the scan never visited.
pub fn classify_entry(
    snapshot: &HashMap<String, u64>,
    identity: &str,
    fingerprint: u64,
) -> Classification {
    match snapshot.get(identity) {
        None => Classification::Unseen,
        Some(&indexed) if fingerprint > indexed => Classification::Stale,
        Some(_) => Classification::Current,
    }
}

/// One planned engine mutation, carrying what the executor needs.
#[derive(Debug, Clone)]
pub enum Mutation {
    Add(ScannedFile),
    Update(ScannedFile),
    Delete(String),
}

/// Turn a snapshot and a scan into the run's mutation list.
///
/// Add/update mutations come out in scan order; orphan deletes (only
/// under `Missing`) follow, sorted by identity for determinism.
pub fn plan_changes(
    snapshot: &HashMap<String, u64>,
    scan: &[ScannedFile],
    mode: Mode,
) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for file in scan {
        seen.insert(file.identity.as_str());
        let classification =
            classify_entry(snapshot, &file.identity, file.fingerprint);
        match mode.mutation_for(classification) {
            Some(MutationKind::Add) => {
                mutations.push(Mutation::Add(file.clone()));
            }
            Some(MutationKind::Update) => {
                mutations.push(Mutation::Update(file.clone()));
            }
            Some(MutationKind::Delete) | None => {}
        }
    }

    if mode.mutation_for(Classification::Orphan) == Some(MutationKind::Delete)
    {
        let mut orphans: Vec<&String> = snapshot
            .keys()
            .filter(|identity| !seen.contains(identity.as_str()))
            .collect();
        orphans.sort();
        mutations
            .extend(orphans.into_iter().map(|o| Mutation::Delete(o.clone())));
    }

    mutations
}
