//! Infer the "current" CTF or challenge from a working directory
//!
//! Resolution is a pure function over an ordered entity list: the first
//! entity whose directory equals the path or is one of its ancestors wins.
//! Nothing here touches the filesystem.

use std::path::Path;

use crate::models::{Challenge, Ctf, Located};

/// First entity (in collection order) whose directory contains `cwd`
pub fn resolve<'a, T, I>(entities: I, cwd: &Path) -> Option<&'a T>
where
    T: Located + 'a,
    I: IntoIterator<Item = &'a T>,
{
    entities
        .into_iter()
        .find(|entity| cwd.starts_with(entity.location()))
}

/// The CTF whose directory is `cwd` or an ancestor of it
pub fn current_ctf<'a>(ctfs: &'a [Ctf], cwd: &Path) -> Option<&'a Ctf> {
    resolve(ctfs, cwd)
}

/// The challenge whose directory is `cwd` or an ancestor of it.
///
/// When `cwd` lies inside a CTF, only that CTF's challenges are considered.
pub fn current_challenge<'a>(
    ctfs: &[Ctf],
    challenges: &'a [Challenge],
    cwd: &Path,
) -> Option<&'a Challenge> {
    match current_ctf(ctfs, cwd) {
        Some(ctf) => resolve(challenges.iter().filter(|c| c.ctf_id == ctf.id), cwd),
        None => resolve(challenges, cwd),
    }
}
