use crate::error::{PgError, PgResult};
use crate::obj::Oid;
use crate::odb::LocalOdb;
use crate::refs::{PgRef, PgRefdb, RefDbBackend, RefTarget};
use crate::remote::PushSpec;
use crate::repo::PgRepo;
use crate::transfer::copy_new_objects;
use anyhow::Context;
use fallible_iterator::FallibleIterator;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Splits a helper url of the form `<conninfo>/<reponame>` on the last slash.
pub fn parse_url(url: &str) -> PgResult<(String, String)> {
    let (conninfo, name) = url
        .rsplit_once('/')
        .ok_or_else(|| anyhow!("invalid url `{}`: expected <conninfo>/<reponame>", url))?;
    ensure!(!conninfo.is_empty(), "invalid url `{}`: empty connection string", url);
    ensure!(!name.is_empty(), "invalid url `{}`: empty repository name", url);
    Ok((conninfo.to_owned(), name.to_owned()))
}

/// The line-oriented remote-helper dialogue (gitremote-helpers(7)) over the
/// database-hosted repository: capabilities, list, fetch and push.
pub struct RemoteHelper<R, W> {
    repo: PgRepo,
    git_dir: PathBuf,
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> RemoteHelper<R, W> {
    pub fn new(repo: PgRepo, git_dir: impl Into<PathBuf>, input: R, out: W) -> Self {
        Self { repo, git_dir: git_dir.into(), input, out }
    }

    /// Dispatches commands until end of input or a blank line.
    pub fn run(&mut self) -> PgResult<()> {
        while let Some(line) = self.read_line()? {
            debug!("< `{}`", line);
            if line.is_empty() {
                break;
            }
            if line == "capabilities" {
                write_capabilities(&mut self.out)?;
                self.out.flush()?;
            } else if line == "list" || line == "list for-push" {
                self.list()?;
            } else if line.starts_with("fetch ") {
                self.fetch()?;
            } else if let Some(spec) = line.strip_prefix("push ") {
                let spec = spec.to_owned();
                self.push(&spec)?;
            } else {
                debug!("unknown command `{}`", line);
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> PgResult<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn open_local(&self) -> PgResult<git2::Repository> {
        git2::Repository::open(&self.git_dir).with_context(|| {
            format!("could not open local repository at `{}`", self.git_dir.display())
        })
    }

    fn list(&mut self) -> PgResult<()> {
        let refs = self.repo.refdb().iter(None)?.collect::<Vec<_>>()?;
        write_ref_listing(&mut self.out, &refs)?;
        self.out.flush()?;
        Ok(())
    }

    /// The remaining `fetch` lines are drained up to the blank terminator;
    /// the transfer itself copies every database object the local repository
    /// is missing.
    fn fetch(&mut self) -> PgResult<()> {
        while let Some(line) = self.read_line()? {
            if line.is_empty() {
                break;
            }
            debug!("< `{}`", line);
        }

        let local = self.open_local()?;
        let local_odb = local.odb()?;
        copy_new_objects(&self.repo.odb(), &LocalOdb::new(&local_odb))?;

        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    fn push(&mut self, first_spec: &str) -> PgResult<()> {
        let mut specs = vec![first_spec.parse::<PushSpec>()?];
        while let Some(line) = self.read_line()? {
            if line.is_empty() {
                break;
            }
            debug!("< `{}`", line);
            if let Some(spec) = line.strip_prefix("push ") {
                specs.push(spec.parse()?);
            }
        }

        let local = self.open_local()?;
        {
            // ship objects before any ref becomes visible
            let local_odb = local.odb()?;
            copy_new_objects(&LocalOdb::new(&local_odb), &self.repo.odb())?;
        }

        let refdb = self.repo.refdb();
        let mut any_ok = false;
        for spec in &specs {
            match apply_push_spec(&local, &refdb, spec) {
                Ok(()) => {
                    debug!("pushed {}", spec);
                    any_ok = true;
                    writeln!(self.out, "ok {}", spec.dst)?;
                }
                Err(err) => writeln!(self.out, "error {} {:#}", spec.dst, err)?,
            }
        }

        if any_ok && !refdb.exists("HEAD")? {
            let head = PgRef::symbolic("HEAD", specs[0].dst.clone());
            match refdb.write(&head, false, None, None, None, None) {
                Ok(()) => debug!("created HEAD -> {}", specs[0].dst),
                // racing another pusher is fine, somebody created it
                Err(err)
                    if matches!(
                        err.downcast_ref::<PgError>(),
                        Some(PgError::RefAlreadyExists(..))
                    ) => {}
                Err(err) => warn!("could not create HEAD: {:#}", err),
            }
        }

        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

fn apply_push_spec(
    local: &git2::Repository,
    refdb: &PgRefdb,
    spec: &PushSpec,
) -> PgResult<()> {
    match &spec.src {
        None => refdb.delete(&spec.dst, None, None),
        Some(src) => {
            let oid = resolve_local(local, src)?;
            refdb.write(&PgRef::direct(spec.dst.clone(), oid), true, None, None, None, None)
        }
    }
}

/// Resolves a push source in the local repository: first as a reference,
/// following symbolic chains, then as a raw oid string.
fn resolve_local(repo: &git2::Repository, src: &str) -> PgResult<Oid> {
    if let Ok(ref_) = repo.find_reference(src) {
        if let Ok(resolved) = ref_.resolve() {
            if let Some(oid) = resolved.target() {
                return Ok(oid.into());
            }
        }
    }
    src.parse::<Oid>().map_err(|_| anyhow!("cannot resolve `{}`", src))
}

pub fn write_capabilities(out: &mut dyn Write) -> PgResult<()> {
    writeln!(out, "fetch")?;
    writeln!(out, "push")?;
    writeln!(out)?;
    Ok(())
}

/// One line per direct ref, then the HEAD line when it can be expressed:
/// `@<target> HEAD` if HEAD is symbolic to a ref listed with an oid, the hex
/// oid if HEAD is itself direct, nothing otherwise.  Blank-line terminated.
pub fn write_ref_listing(out: &mut dyn Write, refs: &[PgRef]) -> PgResult<()> {
    for ref_ in refs {
        if ref_.name == "HEAD" {
            continue;
        }
        if let RefTarget::Direct(oid) = &ref_.target {
            debug!("list: {} {}", oid, ref_.name);
            writeln!(out, "{} {}", oid, ref_.name)?;
        }
    }

    if let Some(head) = refs.iter().find(|r| r.name == "HEAD") {
        match &head.target {
            RefTarget::Symbolic(target) => {
                if refs.iter().any(|r| &r.name == target && r.target.is_direct()) {
                    debug!("list: @{} HEAD", target);
                    writeln!(out, "@{} HEAD", target)?;
                }
            }
            RefTarget::Direct(oid) => {
                debug!("list: {} HEAD", oid);
                writeln!(out, "{} HEAD", oid)?;
            }
        }
    }

    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests;
