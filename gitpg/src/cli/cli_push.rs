use super::Cmd;
use anyhow::Context;
use libgitpg::error::PgResult;
use libgitpg::odb::LocalOdb;
use libgitpg::refs::{PgRef, RefDbBackend};
use libgitpg::repo::PgRepo;
use libgitpg::session::PgSession;
use libgitpg::signature::Signature;
use libgitpg::transfer::copy_new_objects;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct GitPgPushOpts {
    /// libpq-style connection string
    conninfo: String,
    reponame: String,
    local_path: PathBuf,
}

impl Cmd for GitPgPushOpts {
    fn exec(self) -> PgResult<()> {
        let session = PgSession::connect(&self.conninfo)?;
        let repo = PgRepo::create(session, &self.reponame)?;
        let local = git2::Repository::open(&self.local_path).with_context(|| {
            format!("could not open local repository at `{}`", self.local_path.display())
        })?;

        let local_odb = local.odb()?;
        let copied = copy_new_objects(&LocalOdb::new(&local_odb), &repo.odb())?;
        println!("Pushed {} objects", copied);

        let sig = match local.signature() {
            Ok(sig) => Signature::try_from(&sig)?,
            Err(..) => Signature::now("gitpg", "gitpg@localhost"),
        };

        let refdb = repo.refdb();
        let mut ref_count = 0;
        for reference in local.references()? {
            let reference = match reference {
                Ok(reference) => reference,
                Err(err) => {
                    eprintln!("warning: skipping unreadable ref: {}", err);
                    continue;
                }
            };
            let Some(name) = reference.name() else {
                eprintln!("warning: skipping ref with a non-utf8 name");
                continue;
            };
            let ref_ = if let Some(oid) = reference.target() {
                PgRef::direct(name, oid.into())
            } else if let Some(target) = reference.symbolic_target() {
                PgRef::symbolic(name, target)
            } else {
                continue;
            };
            match refdb.write(&ref_, true, Some(&sig), Some("push"), None, None) {
                Ok(()) => ref_count += 1,
                Err(err) => eprintln!("warning: could not push ref {}: {:#}", name, err),
            }
        }

        // HEAD lives outside the refs/ namespace; carry it across so clones
        // know which branch to check out
        if let Ok(head) = local.find_reference("HEAD") {
            if let Some(target) = head.symbolic_target() {
                if let Err(err) =
                    refdb.write(&PgRef::symbolic("HEAD", target), true, None, None, None, None)
                {
                    eprintln!("warning: failed to set HEAD: {:#}", err);
                }
            }
        }

        println!("Pushed {} refs", ref_count);
        Ok(())
    }
}
