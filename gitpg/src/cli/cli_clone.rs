use super::Cmd;
use anyhow::Context;
use fallible_iterator::FallibleIterator;
use libgitpg::error::PgResult;
use libgitpg::odb::LocalOdb;
use libgitpg::refs::{RefDbBackend, RefTarget};
use libgitpg::repo::PgRepo;
use libgitpg::session::PgSession;
use libgitpg::transfer::copy_new_objects;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct GitPgCloneOpts {
    /// libpq-style connection string
    conninfo: String,
    reponame: String,
    dest_dir: PathBuf,
}

impl Cmd for GitPgCloneOpts {
    fn exec(self) -> PgResult<()> {
        let session = PgSession::connect(&self.conninfo)?;
        let repo = PgRepo::find(session, &self.reponame)?;
        let local = git2::Repository::init(&self.dest_dir).with_context(|| {
            format!("could not init local repository at `{}`", self.dest_dir.display())
        })?;

        let local_odb = local.odb()?;
        let copied = copy_new_objects(&repo.odb(), &LocalOdb::new(&local_odb))?;
        println!("Cloned {} objects", copied);

        let mut iter = repo.refdb().iter(None)?;
        let mut ref_count = 0;
        let mut head_target = None;
        while let Some(ref_) = iter.next()? {
            if ref_.name == "HEAD" {
                if let RefTarget::Symbolic(target) = &ref_.target {
                    head_target = Some(target.clone());
                }
                continue;
            }
            let created = match &ref_.target {
                RefTarget::Direct(oid) => {
                    local.reference(&ref_.name, (*oid).into(), true, "clone").map(|_| ())
                }
                RefTarget::Symbolic(target) => {
                    local.reference_symbolic(&ref_.name, target, true, "clone").map(|_| ())
                }
            };
            match created {
                Ok(()) => ref_count += 1,
                Err(err) => eprintln!("warning: could not create ref {}: {}", ref_.name, err),
            }
        }

        if let Some(target) = head_target {
            local.set_head(&target).context("could not set HEAD")?;
        }
        println!("Cloned {} refs", ref_count);

        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        match local.checkout_head(Some(&mut checkout)) {
            Ok(()) => println!("Checked out working directory"),
            Err(err) => eprintln!("warning: checkout failed: {}", err),
        }
        Ok(())
    }
}
