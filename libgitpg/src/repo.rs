use crate::error::PgResult;
use crate::odb::PgOdb;
use crate::refs::PgRefdb;
use crate::session::PgSession;
use std::rc::Rc;

/// Applies the shipped schema; every statement is idempotent.
pub fn ensure_schema(session: &PgSession) -> PgResult<()> {
    session.batch_execute(include_str!("../schema.sql"))
}

/// A repository hosted in the database: the session plus the repository row
/// every child row is scoped to.  The odb and refdb hand out views over the
/// same connection, mirroring a bare repository's object and ref stores.
pub struct PgRepo {
    session: Rc<PgSession>,
    repo_id: i32,
    name: String,
}

impl PgRepo {
    /// Opens `name`, creating the repository row if it does not exist yet.
    pub fn create(session: Rc<PgSession>, name: &str) -> PgResult<Self> {
        let row = session.query_opt(
            "INSERT INTO repositories (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = $1 \
             RETURNING id",
            &[&name],
        )?;
        let repo_id = match row {
            Some(row) => row.try_get(0)?,
            None => bail!("failed to create repository `{}`", name),
        };
        debug!("opened repository `{}` (id={})", name, repo_id);
        Ok(Self { session, repo_id, name: name.to_owned() })
    }

    /// Opens an existing repository; absence is an error.
    pub fn find(session: Rc<PgSession>, name: &str) -> PgResult<Self> {
        let row = session
            .query_opt("SELECT id FROM repositories WHERE name = $1", &[&name])?
            .ok_or_else(|| anyhow!("repository `{}` not found", name))?;
        let repo_id = row.try_get(0)?;
        Ok(Self { session, repo_id, name: name.to_owned() })
    }

    /// Connect-and-create convenience used by the remote helper.
    pub fn open(conninfo: &str, name: &str) -> PgResult<Self> {
        let session = PgSession::connect(conninfo)?;
        Self::create(session, name)
    }

    pub fn repo_id(&self) -> i32 {
        self.repo_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &Rc<PgSession> {
        &self.session
    }

    pub fn odb(&self) -> PgOdb {
        PgOdb::new(Rc::clone(&self.session), self.repo_id)
    }

    pub fn refdb(&self) -> PgRefdb {
        PgRefdb::new(Rc::clone(&self.session), self.repo_id)
    }
}
