use crate::error::PgResult;
use crate::odb::OdbBackend;

/// Copies every object present in `src` but missing from `dst`, preserving
/// types.  Individual objects that fail to copy are skipped with a warning;
/// the count of copied objects is returned.
pub fn copy_new_objects(src: &dyn OdbBackend, dst: &dyn OdbBackend) -> PgResult<usize> {
    let mut copied = 0;
    src.foreach(&mut |oid| {
        if dst.exists(oid)? {
            return Ok(true);
        }
        match src.read(oid).and_then(|obj| dst.write(oid, obj.obj_type, &obj.bytes)) {
            Ok(()) => copied += 1,
            Err(err) => warn!("could not copy object {}: {}", oid, err),
        }
        Ok(true)
    })?;
    debug!("copied {} new objects", copied);
    Ok(copied)
}
