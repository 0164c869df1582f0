//! Whole-mesh JSON snapshots.

use crate::check::check_topology;
use crate::error::Result;
use crate::store::TinMesh;

use super::{read_to_string, write_string};

/// Writes `mesh` as a JSON snapshot.
pub fn write_snapshot(path: &str, mesh: &TinMesh) -> Result<()> {
    let json = serde_json::to_string(mesh)?;
    write_string(path, &json)?;
    Ok(())
}

/// Reads a JSON snapshot and checks its topology before handing it out.
pub fn read_snapshot(path: &str) -> Result<TinMesh> {
    let json = read_to_string(path)?;
    let mesh: TinMesh = serde_json::from_str(&json)?;
    check_topology(&mesh)?;
    Ok(mesh)
}
