//! agrotrace-bootstrap
//!
//! Seeds the admin and verifier permission sets of a fresh store. This is
//! the only path that writes grants without an admin caller: every later
//! grant goes through `StateEngine::apply` and must be signed off by an
//! existing admin.
//!
//! Bootstrap writes straight into the `StateDb` in one staged commit and
//! then records a meta marker, so a store is bootstrapped at most once.

pub mod params;

pub use params::BootstrapParams;

use std::collections::BTreeSet;

use agrotrace_core::error::AgroError;
use agrotrace_core::participant::Permission;
use agrotrace_core::types::Principal;
use agrotrace_state::{StagedMutations, StateDb};
use tracing::{info, warn};

/// Meta key whose presence marks a bootstrapped store.
pub const BOOTSTRAP_MARKER: &str = "bootstrapped";

pub fn is_bootstrapped(db: &StateDb) -> Result<bool, AgroError> {
    Ok(db.get_meta(BOOTSTRAP_MARKER)?.is_some())
}

/// Apply `params` to `db`.
///
/// Returns `false` without writing anything if the store carries the
/// bootstrap marker already. Identities already holding a grant are skipped,
/// so the role counters stay equal to the set sizes even if a previous run
/// stopped between the commit and the marker write.
pub fn apply_bootstrap(db: &StateDb, params: &BootstrapParams) -> Result<bool, AgroError> {
    if is_bootstrapped(db)? {
        info!("store already bootstrapped; skipping");
        return Ok(false);
    }
    if params.admins.is_empty() {
        warn!("bootstrapping without admins: grants and deactivations will be unavailable");
    }

    let mut staged = StagedMutations::default();
    let admins = stage_grants(db, &mut staged, Permission::Admin, &params.admins)?;
    let verifiers = stage_grants(db, &mut staged, Permission::Verifier, &params.verifiers)?;
    db.commit(&staged)?;

    db.put_meta(BOOTSTRAP_MARKER, b"1")?;
    db.flush()?;
    info!(admins, verifiers, "bootstrap state committed to disk");
    Ok(true)
}

fn stage_grants(
    db: &StateDb,
    staged: &mut StagedMutations,
    perm: Permission,
    accounts: &[Principal],
) -> Result<usize, AgroError> {
    let mut count = db.get_role_count(perm.role())?;
    let mut added = 0;
    for account in accounts.iter().collect::<BTreeSet<_>>() {
        if db.has_grant(perm, account)? {
            continue;
        }
        staged.grants.push((perm, *account, true));
        count += 1;
        added += 1;
        info!(%account, ?perm, "bootstrap: permission granted");
    }
    if added > 0 {
        staged.role_counts.insert(perm.role(), count);
    }
    Ok(added)
}
