//! Controller owner references
//!
//! Provider resources are created with a single controller reference back to
//! the intent resource that produced them, so deleting the intent cascades.
//! [`is_owner`] recomputes that reference in memory and looks for it on a
//! candidate, which gates updates to objects the operator did not create.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::Resource;
use tracing::debug;

use crate::gateway::ResourceGateway;
use crate::Error;

/// Build the controller reference `owner` would place on a child.
///
/// Fails when the owner has not been persisted yet (no name or uid).
pub fn controller_reference<O>(owner: &O) -> Result<OwnerReference, Error>
where
    O: Resource<DynamicType = ()>,
{
    owner.controller_owner_ref(&()).ok_or_else(|| {
        Error::ownership(format!(
            "{} has no name or uid and cannot own resources",
            O::kind(&())
        ))
    })
}

/// Make `owner` the controlling owner of `child`.
///
/// Replaces an existing reference to the same owner. Fails if the child lives
/// in another namespace than a namespaced owner, or if another object already
/// controls the child.
pub fn set_controller_reference<O>(owner: &O, child: &mut ObjectMeta) -> Result<(), Error>
where
    O: Resource<DynamicType = ()>,
{
    let reference = controller_reference(owner)?;

    if let Some(owner_ns) = owner.meta().namespace.as_deref() {
        if child.namespace.as_deref() != Some(owner_ns) {
            return Err(Error::ownership(format!(
                "cross-namespace owner reference from {}/{} to {:?} is not allowed",
                owner_ns, reference.name, child.namespace
            )));
        }
    }

    let refs = child.owner_references.get_or_insert_with(Vec::new);
    if let Some(other) = refs
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != reference.uid)
    {
        return Err(Error::ownership(format!(
            "object is already controlled by {} {}",
            other.kind, other.name
        )));
    }

    refs.retain(|r| r.uid != reference.uid);
    refs.push(reference);
    Ok(())
}

/// Structural equality over the fields that identify a controller reference
pub fn owner_refs_match(a: &OwnerReference, b: &OwnerReference) -> bool {
    a.kind == b.kind
        && a.name == b.name
        && a.uid == b.uid
        && a.controller.unwrap_or(false) == b.controller.unwrap_or(false)
}

/// True if `owner` is the controlling owner of `candidate`
pub fn is_owner<O>(owner: &O, candidate: &ObjectMeta) -> Result<bool, Error>
where
    O: Resource<DynamicType = ()>,
{
    let expected = controller_reference(owner)?;
    Ok(candidate
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|r| owner_refs_match(r, &expected)))
}

/// Replace `obj` only if `owner` controls it.
///
/// Returns whether the write happened. Objects that merely share a name with
/// something the operator would create are left alone.
pub async fn update_if_owned<O>(
    gateway: &dyn ResourceGateway,
    owner: &O,
    ar: &ApiResource,
    obj: &DynamicObject,
) -> Result<bool, Error>
where
    O: Resource<DynamicType = ()> + Sync,
{
    if !is_owner(owner, &obj.metadata)? {
        debug!(
            kind = %ar.kind,
            name = ?obj.metadata.name,
            owner = ?owner.meta().name,
            "not owned, skipping update"
        );
        return Ok(false);
    }
    gateway.update(ar, obj).await?;
    Ok(true)
}
