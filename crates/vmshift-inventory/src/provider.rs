//! Collaborator traits the placement advisor is written against.
//!
//! Implementations talk to the virtualization control plane. Every call
//! returns stats as of call time; nothing here caches across calls.

use vmshift_core::{HostCandidate, VmCandidate};

use crate::error::{InventoryResult, TaskError};

/// Read access to the cluster inventory.
pub trait InventoryProvider {
    /// All hosts in `cluster`, in platform enumeration order.
    fn list_hosts(&self, cluster: &str) -> InventoryResult<Vec<HostCandidate>>;

    /// All VMs currently registered on `host`.
    fn list_vms(&self, host: &str) -> InventoryResult<Vec<VmCandidate>>;

    fn find_host(&self, name: &str) -> InventoryResult<Option<HostCandidate>>;

    fn find_vm(&self, name: &str) -> InventoryResult<Option<VmCandidate>>;
}

/// Mutating operations. Each call blocks until the platform reports a
/// terminal task state.
pub trait MigrationExecutor {
    fn relocate(&self, vm: &str, target_host: &str) -> Result<(), TaskError>;

    fn power_off(&self, vm: &str) -> Result<(), TaskError>;

    fn power_on(&self, vm: &str) -> Result<(), TaskError>;

    /// Enter (`enter == true`) or exit maintenance mode on `host`.
    fn set_maintenance(&self, host: &str, enter: bool) -> Result<(), TaskError>;

    /// Graceful (non-forced) host reboot.
    fn reboot_host(&self, host: &str) -> Result<(), TaskError>;

    /// Re-attach a disconnected host to the control plane.
    fn reconnect_host(&self, host: &str) -> Result<(), TaskError>;

    /// Delete a VM and its files. The VM must be powered off.
    fn destroy_vm(&self, vm: &str) -> Result<(), TaskError>;
}

impl<T: InventoryProvider + ?Sized> InventoryProvider for &T {
    fn list_hosts(&self, cluster: &str) -> InventoryResult<Vec<HostCandidate>> {
        (**self).list_hosts(cluster)
    }

    fn list_vms(&self, host: &str) -> InventoryResult<Vec<VmCandidate>> {
        (**self).list_vms(host)
    }

    fn find_host(&self, name: &str) -> InventoryResult<Option<HostCandidate>> {
        (**self).find_host(name)
    }

    fn find_vm(&self, name: &str) -> InventoryResult<Option<VmCandidate>> {
        (**self).find_vm(name)
    }
}

impl<T: MigrationExecutor + ?Sized> MigrationExecutor for &T {
    fn relocate(&self, vm: &str, target_host: &str) -> Result<(), TaskError> {
        (**self).relocate(vm, target_host)
    }

    fn power_off(&self, vm: &str) -> Result<(), TaskError> {
        (**self).power_off(vm)
    }

    fn power_on(&self, vm: &str) -> Result<(), TaskError> {
        (**self).power_on(vm)
    }

    fn set_maintenance(&self, host: &str, enter: bool) -> Result<(), TaskError> {
        (**self).set_maintenance(host, enter)
    }

    fn reboot_host(&self, host: &str) -> Result<(), TaskError> {
        (**self).reboot_host(host)
    }

    fn reconnect_host(&self, host: &str) -> Result<(), TaskError> {
        (**self).reconnect_host(host)
    }

    fn destroy_vm(&self, vm: &str) -> Result<(), TaskError> {
        (**self).destroy_vm(vm)
    }
}
