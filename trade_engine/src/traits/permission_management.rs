use crate::{db_types::ServiceType, traits::StoreError};

#[allow(async_fn_in_trait)]
pub trait PermissionManagement {
    /// Whether `granting_user_id` has granted `receiving_user_id` access to the given service. Missing entries are
    /// treated as a denial.
    async fn check_permission(
        &self,
        granting_user_id: i64,
        receiving_user_id: i64,
        service: ServiceType,
    ) -> Result<bool, StoreError>;

    async fn set_permission(
        &self,
        granting_user_id: i64,
        receiving_user_id: i64,
        service: ServiceType,
        can_access: bool,
    ) -> Result<(), StoreError>;
}
