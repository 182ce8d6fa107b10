use serde::{Deserialize, Serialize};

use crate::models::ride::RideStatus;

/// Customers, riders and admins share one account record distinguished
/// by this tag; capability checks happen at the operation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Rider,
    Admin,
}

impl Role {
    /// Who may cancel a ride in a given state. Customers can back out of
    /// an unassigned booking, riders can abandon a ride they hold, admins
    /// can cancel anything that is not already terminal.
    pub fn may_cancel(self, status: RideStatus) -> bool {
        match self {
            Role::Customer => status == RideStatus::Pending,
            Role::Rider => matches!(status, RideStatus::Accepted | RideStatus::Ongoing),
            Role::Admin => !status.is_terminal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_cancels_pending_only() {
        assert!(Role::Customer.may_cancel(RideStatus::Pending));
        assert!(!Role::Customer.may_cancel(RideStatus::Accepted));
        assert!(!Role::Customer.may_cancel(RideStatus::Ongoing));
    }

    #[test]
    fn rider_cancels_active_only() {
        assert!(!Role::Rider.may_cancel(RideStatus::Pending));
        assert!(Role::Rider.may_cancel(RideStatus::Accepted));
        assert!(Role::Rider.may_cancel(RideStatus::Ongoing));
    }

    #[test]
    fn nobody_cancels_terminal() {
        for role in [Role::Customer, Role::Rider, Role::Admin] {
            assert!(!role.may_cancel(RideStatus::Completed));
            assert!(!role.may_cancel(RideStatus::Cancelled));
        }
    }
}
