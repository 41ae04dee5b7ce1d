//! Logistics status-code translation table
//!
//! Static table keyed by the provider's numeric code. Loaded into a hash map
//! once on first lookup. `map_code` is pure; the fallback for unlisted codes
//! is `(Exception, ManualCheck)` so a new provider code surfaces for review
//! instead of masquerading as a known state.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::lifecycle::{OrderLifecycle, PolicyAction};

use OrderLifecycle as L;
use PolicyAction as A;

/// (provider code, lifecycle bucket, policy action)
const STATUS_TABLE: &[(i32, OrderLifecycle, PolicyAction)] = &[
    // order intake
    (1, L::New, A::NoAction),            // NEW
    (2, L::New, A::NoAction),            // INVOICED
    (3, L::ReadyToShip, A::NoAction),    // READY TO SHIP
    (4, L::PickupScheduled, A::NoAction), // PICKUP SCHEDULED
    (5, L::Canceled, A::ImmediateRefund), // CANCELED
    (6, L::Shipped, A::NoAction),        // SHIPPED
    (7, L::Delivered, A::NoAction),      // DELIVERED
    (8, L::Canceled, A::ImmediateRefund), // CANCELED (courier side)
    // RTO: shipment bounced back toward the seller
    (9, L::RtoInitiated, A::NoAction),     // RTO INITIATED
    (10, L::RtoDelivered, A::CreateRefund), // RTO DELIVERED
    (11, L::Exception, A::ManualCheck),    // PENDING
    (12, L::Exception, A::ManualCheckAndRefund), // LOST
    (13, L::Exception, A::ManualCheck),    // PICKUP ERROR
    (14, L::RtoInitiated, A::NoAction),    // RTO ACKNOWLEDGED
    (15, L::PickupScheduled, A::NoAction), // PICKUP RESCHEDULED
    (16, L::Canceled, A::ManualCheck),     // CANCELLATION REQUESTED
    (17, L::OutForDelivery, A::NoAction),  // OUT FOR DELIVERY
    (18, L::InTransit, A::NoAction),       // IN TRANSIT
    (19, L::PickupScheduled, A::NoAction), // OUT FOR PICKUP
    (20, L::Exception, A::ManualCheck),    // PICKUP EXCEPTION
    (21, L::Failed, A::ManualCheck),       // UNDELIVERED
    (22, L::InTransit, A::NoAction),       // DELAYED
    (23, L::Delivered, A::ManualCheck),    // PARTIALLY DELIVERED
    (24, L::Exception, A::ManualCheckAndRefund), // DESTROYED
    (25, L::Exception, A::ManualCheckAndRefund), // DAMAGED
    (26, L::Delivered, A::NoAction),       // FULFILLED
    (27, L::PickupScheduled, A::NoAction), // PICKUP BOOKED
    (29, L::OutForDelivery, A::NoAction),  // DELIVERY ATTEMPTED
    (30, L::Failed, A::ManualCheck),       // ADDRESS ISSUE
    // warehouse / dispatch
    (34, L::New, A::NoAction),          // SHIPMENT CREATED
    (35, L::ReadyToShip, A::NoAction),  // AWB ASSIGNED
    (36, L::ReadyToShip, A::NoAction),  // LABEL GENERATED
    (37, L::ReadyToShip, A::NoAction),  // MANIFEST GENERATED
    (38, L::InTransit, A::NoAction),    // REACHED DESTINATION HUB
    (39, L::InTransit, A::ManualCheck), // MISROUTED
    (40, L::RtoInitiated, A::NoAction), // RTO NDR
    (41, L::RtoInitiated, A::NoAction), // RTO OUT FOR DELIVERY
    (42, L::Shipped, A::NoAction),      // PICKED UP
    (43, L::Delivered, A::NoAction),    // SELF FULFILLED
    (44, L::Exception, A::ManualCheckAndRefund), // DISPOSED OFF
    (45, L::Canceled, A::ImmediateRefund), // CANCELLED BEFORE DISPATCH
    (46, L::RtoInitiated, A::NoAction), // RTO IN TRANSIT
    (47, L::Exception, A::ManualCheck), // QC FAILED
    (48, L::InTransit, A::NoAction),    // REACHED WAREHOUSE
    (49, L::InTransit, A::NoAction),    // CUSTOM CLEARED
    (50, L::InTransit, A::NoAction),    // IN FLIGHT
    (51, L::ReadyToShip, A::NoAction),  // HANDOVER TO COURIER
    (52, L::ReadyToShip, A::NoAction),  // SHIPMENT BOOKED
    (54, L::InTransit, A::NoAction),    // IN TRANSIT OVERSEAS
    (55, L::InTransit, A::NoAction),    // CONNECTION ALIGNED
    (56, L::InTransit, A::NoAction),    // REACHED OVERSEAS WAREHOUSE
    (57, L::InTransit, A::NoAction),    // CUSTOM CLEARED OVERSEAS
    (59, L::New, A::NoAction),          // BOX PACKING
    (60, L::New, A::NoAction),          // FC ALLOCATED
    (61, L::New, A::NoAction),          // PICKLIST GENERATED
    (62, L::New, A::NoAction),          // READY TO PACK
    (63, L::ReadyToShip, A::NoAction),  // PACKED
    (67, L::ReadyToShip, A::NoAction),  // FC MANIFEST GENERATED
    (68, L::ReadyToShip, A::NoAction),  // PROCESSED AT WAREHOUSE
    (71, L::Exception, A::ManualCheck), // HANDOVER EXCEPTION
    (72, L::Exception, A::ManualCheck), // PACKED EXCEPTION
    (73, L::Failed, A::ManualCheck),    // NDR RAISED
    (74, L::InTransit, A::NoAction),    // NDR RESOLVED
    (75, L::RtoInitiated, A::ManualCheck), // RTO LOCK
    (76, L::Exception, A::ManualCheckAndRefund), // UNTRACEABLE
    (77, L::Failed, A::ManualCheck),    // ISSUE RELATED TO RECIPIENT
    (78, L::RtoDelivered, A::CreateRefund), // REACHED BACK AT SELLER CITY
    // customer-initiated return flow
    (81, L::ReturnInitiated, A::NoAction), // RETURN PENDING
    (82, L::ReturnInitiated, A::CreateReturnRequest), // RETURN INITIATED
    (83, L::ReturnInitiated, A::NoAction), // RETURN PICKUP QUEUED
    (84, L::Exception, A::ManualCheck),    // RETURN PICKUP ERROR
    (85, L::ReturnInTransit, A::NoAction), // RETURN IN TRANSIT
    (86, L::Returned, A::CreateRefund),    // RETURN DELIVERED
    (87, L::Delivered, A::NoAction),       // RETURN CANCELLED
    (88, L::ReturnInitiated, A::NoAction), // RETURN PICKUP GENERATED
    (89, L::ReturnInTransit, A::ManualCheck), // RETURN UNDELIVERED
    (90, L::Delivered, A::NoAction),       // RETURN PICKUP CANCELLED
    (91, L::ReturnInitiated, A::NoAction), // RETURN PICKUP RESCHEDULED
    (92, L::ReturnInTransit, A::NoAction), // RETURN PICKED UP
    (93, L::ReturnInitiated, A::NoAction), // RETURN OUT FOR PICKUP
    (94, L::ReturnInTransit, A::NoAction), // RETURN OUT FOR DELIVERY
    (95, L::Exception, A::ManualCheckAndRefund), // RETURN DAMAGED
    (96, L::Exception, A::ManualCheckAndRefund), // RETURN LOST
    (97, L::Returned, A::NoAction),        // RETURN QC PASSED
    (98, L::Returned, A::ManualCheck),     // RETURN QC FAILED
];

static STATUS_INDEX: Lazy<HashMap<i32, (OrderLifecycle, PolicyAction)>> = Lazy::new(|| {
    STATUS_TABLE
        .iter()
        .map(|&(code, bucket, action)| (code, (bucket, action)))
        .collect()
});

/// Translate a provider status code. Unknown codes land in
/// `(Exception, ManualCheck)`.
pub fn map_code(code: i32) -> (OrderLifecycle, PolicyAction) {
    STATUS_INDEX
        .get(&code)
        .copied()
        .unwrap_or((OrderLifecycle::Exception, PolicyAction::ManualCheck))
}
