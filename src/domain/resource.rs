use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable resource: a studio space or a workshop slot series. Pricing is
/// hourly with a per-person surcharge; the operating window defines the
/// whole-hour slot grid bookings must align to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub kind: ResourceKind,
    pub owner_id: Uuid,
    pub name: String,
    pub hourly_base_rate: Decimal,
    pub per_person_rate: Decimal,
    pub min_people: i32,
    pub max_people: i32,
    pub open_hour: u32,
    pub close_hour: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceKind {
    Studio,
    Workshop,
}

/// Reference to the resource a reservation targets. A reservation points at
/// exactly one of the two kinds; settlement derives its beneficiary from
/// whichever side is set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceRef {
    Studio(Uuid),
    Workshop(Uuid),
}

impl ResourceRef {
    pub fn id(&self) -> Uuid {
        match self {
            ResourceRef::Studio(id) | ResourceRef::Workshop(id) => *id,
        }
    }
}

/// Resource owner, the settlement beneficiary. `commission_rate` overrides
/// the platform default when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: Uuid,
    pub name: String,
    pub commission_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}
