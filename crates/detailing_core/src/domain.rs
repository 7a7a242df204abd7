//! crates/detailing_core/src/domain.rs
//!
//! Defines the core data structures for the detailing platform.
//! These structs are independent of any database; they derive serde so the
//! API layer can hand them to clients without a second set of DTOs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::ports::PortError;

/// Implements `as_str`, `Display`, `FromStr` and an `ALL` listing for a
/// fieldless enum whose storage form is a fixed string.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PortError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(PortError::Validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}
pub(crate) use string_enum;

//=========================================================================================
// Users & Identity
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Customer,
    Admin,
    Detailer,
    TenantOwner,
    TenantAdmin,
}

string_enum!(Role {
    Customer => "customer",
    Admin => "admin",
    Detailer => "detailer",
    TenantOwner => "tenant-owner",
    TenantAdmin => "tenant-admin",
});

/// A verified caller as supplied by the external identity provider.
/// Profile fields are only present the first time a subject is seen.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// The internal user record an identity maps to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    pub id: Uuid,
    pub subject: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub tenant_id: Option<Uuid>, // None for platform-level users
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Vehicles & Service Catalog
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Sedan,
    Suv,
    Truck,
    Van,
    Coupe,
    Luxury,
}

string_enum!(VehicleType {
    Sedan => "sedan",
    Suv => "suv",
    Truck => "truck",
    Van => "van",
    Coupe => "coupe",
    Luxury => "luxury",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum ServiceCategory {
    Exterior,
    Interior,
    FullDetail,
    Specialty,
}

string_enum!(ServiceCategory {
    Exterior => "exterior",
    Interior => "interior",
    FullDetail => "full-detail",
    Specialty => "specialty",
});

/// A multiplier table as it arrives from storage or an operator form,
/// where any entry may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PartialMultipliers {
    pub sedan: Option<Decimal>,
    pub suv: Option<Decimal>,
    pub truck: Option<Decimal>,
    pub van: Option<Decimal>,
    pub coupe: Option<Decimal>,
    pub luxury: Option<Decimal>,
}

impl PartialMultipliers {
    pub fn get(&self, vehicle_type: VehicleType) -> Option<Decimal> {
        match vehicle_type {
            VehicleType::Sedan => self.sedan,
            VehicleType::Suv => self.suv,
            VehicleType::Truck => self.truck,
            VehicleType::Van => self.van,
            VehicleType::Coupe => self.coupe,
            VehicleType::Luxury => self.luxury,
        }
    }

    /// Vehicle types with no entry, in declaration order.
    pub fn missing(&self) -> Vec<VehicleType> {
        VehicleType::ALL
            .iter()
            .copied()
            .filter(|t| self.get(*t).is_none())
            .collect()
    }
}

/// A total mapping from every vehicle type to its price multiplier.
///
/// Build one with [`MultiplierTable::normalize`], which is the only place the
/// "missing entry means 1.0" rule lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MultiplierTable {
    pub sedan: Decimal,
    pub suv: Decimal,
    pub truck: Decimal,
    pub van: Decimal,
    pub coupe: Decimal,
    pub luxury: Decimal,
}

impl Default for MultiplierTable {
    fn default() -> Self {
        Self::uniform(Decimal::ONE)
    }
}

impl MultiplierTable {
    pub fn uniform(value: Decimal) -> Self {
        Self {
            sedan: value,
            suv: value,
            truck: value,
            van: value,
            coupe: value,
            luxury: value,
        }
    }

    pub fn get(&self, vehicle_type: VehicleType) -> Decimal {
        match vehicle_type {
            VehicleType::Sedan => self.sedan,
            VehicleType::Suv => self.suv,
            VehicleType::Truck => self.truck,
            VehicleType::Van => self.van,
            VehicleType::Coupe => self.coupe,
            VehicleType::Luxury => self.luxury,
        }
    }

    /// Fills every missing entry with 1.0 and reports which ones were filled.
    pub fn normalize(partial: &PartialMultipliers) -> (Self, Vec<VehicleType>) {
        let fill = |t| partial.get(t).unwrap_or(Decimal::ONE);
        let table = Self {
            sedan: fill(VehicleType::Sedan),
            suv: fill(VehicleType::Suv),
            truck: fill(VehicleType::Truck),
            van: fill(VehicleType::Van),
            coupe: fill(VehicleType::Coupe),
            luxury: fill(VehicleType::Luxury),
        };
        (table, partial.missing())
    }

    /// Like [`normalize`](Self::normalize), logging a data-quality warning for
    /// each filled entry. Used on the storage load path.
    pub fn normalize_logged(partial: &PartialMultipliers, service_id: Uuid) -> Self {
        let (table, missing) = Self::normalize(partial);
        for vehicle_type in missing {
            warn!(
                service_id = %service_id,
                vehicle_type = %vehicle_type,
                "Service is missing a vehicle multiplier; defaulting to 1.0"
            );
        }
        table
    }
}

impl From<MultiplierTable> for PartialMultipliers {
    fn from(table: MultiplierTable) -> Self {
        Self {
            sedan: Some(table.sedan),
            suv: Some(table.suv),
            truck: Some(table.truck),
            van: Some(table.van),
            coupe: Some(table.coupe),
            luxury: Some(table.luxury),
        }
    }
}

/// A catalog entry. Services are deactivated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Service {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub category: ServiceCategory,
    pub base_price: Decimal,
    pub duration_minutes: u32,
    pub is_active: bool,
    pub vehicle_type_multipliers: MultiplierTable,
}

/// A vehicle owned by exactly one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Vehicle {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub license_plate: Option<String>,
    pub vehicle_type: VehicleType,
    pub notes: Option<String>,
}

//=========================================================================================
// Bookings & Pricing History
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

string_enum!(BookingStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    InProgress => "in-progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl BookingStatus {
    /// The booking lifecycle: pending -> confirmed -> in-progress -> completed,
    /// with cancellation allowed only before work starts.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Cancelled)
                | (InProgress, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

/// Where the detailing takes place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Location {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// The frozen pricing snapshot agreed with the customer at booking time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PricingFactors {
    pub base_price: Decimal,
    pub vehicle_multiplier: Decimal,
    pub demand_multiplier: Decimal,
    pub seasonal_multiplier: Decimal,
    pub loyalty_discount: Decimal,
    pub final_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub vehicle_id: Uuid,
    pub service_ids: Vec<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub total_price: Decimal,
    pub pricing_factors: PricingFactors,
    pub location: Location,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_detailer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

string_enum!(TimeOfDay {
    Morning => "morning",
    Afternoon => "afternoon",
    Evening => "evening",
});

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        if hour < 12 {
            TimeOfDay::Morning
        } else if hour < 17 {
            TimeOfDay::Afternoon
        } else {
            TimeOfDay::Evening
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum DemandLevel {
    High,
    Medium,
    Low,
}

string_enum!(DemandLevel {
    High => "high",
    Medium => "medium",
    Low => "low",
});

impl DemandLevel {
    pub fn from_multiplier(demand: Decimal) -> Self {
        if demand > Decimal::new(110, 2) {
            DemandLevel::High
        } else if demand < Decimal::ONE {
            DemandLevel::Low
        } else {
            DemandLevel::Medium
        }
    }
}

/// One append-only record per booking of the pricing inputs/outputs used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PricingHistory {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub service_ids: Vec<Uuid>,
    /// Raw vehicle type string as recorded at booking time.
    pub vehicle_type: String,
    pub scheduled_at: DateTime<Utc>,
    /// 0 = Sunday ... 6 = Saturday.
    pub day_of_week: u8,
    pub time_of_day: TimeOfDay,
    pub demand_level: DemandLevel,
    pub base_price: Decimal,
    pub final_price: Decimal,
    pub was_accepted: bool,
}

/// A stored rollup value such as `daily_revenue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MetricRecord {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    pub metric: String,
    pub value: Decimal,
}

//=========================================================================================
// Knowledge Base
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum KnowledgeCategory {
    MarketTrends,
    SeasonalFactors,
    Competition,
    ServiceCosts,
    CustomerBehavior,
}

string_enum!(KnowledgeCategory {
    MarketTrends => "market-trends",
    SeasonalFactors => "seasonal-factors",
    Competition => "competition",
    ServiceCosts => "service-costs",
    CustomerBehavior => "customer-behavior",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct KnowledgeMetadata {
    pub source: String,
    pub last_updated: DateTime<Utc>,
    pub relevance_score: f32,
}

/// A short market fact used only to explain prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub content: String,
    pub category: KnowledgeCategory,
    pub metadata: KnowledgeMetadata,
    pub embedding: Vec<f32>,
}

//=========================================================================================
// Workflow Bookkeeping
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum WorkflowRunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

string_enum!(WorkflowRunStatus {
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// Observability mirror of a booking's lifecycle run. Not used for resumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WorkflowState {
    pub workflow_id: String,
    pub booking_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub current_step: String,
    pub status: WorkflowRunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn workflow_id_for(booking_id: Uuid) -> String {
        format!("booking-{}", booking_id)
    }
}

//=========================================================================================
// Tenants & Clients
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TenantBranding {
    pub logo: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
}

impl Default for TenantBranding {
    fn default() -> Self {
        Self {
            logo: None,
            primary_color: "#0066CC".to_string(),
            secondary_color: "#00CCCC".to_string(),
            accent_color: "#FF6B35".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TenantContact {
    pub phone: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TenantSettings {
    pub allow_self_assessment: bool,
    pub require_vin: bool,
    pub auto_approve_bookings: bool,
    pub notification_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionPlan {
    Free,
    Starter,
    Professional,
    Enterprise,
}

string_enum!(SubscriptionPlan {
    Free => "free",
    Starter => "starter",
    Professional => "professional",
    Enterprise => "enterprise",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    PastDue,
}

string_enum!(SubscriptionStatus {
    Active => "active",
    Cancelled => "cancelled",
    PastDue => "past_due",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TenantSubscription {
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub current_period_end: DateTime<Utc>,
}

/// An independent business account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Tenant {
    pub id: Uuid,
    pub business_name: String,
    pub owner_subject: String,
    pub owner_email: String,
    pub slug: String,
    pub qr_code: String,
    pub branding: TenantBranding,
    pub contact: TenantContact,
    pub settings: TenantSettings,
    pub subscription: TenantSubscription,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A non-authenticated customer who came in through a tenant's intake link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Client {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub last_assessment_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// Self-Assessment Intake
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ConditionGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

string_enum!(ConditionGrade {
    Excellent => "excellent",
    Good => "good",
    Fair => "fair",
    Poor => "poor",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExteriorCondition {
    pub paint: ConditionGrade,
    pub scratches: bool,
    pub dents: bool,
    pub rust: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InteriorCondition {
    pub seats: ConditionGrade,
    pub carpet: ConditionGrade,
    pub dashboard: ConditionGrade,
    pub stains: bool,
    pub odors: bool,
    pub pet_hair: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OverallCondition {
    pub mileage: u32,
    pub last_detail_date: Option<String>,
    pub smoking_vehicle: bool,
    pub notes: Option<String>,
}

/// The structured condition form filled in by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConditionAssessment {
    pub exterior: ExteriorCondition,
    pub interior: InteriorCondition,
    pub overall: OverallCondition,
}

impl Default for ConditionAssessment {
    /// A fresh draft: everything "good", nothing flagged.
    fn default() -> Self {
        Self {
            exterior: ExteriorCondition {
                paint: ConditionGrade::Good,
                scratches: false,
                dents: false,
                rust: false,
                notes: None,
            },
            interior: InteriorCondition {
                seats: ConditionGrade::Good,
                carpet: ConditionGrade::Good,
                dashboard: ConditionGrade::Good,
                stains: false,
                odors: false,
                pet_hair: false,
                notes: None,
            },
            overall: OverallCondition {
                mileage: 0,
                last_detail_date: None,
                smoking_vehicle: false,
                notes: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AssessmentVehicleInfo {
    pub vin: Option<String>,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AssessmentPricingFactors {
    pub base_price: Decimal,
    pub vehicle_multiplier: Decimal,
    pub condition_multiplier: Decimal,
    pub demand_multiplier: Decimal,
    pub final_price: Decimal,
}

impl Default for AssessmentPricingFactors {
    fn default() -> Self {
        Self {
            base_price: Decimal::ZERO,
            vehicle_multiplier: Decimal::ONE,
            condition_multiplier: Decimal::ONE,
            demand_multiplier: Decimal::ONE,
            final_price: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AssessmentStatus {
    Draft,
    Submitted,
    Reviewed,
    Approved,
    Converted,
}

string_enum!(AssessmentStatus {
    Draft => "draft",
    Submitted => "submitted",
    Reviewed => "reviewed",
    Approved => "approved",
    Converted => "converted",
});

impl AssessmentStatus {
    /// The only status an assessment may move to from this one.
    pub fn next(self) -> Option<AssessmentStatus> {
        use AssessmentStatus::*;
        match self {
            Draft => Some(Submitted),
            Submitted => Some(Reviewed),
            Reviewed => Some(Approved),
            Approved => Some(Converted),
            Converted => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Assessment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub vehicle_info: AssessmentVehicleInfo,
    pub condition: ConditionAssessment,
    pub selected_services: Vec<Uuid>,
    pub estimated_price: Decimal,
    pub pricing_factors: AssessmentPricingFactors,
    pub status: AssessmentStatus,
    pub converted_booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}
