//! crates/detailing_core/src/condition.rs
//!
//! Condition-based pricing for the self-assessment intake flow.
//!
//! This is a separate strategy from [`crate::pricing`]: the condition multiplier
//! stands in for the date-based demand and seasonal factors, and demand is
//! pinned to 1.0.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{
    AssessmentPricingFactors, ConditionAssessment, ConditionGrade, Service, VehicleType,
};
use crate::ports::PortResult;
use crate::pricing::{base_price, checked_mul, round_currency, round_display};

pub const MIN_CONDITION_MULTIPLIER: Decimal = dec!(0.9);
pub const MAX_CONDITION_MULTIPLIER: Decimal = dec!(2.0);

/// The demand factor used on the assessment path.
pub const ASSESSMENT_DEMAND_MULTIPLIER: Decimal = Decimal::ONE;

pub fn grade_score(grade: ConditionGrade) -> Decimal {
    match grade {
        ConditionGrade::Excellent => dec!(0.9),
        ConditionGrade::Good => dec!(1.0),
        ConditionGrade::Fair => dec!(1.2),
        ConditionGrade::Poor => dec!(1.5),
    }
}

fn flag(set: bool, penalty: Decimal) -> Decimal {
    if set {
        penalty
    } else {
        Decimal::ZERO
    }
}

/// Maps a condition form to a single multiplier in `[0.9, 2.0]`.
///
/// `(exterior + mean(interior grades)) / 2 + penalties`, where every flag adds
/// a fixed penalty independent of the grades.
pub fn condition_multiplier(condition: &ConditionAssessment) -> Decimal {
    let exterior = &condition.exterior;
    let interior = &condition.interior;

    let exterior_score = grade_score(exterior.paint);
    let exterior_penalty = flag(exterior.scratches, dec!(0.10))
        + flag(exterior.dents, dec!(0.10))
        + flag(exterior.rust, dec!(0.15));

    let interior_score = (grade_score(interior.seats)
        + grade_score(interior.carpet)
        + grade_score(interior.dashboard))
        / dec!(3);
    let interior_penalty = flag(interior.stains, dec!(0.10))
        + flag(interior.odors, dec!(0.15))
        + flag(interior.pet_hair, dec!(0.10));

    let overall_penalty = flag(condition.overall.smoking_vehicle, dec!(0.10));

    let raw = (exterior_score + interior_score) / dec!(2)
        + exterior_penalty
        + interior_penalty
        + overall_penalty;

    raw.clamp(MIN_CONDITION_MULTIPLIER, MAX_CONDITION_MULTIPLIER)
}

/// Prices an assessment: vehicle-adjusted base × condition × fixed demand.
pub fn price_assessment(
    services: &[Service],
    vehicle_type: VehicleType,
    condition: &ConditionAssessment,
) -> PortResult<AssessmentPricingFactors> {
    let base = base_price(services, vehicle_type)?;
    let condition_multiplier = condition_multiplier(condition);
    let adjusted = checked_mul(base, condition_multiplier)?;
    let final_price = round_currency(checked_mul(adjusted, ASSESSMENT_DEMAND_MULTIPLIER)?);

    Ok(AssessmentPricingFactors {
        base_price: round_display(base),
        // The per-vehicle multiplier is already folded into `base_price`.
        vehicle_multiplier: Decimal::ONE,
        condition_multiplier: round_display(condition_multiplier),
        demand_multiplier: ASSESSMENT_DEMAND_MULTIPLIER,
        final_price,
    })
}
