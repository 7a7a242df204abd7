//! crates/detailing_core/src/assessments.rs
//!
//! The self-service intake flow: a client describes their vehicle's condition,
//! picks services, and gets a condition-based estimate that the business then
//! reviews, approves and eventually converts into a booking.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::condition::price_assessment;
use crate::domain::{
    Assessment, AssessmentPricingFactors, AssessmentStatus, AssessmentVehicleInfo,
    ConditionAssessment,
};
use crate::policy::{authorize, Action, Actor, Resource};
use crate::ports::{Clock, DatabaseService, PortError, PortResult};
use crate::validation::Violations;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewAssessment {
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub vehicle_info: AssessmentVehicleInfo,
}

fn expect_status(assessment: &Assessment, expected: AssessmentStatus) -> PortResult<()> {
    if assessment.status == expected {
        Ok(())
    } else {
        Err(PortError::Validation(format!(
            "assessment is {}, expected {}",
            assessment.status, expected
        )))
    }
}

#[derive(Clone)]
pub struct AssessmentService {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
}

impl AssessmentService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn create_assessment(&self, input: NewAssessment) -> PortResult<Assessment> {
        let tenant = self.db.get_tenant_by_id(input.tenant_id).await?;
        if !tenant.settings.allow_self_assessment {
            return Err(PortError::Validation(
                "this business does not accept self-assessments".to_string(),
            ));
        }

        let client = self.db.get_client_by_id(input.client_id).await?;
        if client.tenant_id != tenant.id {
            return Err(PortError::Unauthorized);
        }

        let info = &input.vehicle_info;
        let vin_given = info.vin.as_deref().map_or(false, |vin| !vin.trim().is_empty());
        let mut v = Violations::new();
        v.check(vin_given || !tenant.settings.require_vin, "a VIN is required")
            .min_len("make", &info.make, 2)
            .min_len("model", &info.model, 1);
        v.finish()?;

        let assessment = Assessment {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            client_id: client.id,
            vehicle_info: input.vehicle_info,
            condition: ConditionAssessment::default(),
            selected_services: Vec::new(),
            estimated_price: Decimal::ZERO,
            pricing_factors: AssessmentPricingFactors::default(),
            status: AssessmentStatus::Draft,
            converted_booking_id: None,
            created_at: self.clock.now(),
            submitted_at: None,
        };
        let assessment = self.db.create_assessment(assessment).await?;
        info!(assessment_id = %assessment.id, tenant_id = %tenant.id, "Started assessment");
        Ok(assessment)
    }

    pub async fn get_assessment(&self, assessment_id: Uuid) -> PortResult<Assessment> {
        self.db.get_assessment_by_id(assessment_id).await
    }

    pub async fn update_assessment_condition(
        &self,
        assessment_id: Uuid,
        condition: ConditionAssessment,
    ) -> PortResult<Assessment> {
        let mut assessment = self.db.get_assessment_by_id(assessment_id).await?;
        expect_status(&assessment, AssessmentStatus::Draft)?;

        assessment.condition = condition;
        // Keep the estimate in step with the new condition.
        if !assessment.selected_services.is_empty() {
            self.reprice(&mut assessment).await?;
        }
        self.db.update_assessment(&assessment).await?;
        Ok(assessment)
    }

    /// Replaces the selected services and prices them with the condition
    /// strategy.
    pub async fn update_assessment_services(
        &self,
        assessment_id: Uuid,
        service_ids: Vec<Uuid>,
    ) -> PortResult<Assessment> {
        let mut assessment = self.db.get_assessment_by_id(assessment_id).await?;
        expect_status(&assessment, AssessmentStatus::Draft)?;

        assessment.selected_services = service_ids;
        self.reprice(&mut assessment).await?;
        self.db.update_assessment(&assessment).await?;
        info!(
            assessment_id = %assessment.id,
            estimated_price = %assessment.estimated_price,
            "Priced assessment"
        );
        Ok(assessment)
    }

    async fn reprice(&self, assessment: &mut Assessment) -> PortResult<()> {
        let mut services = Vec::with_capacity(assessment.selected_services.len());
        for service_id in &assessment.selected_services {
            services.push(self.db.get_service_by_id(*service_id).await?);
        }
        let factors = price_assessment(
            &services,
            assessment.vehicle_info.vehicle_type,
            &assessment.condition,
        )?;
        assessment.estimated_price = factors.final_price;
        assessment.pricing_factors = factors;
        Ok(())
    }

    pub async fn submit_assessment(&self, assessment_id: Uuid) -> PortResult<Assessment> {
        let mut assessment = self.db.get_assessment_by_id(assessment_id).await?;
        expect_status(&assessment, AssessmentStatus::Draft)?;
        if assessment.selected_services.is_empty() {
            return Err(PortError::Validation(
                "select at least one service before submitting".to_string(),
            ));
        }

        let now = self.clock.now();
        assessment.status = AssessmentStatus::Submitted;
        assessment.submitted_at = Some(now);
        self.db.update_assessment(&assessment).await?;
        self.db.touch_client_assessment(assessment.client_id, now).await?;
        info!(assessment_id = %assessment.id, "Assessment submitted");
        Ok(assessment)
    }

    async fn advance(
        &self,
        actor: &Actor,
        assessment_id: Uuid,
        from: AssessmentStatus,
    ) -> PortResult<Assessment> {
        let mut assessment = self.db.get_assessment_by_id(assessment_id).await?;
        authorize(
            actor,
            Action::ReviewAssessment,
            Resource::TenantScope(assessment.tenant_id),
        )?;
        expect_status(&assessment, from)?;

        if let Some(next) = from.next() {
            assessment.status = next;
        }
        self.db.update_assessment(&assessment).await?;
        info!(assessment_id = %assessment.id, status = %assessment.status, "Assessment advanced");
        Ok(assessment)
    }

    pub async fn review_assessment(
        &self,
        actor: &Actor,
        assessment_id: Uuid,
    ) -> PortResult<Assessment> {
        self.advance(actor, assessment_id, AssessmentStatus::Submitted).await
    }

    pub async fn approve_assessment(
        &self,
        actor: &Actor,
        assessment_id: Uuid,
    ) -> PortResult<Assessment> {
        self.advance(actor, assessment_id, AssessmentStatus::Reviewed).await
    }

    /// Links the booking an approved assessment turned into.
    pub async fn mark_assessment_converted(
        &self,
        actor: &Actor,
        assessment_id: Uuid,
        booking_id: Uuid,
    ) -> PortResult<Assessment> {
        // Fails with NotFound before anything is written.
        self.db.get_booking_by_id(booking_id).await?;

        let mut assessment = self
            .advance(actor, assessment_id, AssessmentStatus::Approved)
            .await?;
        assessment.converted_booking_id = Some(booking_id);
        self.db.update_assessment(&assessment).await?;
        Ok(assessment)
    }

    pub async fn list_tenant_assessments(
        &self,
        actor: &Actor,
        tenant_id: Uuid,
        status: Option<AssessmentStatus>,
    ) -> PortResult<Vec<Assessment>> {
        authorize(actor, Action::ReviewAssessment, Resource::TenantScope(tenant_id))?;
        self.db.list_assessments_by_tenant(tenant_id, status).await
    }
}
