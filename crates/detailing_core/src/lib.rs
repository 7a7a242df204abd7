pub mod domain;
pub mod ports;

pub mod analytics;
pub mod assessments;
pub mod bookings;
pub mod catalog;
pub mod condition;
pub mod jobs;
pub mod knowledge;
pub mod policy;
pub mod pricing;
pub mod tenants;
pub mod users;
pub mod validation;
pub mod vehicles;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use domain::{
    Assessment, AssessmentStatus, Booking, BookingStatus, Client, Identity, KnowledgeItem,
    Service, ServiceCategory, Tenant, User, Vehicle, VehicleType, WorkflowState,
};
pub use policy::{Action, Actor, Resource};
pub use ports::{
    Clock, DatabaseService, EmbeddingService, KnowledgeStore, NotificationKind,
    NotificationService, PortError, PortResult, SystemClock, WorkflowScheduler,
};
pub use pricing::{InsightSource, PriceBreakdown, PricingEngine};
pub use workflow::{BookingWorkflow, ResumeOutcome, WorkflowCheckpoint, WorkflowStep};
