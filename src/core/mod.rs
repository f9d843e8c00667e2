//! Core data models, AI orchestration, and shared infrastructure.

pub mod gateway;
pub mod http;
pub mod logging;
pub mod models;
pub mod prediction;
pub mod provider;
pub mod rates;
pub mod report;
pub mod vision;

pub use gateway::AiGateway;
pub use models::{
    CostLine, ElementRecord, JobStatus, ProjectEstimate, Quantity, ServiceStatus, TranslationJob,
    UploadProgress, UploadSession, UploadState,
};
pub use prediction::{CostPrediction, ProjectBrief, predict_cost};
pub use provider::{AiProvider, Capability, ProviderDescriptor, ProviderTable};
pub use rates::{Measure, RateTable};
pub use report::{CostReport, generate_report};
pub use vision::{ImageAnalysis, analyze_image};
