#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod exam_service;
pub mod sessions;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ExamServiceError, SessionError};
pub use exam_service::ExamSetService;
pub use sessions::{
    Advance, Commit, CompletedSession, SelectionPolicy, SessionLoopService, SessionStateMachine,
    Tick,
};
