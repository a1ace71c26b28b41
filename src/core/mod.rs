//! Acquisition core: models, classification, the spin loop, sessions, and
//! the collaborator seams (HTTP transport, browser).

pub mod browser;
pub mod classify;
pub mod document;
pub mod executor;
pub mod history;
pub mod http;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod session;
pub mod spin_loop;
pub mod webdriver;

pub use browser::{Browser, BrowserFactory, ElementHandle, Selector};
pub use classify::{ResponseProfile, classify};
pub use document::Document;
pub use executor::ActionExecutor;
pub use history::{HistoryEntry, business_day, extract_today};
pub use http::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use models::{
    AccountIdentity, AcquisitionAttempt, AcquisitionReport, CdkResult, Classification,
    DoneReason, ProviderCredentials, RawOutcome, RewardAllowance, RobotOutput, SessionArtifact,
    Step, Termination,
};
pub use pipeline::{RunContext, acquire, acquire_all};
pub use provider::{AllowanceReading, Provider, ProviderSelection, RewardFlow};
pub use session::{Established, SessionManager, SessionPlan, SessionState};
pub use spin_loop::{CdkSink, LoopPolicy, LoopReport, SpinLoop};
pub use webdriver::{WebDriverBrowser, WebDriverFactory};
