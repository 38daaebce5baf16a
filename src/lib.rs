//! `flowtest_engine`: a declarative, YAML-driven HTTP flow test execution
//! kernel. The binary crate (`src/main.rs`) is a thin CLI shell around the
//! modules exported here; embedders can drive `Scheduler`/`SuiteExecutor`
//! directly against their own collaborators.

pub mod assertions;
pub mod call;
pub mod capture;
pub mod collaborators;
pub mod context;
pub mod dispatch;
pub mod errors;
pub mod executor;
pub mod expr;
pub mod faker;
pub mod hooks;
pub mod jmes;
pub mod limits;
pub mod model;
pub mod observer;
pub mod retry;
pub mod scheduler;
pub mod telemetry;
