//! External collaborators (explicitly out of scope for the kernel): HTTP
//! transport, suite discovery, interactive input, and certificate I/O. The
//! kernel (`scheduler`, `executor`, `dispatch`) only ever depends on the
//! trait objects declared here; the default implementations in the
//! sibling modules exist so `src/main.rs` can run real suites end-to-end,
//! mirroring how a reqwest-based runner ships a concrete `reqwest`
//! `HttpExecutor` alongside its step-execution core.

pub mod certificate;
pub mod http;
pub mod input;
pub mod source;

pub use certificate::{CertificateService, NoopCertificateService};
pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use input::{DialoguerInputPrompter, InputPrompter};
pub use source::{DiscoveredSuite, FileSuiteSource, SuiteSource};
