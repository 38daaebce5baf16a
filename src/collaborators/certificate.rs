//! Certificate collaborator (out of scope: "certificate file
//! I/O"; the request strategy's step 4: "resolve certificate by precedence request > suite
//! > none"). The kernel only needs the precedence decision and a hook to
//! mutate the outgoing request; actual file loading/TLS wiring is left to
//! the collaborator.

use crate::collaborators::http::HttpRequest;
use crate::model::CertificateRef;

pub trait CertificateService: Send + Sync {
    /// Picks the certificate that applies to a request, preferring the
    /// request-level reference, then the suite-level one, then none.
    fn resolve<'a>(
        &self,
        request_cert: Option<&'a CertificateRef>,
        suite_cert: Option<&'a CertificateRef>,
    ) -> Option<&'a CertificateRef> {
        request_cert.or(suite_cert)
    }

    /// Mutates `request` to carry whatever transport-level certificate
    /// configuration `cert` implies. The default no-op collaborator leaves
    /// this to a real TLS-aware `HttpClient` implementation.
    fn apply(&self, _cert: &CertificateRef, _request: &mut HttpRequest) {}
}

#[derive(Debug, Default)]
pub struct NoopCertificateService;

impl CertificateService for NoopCertificateService {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_certificate_takes_precedence_over_suite() {
        let service = NoopCertificateService;
        let request_cert = CertificateRef {
            cert_path: Some("req.pem".to_string()),
            ..Default::default()
        };
        let suite_cert = CertificateRef {
            cert_path: Some("suite.pem".to_string()),
            ..Default::default()
        };
        let resolved = service.resolve(Some(&request_cert), Some(&suite_cert));
        assert_eq!(resolved.unwrap().cert_path.as_deref(), Some("req.pem"));
    }

    #[test]
    fn falls_back_to_suite_then_none() {
        let service = NoopCertificateService;
        let suite_cert = CertificateRef {
            cert_path: Some("suite.pem".to_string()),
            ..Default::default()
        };
        assert_eq!(
            service.resolve(None, Some(&suite_cert)).unwrap().cert_path.as_deref(),
            Some("suite.pem")
        );
        assert!(service.resolve(None, None).is_none());
    }
}
