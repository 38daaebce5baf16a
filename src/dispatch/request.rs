//! Request dispatch strategy, the lowest-priority and most
//! common step kind. Grounded directly in
//! `HttpExecutor::execute`: interpolate method/url/headers/query/body,
//! build an absolute URL from either the interpolated path or
//! `base_url + path`, send, then hand the response to the shared
//! assertion/capture engines.

use crate::collaborators::certificate::CertificateService;
use crate::collaborators::http::{HttpClient, HttpRequest};
use crate::context::{GlobalRegistry, Interpolator, VariableContext};
use crate::expr::{self, ExprContext};
use crate::faker::FakerProvider;
use crate::model::{CertificateRef, RequestSpec};
use crate::retry::RetryExecutor;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Everything the executor needs to finish building a `StepResult`:
/// assertions/captures still run against `build_context` in the caller,
/// since those are shared with the scenario strategy's inner request.
pub struct RequestOutcome {
    pub status_code: Option<u16>,
    pub response_headers: Option<HashMap<String, String>>,
    pub response_body: Option<Value>,
    pub size_bytes: Option<u64>,
    pub duration_ms: u64,
    pub raw_url: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl RequestOutcome {
    fn failed(message: String) -> Self {
        Self {
            status_code: None,
            response_headers: None,
            response_body: None,
            size_bytes: None,
            duration_ms: 0,
            raw_url: None,
            success: false,
            error_message: Some(message),
        }
    }
}

/// Executes one `RequestSpec`: interpolates every templated field, resolves
/// the certificate by request-then-suite precedence, sends through
/// `http`, retrying network-class failures via `RetryExecutor`, and returns
/// the raw response pieces for the caller to assert/capture against.
pub async fn run(
    step_id: &str,
    spec: &RequestSpec,
    suite_certificate: Option<&CertificateRef>,
    vars: &VariableContext,
    registry: &GlobalRegistry,
    http: &dyn HttpClient,
    faker: &dyn FakerProvider,
    certificate_service: &dyn CertificateService,
    default_timeout: Duration,
) -> RequestOutcome {
    let interp = Interpolator::new(vars, registry, faker);

    if let Some(script) = &spec.pre_script {
        if let Err(e) = require_truthy(script, &variables_ctx(vars)) {
            return RequestOutcome::failed(format!("pre_script failed: {}", e));
        }
    }

    // §4.3.1 step 3: raw_url preserves the original pre-interpolation URL,
    // with an implicit `{{base_url}}` prefix spliced in when the template is
    // relative, doesn't already name the literal token, and a base_url is
    // actually configured for this suite.
    let url_template = build_url_template(&spec.url, vars, registry);
    let raw_url = url_template.clone();
    let interpolated_url = interp.interpolate_str(&url_template);
    let url = resolve_url(&interpolated_url, http.base_url().as_deref());

    let mut headers = HashMap::new();
    if let Some(h) = &spec.headers {
        for (name, value) in h {
            headers.insert(name.clone(), interp.interpolate_str(value));
        }
    }

    let mut query = HashMap::new();
    if let Some(q) = &spec.query {
        for (name, value) in q {
            query.insert(name.clone(), interp.interpolate_str(value));
        }
    }

    let body = spec.body.as_ref().map(|b| interp.interpolate_value(b));
    let timeout = spec.timeout.map(Duration::from_millis).unwrap_or(default_timeout);

    let cert = certificate_service.resolve(spec.certificate.as_ref(), suite_certificate);
    let mut request = HttpRequest {
        method: spec.method.to_uppercase(),
        url,
        headers,
        query,
        body,
        timeout,
    };
    if let Some(cert) = cert {
        certificate_service.apply(cert, &mut request);
    }

    let retry = RetryExecutor::default();
    let result = retry
        .execute(step_id, || {
            let request = request.clone();
            async { http.execute(request).await }
        })
        .await;

    let response = match result {
        Ok(r) => r,
        Err(e) => {
            let mut outcome = RequestOutcome::failed(e.to_string());
            outcome.raw_url = Some(raw_url);
            return outcome;
        }
    };

    if let Some(script) = &spec.post_script {
        let ctx = variables_ctx(vars)
            .bind("status_code", Value::from(response.status_code))
            .bind("body", response.body.clone());
        if let Err(e) = require_truthy(script, &ctx) {
            return RequestOutcome {
                status_code: Some(response.status_code),
                response_headers: Some(response.headers),
                response_body: Some(response.body),
                size_bytes: Some(response.size_bytes),
                duration_ms: response.duration_ms,
                raw_url: Some(raw_url),
                success: false,
                error_message: Some(format!("post_script failed: {}", e)),
            };
        }
    }

    RequestOutcome {
        status_code: Some(response.status_code),
        response_headers: Some(response.headers),
        response_body: Some(response.body),
        size_bytes: Some(response.size_bytes),
        duration_ms: response.duration_ms,
        raw_url: Some(raw_url),
        success: true,
        error_message: None,
    }
}

/// Builds the pre-interpolation URL template stored in `raw_url`: the
/// template as authored, unless it's relative, lacks the literal
/// `{{base_url}}` token, and a `base_url` is actually resolvable in scope —
/// in which case the token is spliced on implicitly.
fn build_url_template(url: &str, vars: &VariableContext, registry: &GlobalRegistry) -> String {
    let is_absolute = url.starts_with("http://") || url.starts_with("https://");
    let has_literal_token = url.contains("{{base_url}}");
    if is_absolute || has_literal_token {
        return url.to_string();
    }
    if vars.lookup("base_url", registry).is_some() {
        format!("{{{{base_url}}}}{}", url)
    } else {
        url.to_string()
    }
}

fn resolve_url(raw_url: &str, base_url: Option<&str>) -> String {
    if raw_url.starts_with("http://") || raw_url.starts_with("https://") {
        return raw_url.to_string();
    }
    match base_url {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), raw_url),
        None => raw_url.to_string(),
    }
}

fn variables_ctx(vars: &VariableContext) -> ExprContext {
    let mut variables = serde_json::Map::new();
    for (k, v) in &vars.runtime {
        variables.insert(k.clone(), v.clone());
    }
    for (k, v) in &vars.suite {
        variables.entry(k.clone()).or_insert_with(|| v.clone());
    }
    for (k, v) in &vars.environment {
        variables.entry(k.clone()).or_insert_with(|| v.clone());
    }
    ExprContext::new().bind("variables", Value::Object(variables))
}

/// `pre_script`/`post_script` run through the same closed expression bridge
/// as hook `validate` entries: no assignment grammar exists, so a script is
/// a guard condition rather than free-form logic.
fn require_truthy(script: &str, ctx: &ExprContext) -> Result<(), expr::EvalError> {
    if expr::eval_truthy(script, ctx)? {
        Ok(())
    } else {
        Err(expr::EvalError::TypeError("script condition was falsy".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::certificate::NoopCertificateService;
    use crate::collaborators::http::{HttpResponse, MockHttpClient};
    use crate::context::GlobalRegistry;
    use crate::faker::DefaultFakerProvider;

    #[tokio::test]
    async fn builds_absolute_url_from_base_url_and_path() {
        let http = MockHttpClient::new();
        http.set_base_url(Some("http://api.test".to_string()));
        http.on(
            "GET",
            "http://api.test/v1/users/7",
            HttpResponse {
                status_code: 200,
                headers: HashMap::new(),
                body: serde_json::json!({"id": 7}),
                size_bytes: 5,
                duration_ms: 2,
            },
        );

        let spec = RequestSpec {
            method: "GET".to_string(),
            url: "/v1/users/{{uid}}".to_string(),
            headers: None,
            query: None,
            body: None,
            certificate: None,
            timeout: None,
            pre_script: None,
            post_script: None,
        };
        let mut vars = VariableContext::new();
        vars.set_runtime("uid", Value::from(7));
        let registry = GlobalRegistry::new();
        let faker = DefaultFakerProvider;
        let cert_service = NoopCertificateService;

        let outcome = run(
            "step",
            &spec,
            None,
            &vars,
            &registry,
            &http,
            &faker,
            &cert_service,
            Duration::from_secs(30),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.raw_url, Some("/v1/users/{{uid}}".to_string()));
    }

    #[tokio::test]
    async fn literal_base_url_token_resolves_through_suite_scope() {
        let http = MockHttpClient::new();
        http.on(
            "GET",
            "http://api.test/v1/u/42",
            HttpResponse {
                status_code: 200,
                headers: HashMap::new(),
                body: serde_json::json!({"ok": true}),
                size_bytes: 5,
                duration_ms: 1,
            },
        );

        let spec = RequestSpec {
            method: "GET".to_string(),
            url: "{{base_url}}/v1/u/{{uid}}".to_string(),
            headers: None,
            query: None,
            body: None,
            certificate: None,
            timeout: None,
            pre_script: None,
            post_script: None,
        };
        let mut vars = VariableContext::new();
        vars.suite.insert("base_url".to_string(), Value::from("http://api.test"));
        vars.set_runtime("uid", Value::from(42));
        let registry = GlobalRegistry::new();
        let faker = DefaultFakerProvider;
        let cert_service = NoopCertificateService;

        let outcome = run(
            "step",
            &spec,
            None,
            &vars,
            &registry,
            &http,
            &faker,
            &cert_service,
            Duration::from_secs(30),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.raw_url, Some("{{base_url}}/v1/u/{{uid}}".to_string()));
    }

    #[tokio::test]
    async fn implicit_base_url_prefix_added_to_raw_url_when_configured() {
        let http = MockHttpClient::new();
        http.on(
            "GET",
            "http://api.test/v1/ping",
            HttpResponse {
                status_code: 200,
                headers: HashMap::new(),
                body: Value::Null,
                size_bytes: 0,
                duration_ms: 1,
            },
        );

        let spec = RequestSpec {
            method: "GET".to_string(),
            url: "/v1/ping".to_string(),
            headers: None,
            query: None,
            body: None,
            certificate: None,
            timeout: None,
            pre_script: None,
            post_script: None,
        };
        let mut vars = VariableContext::new();
        vars.suite.insert("base_url".to_string(), Value::from("http://api.test"));
        let registry = GlobalRegistry::new();
        let faker = DefaultFakerProvider;
        let cert_service = NoopCertificateService;

        let outcome = run(
            "step",
            &spec,
            None,
            &vars,
            &registry,
            &http,
            &faker,
            &cert_service,
            Duration::from_secs(30),
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.raw_url, Some("{{base_url}}/v1/ping".to_string()));
    }

    #[tokio::test]
    async fn network_error_surfaces_as_failed_outcome() {
        let http = MockHttpClient::new();
        let spec = RequestSpec {
            method: "GET".to_string(),
            url: "http://api.test/missing".to_string(),
            headers: None,
            query: None,
            body: None,
            certificate: None,
            timeout: None,
            pre_script: None,
            post_script: None,
        };
        let vars = VariableContext::new();
        let registry = GlobalRegistry::new();
        let faker = DefaultFakerProvider;
        let cert_service = NoopCertificateService;

        let outcome = run(
            "step",
            &spec,
            None,
            &vars,
            &registry,
            &http,
            &faker,
            &cert_service,
            Duration::from_millis(10),
        )
        .await;

        assert!(!outcome.success);
        assert!(outcome.error_message.is_some());
    }
}
