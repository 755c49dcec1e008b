//! Request gate and response hook
//!
//! [`Gateway`] is what a connection hands each parsed request to. It asks the
//! policy for a decision, answers denied requests with 403, forwards allowed
//! ones and rewrites self-redirects in the upstream response.

use tracing::{error, info, warn};

use crate::http::request::Request;
use crate::http::response::Response;
use crate::policy::{DecisionReason, PolicySet, RequestDescriptor};
use crate::proxy::redirect::RedirectRewriter;
use crate::proxy::upstream::{ForwardError, ProxyHandler};

pub struct Gateway {
    policy: PolicySet,
    handler: ProxyHandler,
    rewriter: RedirectRewriter,
}

impl Gateway {
    pub fn new(policy: PolicySet, handler: ProxyHandler, rewriter: RedirectRewriter) -> Self {
        Self {
            policy,
            handler,
            rewriter,
        }
    }

    pub async fn handle(&self, request: &Request) -> Response {
        if !self.admit(request) {
            return Response::forbidden();
        }

        let mut response = match self.handler.forward_request(request).await {
            Ok(response) => response,
            Err(ForwardError::Timeout(after)) => {
                warn!(method = %request.method, path = %request.path, ?after, "upstream timed out");
                return Response::gateway_timeout();
            }
            Err(ForwardError::Upstream(e)) => {
                error!(method = %request.method, path = %request.path, error = %format!("{e:#}"), "upstream request failed");
                return Response::bad_gateway();
            }
        };

        self.rewrite_location(&mut response);
        response
    }

    /// Runs the policy for a request and logs the outcome.
    fn admit(&self, request: &Request) -> bool {
        let descriptor = RequestDescriptor::new(request.method.as_str(), request.path_only());
        info!(method = descriptor.method, path = descriptor.path, "request");

        let decision = self.policy.evaluate(&descriptor);
        let reason = decision.reason();

        match (reason, decision.matched_rule) {
            (DecisionReason::MatchedAllowRule, Some(rule)) => {
                info!(%rule, "→ ALLOWED");
            }
            (_, Some(rule)) => {
                info!(%rule, "→ DENIED ({reason})");
            }
            (_, None) => {
                info!("→ DENIED ({reason})");
            }
        }

        decision.is_allowed()
    }

    /// Rewrites the Location header of an upstream response in place.
    pub fn rewrite_location(&self, response: &mut Response) {
        let Some(location) = response.header("Location").map(str::to_string) else {
            return;
        };

        match self.rewriter.rewrite(&location) {
            Ok(Some(rewritten)) => {
                info!(from = %location, "→ Redirecting to: {rewritten}");
                response.set_header("Location", rewritten);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(location = %location, error = %e, "Error parsing location header");
            }
        }
    }
}
