//! Service simulator: stand-ins for the billing, ordering and frontend
//! services of the demo checkout.
//!
//! A call never raises. It returns a [`ServiceOutcome`] that is either a
//! success body carrying `order_id`, or a [`FailurePayload`] shaped like a
//! backend error:
//!
//! ```json
//! { "error_code": "BILLING_400",
//!   "message": "Missing required field: currency",
//!   "details": { "missing_fields": ["currency"] } }
//! ```
//!
//! The alert engine keys its detection off `error_code` and `details`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::injector::FailureInjector;
use crate::policy::{FailureKind, FailureRule};

pub const BILLING: &str = "billing";
pub const ORDERING: &str = "ordering";
pub const FRONTEND: &str = "frontend";

/// One line item of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub sku: String,
    pub quantity: u32,
    /// Price in minor currency units.
    pub price: i64,
}

/// Order payload a client submits to the checkout services.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Amount in minor currency units.
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl CheckoutRequest {
    /// A well-formed checkout: only injected failures make it fail.
    pub fn demo() -> Self {
        Self {
            payment_intent_id: Some(format!("pi_{}", short_hex(16))),
            amount: 249_900,
            currency: Some("INR".to_string()),
            idempotency_key: Some(Uuid::new_v4().to_string()),
            items: vec![OrderItem {
                sku: "SKU-CHK-001".to_string(),
                quantity: 1,
                price: 249_900,
            }],
        }
    }
}

/// Structured error details.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FailureDetails {
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A backend-style error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePayload {
    pub service: String,
    pub error_code: String,
    pub message: String,
    pub details: FailureDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// Policy rule that produced this failure, if injected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symptoms: Vec<String>,
    pub trace_id: String,
}

impl FailurePayload {
    fn from_rule(service: &str, rule: &FailureRule, trace_id: String) -> Self {
        Self {
            service: service.to_string(),
            error_code: rule.error_code.clone(),
            message: rule.message.clone(),
            details: FailureDetails {
                missing_fields: rule.missing_fields.clone(),
                extra: rule.metadata.clone(),
            },
            kind: Some(rule.kind),
            rule_id: Some(rule.id.clone()),
            symptoms: rule.symptoms.clone(),
            trace_id,
        }
    }

    fn missing_field(service: &str, code: &str, field: &str, trace_id: String) -> Self {
        Self {
            service: service.to_string(),
            error_code: code.to_string(),
            message: format!("Missing required field: {field}"),
            details: FailureDetails {
                missing_fields: vec![field.to_string()],
                extra: serde_json::Map::new(),
            },
            kind: Some(FailureKind::SchemaMismatch),
            rule_id: None,
            symptoms: Vec::new(),
            trace_id,
        }
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSuccess {
    pub service: String,
    pub order_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    pub trace_id: String,
}

/// Result of one simulated call. Failure is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceOutcome {
    Failure(FailurePayload),
    Success(ServiceSuccess),
}

impl ServiceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn failure(&self) -> Option<&FailurePayload> {
        match self {
            Self::Failure(f) => Some(f),
            Self::Success(_) => None,
        }
    }

    pub fn trace_id(&self) -> &str {
        match self {
            Self::Failure(f) => &f.trace_id,
            Self::Success(s) => &s.trace_id,
        }
    }
}

/// Billing, ordering and frontend stand-ins sharing one injector.
#[derive(Debug, Clone)]
pub struct ServiceSimulator {
    injector: FailureInjector,
}

impl ServiceSimulator {
    pub fn new(injector: FailureInjector) -> Self {
        Self { injector }
    }

    pub fn injector(&self) -> &FailureInjector {
        &self.injector
    }

    /// Invoke `service`, consulting the injector first.
    pub fn invoke(&self, service: &str, request: &CheckoutRequest) -> ServiceOutcome {
        let trace_id = short_hex(8);
        if let Some(rule) = self.injector.sample(service) {
            tracing::debug!(service, rule = %rule.id, trace_id = %trace_id, "Injected failure");
            return ServiceOutcome::Failure(FailurePayload::from_rule(service, &rule, trace_id));
        }
        Self::handle(service, request, trace_id)
    }

    /// Invoke `service` with a specific policy rule forced to fire.
    ///
    /// The failure is reported by the rule's own service, whatever `service`
    /// was called. Falls back to a normal [`invoke`](Self::invoke) when the
    /// rule id is unknown.
    pub fn invoke_forced(
        &self,
        service: &str,
        request: &CheckoutRequest,
        rule_id: &str,
    ) -> ServiceOutcome {
        match self.injector.force(rule_id) {
            Some(rule) => {
                if rule.service != service {
                    tracing::debug!(
                        called = service,
                        rule_service = %rule.service,
                        rule = %rule.id,
                        "Forced rule belongs to another service"
                    );
                }
                ServiceOutcome::Failure(FailurePayload::from_rule(
                    &rule.service,
                    &rule,
                    short_hex(8),
                ))
            }
            None => {
                tracing::warn!(rule_id, "Forced failure rule not found in policy");
                self.invoke(service, request)
            }
        }
    }

    fn handle(service: &str, request: &CheckoutRequest, trace_id: String) -> ServiceOutcome {
        match service {
            BILLING => {
                if request.currency.as_deref().map_or(true, str::is_empty) {
                    return ServiceOutcome::Failure(FailurePayload::missing_field(
                        service,
                        "BILLING_400",
                        "currency",
                        trace_id,
                    ));
                }
                ServiceOutcome::Success(ServiceSuccess {
                    service: service.to_string(),
                    order_id: format!("ord_{}", short_hex(12)),
                    status: "requires_payment_method".to_string(),
                    payment_intent_id: Some(format!("pi_{}", short_hex(16))),
                    trace_id,
                })
            }
            ORDERING => {
                if request
                    .payment_intent_id
                    .as_deref()
                    .map_or(true, str::is_empty)
                {
                    return ServiceOutcome::Failure(FailurePayload::missing_field(
                        service,
                        "ORDER_400",
                        "payment_intent_id",
                        trace_id,
                    ));
                }
                ServiceOutcome::Success(ServiceSuccess {
                    service: service.to_string(),
                    order_id: format!("ord_{}", short_hex(12)),
                    status: "pending".to_string(),
                    payment_intent_id: request.payment_intent_id.clone(),
                    trace_id,
                })
            }
            _ => ServiceOutcome::Success(ServiceSuccess {
                service: service.to_string(),
                order_id: format!("ord_{}", short_hex(12)),
                status: "rendered".to_string(),
                payment_intent_id: None,
                trace_id,
            }),
        }
    }
}

fn short_hex(len: usize) -> String {
    let mut s = Uuid::new_v4().simple().to_string();
    s.truncate(len);
    s
}
