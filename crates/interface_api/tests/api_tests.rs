//! API integration tests
//!
//! The full router runs over in-memory ports; requests carry tokens minted
//! with the configured secret.

use axum::http::StatusCode;
use axum_test::TestServer;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use core_kernel::ItemId;
use domain_adjudication::{MockEmployeeDirectory, MockInvoiceStore};
use domain_insurance::MockCeilingStore;
use domain_pricing::{CatalogSnapshot, InteractionSeverity, MockPricingCatalog};
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::{create_router, AppState, Ports};
use test_utils::{
    interaction, ConditionBuilder, Dates, EmployeeBuilder, InsuranceBuilder, ItemBuilder, PriceBuilder,
};

struct Fixture {
    server: TestServer,
    config: ApiConfig,
    employee_id: Uuid,
    insurance_id: Uuid,
    item_id: ItemId,
    other_item_id: ItemId,
    condition_id: Uuid,
}

impl Fixture {
    async fn new() -> Self {
        let item = ItemBuilder::new().code("DRG-WARF").build();
        let other = ItemBuilder::new().code("DRG-ASA").build();
        let (item_id, other_item_id) = (item.id, other.id);
        let condition = ConditionBuilder::for_item(item_id)
            .name("Anticoagulants under 65")
            .coverage(dec!(80))
            .ages(None, Some(65))
            .build();
        let condition_id = condition.id;

        let snapshot = CatalogSnapshot::new()
            .with_item(item)
            .with_item(other)
            .with_price(PriceBuilder::for_item(item_id).price(dec!(1000000)).build())
            .with_price(PriceBuilder::for_item(other_item_id).price(dec!(20000)).build())
            .with_condition(condition)
            .with_interaction(interaction(item_id, other_item_id, InteractionSeverity::Severe));

        let mut employee = EmployeeBuilder::new().build();
        let insurance = InsuranceBuilder::for_employee(employee.employee_id)
            .ceiling(dec!(10000000))
            .build();
        employee.insurance_id = insurance.id;
        let employee_id = employee.employee_id;

        let ceiling = MockCeilingStore::with_policies(vec![insurance.clone()]).await;
        let employees = MockEmployeeDirectory::new();
        employees.insert(employee).await;
        let invoices = Arc::new(MockInvoiceStore::new());

        let ports = Ports {
            catalog: Arc::new(MockPricingCatalog::new(snapshot)),
            ceiling: Arc::new(ceiling),
            invoices: invoices.clone(),
            usage: invoices,
            employees: Arc::new(employees),
        };
        let config = ApiConfig::default();
        let server = TestServer::new(create_router(AppState::new(config.clone(), ports))).unwrap();

        Self {
            server,
            config,
            employee_id: employee_id.into(),
            insurance_id: insurance.id.into(),
            item_id,
            other_item_id,
            condition_id: condition_id.into(),
        }
    }

    fn token(&self, roles: &[&str]) -> String {
        let roles = roles.iter().map(|r| r.to_string()).collect();
        create_token("reviewer-1", roles, &self.config.jwt_secret, 300).unwrap()
    }

    fn admin(&self) -> String {
        self.token(&["admin"])
    }

    fn line(&self, item_id: ItemId) -> Value {
        json!({ "item_id": Uuid::from(item_id), "quantity": 1 })
    }

    fn invoice_body(&self) -> Value {
        json!({
            "employee_id": self.employee_id,
            "service_date": Dates::service_date(),
            "lines": [self.line(self.item_id)],
        })
    }
}

fn amount(value: &Value) -> Decimal {
    value
        .as_str()
        .map(|s| s.parse().unwrap())
        .or_else(|| value.as_f64().map(|f| Decimal::try_from(f).unwrap()))
        .unwrap_or_else(|| panic!("not an amount: {}", value))
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_liveness_is_public() {
        let fixture = Fixture::new().await;
        let response = fixture.server.get("/health").await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_lists_adapters() {
        let fixture = Fixture::new().await;
        let response = fixture.server.get("/health/ready").await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["status"], "ready");
        assert_eq!(body["adapters"].as_array().unwrap().len(), 5);
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let fixture = Fixture::new().await;
        let response = fixture
            .server
            .get(&format!("/api/v1/insurances/{}/ceiling", fixture.insurance_id))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_unauthorized() {
        let fixture = Fixture::new().await;
        let token = create_token("intruder", vec!["admin".to_string()], "not-the-secret", 300).unwrap();
        let response = fixture
            .server
            .get(&format!("/api/v1/insurances/{}/ceiling", fixture.insurance_id))
            .authorization_bearer(token)
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let fixture = Fixture::new().await;
        let response = fixture
            .server
            .post("/api/v1/invoices")
            .authorization_bearer(fixture.token(&[permissions::INVOICE_READ]))
            .json(&fixture.invoice_body())
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }
}

mod adjudication {
    use super::*;

    #[tokio::test]
    async fn test_preview_prices_without_debiting() {
        let fixture = Fixture::new().await;
        let response = fixture
            .server
            .post("/api/v1/adjudications/preview")
            .authorization_bearer(fixture.token(&[permissions::ADJUDICATION_PREVIEW]))
            .json(&json!({
                "employee_id": fixture.employee_id,
                "service_date": Dates::service_date(),
                "lines": [fixture.line(fixture.item_id), fixture.line(fixture.other_item_id)],
            }))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["mode"], "preview");
        assert_eq!(amount(&body["items"][0]["insurance_share"]), dec!(800000));
        assert_eq!(amount(&body["items"][1]["insurance_share"]), dec!(14000));
        assert_eq!(body["requires_review"], true);
        assert_eq!(body["alerts"].as_array().unwrap().len(), 1);

        let ceiling = fixture
            .server
            .get(&format!("/api/v1/insurances/{}/ceiling", fixture.insurance_id))
            .authorization_bearer(fixture.admin())
            .await
            .json::<Value>();
        assert_eq!(amount(&ceiling["remaining_amount"]), dec!(10000000));
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected() {
        let fixture = Fixture::new().await;
        let response = fixture
            .server
            .post("/api/v1/adjudications/preview")
            .authorization_bearer(fixture.admin())
            .json(&json!({
                "employee_id": fixture.employee_id,
                "lines": [{ "item_id": Uuid::from(fixture.item_id), "quantity": 0 }],
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_unknown_employee_is_not_found() {
        let fixture = Fixture::new().await;
        let response = fixture
            .server
            .post("/api/v1/adjudications/preview")
            .authorization_bearer(fixture.admin())
            .json(&json!({
                "employee_id": Uuid::now_v7(),
                "lines": [fixture.line(fixture.item_id)],
            }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_screen_reports_interactions() {
        let fixture = Fixture::new().await;
        let response = fixture
            .server
            .post("/api/v1/interactions/screen")
            .authorization_bearer(fixture.token(&[permissions::ADJUDICATION_PREVIEW]))
            .json(&json!({
                "item_ids": [Uuid::from(fixture.item_id), Uuid::from(fixture.other_item_id)],
            }))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["requires_review"], true);
        assert_eq!(body["alerts"][0]["severity"], "severe");
    }

    #[tokio::test]
    async fn test_condition_eligibility_lists_failures() {
        let fixture = Fixture::new().await;
        let response = fixture
            .server
            .post(&format!("/api/v1/conditions/{}/eligibility", fixture.condition_id))
            .authorization_bearer(fixture.token(&[permissions::CONDITION_READ]))
            .json(&json!({
                "employee_id": fixture.employee_id,
                "service_date": Dates::service_date(),
            }))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["eligible"], true);
        assert_eq!(body["condition_name"], "Anticoagulants under 65");
        assert!(body["failures"].as_array().unwrap().is_empty());
    }
}

mod invoices {
    use super::*;

    async fn create(fixture: &Fixture) -> Uuid {
        let response = fixture
            .server
            .post("/api/v1/invoices")
            .authorization_bearer(fixture.admin())
            .json(&fixture.invoice_body())
            .await;
        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["status"], "draft");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_invoice_lifecycle() {
        let fixture = Fixture::new().await;
        let id = create(&fixture).await;
        let token = fixture.admin();

        let calculated = fixture
            .server
            .post(&format!("/api/v1/invoices/{}/calculate", id))
            .authorization_bearer(token.clone())
            .await;
        calculated.assert_status_ok();
        let body = calculated.json::<Value>();
        assert_eq!(body["invoice"]["status"], "calculated");
        assert_eq!(amount(&body["adjudication"]["totals"]["insurance_share"]), dec!(800000));

        fixture
            .server
            .post(&format!("/api/v1/invoices/{}/submit", id))
            .authorization_bearer(token.clone())
            .await
            .assert_status_ok();

        let approved = fixture
            .server
            .post(&format!("/api/v1/invoices/{}/approve", id))
            .authorization_bearer(fixture.token(&[permissions::INVOICE_APPROVE]))
            .json(&json!({ "note": "clinically justified" }))
            .await;
        approved.assert_status_ok();
        let body = approved.json::<Value>();
        assert_eq!(body["status"], "approved");
        assert_eq!(body["decided_by"], "reviewer-1");

        let ceiling = fixture
            .server
            .get(&format!("/api/v1/insurances/{}/ceiling", fixture.insurance_id))
            .authorization_bearer(fixture.token(&[permissions::CEILING_READ]))
            .await
            .json::<Value>();
        assert_eq!(amount(&ceiling["used_amount"]), dec!(800000));
        assert_eq!(amount(&ceiling["remaining_amount"]), dec!(9200000));
    }

    #[tokio::test]
    async fn test_cancel_releases_ceiling() {
        let fixture = Fixture::new().await;
        let id = create(&fixture).await;
        let token = fixture.admin();

        fixture
            .server
            .post(&format!("/api/v1/invoices/{}/calculate", id))
            .authorization_bearer(token.clone())
            .await
            .assert_status_ok();
        let cancelled = fixture
            .server
            .post(&format!("/api/v1/invoices/{}/cancel", id))
            .authorization_bearer(token.clone())
            .json(&json!({}))
            .await;
        cancelled.assert_status_ok();
        assert_eq!(cancelled.json::<Value>()["status"], "cancelled");

        let ceiling = fixture
            .server
            .get(&format!("/api/v1/insurances/{}/ceiling", fixture.insurance_id))
            .authorization_bearer(token)
            .await
            .json::<Value>();
        assert_eq!(amount(&ceiling["remaining_amount"]), dec!(10000000));
    }

    #[tokio::test]
    async fn test_approving_a_draft_is_a_conflict() {
        let fixture = Fixture::new().await;
        let id = create(&fixture).await;

        let response = fixture
            .server
            .post(&format!("/api/v1/invoices/{}/approve", id))
            .authorization_bearer(fixture.admin())
            .json(&json!({}))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_invoice_is_not_found() {
        let fixture = Fixture::new().await;
        let response = fixture
            .server
            .get(&format!("/api/v1/invoices/{}", Uuid::now_v7()))
            .authorization_bearer(fixture.admin())
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}
