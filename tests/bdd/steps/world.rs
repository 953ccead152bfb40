use cucumber::event::ScenarioFinished;
use cucumber::gherkin::{Feature, Rule, Scenario};
use cucumber::World;
use plantshop_test_utils::{
    ApiClient, HttpResult, ResourceId, RunContext, ScenarioInfo, ScenarioOutcome, Session,
    SetupResult, TeardownReport,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::utils::substitute;

/// Session data key for the stock noted before a sale
pub const INITIAL_STOCK: &str = "initialStock";

/// World struct that holds state across step definitions
#[derive(Debug, Default, World)]
pub struct PlantShopWorld {
    /// Installed by the before hook, removed by the after hook
    pub session: Option<Session>,

    // Last request and its result
    pub response: Option<HttpResult>,
    pub last_endpoint: Option<String>,
    pub request_body: Option<Value>,

    // Ids remembered by fixture and request steps
    pub sale_id: Option<ResourceId>,
    pub plant_id: Option<ResourceId>,
    pub expected_sales: Option<usize>,
}

impl PlantShopWorld {
    /// Build and set up this scenario's session.
    ///
    /// If setup fails, whatever was acquired is released before the error
    /// is returned.
    pub async fn start_scenario(&mut self, run: Arc<RunContext>, scenario: ScenarioInfo) -> SetupResult<()> {
        let mut session = Session::new(run);
        match session.setup(scenario).await {
            Ok(()) => {
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                let report = session.teardown(ScenarioOutcome::Failed).await;
                warn!(errors = ?report.errors, "Scenario setup failed: {}", e);
                Err(e)
            }
        }
    }

    pub async fn finish_scenario(&mut self, outcome: ScenarioOutcome) -> Option<TeardownReport> {
        let mut session = self.session.take()?;
        Some(session.teardown(outcome).await)
    }

    pub fn session(&self) -> &Session {
        self.session
            .as_ref()
            .expect("scenario session missing; was the before hook installed?")
    }

    pub fn session_mut(&mut self) -> &mut Session {
        self.session
            .as_mut()
            .expect("scenario session missing; was the before hook installed?")
    }

    pub fn client(&self) -> &ApiClient {
        self.session()
            .api()
            .unwrap_or_else(|e| panic!("API client unavailable: {e}"))
    }

    /// The result of the last request step
    pub fn response(&self) -> &HttpResult {
        self.response
            .as_ref()
            .expect("no request has been sent in this scenario")
    }

    pub fn record_response(&mut self, endpoint: String, result: HttpResult) {
        debug!(endpoint = %endpoint, status = result.status, "Recorded response");
        self.last_endpoint = Some(endpoint);
        self.response = Some(result);
    }

    pub fn initial_stock(&self) -> Option<i64> {
        self.session().recall(INITIAL_STOCK).and_then(Value::as_i64)
    }

    /// Fill `{saleId}` and `{plantId}` from remembered ids
    pub fn resolve_endpoint(&self, template: &str) -> String {
        let sale = self.sale_id.as_ref().map(ResourceId::as_str);
        let plant = self.plant_id.as_ref().map(ResourceId::as_str);
        let endpoint = substitute(template, "saleId", sale);
        substitute(&endpoint, "plantId", plant)
    }

    /// Context appended to assertion failures
    pub fn describe_response(&self) -> String {
        match &self.response {
            Some(result) => format!(
                "Endpoint: {}\nStatus: {}\nResponse: {}",
                self.last_endpoint.as_deref().unwrap_or("<none>"),
                result.status,
                serde_json::to_string_pretty(&result.data).unwrap_or_default()
            ),
            None => "no response recorded".to_string(),
        }
    }
}

/// Scenario name plus the tags it inherits from its feature and rule
pub fn scenario_info(feature: &Feature, rule: Option<&Rule>, scenario: &Scenario) -> ScenarioInfo {
    let tags = feature
        .tags
        .iter()
        .chain(rule.into_iter().flat_map(|r| r.tags.iter()))
        .chain(scenario.tags.iter());
    ScenarioInfo::new(scenario.name.clone(), tags)
}

pub fn outcome_of(event: &ScenarioFinished) -> ScenarioOutcome {
    if matches!(
        event,
        ScenarioFinished::StepFailed(..) | ScenarioFinished::BeforeHookFailed(..)
    ) {
        ScenarioOutcome::Failed
    } else if matches!(event, ScenarioFinished::StepSkipped) {
        ScenarioOutcome::Skipped
    } else {
        ScenarioOutcome::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn endpoints_use_remembered_ids() {
        let world = PlantShopWorld {
            sale_id: Some(ResourceId::from(42i64)),
            ..PlantShopWorld::default()
        };
        assert_eq!(world.resolve_endpoint("/api/sales/{saleId}"), "/api/sales/42");
        assert_eq!(
            world.resolve_endpoint("/api/sales/plant/{plantId}"),
            "/api/sales/plant/999999"
        );
    }

    #[test]
    fn describe_without_response() {
        assert_eq!(PlantShopWorld::default().describe_response(), "no response recorded");
    }
}
