//! Self-repairing preconditions.
//!
//! The target's database is shared and long-lived, so fixtures look at what
//! is there first and only create or patch what the scenario needs. Every
//! resource they create is tracked for teardown.

use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, Pagination, Role};
use crate::cleanup::CreatedResources;
use crate::config::SuiteConfig;
use crate::error::{SetupError, SetupResult};
use crate::response::{HttpResult, ResourceId};

/// Stock given to a plant when a fixture has to top it up
pub const RESTOCK_QUANTITY: i64 = 10;
/// Stock given to the plant that backs a batch of sales
pub const BATCH_RESTOCK_QUANTITY: i64 = 100;

const BACKOFF_INITIAL_MS: u64 = 100;

/// Fixture operations bound to one scenario's client and tracker.
pub struct Fixtures<'a> {
    client: ApiClient,
    config: &'a SuiteConfig,
    resources: &'a mut CreatedResources,
}

impl<'a> Fixtures<'a> {
    pub fn new(client: ApiClient, config: &'a SuiteConfig, resources: &'a mut CreatedResources) -> Self {
        Self {
            client,
            config,
            resources,
        }
    }

    /// Make a plant with exactly `quantity` in stock and return it.
    ///
    /// Runs as admin regardless of the scenario's identity. A fresh plant is
    /// preferred; when creation is refused an existing plant is updated.
    pub async fn ensure_plant_with_quantity(&mut self, quantity: i64) -> SetupResult<Value> {
        let admin = self.admin_client().await?;
        let plants = list_plants(&admin).await?;
        let sample = &plants[0];

        let body = json!({
            "name": format!("Test Plant {}", short_id()),
            "price": sample.get("price").cloned().unwrap_or(Value::Null),
            "quantity": quantity,
            "categoryId": category_id(sample),
        });
        let created = admin.post("/plants", &body).await;

        let mut plant = if created.is_success() {
            if let Some(id) = created.resource_id() {
                info!(plant = %id, quantity, "Created fixture plant");
                self.resources.track_plant(id);
            }
            created.data
        } else {
            debug!(status = created.status, "Plant creation refused, updating an existing plant");
            let target = plants
                .iter()
                .find(|p| plant_quantity(p) == Some(quantity))
                .unwrap_or(sample);
            let updated = set_stock(&admin, target, quantity).await;
            if !updated.is_success() {
                return Err(precondition("update plant quantity", &updated));
            }
            updated.data
        };

        let id = required_id(&plant, "plant")?;
        let verify = admin.get(&format!("/plants/{}", id)).await;
        if verify.is_success() {
            if plant_quantity(&verify.data) == Some(quantity) {
                plant = verify.data;
            } else {
                warn!(plant = %id, quantity, "Quantity mismatch after update, re-applying");
                let retry = set_stock(&admin, &verify.data, quantity).await;
                if !retry.is_success() {
                    return Err(precondition("re-apply plant quantity", &retry));
                }
                plant = retry.data;
            }
        }
        Ok(plant)
    }

    /// Return a plant that has stock, restocking the first one if none does
    pub async fn ensure_plant_in_stock(&mut self) -> SetupResult<Value> {
        let plants = list_plants(&self.client).await?;
        if let Some(plant) = plants.iter().find(|p| plant_quantity(p).unwrap_or(0) > 0) {
            return Ok(plant.clone());
        }

        info!("No plant has stock, restocking the first one");
        let admin = self.admin_client().await?;
        let updated = set_stock(&admin, &plants[0], RESTOCK_QUANTITY).await;
        if updated.is_success() {
            Ok(updated.data)
        } else {
            Err(precondition("update plant stock", &updated))
        }
    }

    /// Sell `quantity` of a plant and track the sale
    pub async fn create_sale(&mut self, plant_id: &ResourceId, quantity: i64) -> SetupResult<Value> {
        let result = self
            .client
            .post(&format!("/sales/plant/{}?quantity={}", plant_id, quantity), &json!({}))
            .await;
        if !result.is_success() {
            return Err(precondition("create sale", &result));
        }
        if let Some(id) = result.resource_id() {
            debug!(sale = %id, plant = %plant_id, quantity, "Created fixture sale");
            self.resources.track_sale(id);
        }
        Ok(result.data)
    }

    /// A single sale of one unit against any plant with stock
    pub async fn ensure_sale_exists(&mut self) -> SetupResult<Value> {
        let plant = self.ensure_plant_in_stock().await?;
        let plant_id = required_id(&plant, "plant")?;
        self.create_sale(&plant_id, 1).await
    }

    /// Leave exactly `count` sales in the system and return their ids.
    ///
    /// Existing sales are deleted first. A round only counts once the target
    /// lists exactly `count` sales; otherwise it is retried with backoff until
    /// the attempt budget runs out.
    pub async fn ensure_sales_count(&mut self, count: usize) -> SetupResult<Vec<ResourceId>> {
        let attempts = self.config.fixture_attempts.max(1);
        let mut delay_ms = BACKOFF_INITIAL_MS;
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            self.delete_all_sales().await?;
            let round = if count == 0 {
                Ok(Vec::new())
            } else {
                self.create_sales(count).await
            };

            match round {
                Ok(ids) if ids.len() == count => {
                    let held = self.list_sales().await?.len();
                    if held == count {
                        info!(count, attempt, "Sales fixture ready");
                        return Ok(ids);
                    }
                    last_reason = format!("target holds {} sales, expected {}", held, count);
                }
                Ok(ids) => last_reason = format!("created {} of {} sales", ids.len(), count),
                Err(e) => last_reason = e.to_string(),
            }

            if attempt < attempts {
                warn!(attempt, reason = %last_reason, "Sales fixture incomplete, retrying");
                let jitter = rand::random::<u64>() % 20;
                sleep(Duration::from_millis(delay_ms + jitter)).await;
                delay_ms *= 2;
            }
        }

        Err(SetupError::FixtureExhausted {
            fixture: format!("{} sales", count),
            attempts,
            reason: last_reason,
        })
    }

    /// Delete every sale the target lists. Returns how many were deleted.
    pub async fn delete_all_sales(&mut self) -> SetupResult<usize> {
        let sales = self.list_sales().await?;
        let mut deleted = 0;
        for sale in &sales {
            let Some(id) = sale.get("id").and_then(ResourceId::from_value) else {
                continue;
            };
            let result = self.client.delete(&format!("/sales/{}", id)).await;
            if result.is_success() {
                self.resources.forget_sale(&id);
                deleted += 1;
            } else {
                warn!(sale = %id, status = result.status, "Failed to delete sale");
            }
        }

        if !sales.is_empty() {
            info!(deleted, listed = sales.len(), "Cleared existing sales");
        }
        Ok(deleted)
    }

    /// Every sale the target lists, from the page endpoint or the plain list
    async fn list_sales(&self) -> SetupResult<Vec<Value>> {
        let listed = self
            .client
            .get_page("/sales/page", &Pagination::page(0, 1000))
            .await;
        let listed = if listed.is_success() {
            listed
        } else {
            debug!(status = listed.status, "Sales page unavailable, using plain list");
            self.client.get("/sales").await
        };
        if !listed.is_success() {
            return Err(precondition("list sales", &listed));
        }
        Ok(listed.list().map(|l| l.into_items()).unwrap_or_default())
    }

    async fn create_sales(&mut self, count: usize) -> SetupResult<Vec<ResourceId>> {
        let plants = list_plants(&self.client).await?;
        let mut plant = plants[0].clone();
        let mut ids = Vec::with_capacity(count);

        for n in 1..=count {
            if plant_quantity(&plant).unwrap_or(0) <= 0 {
                let restocked = set_stock(&self.client, &plant, BATCH_RESTOCK_QUANTITY).await;
                if !restocked.is_success() {
                    warn!(status = restocked.status, "Could not restock plant for sales fixture");
                    break;
                }
                plant = restocked.data;
            }

            let plant_id = required_id(&plant, "plant")?;
            let result = self
                .client
                .post(&format!("/sales/plant/{}?quantity=1", plant_id), &json!({}))
                .await;
            if !result.is_success() {
                warn!(n, count, status = result.status, "Failed to create sale");
                continue;
            }
            if let Some(id) = result.resource_id() {
                self.resources.track_sale(id.clone());
                ids.push(id);
            }
            match result.field("plant") {
                Some(updated) if updated.is_object() => plant = updated.clone(),
                _ => decrement_quantity(&mut plant),
            }
        }
        Ok(ids)
    }

    async fn admin_client(&self) -> SetupResult<ApiClient> {
        if self.client.role() == Role::Admin {
            return Ok(self.client.clone());
        }
        let mut admin = self.client.anonymous();
        admin
            .authenticate(&self.config.admin.username, &self.config.admin.password)
            .await?;
        Ok(admin)
    }
}

async fn list_plants(client: &ApiClient) -> SetupResult<Vec<Value>> {
    let result = client.get("/plants").await;
    if !result.is_success() {
        return Err(precondition("list plants", &result));
    }
    let plants = result.list().map(|l| l.into_items()).unwrap_or_default();
    if plants.is_empty() {
        return Err(SetupError::Precondition(
            "No plants available in system".to_string(),
        ));
    }
    Ok(plants)
}

/// PUT a plant back with a new stock level, keeping its other fields
async fn set_stock(client: &ApiClient, plant: &Value, quantity: i64) -> HttpResult {
    let Some(id) = plant.get("id").and_then(ResourceId::from_value) else {
        return HttpResult::new(
            400,
            json!({"message": "plant has no id"}),
            Default::default(),
        );
    };
    let body = json!({
        "name": plant.get("name").cloned().unwrap_or(Value::Null),
        "price": plant.get("price").cloned().unwrap_or(Value::Null),
        "quantity": quantity,
        "categoryId": category_id(plant),
    });
    client.put(&format!("/plants/{}", id), &body).await
}

pub fn plant_quantity(plant: &Value) -> Option<i64> {
    plant.get("quantity").and_then(Value::as_i64)
}

/// `category.id` when the plant embeds its category, else `categoryId`
pub fn category_id(plant: &Value) -> Value {
    plant
        .get("category")
        .and_then(|c| c.get("id"))
        .or_else(|| plant.get("categoryId"))
        .cloned()
        .unwrap_or(Value::Null)
}

fn decrement_quantity(plant: &mut Value) {
    if let Some(quantity) = plant_quantity(plant) {
        plant["quantity"] = json!(quantity - 1);
    }
}

fn required_id(value: &Value, what: &str) -> SetupResult<ResourceId> {
    value
        .get("id")
        .and_then(ResourceId::from_value)
        .ok_or_else(|| SetupError::Precondition(format!("{} response has no id: {}", what, value)))
}

fn precondition(action: &str, result: &HttpResult) -> SetupError {
    SetupError::Precondition(format!(
        "Failed to {}: {} - {}",
        action, result.status, result.data
    ))
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
