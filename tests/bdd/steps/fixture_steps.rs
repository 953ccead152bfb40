use cucumber::given;
use plantshop_test_utils::fixtures::plant_quantity;
use plantshop_test_utils::{ResourceId, SetupResult};
use serde_json::Value;
use tracing::info;

use crate::steps::world::{PlantShopWorld, INITIAL_STOCK};

/// Fixture failures abort the scenario with the setup error
fn established<T>(what: &str, result: SetupResult<T>) -> T {
    result.unwrap_or_else(|e| panic!("Could not establish {what}: {e}"))
}

fn remember_plant(world: &mut PlantShopWorld, plant: &Value) {
    world.plant_id = plant.get("id").and_then(ResourceId::from_value);
    let stock = plant_quantity(plant);
    world.session_mut().remember(INITIAL_STOCK, stock);
    if let Some(id) = &world.plant_id {
        info!(plant = %id, stock = ?stock, "Using plant");
    }
}

#[given(expr = "a plant exists with quantity {int}")]
async fn plant_with_quantity(world: &mut PlantShopWorld, quantity: i64) {
    let result = world
        .session_mut()
        .fixtures()
        .expect("session is running")
        .ensure_plant_with_quantity(quantity)
        .await;
    let plant = established("plant with quantity", result);
    remember_plant(world, &plant);
}

#[given(expr = "a plant exists in stock")]
async fn plant_in_stock(world: &mut PlantShopWorld) {
    let result = world
        .session_mut()
        .fixtures()
        .expect("session is running")
        .ensure_plant_in_stock()
        .await;
    let plant = established("plant in stock", result);
    remember_plant(world, &plant);
}

#[given(expr = "a plant exists in system")]
async fn plant_in_system(world: &mut PlantShopWorld) {
    let result = world.client().get("/plants").await;
    let first = result.list().and_then(|list| list.items().first().cloned());
    if let Some(plant) = first {
        remember_plant(world, &plant);
    }
}

#[given(expr = "a sale exists with known ID")]
async fn sale_with_known_id(world: &mut PlantShopWorld) {
    let result = world
        .session_mut()
        .fixtures()
        .expect("session is running")
        .ensure_sale_exists()
        .await;
    let sale = established("sale", result);
    world.sale_id = sale.get("id").and_then(ResourceId::from_value);
    if let Some(plant) = sale.get("plant") {
        world.plant_id = plant.get("id").and_then(ResourceId::from_value);
    }
    info!(sale = ?world.sale_id, "Using sale");
}

#[given(expr = "{int} sales records exist in system via API")]
async fn exact_sales_count(world: &mut PlantShopWorld, count: usize) {
    let result = world
        .session_mut()
        .fixtures()
        .expect("session is running")
        .ensure_sales_count(count)
        .await;
    let ids = established("sales count", result);
    world.sale_id = ids.first().cloned();
    world.expected_sales = Some(count);
}

#[given(expr = "no sales records exist in system via API")]
async fn no_sales(world: &mut PlantShopWorld) {
    let result = world
        .session_mut()
        .fixtures()
        .expect("session is running")
        .delete_all_sales()
        .await;
    let deleted = established("empty sales table", result);
    info!(deleted, "Cleared sales");
    world.expected_sales = Some(0);
}

#[given(expr = "I note the plant's current quantity")]
async fn note_quantity(world: &mut PlantShopWorld) {
    let Some(id) = world.plant_id.clone() else {
        return;
    };
    let result = world.client().get(&format!("/plants/{}", id)).await;
    if result.is_success() {
        let stock = plant_quantity(&result.data);
        world.session_mut().remember(INITIAL_STOCK, stock);
    }
}
