use cucumber::{given, then, when};
use plantshop_test_utils::client::extract_token;
use plantshop_test_utils::Role;
use tracing::info;

use crate::steps::world::PlantShopWorld;

async fn authenticate(world: &mut PlantShopWorld, role: Role) {
    let outcome = world
        .session_mut()
        .authenticate_as(role)
        .await
        .unwrap_or_else(|e| panic!("Authentication as {role} failed: {e}"));
    info!(role = %outcome.role, "Authenticated");
}

#[given(expr = "I am authenticated as Admin")]
async fn authenticated_as_admin(world: &mut PlantShopWorld) {
    authenticate(world, Role::Admin).await;
}

#[given(expr = "I am authenticated as User")]
async fn authenticated_as_user(world: &mut PlantShopWorld) {
    authenticate(world, Role::User).await;
}

#[given(expr = "I am not authenticated")]
async fn not_authenticated(world: &mut PlantShopWorld) {
    world.session_mut().logout();
}

#[when(expr = "I log out")]
async fn log_out(world: &mut PlantShopWorld) {
    world.session_mut().logout();
}

#[when(expr = "I log in as {string} with password {string}")]
async fn log_in_with(world: &mut PlantShopWorld, username: String, password: String) {
    let result = world.client().try_login(&username, &password).await;
    world.record_response("/api/auth/login".to_string(), result);
}

#[then(expr = "the response should contain a token")]
async fn response_has_token(world: &mut PlantShopWorld) {
    let token = extract_token(&world.response().data);
    assert!(
        token.is_some(),
        "Login response carried no token.\n{}",
        world.describe_response()
    );
}

#[then(expr = "the session should be authenticated as {word}")]
async fn session_role(world: &mut PlantShopWorld, role: String) {
    let expected = Role::parse(&role).unwrap_or_else(|| panic!("Unknown role: {role}"));
    assert_eq!(world.session().role(), expected);
}
