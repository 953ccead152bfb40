pub mod auth_steps;
pub mod fixture_steps;
pub mod world;
