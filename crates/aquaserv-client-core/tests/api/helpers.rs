use aquaserv_client_core::{ApiRequest, Client, ClientError};
use serde::Deserialize;

pub use aquaserv_test_helper::{
    no_cb, record_events, spawn_app, TestApp, TestUser, PERMISSION_CUSTOMERS_READ,
    PERMISSION_USERS_MANAGE,
};

pub const PATH_CUSTOMERS: &str = "/customers";

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: u32,
    pub name: String,
}

pub async fn get_customers(client: &Client) -> Result<Vec<Customer>, ClientError> {
    client.send_json(ApiRequest::get(PATH_CUSTOMERS)).await
}

pub fn bearer(token: &str) -> Option<String> {
    Some(format!("Bearer {token}"))
}
