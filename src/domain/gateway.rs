use {
    super::error::PaymentError,
    super::id::GatewayId,
    super::transaction::{Customer, Item, PaymentMethod},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::{future::Future, pin::Pin},
};

pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PaymentError>> + Send + 'a>>;

/// Body of `POST /v1/transactions`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateTransactionRequest {
    pub external_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub webhook_url: String,
    pub items: Vec<Item>,
    pub ip: String,
    pub customer: Customer,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayAddress {
    #[serde(default)]
    pub cep: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[serde(default)]
    pub neighborhood: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayCustomer {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<GatewayAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PixInfo {
    pub payload: String,
}

/// Transaction as the gateway reports it on create and read.
///
/// `status` stays a raw string: an unfamiliar value from the gateway must not
/// turn an already-created transaction into a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayTransaction {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub total_value: Option<Decimal>,
    #[serde(default)]
    pub customer: Option<GatewayCustomer>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub pix: Option<PixInfo>,
    #[serde(rename = "hasError", default)]
    pub has_error: bool,
}

impl GatewayTransaction {
    pub fn pix_payload(&self) -> Option<&str> {
        self.pix.as_ref().map(|p| p.payload.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    pub email: String,
    pub name: String,
    pub document: String,
}

/// Wire access to the PIX gateway.
pub trait PaymentGateway: Send + Sync {
    /// Not retried: the gateway may have partially processed a failed call.
    fn create_transaction<'a>(
        &'a self,
        request: &'a CreateTransactionRequest,
    ) -> GatewayFuture<'a, GatewayTransaction>;

    /// Read-only; callers may retry at their discretion.
    fn get_transaction<'a>(&'a self, id: &'a GatewayId) -> GatewayFuture<'a, GatewayTransaction>;

    fn get_account_info(&self) -> GatewayFuture<'_, AccountInfo>;
}
