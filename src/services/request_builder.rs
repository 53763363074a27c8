use {
    crate::{
        config::{Environment, is_loopback_url},
        domain::{
            error::PaymentError,
            gateway::CreateTransactionRequest,
            id::ExternalId,
            money::{Amount, decimal_from_json},
            transaction::{Customer, Item, NewTransaction, PaymentMethod},
            validators::{digits_only, is_email, is_phone, validate_document},
        },
    },
    rust_decimal::{Decimal, prelude::ToPrimitive},
    serde::Deserialize,
    url::Url,
    uuid::Uuid,
};

const LOOPBACK_IP: &str = "127.0.0.1";
const DEFAULT_ITEM_TITLE: &str = "PIX payment";

/// Customer block of the checkout form, as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// The checkout form calls it `cpf` even when a CNPJ is entered.
    #[serde(alias = "document")]
    pub cpf: Option<String>,
}

/// Item as submitted; every field may be missing or stringly typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawItem {
    pub id: Option<serde_json::Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<serde_json::Value>,
    pub quantity: Option<serde_json::Value>,
    pub is_physical: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrder {
    #[serde(rename = "customerData", alias = "customer")]
    pub customer_data: Option<RawCustomer>,
    pub amount: Option<serde_json::Value>,
    pub items: Option<Vec<RawItem>>,
}

/// Forwarding headers of the inbound request. Only used to derive the
/// callback URL and client IP, never for authorization.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub host: Option<String>,
    pub forwarded_host: Option<String>,
    pub forwarded_proto: Option<String>,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
}

impl RequestContext {
    /// First hop of `X-Forwarded-For`, then `X-Real-IP`, then loopback.
    pub fn client_ip(&self) -> String {
        first_entry(self.forwarded_for.as_deref())
            .or_else(|| first_entry(self.real_ip.as_deref()))
            .unwrap_or_else(|| LOOPBACK_IP.to_string())
    }
}

fn first_entry(header: Option<&str>) -> Option<String> {
    header
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A validated order, ready to persist and send.
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub record: NewTransaction,
    pub request: CreateTransactionRequest,
}

#[derive(Debug, Clone)]
pub struct TransactionRequestBuilder {
    external_id_prefix: String,
    public_webhook_url: Option<String>,
    callback_path: String,
    environment: Environment,
}

impl TransactionRequestBuilder {
    pub fn new(
        external_id_prefix: impl Into<String>,
        public_webhook_url: Option<String>,
        callback_path: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            external_id_prefix: external_id_prefix.into(),
            public_webhook_url,
            callback_path: callback_path.into(),
            environment,
        }
    }

    pub fn build(
        &self,
        order: &RawOrder,
        ctx: &RequestContext,
    ) -> Result<BuiltTransaction, PaymentError> {
        let customer = normalize_customer(order.customer_data.as_ref())?;

        let amount = order
            .amount
            .as_ref()
            .ok_or_else(|| PaymentError::Validation("amount is required".into()))
            .and_then(Amount::from_json)?;

        let raw_items = order
            .items
            .as_deref()
            .filter(|items| !items.is_empty())
            .ok_or_else(|| PaymentError::Validation("at least one item is required".into()))?;
        let items = raw_items
            .iter()
            .enumerate()
            .map(|(i, item)| normalize_item(i, item))
            .collect::<Result<Vec<_>, _>>()?;

        let items_total: Decimal = items.iter().map(Item::subtotal).sum();
        if items_total != amount.value() {
            tracing::warn!(
                amount = %amount,
                items_total = %items_total,
                "item total does not match order amount"
            );
        }

        let webhook_url = self.resolve_webhook_url(ctx)?;
        let ip = ctx.client_ip();
        let external_id = ExternalId::generate(&self.external_id_prefix);

        let request = CreateTransactionRequest {
            external_id: external_id.as_str().to_string(),
            total_amount: amount.value(),
            payment_method: PaymentMethod::Pix,
            webhook_url: webhook_url.clone(),
            items: items.clone(),
            ip: ip.clone(),
            customer: customer.clone(),
        };

        Ok(BuiltTransaction {
            record: NewTransaction {
                id: Uuid::now_v7(),
                external_id,
                total_amount: amount,
                customer,
                items,
                webhook_url,
                ip_address: ip,
            },
            request,
        })
    }

    /// Configured HTTPS URL verbatim, else derived from forwarding headers.
    pub fn resolve_webhook_url(&self, ctx: &RequestContext) -> Result<String, PaymentError> {
        if let Some(url) = &self.public_webhook_url {
            return Ok(url.clone());
        }

        let host = first_entry(ctx.forwarded_host.as_deref())
            .or_else(|| first_entry(ctx.host.as_deref()))
            .ok_or_else(|| {
                PaymentError::Configuration(
                    "cannot derive webhook URL: no host header and no VIPERPAY_WEBHOOK_URL".into(),
                )
            })?;

        let candidate = format!("https://{host}{}", self.callback_path);
        let mut url = Url::parse(&candidate).map_err(|e| {
            PaymentError::Configuration(format!("invalid webhook URL {candidate}: {e}"))
        })?;
        if !url.username().is_empty() || url.password().is_some() {
            return Err(PaymentError::Configuration(format!(
                "webhook host must not carry credentials: {host}"
            )));
        }

        let loopback = is_loopback_url(&url);
        if loopback && self.environment != Environment::Development {
            return Err(PaymentError::Configuration(format!(
                "webhook URL would resolve to loopback host {}; set VIPERPAY_WEBHOOK_URL",
                url.host_str().unwrap_or_default()
            )));
        }

        let forwarded_proto = first_entry(ctx.forwarded_proto.as_deref());
        if loopback && matches!(forwarded_proto.as_deref(), None | Some("http")) {
            url.set_scheme("http").map_err(|()| {
                PaymentError::Configuration(format!("cannot downgrade webhook URL for {host}"))
            })?;
        }

        Ok(url.to_string())
    }
}

fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str, PaymentError> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PaymentError::Validation(format!("customer {field} is required")))
}

fn normalize_customer(raw: Option<&RawCustomer>) -> Result<Customer, PaymentError> {
    let raw = raw.ok_or_else(|| PaymentError::Validation("customerData is required".into()))?;

    let name = required(raw.name.as_ref(), "name")?;
    let email = required(raw.email.as_ref(), "email")?.to_lowercase();
    let phone = required(raw.phone.as_ref(), "phone")?;
    let document = required(raw.cpf.as_ref(), "document")?;

    if !is_email(&email) {
        return Err(PaymentError::Validation("invalid email format".into()));
    }
    if !is_phone(phone) {
        return Err(PaymentError::Validation("invalid phone format".into()));
    }
    let check = validate_document(document);
    let document_type = match (check.valid, check.document_type) {
        (true, Some(t)) => t,
        _ => return Err(PaymentError::Validation("invalid CPF/CNPJ".into())),
    };

    Ok(Customer {
        name: name.to_string(),
        email,
        phone: digits_only(phone),
        document_type,
        document: digits_only(document),
    })
}

fn normalize_item(index: usize, raw: &RawItem) -> Result<Item, PaymentError> {
    let position = index + 1;

    let price = raw
        .price
        .as_ref()
        .ok_or_else(|| PaymentError::Validation(format!("item {position}: price is required")))
        .and_then(decimal_from_json)?;
    if price < Decimal::ZERO {
        return Err(PaymentError::Validation(format!(
            "item {position}: price cannot be negative"
        )));
    }

    let quantity = match &raw.quantity {
        None => 1,
        Some(q) => {
            let q = decimal_from_json(q)?;
            if q.fract() != Decimal::ZERO || q < Decimal::ONE {
                return Err(PaymentError::Validation(format!(
                    "item {position}: quantity must be a positive integer, got {q}"
                )));
            }
            q.to_u32().ok_or_else(|| {
                PaymentError::Validation(format!("item {position}: quantity too large"))
            })?
        }
    };

    let is_physical = match &raw.is_physical {
        None => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(_) => false,
    };

    let id = match &raw.id {
        None | Some(serde_json::Value::Null) => format!("item-{position}"),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    Ok(Item {
        id,
        title: raw
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_ITEM_TITLE.to_string()),
        description: raw.description.clone().unwrap_or_default(),
        price,
        quantity,
        is_physical,
    })
}
