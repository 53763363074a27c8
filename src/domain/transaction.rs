use {
    super::error::PaymentError,
    super::id::{ExternalId, GatewayId},
    super::money::Amount,
    super::validators::{format_cnpj, format_cpf, format_phone},
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Authorized,
    Failed,
    Chargeback,
    InDispute,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 5] = [
        Self::Pending,
        Self::Authorized,
        Self::Failed,
        Self::Chargeback,
        Self::InDispute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Authorized => "AUTHORIZED",
            Self::Failed => "FAILED",
            Self::Chargeback => "CHARGEBACK",
            Self::InDispute => "IN_DISPUTE",
        }
    }

    /// Anything except re-entering PENDING is allowed: the gateway is the
    /// status authority and does not order its callbacks.
    pub fn can_transition_to(&self, next: &TransactionStatus) -> bool {
        *next != Self::Pending || *self == Self::Pending
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "AUTHORIZED" => Ok(Self::Authorized),
            "FAILED" => Ok(Self::Failed),
            "CHARGEBACK" => Ok(Self::Chargeback),
            "IN_DISPUTE" => Ok(Self::InDispute),
            other => Err(PaymentError::Validation(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    Cpf,
    Cnpj,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpf => "CPF",
            Self::Cnpj => "CNPJ",
        }
    }
}

impl TryFrom<&str> for DocumentType {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "CPF" => Ok(Self::Cpf),
            "CNPJ" => Ok(Self::Cnpj),
            other => Err(PaymentError::Validation(format!(
                "unknown document type: {other}"
            ))),
        }
    }
}

/// The only instrument this service settles.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    #[default]
    Pix,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        "PIX"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub document_type: DocumentType,
    pub document: String,
}

impl Customer {
    /// Document in its usual punctuated form, for logs and receipts.
    pub fn formatted_document(&self) -> String {
        match self.document_type {
            DocumentType::Cpf => format_cpf(&self.document),
            DocumentType::Cnpj => format_cnpj(&self.document),
        }
    }

    pub fn formatted_phone(&self) -> String {
        format_phone(&self.phone)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    pub is_physical: bool,
}

impl Item {
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Full transaction record as held by the store.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub external_id: ExternalId,
    pub gateway_id: Option<GatewayId>,
    pub status: TransactionStatus,
    pub total_amount: Amount,
    pub total_value: Option<Decimal>,
    pub payment_method: PaymentMethod,
    pub customer: Customer,
    pub items: Vec<Item>,
    pub webhook_url: String,
    pub ip_address: String,
    pub pix_payload: Option<String>,
    pub has_error: bool,
    pub gateway_customer: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Apply a partial update, enforcing the write-once and no-PENDING-re-entry
    /// rules. Returns the status change it produced.
    pub fn apply(&mut self, update: &TransactionUpdate) -> Result<StatusChange, PaymentError> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(&next) {
                return Err(PaymentError::InvalidTransition {
                    from: self.status,
                    to: next,
                });
            }
        }
        if let (Some(current), Some(incoming)) = (&self.gateway_id, &update.gateway_id) {
            if current != incoming {
                return Err(PaymentError::GatewayIdConflict {
                    external_id: self.external_id.to_string(),
                });
            }
        }

        let previous = self.status;
        if let Some(next) = update.status {
            self.status = next;
        }
        if self.gateway_id.is_none() {
            self.gateway_id = update.gateway_id.clone();
        }
        if let Some(v) = update.total_value {
            self.total_value = Some(v);
        }
        if let Some(p) = &update.pix_payload {
            self.pix_payload = Some(p.clone());
        }
        if let Some(e) = update.has_error {
            self.has_error = e;
        }
        if let Some(c) = &update.gateway_customer {
            self.gateway_customer = Some(c.clone());
        }
        self.updated_at = Utc::now();

        Ok(StatusChange {
            transaction_id: self.id,
            external_id: self.external_id.clone(),
            previous,
            current: self.status,
        })
    }
}

/// For INSERT. Always starts PENDING without a gateway id.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: Uuid,
    pub external_id: ExternalId,
    pub total_amount: Amount,
    pub customer: Customer,
    pub items: Vec<Item>,
    pub webhook_url: String,
    pub ip_address: String,
}

impl NewTransaction {
    pub fn into_record(self) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: self.id,
            external_id: self.external_id,
            gateway_id: None,
            status: TransactionStatus::Pending,
            total_amount: self.total_amount,
            total_value: None,
            payment_method: PaymentMethod::Pix,
            customer: self.customer,
            items: self.items,
            webhook_url: self.webhook_url,
            ip_address: self.ip_address,
            pix_payload: None,
            has_error: false,
            gateway_customer: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub gateway_id: Option<GatewayId>,
    pub status: Option<TransactionStatus>,
    pub total_value: Option<Decimal>,
    pub pix_payload: Option<String>,
    pub has_error: Option<bool>,
    pub gateway_customer: Option<serde_json::Value>,
}

impl TransactionUpdate {
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub transaction_id: Uuid,
    pub external_id: ExternalId,
    pub previous: TransactionStatus,
    pub current: TransactionStatus,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rust_decimal_macros::dec};

    fn record() -> Transaction {
        NewTransaction {
            id: Uuid::now_v7(),
            external_id: ExternalId::new("pix-1-abc").unwrap(),
            total_amount: Amount::new(dec!(10)).unwrap(),
            customer: Customer {
                name: "Maria".into(),
                email: "maria@x.com".into(),
                phone: "11988887777".into(),
                document_type: DocumentType::Cpf,
                document: "11144477735".into(),
            },
            items: vec![],
            webhook_url: "https://shop.example/api/webhooks/pix".into(),
            ip_address: "127.0.0.1".into(),
        }
        .into_record()
    }

    #[test]
    fn pending_is_never_reentered() {
        let mut tx = record();
        tx.apply(&TransactionUpdate::status(TransactionStatus::Authorized))
            .unwrap();
        let err = tx
            .apply(&TransactionUpdate::status(TransactionStatus::Pending))
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidTransition { .. }));
        assert_eq!(tx.status, TransactionStatus::Authorized);
    }

    #[test]
    fn gateway_id_is_write_once() {
        let mut tx = record();
        let set = TransactionUpdate {
            gateway_id: Some(GatewayId::new("gw_1").unwrap()),
            ..Default::default()
        };
        tx.apply(&set).unwrap();
        // same value is a no-op, not a conflict
        tx.apply(&set).unwrap();

        let other = TransactionUpdate {
            gateway_id: Some(GatewayId::new("gw_2").unwrap()),
            ..Default::default()
        };
        assert!(matches!(
            tx.apply(&other),
            Err(PaymentError::GatewayIdConflict { .. })
        ));
        assert_eq!(tx.gateway_id.unwrap().as_str(), "gw_1");
    }

    #[test]
    fn replay_reports_no_change() {
        let mut tx = record();
        let first = tx
            .apply(&TransactionUpdate::status(TransactionStatus::Failed))
            .unwrap();
        assert!(first.changed());
        let second = tx
            .apply(&TransactionUpdate::status(TransactionStatus::Failed))
            .unwrap();
        assert!(!second.changed());
    }

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(
            TransactionStatus::try_from("in_dispute").unwrap(),
            TransactionStatus::InDispute
        );
        assert!(TransactionStatus::try_from("REFUNDED").is_err());
    }

    #[test]
    fn customer_formats_by_document_type() {
        let tx = record();
        assert_eq!(tx.customer.formatted_phone(), "(11) 98888-7777");
        assert_eq!(tx.customer.formatted_document(), "111.444.777-35");
        let mut cnpj = tx.customer.clone();
        cnpj.document_type = DocumentType::Cnpj;
        cnpj.document = "11222333000181".into();
        assert_eq!(cnpj.formatted_document(), "11.222.333/0001-81");
    }
}
