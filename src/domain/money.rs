use {
    super::error::PaymentError,
    rust_decimal::{Decimal, RoundingStrategy},
    rust_decimal_macros::dec,
    serde::{Deserialize, Serialize},
    std::{fmt, str::FromStr},
};

/// Largest gap between requested and gateway-confirmed totals that we
/// attribute to gateway-side rounding.
pub const ROUNDING_TOLERANCE: Decimal = dec!(0.01);

/// Strictly positive BRL amount held at centavo precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        let value = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if value <= Decimal::ZERO {
            return Err(PaymentError::Validation(format!(
                "amount must be positive, got: {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Accepts a JSON number or a numeric string, the two shapes checkout
    /// forms actually send.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PaymentError> {
        Self::new(decimal_from_json(value)?)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Whether `confirmed` differs from this amount by more than rounding.
    pub fn deviates_from(&self, confirmed: Decimal) -> bool {
        (self.0 - confirmed).abs() > ROUNDING_TOLERANCE
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

pub fn decimal_from_json(value: &serde_json::Value) -> Result<Decimal, PaymentError> {
    let parsed = match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string())),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()),
        other => {
            return Err(PaymentError::Validation(format!(
                "expected a number, got: {other}"
            )));
        }
    };
    parsed.map_err(|e| PaymentError::Validation(format!("not a number: {value} ({e})")))
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn deserializing_applies_the_same_rules() {
        let rounded: Amount = serde_json::from_value(json!("10.005")).unwrap();
        assert_eq!(rounded.value(), dec!(10.01));
        assert!(serde_json::from_value::<Amount>(json!("-1.00")).is_err());
        assert!(serde_json::from_value::<Amount>(json!("0.004")).is_err());
    }

    #[test]
    fn rounds_to_centavos() {
        assert_eq!(Amount::new(dec!(10.005)).unwrap().value(), dec!(10.01));
        assert_eq!(Amount::new(dec!(10)).unwrap().to_string(), "10.00");
    }

    #[test]
    fn rejects_zero_and_negative() {
        assert!(Amount::new(Decimal::ZERO).is_err());
        assert!(Amount::new(dec!(-1)).is_err());
        assert!(Amount::new(dec!(0.001)).is_err());
    }

    #[test]
    fn coerces_json_numbers_and_strings() {
        assert_eq!(Amount::from_json(&json!(10.5)).unwrap().value(), dec!(10.50));
        assert_eq!(Amount::from_json(&json!(" 7.25 ")).unwrap().value(), dec!(7.25));
        assert!(Amount::from_json(&json!("abc")).is_err());
        assert!(Amount::from_json(&json!(null)).is_err());
    }

    #[test]
    fn tolerance_covers_one_centavo() {
        let amount = Amount::new(dec!(10.00)).unwrap();
        assert!(!amount.deviates_from(dec!(10.01)));
        assert!(amount.deviates_from(dec!(10.02)));
    }
}
