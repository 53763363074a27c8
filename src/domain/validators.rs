//! Brazilian tax-id and contact field checks.
//!
//! Every function here is total: malformed input yields `false` / an
//! invalid [`DocumentCheck`], never a panic.

use super::transaction::DocumentType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentCheck {
    pub valid: bool,
    /// Inferred from the digit count; `None` when it is neither 11 nor 14.
    pub document_type: Option<DocumentType>,
}

pub fn digits_only(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Classify a CPF/CNPJ by length, then verify its check digits.
pub fn validate_document(document: &str) -> DocumentCheck {
    let digits = digits_only(document);
    match digits.len() {
        11 => DocumentCheck {
            valid: cpf_digits_valid(&digits),
            document_type: Some(DocumentType::Cpf),
        },
        14 => DocumentCheck {
            valid: cnpj_digits_valid(&digits),
            document_type: Some(DocumentType::Cnpj),
        },
        _ => DocumentCheck {
            valid: false,
            document_type: None,
        },
    }
}

pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits = digits_only(cpf);
    digits.len() == 11 && cpf_digits_valid(&digits)
}

pub fn is_valid_cnpj(cnpj: &str) -> bool {
    let digits = digits_only(cnpj);
    digits.len() == 14 && cnpj_digits_valid(&digits)
}

/// `local@domain.tld`, no whitespace anywhere.
pub fn is_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Brazilian local number with area code: 10 digits (landline) or 11 (mobile).
pub fn is_phone(phone: &str) -> bool {
    matches!(digits_only(phone).len(), 10 | 11)
}

pub fn format_cpf(cpf: &str) -> String {
    let d = digits_only(cpf);
    if d.len() != 11 {
        return cpf.to_string();
    }
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
}

pub fn format_cnpj(cnpj: &str) -> String {
    let d = digits_only(cnpj);
    if d.len() != 14 {
        return cnpj.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &d[0..2],
        &d[2..5],
        &d[5..8],
        &d[8..12],
        &d[12..14]
    )
}

pub fn format_phone(phone: &str) -> String {
    let d = digits_only(phone);
    match d.len() {
        10 => format!("({}) {}-{}", &d[0..2], &d[2..6], &d[6..10]),
        11 => format!("({}) {}-{}", &d[0..2], &d[2..7], &d[7..11]),
        _ => phone.to_string(),
    }
}

fn to_digits(digits: &str) -> Vec<u32> {
    digits.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(d: &[u32]) -> bool {
    d.windows(2).all(|w| w[0] == w[1])
}

fn cpf_check_digit(d: &[u32]) -> u32 {
    // Weights run from len+1 down to 2.
    let top = d.len() as u32 + 1;
    let sum: u32 = d.iter().enumerate().map(|(i, v)| v * (top - i as u32)).sum();
    match (sum * 10) % 11 {
        10 | 11 => 0,
        r => r,
    }
}

fn cpf_digits_valid(digits: &str) -> bool {
    let d = to_digits(digits);
    if d.len() != 11 || all_same(&d) {
        return false;
    }
    cpf_check_digit(&d[..9]) == d[9] && cpf_check_digit(&d[..10]) == d[10]
}

fn cnpj_check_digit(d: &[u32]) -> u32 {
    let sum: u32 = d
        .iter()
        .rev()
        .zip([2u32, 3, 4, 5, 6, 7, 8, 9].iter().cycle())
        .map(|(v, w)| v * w)
        .sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

fn cnpj_digits_valid(digits: &str) -> bool {
    let d = to_digits(digits);
    if d.len() != 14 || all_same(&d) {
        return false;
    }
    cnpj_check_digit(&d[..12]) == d[12] && cnpj_check_digit(&d[..13]) == d[13]
}
