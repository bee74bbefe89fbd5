use crate::utils::error::{Result, TariffError};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_positive_amount(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(TariffError::invalid_input(
            field_name,
            value,
            "Amount must be a finite number",
        ));
    }
    if value <= 0.0 {
        return Err(TariffError::invalid_input(
            field_name,
            value,
            "Amount must be greater than zero",
        ));
    }
    Ok(())
}

pub fn validate_non_negative_amount(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(TariffError::invalid_input(
            field_name,
            value,
            "Amount must be a finite number",
        ));
    }
    if value < 0.0 {
        return Err(TariffError::invalid_input(
            field_name,
            value,
            "Amount cannot be negative",
        ));
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(TariffError::invalid_input(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TariffError::invalid_input(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    validate_non_empty_string(field_name, path)?;

    if path.contains('\0') {
        return Err(TariffError::invalid_input(
            field_name,
            path,
            "Path contains null bytes",
        ));
    }

    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(TariffError::invalid_input(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// ISO 3166-1 alpha-2，例如 "CN"
pub fn validate_country_code(field_name: &str, value: &str) -> Result<()> {
    validate_alpha_code(field_name, value, 2, "ISO 3166-1 alpha-2 country code")
}

/// ISO 4217 alpha-3，例如 "USD"
pub fn validate_currency_code(field_name: &str, value: &str) -> Result<()> {
    validate_alpha_code(field_name, value, 3, "ISO 4217 currency code")
}

fn validate_alpha_code(field_name: &str, value: &str, len: usize, what: &str) -> Result<()> {
    if value.len() != len || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(TariffError::invalid_input(
            field_name,
            value,
            format!("Expected a {}-letter {}", len, what),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive_amount() {
        assert!(validate_positive_amount("product_value", 0.01).is_ok());
        assert!(validate_positive_amount("product_value", 0.0).is_err());
        assert!(validate_positive_amount("product_value", -5.0).is_err());
        assert!(validate_positive_amount("product_value", f64::NAN).is_err());
        assert!(validate_positive_amount("product_value", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_non_negative_amount() {
        assert!(validate_non_negative_amount("freight_cost", 0.0).is_ok());
        assert!(validate_non_negative_amount("freight_cost", 12.5).is_ok());
        assert!(validate_non_negative_amount("freight_cost", -0.01).is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("quantity", 1, 1).is_ok());
        assert!(validate_positive_number("quantity", 0, 1).is_err());
    }

    #[test]
    fn test_validate_codes() {
        assert!(validate_country_code("country_code", "CN").is_ok());
        assert!(validate_country_code("country_code", "CHN").is_err());
        assert!(validate_country_code("country_code", "C1").is_err());
        assert!(validate_currency_code("currency", "USD").is_ok());
        assert!(validate_currency_code("currency", "US").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("sourcing.concurrency", 4, 1, 64).is_ok());
        assert!(validate_range("sourcing.concurrency", 0, 1, 64).is_err());
    }
}
