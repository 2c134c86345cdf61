use std::{collections::HashMap, str::FromStr};

use rust_decimal::Decimal;
use serde_json::Value;

use super::{
    error::{Error, FieldErrors},
    schema::Id,
};
use crate::{PRICE_DECIMAL_PLACES, PRICE_MAX_DIGITS};

pub type FormData = HashMap<String, Value>;

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";

/// Length limits for a string field, counted in characters
#[derive(Debug, Clone, Copy)]
pub struct StrField {
    pub min_length: usize,
    pub max_length: usize,
    pub trim: bool,
}

impl StrField {
    pub fn text(max_length: usize) -> Self {
        Self {
            min_length: 0,
            max_length,
            trim: true,
        }
    }

    pub fn secret(min_length: usize) -> Self {
        Self {
            min_length,
            max_length: 128,
            trim: false,
        }
    }
}

/// A JSON object payload that collects per-field errors while it is read.
///
/// Getters return `None` both for absent optional keys and for invalid
/// values; the distinction surfaces in [`Form::finish`].
pub struct Form {
    inner: FormData,
    errors: FieldErrors,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self {
            inner: data,
            errors: FieldErrors::new(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn reject(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_default()
            .push(message.to_string());
    }

    fn present(&mut self, key: &str, required: bool) -> Option<Value> {
        match self.inner.get(key).cloned() {
            Some(Value::Null) => {
                self.reject(key, NOT_NULL);
                None
            }
            Some(value) => Some(value),
            None => {
                if required {
                    self.reject(key, REQUIRED);
                }
                None
            }
        }
    }

    pub fn get_str(&mut self, key: &str, field: StrField, required: bool) -> Option<String> {
        let value = self.present(key, required)?;
        let value = match value {
            Value::String(value) => value,
            Value::Number(value) => value.to_string(),
            _ => {
                self.reject(key, "Not a valid string.");
                return None;
            }
        };
        let value = if field.trim {
            value.trim().to_string()
        } else {
            value
        };

        let length = value.chars().count();
        if length == 0 {
            self.reject(key, NOT_BLANK);
            return None;
        }
        if length < field.min_length {
            self.reject(
                key,
                &format!(
                    "Ensure this field has at least {} characters.",
                    field.min_length
                ),
            );
            return None;
        }
        if length > field.max_length {
            self.reject(
                key,
                &format!(
                    "Ensure this field has no more than {} characters.",
                    field.max_length
                ),
            );
            return None;
        }

        Some(value)
    }

    pub fn get_email(&mut self, key: &str, max_length: usize, required: bool) -> Option<String> {
        let email = self.get_str(key, StrField::text(max_length), required)?;
        match email.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Some(email),
            _ => {
                self.reject(key, "Enter a valid email address.");
                None
            }
        }
    }

    pub fn get_non_negative(&mut self, key: &str, required: bool) -> Option<i32> {
        let value = self.present(key, required)?;
        let number = match &value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        match number.map(i32::try_from) {
            Some(Ok(n)) if n >= 0 => Some(n),
            Some(Ok(_)) => {
                self.reject(key, "Ensure this value is greater than or equal to 0.");
                None
            }
            Some(Err(_)) => {
                self.reject(key, "Ensure this value is less than or equal to 2147483647.");
                None
            }
            None => {
                self.reject(key, "A valid integer is required.");
                None
            }
        }
    }

    /// Non-negative decimal constrained to NUMERIC(5, 2), rescaled to two places
    pub fn get_price(&mut self, key: &str, required: bool) -> Option<Decimal> {
        let value = self.present(key, required)?;
        let parsed = match &value {
            Value::Number(n) => parse_decimal(&n.to_string()),
            Value::String(s) => parse_decimal(s.trim()),
            _ => None,
        };
        let Some(price) = parsed else {
            self.reject(key, "A valid number is required.");
            return None;
        };

        let normalized = price.normalize();
        let integer_digits = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;
        if normalized.is_sign_negative() && !normalized.is_zero() {
            self.reject(key, "Ensure this value is greater than or equal to 0.");
            return None;
        }
        if normalized.scale() > PRICE_DECIMAL_PLACES {
            self.reject(
                key,
                &format!(
                    "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
                ),
            );
            return None;
        }
        if normalized.trunc() >= Decimal::from(10_i64.pow(integer_digits)) {
            self.reject(
                key,
                &format!(
                    "Ensure that there are no more than {integer_digits} digits \
                     before the decimal point."
                ),
            );
            return None;
        }

        let mut price = normalized.abs();
        price.rescale(PRICE_DECIMAL_PLACES);
        Some(price)
    }

    /// List of primary keys, de-duplicated in first-seen order
    pub fn get_id_list(&mut self, key: &str) -> Option<Vec<Id>> {
        let value = self.present(key, false)?;
        let items = match value {
            Value::Array(items) => items,
            other => {
                self.reject(
                    key,
                    &format!(
                        "Expected a list of items but got type \"{}\".",
                        type_name(&other)
                    ),
                );
                return None;
            }
        };

        let mut ids: Vec<Id> = Vec::with_capacity(items.len());
        let mut valid = true;
        for item in items.iter() {
            let id = match item {
                Value::Number(n) => n.as_i64().and_then(|n| Id::try_from(n).ok()),
                Value::String(s) => s.trim().parse::<Id>().ok(),
                _ => None,
            };
            match id {
                Some(id) => {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                None => {
                    self.reject(
                        key,
                        &format!(
                            "Incorrect type. Expected pk value, received {}.",
                            type_name(item)
                        ),
                    );
                    valid = false;
                }
            }
        }

        valid.then_some(ids)
    }

    pub fn finish(self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(self.errors))
        }
    }
}

/// Plain or exponent notation; serde_json prints small floats as `1e-7`
fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_e| Decimal::from_scientific(value))
        .ok()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: Value) -> Form {
        let data: FormData = serde_json::from_value(value).expect("object payload");
        Form::from_data(data)
    }

    #[test]
    fn missing_and_blank_strings_are_reported() {
        let mut f = form(json!({ "name": "   " }));

        assert_eq!(f.get_str("name", StrField::text(10), true), None);
        assert_eq!(f.get_str("title", StrField::text(10), true), None);
        assert_eq!(f.get_str("link", StrField::text(10), false), None);

        let error = f.finish().unwrap_err();
        assert_eq!(error.fields["name"], vec![NOT_BLANK.to_string()]);
        assert_eq!(error.fields["title"], vec![REQUIRED.to_string()]);
        assert!(!error.fields.contains_key("link"));
    }

    #[test]
    fn secrets_keep_whitespace_and_enforce_minimum() {
        let mut f = form(json!({ "password": "pw", "other": " pass " }));

        assert_eq!(f.get_str("password", StrField::secret(5), true), None);
        assert_eq!(
            f.get_str("other", StrField::secret(5), true),
            Some(" pass ".to_string())
        );

        let error = f.finish().unwrap_err();
        assert_eq!(
            error.fields["password"],
            vec!["Ensure this field has at least 5 characters.".to_string()]
        );
    }

    #[test]
    fn emails_need_a_local_part_and_domain() {
        let mut f = form(json!({ "a": "salman@gmail.com", "b": "salman", "c": "@gmail.com" }));

        assert_eq!(f.get_email("a", 255, true), Some("salman@gmail.com".to_string()));
        assert_eq!(f.get_email("b", 255, true), None);
        assert_eq!(f.get_email("c", 255, true), None);
        assert_eq!(f.finish().unwrap_err().fields.len(), 2);
    }

    #[test]
    fn integers_accept_numeric_strings() {
        let mut f = form(json!({ "a": 13, "b": "25", "c": -1, "d": "ten", "e": 1.5 }));

        assert_eq!(f.get_non_negative("a", true), Some(13));
        assert_eq!(f.get_non_negative("b", true), Some(25));
        assert_eq!(f.get_non_negative("c", true), None);
        assert_eq!(f.get_non_negative("d", true), None);
        assert_eq!(f.get_non_negative("e", true), None);
        assert_eq!(f.finish().unwrap_err().fields.len(), 3);
    }

    #[test]
    fn prices_are_rescaled_to_two_places() {
        let mut f = form(json!({ "a": 7.05, "b": "12", "c": 12.0 }));

        assert_eq!(f.get_price("a", true).map(|p| p.to_string()), Some("7.05".to_string()));
        assert_eq!(f.get_price("b", true).map(|p| p.to_string()), Some("12.00".to_string()));
        assert_eq!(f.get_price("c", true).map(|p| p.to_string()), Some("12.00".to_string()));
        assert!(f.finish().is_ok());
    }

    #[test]
    fn prices_outside_numeric_5_2_are_rejected() {
        let mut f = form(json!({ "a": "1.005", "b": 1000, "c": "-3", "d": "cheap", "e": 999.99 }));

        assert_eq!(f.get_price("a", true), None);
        assert_eq!(f.get_price("b", true), None);
        assert_eq!(f.get_price("c", true), None);
        assert_eq!(f.get_price("d", true), None);
        assert!(f.get_price("e", true).is_some());

        let error = f.finish().unwrap_err();
        assert_eq!(
            error.fields["a"],
            vec!["Ensure that there are no more than 2 decimal places.".to_string()]
        );
        assert_eq!(
            error.fields["b"],
            vec![
                "Ensure that there are no more than 3 digits before the decimal point.".to_string()
            ]
        );
        assert_eq!(error.fields.len(), 4);
    }

    #[test]
    fn exponent_prices_report_decimal_places() {
        let mut f = form(json!({ "a": 1e-7, "b": "2.5e1" }));

        assert_eq!(f.get_price("a", true), None);
        assert_eq!(
            f.get_price("b", true).map(|p| p.to_string()),
            Some("25.00".to_string())
        );

        let error = f.finish().unwrap_err();
        assert_eq!(
            error.fields["a"],
            vec!["Ensure that there are no more than 2 decimal places.".to_string()]
        );
    }

    #[test]
    fn id_lists_dedupe_and_flag_bad_items() {
        let mut f = form(json!({ "tags": [3, "1", 3], "ingredients": [1, "x"], "bad": "1,2" }));

        assert_eq!(f.get_id_list("tags"), Some(vec![3, 1]));
        assert_eq!(f.get_id_list("ingredients"), None);
        assert_eq!(f.get_id_list("bad"), None);
        assert_eq!(f.get_id_list("absent"), None);

        let error = f.finish().unwrap_err();
        assert_eq!(
            error.fields["ingredients"],
            vec!["Incorrect type. Expected pk value, received str.".to_string()]
        );
        assert_eq!(
            error.fields["bad"],
            vec!["Expected a list of items but got type \"str\".".to_string()]
        );
    }

    #[test]
    fn null_is_not_absent() {
        let mut f = form(json!({ "tags": null }));

        assert!(f.contains("tags"));
        assert_eq!(f.get_id_list("tags"), None);
        assert_eq!(f.finish().unwrap_err().fields["tags"], vec![NOT_NULL.to_string()]);
    }
}
