//! `{{faker.category.method(args?)}}` support: a `FakerProvider` collaborator
//! trait plus a small allow-listed default implementation.
//!
//! Grounded in the ambient-collaborator pattern: pass concrete or
//! interface-typed collaborators explicitly; the default catalogue
//! intentionally covers only the categories the suite format is documented
//! to need, matching the closed-grammar philosophy of `src::expr`.

use rand::Rng;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct FakerError {
    pub category: String,
    pub method: String,
}

impl fmt::Display for FakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown faker method: {}.{}", self.category, self.method)
    }
}

impl std::error::Error for FakerError {}

/// `args`, if present, is already parsed JSON (or a plain string on parse
/// failure), per the interpolation grammar's argument-parsing rule.
pub trait FakerProvider: Send + Sync {
    fn generate(&self, category: &str, method: &str, args: &[Value]) -> Result<Value, FakerError>;
}

#[derive(Debug, Default)]
pub struct DefaultFakerProvider;

impl FakerProvider for DefaultFakerProvider {
    fn generate(&self, category: &str, method: &str, args: &[Value]) -> Result<Value, FakerError> {
        let mut rng = rand::thread_rng();
        let result = match (category, method) {
            ("string", "uuid") => Value::String(uuid::Uuid::new_v4().to_string()),
            ("string", "alphanumeric") => {
                let len = args
                    .first()
                    .and_then(|v| v.as_u64())
                    .unwrap_or(8) as usize;
                let s: String = (0..len)
                    .map(|_| {
                        const CHARS: &[u8] =
                            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
                        let idx = rng.gen_range(0..CHARS.len());
                        CHARS[idx] as char
                    })
                    .collect();
                Value::String(s)
            }
            ("internet", "email") => {
                let n: u32 = rng.gen_range(1000..9999);
                Value::String(format!("user{}@example.com", n))
            }
            ("internet", "username") => {
                let n: u32 = rng.gen_range(1000..9999);
                Value::String(format!("user{}", n))
            }
            ("number", "int") => {
                let min = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
                let max = args.get(1).and_then(|v| v.as_i64()).unwrap_or(1000);
                Value::from(rng.gen_range(min..=max))
            }
            ("datatype", "boolean") => Value::Bool(rng.gen_bool(0.5)),
            ("date", "recent") => Value::String(chrono::Utc::now().to_rfc3339()),
            ("person", "fullName") => Value::String("Jordan Rivera".to_string()),
            _ => {
                return Err(FakerError {
                    category: category.to_string(),
                    method: method.to_string(),
                })
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_uuid_string() {
        let provider = DefaultFakerProvider;
        let value = provider.generate("string", "uuid", &[]).unwrap();
        assert!(value.as_str().unwrap().len() >= 32);
    }

    #[test]
    fn unknown_category_is_an_error() {
        let provider = DefaultFakerProvider;
        assert!(provider.generate("bogus", "thing", &[]).is_err());
    }

    #[test]
    fn number_int_respects_bounds() {
        let provider = DefaultFakerProvider;
        let value = provider
            .generate("number", "int", &[Value::from(5), Value::from(5)])
            .unwrap();
        assert_eq!(value, Value::from(5));
    }
}
